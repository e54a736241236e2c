//!
//! This module implements the CLI interface for cwms-cli: command parsing,
//! argument validation and the async entrypoint used by `main` and tests.
//!
//! Business logic for bulk uploads (resolving files, deriving blob ids,
//! sequential upload with per-file fault isolation) lives in `cwms-cli-core`.
//! Network calls live in [`crate::cda`]; command handlers in [`crate::blob`]
//! and [`crate::clob`].
//!
//! ## How To Use
//! - For command-line users: use the installed `cwms-cli` binary with `--help`.
//! - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
use crate::{blob, clob};
use crate::load_config::{load_profile, Profile};
use anyhow::Result;
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI for the CWMS Data API.
#[derive(Parser, Debug)]
#[command(
    name = "cwms-cli",
    version,
    about = "Command line utilities for the CWMS Data API (CDA)"
)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Disable coloured log output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Optional YAML profile with CDA connection defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store, fetch, update, list and delete blobs in CWMS
    #[command(subcommand)]
    Blob(BlobCommand),
    /// Store, fetch, update, list and delete text clobs in CWMS
    #[command(subcommand)]
    Clob(ClobCommand),
}

#[derive(Subcommand, Debug)]
pub enum BlobCommand {
    /// Upload a file, or every matching file in a directory, as blobs
    Upload(UploadArgs),
    /// Download a blob to a local file
    Download(DownloadArgs),
    /// List blobs for an office
    List(ListArgs),
    /// Delete a blob
    Delete(DeleteArgs),
    /// Change the description, media type or content of an existing blob
    Update(BlobUpdateArgs),
}

#[derive(Subcommand, Debug)]
pub enum ClobCommand {
    /// Store a text file as a clob
    Upload(ClobUploadArgs),
    /// Write a clob's value to a local file
    Download(ClobDownloadArgs),
    /// List clobs for an office
    List(ClobListArgs),
    /// Delete a clob
    Delete(ClobDeleteArgs),
    /// Change the description or value of an existing clob
    Update(ClobUpdateArgs),
}

/// Where the CDA lives and who is asking.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Api root for CDA, e.g. https://host/cwms-data/
    #[arg(short = 'a', long = "api-root", alias = "api_root", env = "CDA_API_ROOT")]
    pub api_root: Option<String>,

    /// Api key for CDA
    #[arg(
        short = 'k',
        long = "api-key",
        alias = "api_key",
        env = "CDA_API_KEY",
        hide_env_values = true
    )]
    pub api_key: Option<String>,

    /// File whose first line is the api key
    #[arg(long = "api-key-loc", alias = "api_key_loc")]
    pub api_key_loc: Option<PathBuf>,

    /// Office the blobs belong to
    #[arg(short = 'o', long, env = "OFFICE")]
    pub office: Option<String>,
}

#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["input_file", "input_dir"])
))]
pub struct UploadArgs {
    /// Upload a single file (requires --blob-id)
    #[arg(long, conflicts_with = "input_dir")]
    pub input_file: Option<PathBuf>,

    /// Upload every matching file under this directory
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Regex searched against each path relative to --input-dir (anchor it yourself)
    #[arg(long, default_value = ".*")]
    pub file_regex: String,

    /// Descend into subdirectories of --input-dir
    #[arg(long, conflicts_with = "input_file")]
    pub recursive: bool,

    /// Blob id for --input-file mode
    #[arg(long, conflicts_with = "input_dir")]
    pub blob_id: Option<String>,

    /// Text prepended to every generated blob id in --input-dir mode
    #[arg(long, conflicts_with = "input_file")]
    pub blob_id_prefix: Option<String>,

    /// Optional description stored with each blob
    #[arg(long)]
    pub description: Option<String>,

    /// Override the media type; guessed from the file extension otherwise
    #[arg(long)]
    pub media_type: Option<String>,

    /// Replace existing blobs (sends fail-if-exists=false)
    #[arg(long, overrides_with = "no_overwrite")]
    pub overwrite: bool,

    /// Fail when a blob already exists (default)
    #[arg(long, overrides_with = "overwrite")]
    pub no_overwrite: bool,

    /// Log what would be sent without performing any request
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[arg(long)]
    pub blob_id: String,

    /// Destination path; defaults to the blob id, extension guessed from the media type
    #[arg(long)]
    pub dest: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// CDA `like` filter on blob ids
    #[arg(long, alias = "blob-id")]
    pub blob_id_like: Option<String>,

    /// Show at most this many rows
    #[arg(long)]
    pub limit: Option<usize>,

    /// Sort ids descending
    #[arg(long)]
    pub desc: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(long)]
    pub blob_id: String,

    /// Log what would be deleted without performing the request
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct BlobUpdateArgs {
    #[arg(long)]
    pub blob_id: String,

    /// Replace the blob content with this file
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    #[arg(long)]
    pub description: Option<String>,

    /// Media type; guessed from --input-file when omitted
    #[arg(long)]
    pub media_type: Option<String>,

    /// Send omitted fields as null and let the CDA clear them
    #[arg(long)]
    pub no_ignore_nulls: bool,

    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ClobUploadArgs {
    /// Text file whose content becomes the clob value
    #[arg(long)]
    pub input_file: PathBuf,

    #[arg(long)]
    pub clob_id: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Replace an existing clob (sends fail-if-exists=false)
    #[arg(long, overrides_with = "no_overwrite")]
    pub overwrite: bool,

    #[arg(long, overrides_with = "overwrite")]
    pub no_overwrite: bool,

    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ClobDownloadArgs {
    #[arg(long)]
    pub clob_id: String,

    /// Destination path; defaults to the clob id
    #[arg(long)]
    pub dest: Option<PathBuf>,

    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ClobListArgs {
    /// CDA `like` filter on clob ids
    #[arg(long)]
    pub clob_id_like: Option<String>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub desc: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ClobDeleteArgs {
    #[arg(long)]
    pub clob_id: String,

    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ClobUpdateArgs {
    #[arg(long)]
    pub clob_id: String,

    /// Replace the clob value with this file's text
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    #[arg(long)]
    pub description: Option<String>,

    /// Send omitted fields as null and let the CDA clear them
    #[arg(long)]
    pub no_ignore_nulls: bool,

    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let profile = match &cli.config {
        Some(path) => load_profile(path)?,
        None => Profile::default(),
    };

    match cli.command {
        Commands::Blob(command) => blob::run(command, &profile).await,
        Commands::Clob(command) => clob::run(command, &profile).await,
    }
}
