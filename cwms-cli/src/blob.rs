//! Handlers for `cwms-cli blob <command>`.
//!
//! Each handler resolves its connection settings, talks to the CDA through
//! [`crate::cda`] and prints user-facing results to stdout. Logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use regex::Regex;
use tracing::{info, warn};

use cwms_cli_core::bulk_upload::{upload_all, RunStatus};
use cwms_cli_core::config::{BulkUploadConfig, UploadOptions};
use cwms_cli_core::contract::{BlobUpload, Uploader};
use cwms_cli_core::media::{extension_for_media_type, guess_media_type};
use cwms_cli_core::resolve::resolve_targets;

use crate::cda::{view_url, BlobPatch, BlobSummary, CdaClient, DryRunUploader};
use crate::cli::{
    BlobCommand, BlobUpdateArgs, ConnectionArgs, DeleteArgs, DownloadArgs, ListArgs, UploadArgs,
};
use crate::load_config::{resolve_connection, resolve_office, ConnectionConfig, Profile};

const FALLBACK_EXTENSION: &str = "bin";

pub async fn run(command: BlobCommand, profile: &Profile) -> Result<()> {
    match command {
        BlobCommand::Upload(args) => upload_cmd(args, profile).await,
        BlobCommand::Download(args) => download_cmd(args, profile).await,
        BlobCommand::List(args) => list_cmd(args, profile).await,
        BlobCommand::Delete(args) => delete_cmd(args, profile).await,
        BlobCommand::Update(args) => update_cmd(args, profile).await,
    }
}

pub(crate) fn connection(args: &ConnectionArgs, profile: &Profile) -> Result<ConnectionConfig> {
    resolve_connection(
        args.api_root.as_deref(),
        args.api_key.as_deref(),
        args.api_key_loc.as_deref(),
        profile,
    )
}

/// Writes need a key unless nothing is sent.
pub(crate) fn require_api_key(conn: &ConnectionConfig, dry_run: bool) -> Result<()> {
    if conn.api_key.is_none() && !dry_run {
        anyhow::bail!("an api key is required: pass --api-key, --api-key-loc or set CDA_API_KEY");
    }
    Ok(())
}

fn uploader_for(conn: &ConnectionConfig, dry_run: bool) -> Result<Box<dyn Uploader>> {
    if dry_run {
        Ok(Box::new(DryRunUploader::new(&conn.api_root)?))
    } else {
        Ok(Box::new(CdaClient::new(conn)?))
    }
}

async fn upload_cmd(args: UploadArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let options = UploadOptions {
        description: args.description.clone(),
        media_type: args.media_type.clone(),
        overwrite: args.overwrite && !args.no_overwrite,
    };

    match (&args.input_file, &args.input_dir) {
        (Some(file), None) => upload_single(&args, file, office, &options, profile).await,
        (None, Some(dir)) => upload_directory(&args, dir, office, &options, profile).await,
        _ => anyhow::bail!("exactly one of --input-file or --input-dir is required"),
    }
}

async fn upload_single(
    args: &UploadArgs,
    file: &Path,
    office: String,
    options: &UploadOptions,
    profile: &Profile,
) -> Result<()> {
    let blob_id = args
        .blob_id
        .as_deref()
        .map(str::to_uppercase)
        .ok_or_else(|| anyhow::anyhow!("--blob-id is required with --input-file"))?;
    let content =
        fs::read(file).with_context(|| format!("Failed to read file {}", file.display()))?;
    let media_type = options
        .media_type
        .clone()
        .unwrap_or_else(|| guess_media_type(file).to_string());

    let conn = connection(&args.connection, profile)?;
    require_api_key(&conn, args.dry_run)?;
    let uploader = uploader_for(&conn, args.dry_run)?;

    let blob = BlobUpload {
        blob_id,
        office,
        content,
        media_type,
        description: options.description.clone(),
        overwrite: options.overwrite,
    };
    info!(file = %file.display(), blob_id = %blob.blob_id, "Uploading single file");
    let stored = uploader
        .upload(&blob)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to upload blob {}: {e}", blob.blob_id))?;
    println!("{}", stored.view_url);
    Ok(())
}

async fn upload_directory(
    args: &UploadArgs,
    dir: &Path,
    office: String,
    options: &UploadOptions,
    profile: &Profile,
) -> Result<()> {
    let config = BulkUploadConfig {
        input_dir: dir.to_path_buf(),
        file_regex: args.file_regex.clone(),
        recursive: args.recursive,
        office,
        blob_id_prefix: args.blob_id_prefix.clone(),
    };
    config.trace_loaded();

    let targets = resolve_targets(&config)?;
    if targets.is_empty() {
        warn!(
            input_dir = %dir.display(),
            file_regex = %args.file_regex,
            "No files matched, exiting without uploading"
        );
        return Ok(());
    }

    let conn = connection(&args.connection, profile)?;
    require_api_key(&conn, args.dry_run)?;
    let uploader = uploader_for(&conn, args.dry_run)?;

    let report = upload_all(&targets, uploader.as_ref(), options).await;
    for stored in report.outcomes.iter().filter_map(|o| o.stored()) {
        println!("{}", stored.view_url);
    }

    match report.status() {
        RunStatus::CompletedClean => Ok(()),
        RunStatus::CompletedWithFailures => {
            for (path, detail) in report.failures() {
                eprintln!("{path}: {detail}");
            }
            Err(anyhow::anyhow!(report.summary()))
        }
    }
}

async fn download_cmd(args: DownloadArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let blob_id = args.blob_id.to_uppercase();
    let conn = connection(&args.connection, profile)?;
    let client = CdaClient::new(&conn)?;

    let fetched = client
        .get_blob(&blob_id, &office)
        .await
        .with_context(|| format!("Failed to download blob {blob_id}"))?;
    let (content, media_type) = decode_body(fetched.content, fetched.media_type)?;

    let dest = destination_path(args.dest.as_deref(), &blob_id, media_type.as_deref());
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(&dest, &content).with_context(|| format!("Failed to write {}", dest.display()))?;

    info!(
        blob_id = %blob_id,
        office = %office,
        dest = %dest.display(),
        bytes = content.len(),
        "Downloaded blob"
    );
    println!("{}", dest.display());
    Ok(())
}

async fn list_cmd(args: ListArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let conn = connection(&args.connection, profile)?;
    let client = CdaClient::new(&conn)?;

    let blobs = client
        .list_blobs(&office, args.blob_id_like.as_deref())
        .await
        .context("Failed to list blobs")?;
    let rows = sort_and_limit(blobs, |b: &BlobSummary| b.id.as_str(), args.desc, args.limit);
    info!(office = %office, rows = rows.len(), "Listed blobs");
    for line in format_rows(&rows) {
        println!("{line}");
    }
    Ok(())
}

async fn delete_cmd(args: DeleteArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let blob_id = args.blob_id.to_uppercase();
    let conn = connection(&args.connection, profile)?;
    require_api_key(&conn, args.dry_run)?;
    let client = CdaClient::new(&conn)?;

    if args.dry_run {
        let url = view_url(client.api_root(), &blob_id, &office)?;
        info!(url = %url, "--dry-run enabled, would DELETE blob");
        return Ok(());
    }

    client
        .delete_blob(&blob_id, &office)
        .await
        .with_context(|| format!("Failed to delete blob {blob_id}"))?;
    info!(blob_id = %blob_id, office = %office, "Deleted blob");
    Ok(())
}

async fn update_cmd(args: BlobUpdateArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let content = match &args.input_file {
        Some(file) => Some(
            fs::read(file).with_context(|| format!("Failed to read file {}", file.display()))?,
        ),
        None => None,
    };
    let media_type = args.media_type.clone().or_else(|| {
        args.input_file
            .as_deref()
            .map(|file| guess_media_type(file).to_string())
    });
    let patch = BlobPatch {
        blob_id: args.blob_id.to_uppercase(),
        office,
        description: args.description.clone(),
        media_type,
        content,
    };
    let ignore_nulls = !args.no_ignore_nulls;

    let conn = connection(&args.connection, profile)?;
    require_api_key(&conn, args.dry_run)?;
    let client = CdaClient::new(&conn)?;
    let url = view_url(client.api_root(), &patch.blob_id, &patch.office)?;

    if args.dry_run {
        info!(
            url = %url,
            ignore_nulls,
            description_set = patch.description.is_some(),
            media_type = ?patch.media_type,
            content_bytes = ?patch.content.as_ref().map(Vec::len),
            "--dry-run enabled, would PATCH blob"
        );
        return Ok(());
    }

    client
        .update_blob(&patch, ignore_nulls)
        .await
        .with_context(|| format!("Failed to update blob {}", patch.blob_id))?;
    info!(blob_id = %patch.blob_id, "Updated blob");
    println!("{url}");
    Ok(())
}

/// Unwraps `;base64` data URLs and base64-declared bodies; anything else is returned untouched.
fn decode_body(
    content: Vec<u8>,
    media_type: Option<String>,
) -> Result<(Vec<u8>, Option<String>)> {
    let data_url = Regex::new(r"(?is)^data:([^;,]+)(?:;[^;,]*)*;base64,(.*)$")?;

    let text = match std::str::from_utf8(&content) {
        Ok(text) => text.trim(),
        Err(_) => return Ok((content, media_type)),
    };

    if let Some(caps) = data_url.captures(text) {
        let declared = caps.get(1).map(|m| m.as_str().to_string());
        let payload = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        return Ok((decode_base64_lenient(payload)?, declared.or(media_type)));
    }

    let declared_base64 = media_type
        .as_deref()
        .is_some_and(|m| m.to_ascii_lowercase().contains("base64"));
    if declared_base64 {
        return Ok((decode_base64_lenient(text)?, media_type));
    }
    Ok((content, media_type))
}

fn decode_base64_lenient(payload: &str) -> Result<Vec<u8>> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD_NO_PAD
        .decode(cleaned.trim_end_matches('='))
        .context("Failed to decode base64 blob content")
}

fn destination_path(dest: Option<&Path>, blob_id: &str, media_type: Option<&str>) -> PathBuf {
    let path = dest
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(blob_id));
    if path.extension().is_some() {
        return path;
    }
    let ext = media_type
        .and_then(extension_for_media_type)
        .unwrap_or(FALLBACK_EXTENSION);
    path.with_extension(ext)
}

/// Sort rows by id, ascending unless `desc`, then keep the first `limit`.
pub(crate) fn sort_and_limit<T, F>(mut rows: Vec<T>, id: F, desc: bool, limit: Option<usize>) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    rows.sort_by(|a, b| id(a).cmp(id(b)));
    if desc {
        rows.reverse();
    }
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

fn format_rows(rows: &[BlobSummary]) -> Vec<String> {
    let cells: Vec<Vec<&str>> = rows
        .iter()
        .map(|r| {
            vec![
                r.id.as_str(),
                r.media_type_id.as_deref().unwrap_or(""),
                r.description.as_deref().unwrap_or(""),
            ]
        })
        .collect();
    aligned_rows(&cells)
}

/// Left-aligned columns separated by two spaces, trailing blanks trimmed.
pub(crate) fn aligned_rows(rows: &[Vec<&str>]) -> Vec<String> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .map(|r| r.get(c).map_or(0, |cell| cell.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    rows.iter()
        .map(|row| {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            line.trim_end().to_string()
        })
        .collect()
}
