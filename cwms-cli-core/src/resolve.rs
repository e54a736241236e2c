//! Path resolution for bulk uploads.
//!
//! Walks an input directory, keeps the files whose forward-slash relative
//! path matches a regex, and derives a blob id for each from that relative
//! path. The full target list is built before anything is uploaded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::BulkUploadConfig;
use crate::error::{ConfigurationError, Result};

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Path relative to the input directory, always `/`-separated.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub blob_id: String,
    pub office: String,
}

/// Enumerate and match files under `config.input_dir`.
///
/// Returns targets sorted by relative path. No match is not an error.
pub fn resolve_targets(config: &BulkUploadConfig) -> Result<Vec<UploadTarget>> {
    let pattern = compile_file_regex(&config.file_regex)?;
    let root = validate_input_dir(&config.input_dir)?;
    let prefix = config.blob_id_prefix.as_deref();

    info!(
        input_dir = %root.display(),
        recursive = config.recursive,
        "Resolving upload targets"
    );

    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let mut targets = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    error = %e,
                    path = ?e.path(),
                    "Skipping entry that could not be read"
                );
                continue;
            }
        };

        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let Some(relative_path) = relative_slash_path(root, entry.path()) else {
            continue;
        };
        if !pattern.is_match(&relative_path) {
            debug!(path = %relative_path, "Skipping file, regex did not match");
            continue;
        }

        let blob_id = blob_id_for_path(&relative_path, prefix);
        if derived_part(&blob_id, prefix).is_empty() {
            error!(path = %relative_path, "File name has no alphanumeric characters");
            return Err(ConfigurationError::EmptyBlobId { relative_path });
        }
        debug!(path = %relative_path, blob_id = %blob_id, "Matched file");
        targets.push(UploadTarget {
            relative_path,
            absolute_path: entry.path().to_path_buf(),
            blob_id,
            office: config.office.clone(),
        });
    }

    targets.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    reject_duplicate_ids(&targets)?;

    info!(count = targets.len(), "Resolved upload targets");
    Ok(targets)
}

/// Derive a blob id from a relative path, e.g. `subdir/file.json` -> `SUBDIR_FILE`.
///
/// The extension of the last segment is dropped, every run of non-alphanumeric
/// characters becomes a single `_`, and the result is uppercased. Letters
/// outside ASCII are kept. `prefix` is prepended as-is.
pub fn blob_id_for_path(relative_path: &str, prefix: Option<&str>) -> String {
    let stem = strip_extension(relative_path);

    let mut derived = String::with_capacity(stem.len());
    let mut pending_separator = false;
    for ch in stem.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !derived.is_empty() {
                derived.push('_');
            }
            pending_separator = false;
            derived.extend(ch.to_uppercase());
        } else {
            pending_separator = true;
        }
    }

    format!("{}{}", prefix.unwrap_or(""), derived)
}

fn derived_part<'a>(blob_id: &'a str, prefix: Option<&str>) -> &'a str {
    prefix
        .and_then(|p| blob_id.strip_prefix(p))
        .unwrap_or(blob_id)
}

/// Two files mapping to one id would overwrite or reject each other.
fn reject_duplicate_ids(targets: &[UploadTarget]) -> Result<()> {
    let mut by_id: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for target in targets {
        by_id
            .entry(target.blob_id.as_str())
            .or_default()
            .push(target.relative_path.as_str());
    }
    match by_id.into_iter().find(|(_, paths)| paths.len() > 1) {
        Some((blob_id, paths)) => {
            error!(blob_id, paths = ?paths, "Several files map to one blob id");
            Err(ConfigurationError::DuplicateBlobId {
                blob_id: blob_id.to_string(),
                paths: paths.into_iter().map(str::to_string).collect(),
            })
        }
        None => Ok(()),
    }
}

fn strip_extension(relative_path: &str) -> &str {
    let name_start = relative_path.rfind('/').map_or(0, |i| i + 1);
    let name = &relative_path[name_start..];
    // A leading dot names a hidden file, it does not start an extension.
    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => {
            &relative_path[..name_start + dot]
        }
        _ => relative_path,
    }
}

fn compile_file_regex(file_regex: &str) -> Result<Regex> {
    Regex::new(file_regex).map_err(|source| {
        error!(pattern = %file_regex, error = %source, "Invalid file regex");
        ConfigurationError::InvalidRegex {
            pattern: file_regex.to_string(),
            source,
        }
    })
}

fn validate_input_dir(input_dir: &Path) -> Result<&Path> {
    if !input_dir.exists() {
        error!(path = %input_dir.display(), "Input directory does not exist");
        return Err(ConfigurationError::InputDirMissing(input_dir.to_path_buf()));
    }
    if !input_dir.is_dir() {
        error!(path = %input_dir.display(), "Input path is not a directory");
        return Err(ConfigurationError::NotADirectory(input_dir.to_path_buf()));
    }
    Ok(input_dir)
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = rel
        .components()
        .map(|comp| comp.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}
