use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Invocation parameters for one bulk upload run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUploadConfig {
    pub input_dir: PathBuf,
    pub file_regex: String,
    #[serde(default)]
    pub recursive: bool,
    pub office: String,
    #[serde(default)]
    pub blob_id_prefix: Option<String>,
}

impl BulkUploadConfig {
    pub fn trace_loaded(&self) {
        info!(
            input_dir = %self.input_dir.display(),
            file_regex = %self.file_regex,
            recursive = self.recursive,
            office = %self.office,
            blob_id_prefix = self.blob_id_prefix.as_deref().unwrap_or(""),
            "Loaded bulk upload config"
        );
        debug!(?self, "Bulk upload config loaded (full debug)");
    }
}

/// Settings applied to every blob stored in a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadOptions {
    pub description: Option<String>,
    /// Overrides the per-file guess when set.
    pub media_type: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}
