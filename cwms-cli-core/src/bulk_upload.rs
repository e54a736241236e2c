//! Sequential bulk upload: attempts every resolved target once and aggregates the result.
//!
//! The driver takes the ordered targets produced by [`crate::resolve`] and an
//! [`Uploader`] capability, then:
//!   - Reads each file's bytes and determines its media type
//!   - Awaits one upload attempt per target, strictly in order
//!   - Records a terminal outcome per target (`Succeeded` or `Failed`)
//!   - Returns a [`BulkUploadReport`] the CLI reduces to an exit status
//!
//! # Error Handling
//! A failure for one target (unreadable file, rejected upload, transport
//! error) is recorded and the run moves on. Nothing is retried. Only the
//! caller decides what a failed run means for the process.
//!
//! # Navigation
//! - Main entrypoint: [`upload_all`]
//! - Supporting types: [`UploadOutcome`], [`TargetState`], [`RunStatus`], [`BulkUploadReport`].

use tracing::{debug, error, info, warn};

use crate::config::UploadOptions;
use crate::contract::{BlobUpload, StoredBlob, Uploader};
use crate::media::guess_media_type;
use crate::resolve::UploadTarget;

/// Terminal state of one target. A target is pending until its attempt returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    Succeeded(StoredBlob),
    Failed { detail: String },
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub target: UploadTarget,
    pub state: TargetState,
}

impl UploadOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.state, TargetState::Succeeded(_))
    }

    pub fn stored(&self) -> Option<&StoredBlob> {
        match &self.state {
            TargetState::Succeeded(stored) => Some(stored),
            TargetState::Failed { .. } => None,
        }
    }

    pub fn error_detail(&self) -> Option<&str> {
        match &self.state {
            TargetState::Succeeded(_) => None,
            TargetState::Failed { detail } => Some(detail),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    CompletedClean,
    CompletedWithFailures,
}

/// Outcomes of one run, in attempt order.
#[derive(Debug, Default)]
pub struct BulkUploadReport {
    pub outcomes: Vec<UploadOutcome>,
}

impl BulkUploadReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    pub fn status(&self) -> RunStatus {
        if self.outcomes.iter().all(UploadOutcome::succeeded) {
            RunStatus::CompletedClean
        } else {
            RunStatus::CompletedWithFailures
        }
    }

    /// `(relative_path, detail)` for each failed target.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.outcomes.iter().filter_map(|o| {
            o.error_detail()
                .map(|detail| (o.target.relative_path.as_str(), detail))
        })
    }

    pub fn summary(&self) -> String {
        format!("{}/{} files failed", self.failed_count(), self.attempted())
    }
}

/// Upload every target in order, one attempt each.
pub async fn upload_all<U>(
    targets: &[UploadTarget],
    uploader: &U,
    options: &UploadOptions,
) -> BulkUploadReport
where
    U: Uploader + ?Sized,
{
    info!(targets = targets.len(), "[BULK] Starting bulk upload");
    if targets.is_empty() {
        warn!("[BULK] No files matched, nothing to upload");
    }

    let mut report = BulkUploadReport {
        outcomes: Vec::with_capacity(targets.len()),
    };

    for (index, target) in targets.iter().enumerate() {
        info!(
            file = %target.relative_path,
            blob_id = %target.blob_id,
            position = index + 1,
            total = targets.len(),
            "[BULK] Uploading file"
        );
        let state = attempt(target, uploader, options).await;
        report.outcomes.push(UploadOutcome {
            target: target.clone(),
            state,
        });
    }

    match report.status() {
        RunStatus::CompletedClean => {
            info!(attempted = report.attempted(), "[BULK] Completed cleanly")
        }
        RunStatus::CompletedWithFailures => error!(
            attempted = report.attempted(),
            failed = report.failed_count(),
            "[BULK][ERROR] Completed with failures"
        ),
    }
    report
}

async fn attempt<U>(target: &UploadTarget, uploader: &U, options: &UploadOptions) -> TargetState
where
    U: Uploader + ?Sized,
{
    let content = match tokio::fs::read(&target.absolute_path).await {
        Ok(content) => content,
        Err(e) => {
            error!(
                error = ?e,
                path = %target.absolute_path.display(),
                "[BULK][ERROR] Failed to read file"
            );
            return TargetState::Failed {
                detail: format!("failed to read file: {e}"),
            };
        }
    };

    let media_type = options
        .media_type
        .clone()
        .unwrap_or_else(|| guess_media_type(&target.absolute_path).to_string());

    let blob = BlobUpload {
        blob_id: target.blob_id.clone(),
        office: target.office.clone(),
        content,
        media_type,
        description: options.description.clone(),
        overwrite: options.overwrite,
    };

    match uploader.upload(&blob).await {
        Ok(stored) => {
            info!(file = %target.relative_path, blob_id = %stored.blob_id, "[BULK] Upload succeeded");
            match serde_json::to_string_pretty(&stored) {
                Ok(json) => debug!(json = %json, "[BULK][DEBUG] Stored blob"),
                Err(e) => debug!(error = ?e, "[BULK][DEBUG] Failed to serialize stored blob"),
            }
            TargetState::Succeeded(stored)
        }
        Err(e) => {
            error!(file = %target.relative_path, error = %e, "[BULK][ERROR] Upload failed");
            TargetState::Failed {
                detail: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ok() -> TargetState {
        TargetState::Succeeded(StoredBlob {
            blob_id: "A".to_string(),
            office: "SWT".to_string(),
            view_url: "https://cda.test/blobs/A?office=SWT".to_string(),
        })
    }

    fn outcome(path: &str, state: TargetState) -> UploadOutcome {
        UploadOutcome {
            target: UploadTarget {
                relative_path: path.to_string(),
                absolute_path: PathBuf::from(path),
                blob_id: path.to_uppercase(),
                office: "SWT".to_string(),
            },
            state,
        }
    }

    #[test]
    fn empty_report_is_clean() {
        let report = BulkUploadReport::default();
        assert_eq!(report.status(), RunStatus::CompletedClean);
        assert_eq!(report.summary(), "0/0 files failed");
    }

    #[test]
    fn any_failure_marks_run_failed() {
        let report = BulkUploadReport {
            outcomes: vec![
                outcome("a", ok()),
                outcome(
                    "b",
                    TargetState::Failed {
                        detail: "boom".into(),
                    },
                ),
            ],
        };
        assert_eq!(report.status(), RunStatus::CompletedWithFailures);
        assert_eq!(report.failures().collect::<Vec<_>>(), vec![("b", "boom")]);
        assert_eq!(report.summary(), "1/2 files failed");
    }

    #[test]
    fn error_detail_only_on_failure() {
        assert_eq!(outcome("a", ok()).error_detail(), None);
        let failed = outcome(
            "a",
            TargetState::Failed {
                detail: "nope".into(),
            },
        );
        assert!(!failed.succeeded());
        assert_eq!(failed.error_detail(), Some("nope"));
    }
}
