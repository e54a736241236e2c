#![allow(unused)]

//! # contract: the upload capability handed to the bulk driver
//!
//! This module defines a single trait (`Uploader`) and the plain data that
//! crosses it. The driver in [`crate::bulk_upload`] only ever sees this
//! trait; the CLI crate provides the real CDA client and a dry-run
//! implementation, tests use the generated [`MockUploader`].
//!
//! ## Interface
//! - One async method: store one blob, return an acknowledgement or an error.
//! - Errors are boxed trait objects so any client (HTTP, file-based, mock)
//!   can report failures without the core knowing its error type.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit and integration tests.

use async_trait::async_trait;

use mockall::{automock, predicate::*};

/// Error returned by an [`Uploader`]. Recorded per file by the driver, never propagated.
pub type UploadError = Box<dyn std::error::Error + Send + Sync>;

/// Everything needed to store one blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobUpload {
    /// Blob identifier as it will be stored (already uppercased/derived).
    pub blob_id: String,
    /// Office code the blob belongs to, e.g. `SWT`.
    pub office: String,
    /// Raw file bytes.
    pub content: Vec<u8>,
    /// Media type sent as `media-type-id`.
    pub media_type: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Replace an existing blob with the same id (`fail-if-exists=false`).
    pub overwrite: bool,
}

/// Acknowledgement for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredBlob {
    pub blob_id: String,
    pub office: String,
    /// Where the blob can be viewed on the CDA.
    pub view_url: String,
}

/// Capability for storing blobs on a remote service.
///
/// The implementor owns transport, authentication and timeouts. One call is
/// one attempt: implementations must not retry internally.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Store a single blob.
    async fn upload(&self, blob: &BlobUpload) -> Result<StoredBlob, UploadError>;
}
