use std::path::PathBuf;
use thiserror::Error;

/// Problems with the invocation itself. Raised before any file is uploaded.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("input directory does not exist: {}", .0.display())]
    InputDirMissing(PathBuf),

    #[error("input path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("invalid --file-regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{relative_path} yields an empty blob id; rename it or narrow --file-regex")]
    EmptyBlobId { relative_path: String },

    #[error("blob id {blob_id} would be shared by {}", .paths.join(", "))]
    DuplicateBlobId { blob_id: String, paths: Vec<String> },
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;
