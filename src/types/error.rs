use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadAgentError {
    #[error("source file not found: {0}")]
    SourceFileNotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not a regular file: {0}")]
    NotRegularFile(String),
    #[error("truncated read: {path} (expected {expected} bytes, read {actual} bytes)")]
    TruncatedRead {
        path: String,
        expected: u64,
        actual: u64,
    },
    #[error("failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },
    #[error("an entry references a parent directory: {0}")]
    DirectoryTraversalError(String),
    #[error("e_tag mismatch. object in the target storage may be corrupted: {key}")]
    ETagMismatch { key: String },
    #[error("target storage is not specified")]
    TargetStorageNotSpecified,
    #[error("cancelled")]
    Cancelled,
}

pub fn is_cancelled_error(e: &anyhow::Error) -> bool {
    if let Some(err) = e.downcast_ref::<UploadAgentError>() {
        return *err == UploadAgentError::Cancelled;
    }

    false
}
