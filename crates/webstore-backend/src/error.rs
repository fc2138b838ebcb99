use std::path::PathBuf;

/// Errors from raw storage media.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The medium cannot serve requests (not present, lock poisoned, closed).
    #[error("storage medium unavailable: {0}")]
    Unavailable(String),

    /// A write would push the medium past its size limit.
    #[error("quota exceeded writing '{key}': {required} bytes needed, quota is {quota}")]
    QuotaExceeded {
        key: String,
        required: usize,
        quota: usize,
    },

    /// Keys must be non-empty strings.
    #[error("storage keys must not be empty")]
    EmptyKey,

    /// A persisted store file could not be parsed.
    #[error("corrupt store file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// I/O error from a file-backed medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Reject empty keys before they reach a medium.
pub(crate) fn check_key(key: &str) -> BackendResult<()> {
    if key.is_empty() {
        return Err(BackendError::EmptyKey);
    }
    Ok(())
}
