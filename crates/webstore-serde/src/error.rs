//! Error types for serialization.

use thiserror::Error;

/// Errors that can occur while converting values to and from stored text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerdeError {
    /// The value could not be converted to text.
    #[error("cannot encode value: {0}")]
    Encode(String),

    /// The text could not be parsed as the requested type.
    #[error("cannot decode value: {0}")]
    Decode(String),
}

/// Convenience type alias for serialization operations.
pub type SerdeResult<T> = std::result::Result<T, SerdeError>;
