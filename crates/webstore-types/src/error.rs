use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A change value could not be decoded into the requested type.
    #[error("cannot decode change value: {0}")]
    Decode(String),

    /// A store kind name was not recognised.
    #[error("unknown store kind: {0}")]
    UnknownStoreKind(String),
}
