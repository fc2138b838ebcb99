use thiserror::Error;

use webstore_backend::BackendError;
use webstore_serde::SerdeError;
use webstore_types::StoreKind;

use crate::events::{Channel, HandlerError};

/// Errors returned by [`StorageFacade`](crate::StorageFacade) operations.
///
/// An absent key is never an error: reads report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage medium could not be prepared.
    #[error("cannot initialize {kind} storage: {source}")]
    Initialization {
        kind: StoreKind,
        #[source]
        source: BackendError,
    },

    /// A value could not be converted to stored text.
    #[error("cannot serialize value for '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: SerdeError,
    },

    /// Stored text could not be parsed as the requested type.
    #[error("cannot deserialize value of '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: SerdeError,
    },

    /// The medium rejected an operation (quota, I/O, corruption).
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] BackendError),

    /// A change subscriber returned an error.
    #[error("{channel} subscriber failed: {source}")]
    Subscriber {
        channel: Channel,
        #[source]
        source: HandlerError,
    },

    /// Keys must be non-empty.
    #[error("storage keys must not be empty")]
    EmptyKey,
}

impl StorageError {
    pub(crate) fn serialization(key: &str, source: SerdeError) -> Self {
        Self::Serialization {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn deserialization(key: &str, source: SerdeError) -> Self {
        Self::Deserialization {
            key: key.to_string(),
            source,
        }
    }

    /// Returns `true` if a subscriber caused this error.
    pub fn is_subscriber(&self) -> bool {
        matches!(self, Self::Subscriber { .. })
    }
}

/// Result alias for facade operations.
pub type StorageResult<T> = Result<T, StorageError>;
