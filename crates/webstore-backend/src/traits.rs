use async_trait::async_trait;

use crate::error::BackendResult;

/// A raw string-keyed storage medium.
///
/// This is the minimal surface the storage facade depends on; it maps 1:1
/// onto a browser's `localStorage`/`sessionStorage` objects. Implementations
/// must make each single `get`/`set`/`remove` atomic with respect to other
/// callers. Values are opaque text that the medium never interprets.
///
/// Enumeration order (`key_at`, `all_keys`) is whatever the medium natively
/// uses and may change after any mutation.
#[async_trait]
pub trait RawStore: Send + Sync {
    /// Prepare the medium for use. Must be idempotent.
    async fn open(&self) -> BackendResult<()> {
        Ok(())
    }

    /// Read the text stored under `key`, `Ok(None)` if absent.
    async fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> BackendResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> BackendResult<()>;

    /// Remove every entry, returning how many were removed.
    async fn remove_all(&self) -> BackendResult<usize>;

    /// The key at zero-based enumeration position `index`, `Ok(None)` if
    /// out of range.
    async fn key_at(&self, index: usize) -> BackendResult<Option<String>>;

    /// Number of entries.
    async fn count(&self) -> BackendResult<usize>;

    /// Snapshot of all keys in enumeration order.
    async fn all_keys(&self) -> BackendResult<Vec<String>>;

    /// Whether `key` has an entry.
    ///
    /// Default implementation reads the value; backends may override to avoid
    /// copying it.
    async fn contains(&self, key: &str) -> BackendResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
