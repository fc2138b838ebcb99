//! In-memory storage medium for tests, session storage and embedding.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{check_key, BackendError, BackendResult};
use crate::traits::RawStore;

/// In-memory, `BTreeMap`-based storage medium.
///
/// Entries live behind a `RwLock` and are lost when the store is dropped.
/// Keys enumerate in sorted order. An optional byte quota (key length plus
/// value length, summed over all entries) makes writes fail the way a
/// browser rejects writes past its storage limit.
pub struct InMemoryRawStore {
    entries: RwLock<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl InMemoryRawStore {
    /// Create a new empty store with no quota.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota_bytes: None,
        }
    }

    /// Create a new empty store that rejects writes beyond `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Bytes currently used, counted the same way as the quota.
    pub fn used_bytes(&self) -> BackendResult<usize> {
        Ok(self
            .read()?
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum())
    }

    fn read(&self) -> BackendResult<RwLockReadGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .read()
            .map_err(|e| BackendError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> BackendResult<RwLockWriteGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .write()
            .map_err(|e| BackendError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryRawStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RawStore for InMemoryRawStore {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        check_key(key)?;
        let mut entries = self.write()?;
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
            let replaced = entries.get(key).map_or(0, |old| key.len() + old.len());
            let required = used - replaced + key.len() + value.len();
            if required > quota {
                return Err(BackendError::QuotaExceeded {
                    key: key.to_string(),
                    required,
                    quota,
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        self.write()?.remove(key);
        Ok(())
    }

    async fn remove_all(&self) -> BackendResult<usize> {
        let mut entries = self.write()?;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }

    async fn key_at(&self, index: usize) -> BackendResult<Option<String>> {
        Ok(self.read()?.keys().nth(index).cloned())
    }

    async fn count(&self) -> BackendResult<usize> {
        Ok(self.read()?.len())
    }

    async fn all_keys(&self) -> BackendResult<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    async fn contains(&self, key: &str) -> BackendResult<bool> {
        Ok(self.read()?.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryRawStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.entries.read().map(|e| e.len()).unwrap_or_default();
        f.debug_struct("InMemoryRawStore")
            .field("entry_count", &count)
            .field("quota_bytes", &self.quota_bytes)
            .finish()
    }
}
