//! Per-key write serialization.
//!
//! A mutating call holds its key's lock across preview, apply and record, so
//! two writers to the same key can never both pass their cancellation check
//! before either applies. Different keys never contend. Entries are dropped
//! from the table once no holder or waiter references them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub(crate) struct KeyLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to `key`.
    pub(crate) async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let lock = Arc::clone(self.table().entry(key.to_string()).or_default());
        let guard = Arc::clone(&lock).lock_owned().await;
        KeyGuard {
            owner: self,
            key: key.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub(crate) fn len(&self) -> usize {
        self.table().len()
    }
}

/// Exclusive access to one key, released on drop.
pub(crate) struct KeyGuard<'a> {
    owner: &'a KeyLocks,
    key: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.owner.table();
        // The table and this guard hold the only references: nobody waits.
        if Arc::strong_count(&self.lock) == 2 {
            table.remove(&self.key);
        }
    }
}
