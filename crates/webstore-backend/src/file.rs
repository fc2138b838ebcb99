//! Durable storage medium backed by a single JSON file.
//!
//! The whole store is one JSON object mapping keys to their stored text.
//! It is loaded on first use and rewritten after every mutation by writing a
//! uniquely named temp file in the same directory and renaming it over the
//! original, so a crash leaves either the old or the new contents on disk.
//! When a rewrite fails the in-memory map is rolled back to match the file.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::{check_key, BackendError, BackendResult};
use crate::traits::RawStore;

type Entries = BTreeMap<String, String>;

/// A [`RawStore`] persisted to a JSON file.
///
/// A missing file is an empty store. A file that exists but does not parse
/// is reported as [`BackendError::Corrupt`] rather than silently replaced.
pub struct FileRawStore {
    path: PathBuf,
    entries: Mutex<Option<Entries>>,
}

impl FileRawStore {
    /// Create a store persisted at `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the entries, loading them from disk if this is the first access.
    async fn loaded(&self) -> BackendResult<MutexGuard<'_, Option<Entries>>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard)
    }

    async fn load(&self) -> BackendResult<Entries> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "store file not found; starting empty");
                return Ok(Entries::new());
            }
            Err(e) => return Err(e.into()),
        };
        let entries: Entries = serde_json::from_slice(&bytes).map_err(|e| BackendError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        info!(path = %self.path.display(), entries = entries.len(), "store file loaded");
        Ok(entries)
    }

    async fn persist(&self, entries: &Entries) -> BackendResult<()> {
        let bytes = serde_json::to_vec_pretty(entries).map_err(|e| BackendError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let path = self.path.clone();
        let len = bytes.len();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| BackendError::Unavailable(format!("store file writer failed: {e}")))??;
        debug!(path = %self.path.display(), bytes = len, "store file written");
        Ok(())
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> BackendResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Access the loaded map inside a guard returned by [`FileRawStore::loaded`].
fn map(guard: &mut Option<Entries>) -> BackendResult<&mut Entries> {
    guard
        .as_mut()
        .ok_or_else(|| BackendError::Unavailable("store file not loaded".into()))
}

#[async_trait]
impl RawStore for FileRawStore {
    async fn open(&self) -> BackendResult<()> {
        self.loaded().await.map(|_| ())
    }

    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut guard = self.loaded().await?;
        Ok(map(&mut guard)?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        check_key(key)?;
        let mut guard = self.loaded().await?;
        let entries = map(&mut guard)?;
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(entries).await {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        let mut guard = self.loaded().await?;
        let entries = map(&mut guard)?;
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(entries).await {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    async fn remove_all(&self) -> BackendResult<usize> {
        let mut guard = self.loaded().await?;
        let entries = map(&mut guard)?;
        let removed = std::mem::take(entries);
        if let Err(e) = self.persist(entries).await {
            *entries = removed;
            return Err(e);
        }
        Ok(removed.len())
    }

    async fn key_at(&self, index: usize) -> BackendResult<Option<String>> {
        let mut guard = self.loaded().await?;
        Ok(map(&mut guard)?.keys().nth(index).cloned())
    }

    async fn count(&self) -> BackendResult<usize> {
        let mut guard = self.loaded().await?;
        Ok(map(&mut guard)?.len())
    }

    async fn all_keys(&self) -> BackendResult<Vec<String>> {
        let mut guard = self.loaded().await?;
        Ok(map(&mut guard)?.keys().cloned().collect())
    }

    async fn contains(&self, key: &str) -> BackendResult<bool> {
        let mut guard = self.loaded().await?;
        Ok(map(&mut guard)?.contains_key(key))
    }
}

impl std::fmt::Debug for FileRawStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRawStore")
            .field("path", &self.path)
            .finish()
    }
}
