//! Shared store instances per [`StoreKind`].
//!
//! Every facade of the same kind built from one provider sees the same
//! medium, mirroring how all scripts in a browser page share a single
//! `localStorage` and a single `sessionStorage`.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use webstore_types::StoreKind;

use crate::file::FileRawStore;
use crate::memory::InMemoryRawStore;
use crate::traits::RawStore;

/// Holds one shared [`RawStore`] for each [`StoreKind`].
#[derive(Clone)]
pub struct StoreProvider {
    local: Arc<dyn RawStore>,
    session: Arc<dyn RawStore>,
}

impl StoreProvider {
    pub fn new(local: Arc<dyn RawStore>, session: Arc<dyn RawStore>) -> Self {
        Self { local, session }
    }

    /// Both kinds held in memory.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryRawStore::new()),
            Arc::new(InMemoryRawStore::new()),
        )
    }

    /// Local storage persisted to `path`; session storage in memory.
    pub fn with_local_file(path: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(FileRawStore::new(path)),
            Arc::new(InMemoryRawStore::new()),
        )
    }

    /// The process-wide provider, created in memory on first use.
    pub fn global() -> &'static StoreProvider {
        static GLOBAL: OnceLock<StoreProvider> = OnceLock::new();
        GLOBAL.get_or_init(StoreProvider::in_memory)
    }

    /// The shared store for `kind`.
    pub fn store(&self, kind: StoreKind) -> Arc<dyn RawStore> {
        match kind {
            StoreKind::Local => Arc::clone(&self.local),
            StoreKind::Session => Arc::clone(&self.session),
        }
    }
}

impl std::fmt::Debug for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreProvider").finish_non_exhaustive()
    }
}
