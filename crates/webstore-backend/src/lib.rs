//! Raw storage media for webstore.
//!
//! A raw store is a string-keyed map of opaque text: the shape of a browser's
//! `localStorage` and `sessionStorage`. The storage facade reaches the medium
//! only through the [`RawStore`] trait.
//!
//! # Backends
//!
//! - [`InMemoryRawStore`] -- `BTreeMap`-based store with an optional quota
//! - [`FileRawStore`] -- JSON file, rewritten atomically on every mutation
//!
//! [`StoreProvider`] hands out one shared instance per store kind.
//!
//! # Design Rules
//!
//! 1. Keys are non-empty strings; values are never interpreted.
//! 2. Each single get/set/remove is atomic with respect to other callers.
//! 3. Removing an absent key succeeds.
//! 4. Medium failures (quota, I/O, corrupt files) are propagated, never
//!    silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod provider;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use file::FileRawStore;
pub use memory::InMemoryRawStore;
pub use provider::StoreProvider;
pub use traits::RawStore;
