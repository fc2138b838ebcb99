//! Typed, change-notifying access to browser-style key-value storage.
//!
//! [`StorageFacade`] wraps one raw storage medium (local or session) and
//! adds three things on top of plain string get/set:
//!
//! - typed reads and writes through a configurable serializer
//! - a cancellable "changing" notification before every single-key mutation
//! - a "changed" notification after it has been applied
//!
//! # Example
//!
//! ```
//! use webstore::{ChangePreview, HandlerResult, StorageFacade, StoreProvider};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let storage = StorageFacade::local(&StoreProvider::in_memory());
//! storage.on_changing(|preview: &mut ChangePreview| -> HandlerResult {
//!     preview.cancel = preview.key == "readonly";
//!     Ok(())
//! });
//!
//! storage.set_item("volume", &7u8).await.unwrap();
//! assert_eq!(storage.get_item::<u8>("volume").await.unwrap(), Some(7));
//!
//! let outcome = storage.set_item("readonly", &true).await.unwrap();
//! assert!(!outcome.is_applied());
//! # }
//! ```
//!
//! # Modules
//!
//! - [`facade`] — [`StorageFacade`] and [`ChangeOutcome`]
//! - [`events`] — Notification channels and handler traits
//! - [`config`] — [`StorageOptions`], loadable from TOML
//! - [`error`] — [`StorageError`]

pub mod config;
pub mod error;
pub mod events;
pub mod facade;
mod locks;

pub use config::StorageOptions;
pub use error::{StorageError, StorageResult};
pub use events::{
    Channel, ChangedHandler, ChangingHandler, EventHub, HandlerError, HandlerResult,
    SubscriptionId,
};
pub use facade::{ChangeOutcome, StorageFacade};

// Re-export key types
pub use webstore_backend::{
    BackendError, FileRawStore, InMemoryRawStore, RawStore, StoreProvider,
};
pub use webstore_serde::{
    DisplayContract, FnContract, JsonSerializer, NamingPolicy, NullHandling, SerdeError,
    SerializerOptions, StorageSerializer, TypeContract,
};
pub use webstore_types::{ChangePreview, ChangeRecord, ChangeValue, StoreKind};
