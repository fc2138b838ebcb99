//! Serialization layer for webstore.
//!
//! Storage media hold opaque text. This crate turns typed values into that
//! text and back, and produces the structured form reported in change
//! notifications.
//!
//! # Modules
//!
//! - [`error`] — Error types for encoding and decoding
//! - [`options`] — [`SerializerOptions`]: naming and null policies
//! - [`names`] — Identifier case conversion used by the naming policies
//! - [`encode`] / [`decode`] — Value conversion that applies the policies at
//!   struct boundaries
//! - [`traits`] — The [`StorageSerializer`] and [`TypeContract`] interfaces
//! - [`json`] — [`JsonSerializer`], the default implementation

pub mod decode;
pub mod encode;
pub mod error;
pub mod json;
pub mod names;
pub mod options;
pub mod traits;

pub use error::{SerdeError, SerdeResult};
pub use json::JsonSerializer;
pub use options::{NamingPolicy, NullHandling, SerializerOptions};
pub use traits::{DisplayContract, FnContract, StorageSerializer, TypeContract};
