//! Foundation types for webstore.
//!
//! This crate provides the payload and identity types shared by every other
//! webstore crate. It has no knowledge of serializers or storage backends.
//!
//! # Key Types
//!
//! - [`StoreKind`] — Selects the local or session storage medium
//! - [`ChangeValue`] — A value carried by a change notification
//! - [`ChangePreview`] — A pending mutation that subscribers may cancel
//! - [`ChangeRecord`] — A mutation that has already been applied

pub mod change;
pub mod error;
pub mod kind;

pub use change::{ChangePreview, ChangeRecord, ChangeValue};
pub use error::TypeError;
pub use kind::StoreKind;
