//! The "changing" and "changed" notification channels.
//!
//! Each facade owns one [`EventHub`] with two ordered subscriber lists.
//! Handlers run synchronously inside the emitting call, in registration
//! order. The list is snapshotted before a pass, so a handler may subscribe
//! or unsubscribe while it runs; the change takes effect on the next pass.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;
use webstore_types::{ChangePreview, ChangeRecord};

use crate::error::{StorageError, StorageResult};

/// Error type returned by handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// The two notification channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Before a mutation; subscribers may cancel.
    Changing,
    /// After a mutation has been applied.
    Changed,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changing => f.write_str("changing"),
            Self::Changed => f.write_str("changed"),
        }
    }
}

/// Identifies a registered handler so it can be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId {
    channel: Channel,
    seq: u64,
}

impl SubscriptionId {
    /// The channel this subscription belongs to.
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

/// Receives a [`ChangePreview`] before a mutation is applied.
///
/// Set `preview.cancel = true` to veto the mutation. Returning an error
/// aborts the operation without applying it.
pub trait ChangingHandler: Send + Sync {
    fn on_changing(&self, preview: &mut ChangePreview) -> HandlerResult;
}

impl<F> ChangingHandler for F
where
    F: Fn(&mut ChangePreview) -> HandlerResult + Send + Sync,
{
    fn on_changing(&self, preview: &mut ChangePreview) -> HandlerResult {
        self(preview)
    }
}

/// Receives a [`ChangeRecord`] after a mutation has been applied.
pub trait ChangedHandler: Send + Sync {
    fn on_changed(&self, record: &ChangeRecord) -> HandlerResult;
}

impl<F> ChangedHandler for F
where
    F: Fn(&ChangeRecord) -> HandlerResult + Send + Sync,
{
    fn on_changed(&self, record: &ChangeRecord) -> HandlerResult {
        self(record)
    }
}

/// An ordered list of handlers for one channel.
struct Subscribers<H: ?Sized> {
    entries: RwLock<Vec<(SubscriptionId, Arc<H>)>>,
}

impl<H: ?Sized> Subscribers<H> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn push(&self, id: SubscriptionId, handler: Arc<H>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    fn snapshot(&self) -> Vec<Arc<H>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Subscriber registry for both channels of one facade.
pub struct EventHub {
    next_seq: AtomicU64,
    changing: Subscribers<dyn ChangingHandler>,
    changed: Subscribers<dyn ChangedHandler>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(0),
            changing: Subscribers::new(),
            changed: Subscribers::new(),
        }
    }

    fn next_id(&self, channel: Channel) -> SubscriptionId {
        SubscriptionId {
            channel,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Register a "changing" handler at the end of the list.
    pub fn subscribe_changing(&self, handler: Arc<dyn ChangingHandler>) -> SubscriptionId {
        let id = self.next_id(Channel::Changing);
        self.changing.push(id, handler);
        id
    }

    /// Register a "changed" handler at the end of the list.
    pub fn subscribe_changed(&self, handler: Arc<dyn ChangedHandler>) -> SubscriptionId {
        let id = self.next_id(Channel::Changed);
        self.changed.push(id, handler);
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match id.channel {
            Channel::Changing => self.changing.remove(id),
            Channel::Changed => self.changed.remove(id),
        }
    }

    /// Number of handlers registered on `channel`.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::Changing => self.changing.len(),
            Channel::Changed => self.changed.len(),
        }
    }

    /// Run every "changing" handler against `preview`.
    ///
    /// A cancellation does not stop the pass; the caller inspects
    /// `preview.cancel` afterwards. The first handler error stops the pass.
    pub fn emit_changing(&self, preview: &mut ChangePreview) -> StorageResult<()> {
        let handlers = self.changing.snapshot();
        trace!(key = %preview.key, handlers = handlers.len(), "emitting changing");
        for handler in handlers {
            handler
                .on_changing(preview)
                .map_err(|source| StorageError::Subscriber {
                    channel: Channel::Changing,
                    source,
                })?;
        }
        Ok(())
    }

    /// Run every "changed" handler against `record`. The first handler
    /// error stops the pass.
    pub fn emit_changed(&self, record: &ChangeRecord) -> StorageResult<()> {
        let handlers = self.changed.snapshot();
        trace!(key = %record.key, handlers = handlers.len(), "emitting changed");
        for handler in handlers {
            handler
                .on_changed(record)
                .map_err(|source| StorageError::Subscriber {
                    channel: Channel::Changed,
                    source,
                })?;
        }
        Ok(())
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("changing", &self.changing.len())
            .field("changed", &self.changed.len())
            .finish()
    }
}
