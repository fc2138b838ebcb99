use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, trace, warn};

use webstore_backend::{RawStore, StoreProvider};
use webstore_serde::{JsonSerializer, StorageSerializer, TypeContract};
use webstore_types::{ChangePreview, ChangeRecord, ChangeValue, StoreKind};

use crate::config::StorageOptions;
use crate::error::{StorageError, StorageResult};
use crate::events::{
    Channel, ChangedHandler, ChangingHandler, EventHub, HandlerResult, SubscriptionId,
};
use crate::locks::KeyLocks;

/// What happened to a single-key mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The mutation was written and "changed" subscribers were notified.
    Applied,
    /// A "changing" subscriber vetoed the mutation; the store is untouched.
    Cancelled,
    /// Nothing to do (removal of an absent key); no events were emitted.
    Skipped,
}

impl ChangeOutcome {
    /// Returns `true` if the mutation reached the store.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// The physical effect of an approved mutation.
enum Mutation<'a> {
    Write(&'a str),
    Remove,
}

/// Typed, change-notifying access to one storage medium.
///
/// Every mutating call follows the same cycle: build a [`ChangePreview`],
/// run all "changing" subscribers, apply the mutation unless the preview
/// was cancelled, then run all "changed" subscribers with a
/// [`ChangeRecord`]. Calls on the same key are serialized for the whole
/// cycle; calls on different keys proceed independently.
///
/// `clear` is a bulk operation outside this cycle and emits no events.
pub struct StorageFacade<S = JsonSerializer> {
    kind: StoreKind,
    store: Arc<dyn RawStore>,
    serializer: S,
    options: StorageOptions,
    events: EventHub,
    locks: KeyLocks,
    initialized: OnceCell<()>,
}

impl StorageFacade<JsonSerializer> {
    /// Create a facade over `store` using the JSON serializer configured by
    /// `options`.
    pub fn new(kind: StoreKind, store: Arc<dyn RawStore>, options: StorageOptions) -> Self {
        let serializer = JsonSerializer::new(options.serializer.clone());
        Self::with_serializer(kind, store, options, serializer)
    }

    /// Bind to the provider's shared store for `kind`.
    pub fn from_provider(provider: &StoreProvider, kind: StoreKind, options: StorageOptions) -> Self {
        Self::new(kind, provider.store(kind), options)
    }

    /// Local storage from `provider`, default options.
    pub fn local(provider: &StoreProvider) -> Self {
        Self::from_provider(provider, StoreKind::Local, StorageOptions::default())
    }

    /// Session storage from `provider`, default options.
    pub fn session(provider: &StoreProvider) -> Self {
        Self::from_provider(provider, StoreKind::Session, StorageOptions::default())
    }
}

impl<S: StorageSerializer> StorageFacade<S> {
    /// Create a facade with a custom serializer.
    pub fn with_serializer(
        kind: StoreKind,
        store: Arc<dyn RawStore>,
        options: StorageOptions,
        serializer: S,
    ) -> Self {
        Self {
            kind,
            store,
            serializer,
            options,
            events: EventHub::new(),
            locks: KeyLocks::new(),
            initialized: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    // ---- Subscriptions ----

    /// Register a closure on the "changing" channel.
    pub fn on_changing<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&mut ChangePreview) -> HandlerResult + Send + Sync + 'static,
    {
        self.events.subscribe_changing(Arc::new(handler))
    }

    /// Register a closure on the "changed" channel.
    pub fn on_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeRecord) -> HandlerResult + Send + Sync + 'static,
    {
        self.events.subscribe_changed(Arc::new(handler))
    }

    /// Register a shared handler on the "changing" channel.
    pub fn subscribe_changing(&self, handler: Arc<dyn ChangingHandler>) -> SubscriptionId {
        self.events.subscribe_changing(handler)
    }

    /// Register a shared handler on the "changed" channel.
    pub fn subscribe_changed(&self, handler: Arc<dyn ChangedHandler>) -> SubscriptionId {
        self.events.subscribe_changed(handler)
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Number of handlers on `channel`.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.events.subscriber_count(channel)
    }

    // ---- Lifecycle ----

    /// Prepare the underlying medium.
    ///
    /// Idempotent and safe to call concurrently; the medium is opened once.
    /// Every other operation calls this first, so explicit initialization
    /// is only needed to surface medium errors early.
    pub async fn initialize(&self) -> StorageResult<()> {
        self.initialized
            .get_or_try_init(|| async {
                self.store
                    .open()
                    .await
                    .map_err(|source| StorageError::Initialization {
                        kind: self.kind,
                        source,
                    })?;
                info!(kind = %self.kind, "storage initialized");
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }

    /// Remove every entry. No per-key events are emitted.
    pub async fn clear(&self) -> StorageResult<()> {
        self.initialize().await?;
        let removed = self.store.remove_all().await?;
        debug!(kind = %self.kind, removed, "storage cleared");
        Ok(())
    }

    // ---- Reads ----

    /// Read and decode the value stored under `key`.
    ///
    /// `Ok(None)` if the key is absent or holds the null literal; an error if
    /// the stored text is not a valid `T`.
    pub async fn get_item<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(text) = self.get_item_as_string(key).await? else {
            return Ok(None);
        };
        self.serializer
            .deserialize(&text)
            .map_err(|e| StorageError::deserialization(key, e))
    }

    /// Read and decode the value stored under `key` with an explicit contract.
    pub async fn get_item_with<T, C>(&self, key: &str, contract: &C) -> StorageResult<Option<T>>
    where
        C: TypeContract<T> + ?Sized,
    {
        let Some(text) = self.get_item_as_string(key).await? else {
            return Ok(None);
        };
        contract
            .decode(&text, &self.options.serializer)
            .map_err(|e| StorageError::deserialization(key, e))
    }

    /// The raw stored text for `key`.
    pub async fn get_item_as_string(&self, key: &str) -> StorageResult<Option<String>> {
        self.initialize().await?;
        Ok(self.store.get(key).await?)
    }

    /// The key at zero-based position `index`, `None` past the end.
    ///
    /// Order is the medium's native enumeration order and may change after
    /// any mutation.
    pub async fn key(&self, index: usize) -> StorageResult<Option<String>> {
        self.initialize().await?;
        Ok(self.store.key_at(index).await?)
    }

    /// Whether `key` has an entry. The value is not decoded.
    pub async fn contains_key(&self, key: &str) -> StorageResult<bool> {
        self.initialize().await?;
        Ok(self.store.contains(key).await?)
    }

    /// Number of entries.
    pub async fn length(&self) -> StorageResult<usize> {
        self.initialize().await?;
        Ok(self.store.count().await?)
    }

    /// Snapshot of all keys at call time.
    pub async fn keys(&self) -> StorageResult<Vec<String>> {
        self.initialize().await?;
        Ok(self.store.all_keys().await?)
    }

    // ---- Mutations ----

    /// Remove `key`, notifying subscribers.
    ///
    /// Removing an absent key succeeds with [`ChangeOutcome::Skipped`] and
    /// emits nothing.
    pub async fn remove_item(&self, key: &str) -> StorageResult<ChangeOutcome> {
        check_key(key)?;
        self.initialize().await?;
        let _guard = self.locks.lock(key).await;
        let Some(old) = self.store.get(key).await? else {
            trace!(kind = %self.kind, key, "remove of absent key skipped");
            return Ok(ChangeOutcome::Skipped);
        };
        let preview = ChangePreview::new(key, Some(ChangeValue::Text(old)), None);
        self.commit(preview, Mutation::Remove).await
    }

    /// Remove each key in order. Every key runs its own notification
    /// cycle, so a cancellation on one key does not affect the others.
    /// The first error stops processing.
    pub async fn remove_items<I>(&self, keys: I) -> StorageResult<Vec<ChangeOutcome>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut outcomes = Vec::new();
        for key in keys {
            outcomes.push(self.remove_item(key.as_ref()).await?);
        }
        Ok(outcomes)
    }

    /// Serialize `value` and store it under `key`, notifying subscribers.
    ///
    /// The preview's new value is `value` in structured form. Its old value
    /// is the stored value decoded as `T`, or the raw text if it does not
    /// decode as `T`.
    pub async fn set_item<T>(&self, key: &str, value: &T) -> StorageResult<ChangeOutcome>
    where
        T: Serialize + DeserializeOwned,
    {
        check_key(key)?;
        let text = self
            .serializer
            .serialize(value)
            .map_err(|e| StorageError::serialization(key, e))?;
        let structured = self
            .serializer
            .to_structured(value)
            .map_err(|e| StorageError::serialization(key, e))?;

        self.initialize().await?;
        let _guard = self.locks.lock(key).await;
        let old = match self.store.get(key).await? {
            Some(raw) => Some(self.previous_as::<T>(key, raw)),
            None => None,
        };
        let preview = ChangePreview::new(key, old, Some(ChangeValue::Structured(structured)));
        self.commit(preview, Mutation::Write(&text)).await
    }

    /// Encode `value` with an explicit contract and store it under `key`.
    ///
    /// Both preview values are reported as stored text.
    pub async fn set_item_with<T, C>(
        &self,
        key: &str,
        value: &T,
        contract: &C,
    ) -> StorageResult<ChangeOutcome>
    where
        C: TypeContract<T> + ?Sized,
    {
        check_key(key)?;
        let text = contract
            .encode(value, &self.options.serializer)
            .map_err(|e| StorageError::serialization(key, e))?;
        self.write_text(key, text).await
    }

    /// Store `value` under `key` verbatim, bypassing the serializer.
    pub async fn set_item_as_string(&self, key: &str, value: &str) -> StorageResult<ChangeOutcome> {
        check_key(key)?;
        self.write_text(key, value.to_string()).await
    }

    async fn write_text(&self, key: &str, text: String) -> StorageResult<ChangeOutcome> {
        self.initialize().await?;
        let _guard = self.locks.lock(key).await;
        let old = self.store.get(key).await?.map(ChangeValue::Text);
        let preview = ChangePreview::new(key, old, Some(ChangeValue::Text(text.clone())));
        self.commit(preview, Mutation::Write(&text)).await
    }

    /// Decode a prior value for a typed preview.
    fn previous_as<T>(&self, key: &str, raw: String) -> ChangeValue
    where
        T: Serialize + DeserializeOwned,
    {
        let decoded = self
            .serializer
            .deserialize::<T>(&raw)
            .and_then(|value| self.serializer.to_structured(&value));
        match decoded {
            Ok(structured) => ChangeValue::Structured(structured),
            Err(e) => {
                warn!(kind = %self.kind, key, error = %e, "previous value does not decode; reporting raw text");
                ChangeValue::Text(raw)
            }
        }
    }

    /// Run the notify/apply/notify cycle. The caller holds the key lock.
    async fn commit(
        &self,
        mut preview: ChangePreview,
        mutation: Mutation<'_>,
    ) -> StorageResult<ChangeOutcome> {
        self.events.emit_changing(&mut preview)?;
        if preview.cancel {
            debug!(kind = %self.kind, key = %preview.key, "change cancelled by subscriber");
            return Ok(ChangeOutcome::Cancelled);
        }

        match mutation {
            Mutation::Write(text) => self.store.set(&preview.key, text).await?,
            Mutation::Remove => self.store.remove(&preview.key).await?,
        }
        debug!(
            kind = %self.kind,
            key = %preview.key,
            removal = preview.is_removal(),
            "change applied"
        );

        let record = ChangeRecord::from(preview);
        self.events.emit_changed(&record)?;
        Ok(ChangeOutcome::Applied)
    }
}

fn check_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::EmptyKey);
    }
    Ok(())
}

impl<S> std::fmt::Debug for StorageFacade<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFacade")
            .field("kind", &self.kind)
            .field("options", &self.options)
            .field("events", &self.events)
            .field("initialized", &self.initialized.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use webstore_backend::{BackendError, BackendResult, InMemoryRawStore};
    use webstore_serde::DisplayContract;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Settings {
        theme: String,
        font_size: u8,
        recent_files: Vec<String>,
    }

    fn settings() -> Settings {
        Settings {
            theme: "dark".into(),
            font_size: 14,
            recent_files: vec!["a.txt".into()],
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn local() -> StorageFacade {
        init_tracing();
        StorageFacade::local(&StoreProvider::in_memory())
    }

    /// Collects every record delivered on the "changed" channel.
    fn record_changes(facade: &StorageFacade) -> Arc<Mutex<Vec<ChangeRecord>>> {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        facade.on_changed(move |record: &ChangeRecord| -> HandlerResult {
            sink.lock().unwrap().push(record.clone());
            Ok(())
        });
        records
    }

    /// Collects every preview delivered on the "changing" channel.
    fn record_previews(facade: &StorageFacade) -> Arc<Mutex<Vec<ChangePreview>>> {
        let previews = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&previews);
        facade.on_changing(move |preview: &mut ChangePreview| -> HandlerResult {
            sink.lock().unwrap().push(preview.clone());
            Ok(())
        });
        previews
    }

    /// Wraps an in-memory store, counting `open` calls and optionally
    /// failing them.
    struct ProbeStore {
        inner: InMemoryRawStore,
        opens: AtomicUsize,
        fail_open: bool,
    }

    impl ProbeStore {
        fn new(fail_open: bool) -> Self {
            Self {
                inner: InMemoryRawStore::new(),
                opens: AtomicUsize::new(0),
                fail_open,
            }
        }
    }

    #[async_trait]
    impl RawStore for ProbeStore {
        async fn open(&self) -> BackendResult<()> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                return Err(BackendError::Unavailable("storage disabled".into()));
            }
            Ok(())
        }
        async fn get(&self, key: &str) -> BackendResult<Option<String>> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> BackendResult<()> {
            self.inner.set(key, value).await
        }
        async fn remove(&self, key: &str) -> BackendResult<()> {
            self.inner.remove(key).await
        }
        async fn remove_all(&self) -> BackendResult<usize> {
            self.inner.remove_all().await
        }
        async fn key_at(&self, index: usize) -> BackendResult<Option<String>> {
            self.inner.key_at(index).await
        }
        async fn count(&self) -> BackendResult<usize> {
            self.inner.count().await
        }
        async fn all_keys(&self) -> BackendResult<Vec<String>> {
            self.inner.all_keys().await
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn initialize_opens_the_medium_once() {
        let store = Arc::new(ProbeStore::new(false));
        let facade = StorageFacade::new(StoreKind::Local, store.clone(), StorageOptions::default());
        facade.initialize().await.unwrap();
        facade.initialize().await.unwrap();
        facade.set_item("k", &1u32).await.unwrap();
        assert_eq!(store.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unavailable_medium_fails_initialization() {
        let store = Arc::new(ProbeStore::new(true));
        let facade = StorageFacade::new(StoreKind::Session, store, StorageOptions::default());
        let err = facade.initialize().await.unwrap_err();
        match err {
            StorageError::Initialization { kind, .. } => assert_eq!(kind, StoreKind::Session),
            other => panic!("expected Initialization, got: {other}"),
        }
        assert!(matches!(
            facade.length().await,
            Err(StorageError::Initialization { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let facade = local();
        facade.set_item("settings", &settings()).await.unwrap();
        let back: Option<Settings> = facade.get_item("settings").await.unwrap();
        assert_eq!(back, Some(settings()));
    }

    #[tokio::test]
    async fn absent_key_reads_as_none() {
        let facade = local();
        assert_eq!(facade.get_item::<u32>("missing").await.unwrap(), None);
        assert_eq!(facade.get_item_as_string("missing").await.unwrap(), None);
        assert!(!facade.contains_key("missing").await.unwrap());
    }

    #[tokio::test]
    async fn null_literal_reads_as_none_but_exists() {
        let facade = local();
        facade.set_item_as_string("nothing", "null").await.unwrap();
        assert_eq!(facade.get_item::<Settings>("nothing").await.unwrap(), None);
        assert!(facade.contains_key("nothing").await.unwrap());
    }

    #[tokio::test]
    async fn malformed_value_is_a_deserialization_error() {
        let facade = local();
        facade.set_item_as_string("count", "not a number").await.unwrap();
        let err = facade.get_item::<u32>("count").await.unwrap_err();
        match err {
            StorageError::Deserialization { key, .. } => assert_eq!(key, "count"),
            other => panic!("expected Deserialization, got: {other}"),
        }
    }

    #[tokio::test]
    async fn raw_string_is_returned_unchanged() {
        let facade = local();
        facade.set_item("name", &"ada".to_string()).await.unwrap();
        assert_eq!(
            facade.get_item_as_string("name").await.unwrap().as_deref(),
            Some("\"ada\"")
        );
        facade.set_item_as_string("plain", "ada").await.unwrap();
        assert_eq!(
            facade.get_item_as_string("plain").await.unwrap().as_deref(),
            Some("ada")
        );
    }

    #[tokio::test]
    async fn keys_length_and_index() {
        let facade = local();
        facade.set_item("a", &1).await.unwrap();
        facade.set_item("b", &2).await.unwrap();

        let keys: BTreeSet<String> = facade.keys().await.unwrap().into_iter().collect();
        assert_eq!(keys, BTreeSet::from(["a".to_string(), "b".to_string()]));
        assert_eq!(facade.length().await.unwrap(), 2);

        let first = facade.key(0).await.unwrap().unwrap();
        assert!(keys.contains(&first));
        assert_eq!(facade.key(2).await.unwrap(), None);
        assert_eq!(facade.key(usize::MAX).await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_is_a_snapshot() {
        let facade = local();
        facade.set_item("a", &1).await.unwrap();
        let snapshot = facade.keys().await.unwrap();
        facade.set_item("b", &2).await.unwrap();
        assert_eq!(snapshot, vec!["a"]);
    }

    #[tokio::test]
    async fn overwriting_keeps_length() {
        let facade = local();
        facade.set_item("a", &1).await.unwrap();
        facade.set_item("a", &2).await.unwrap();
        assert_eq!(facade.length().await.unwrap(), 1);
        assert_eq!(facade.get_item::<i32>("a").await.unwrap(), Some(2));
    }

    // -----------------------------------------------------------------------
    // Change notifications
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn changed_reports_old_and_new_values() {
        let facade = local();
        let records = record_changes(&facade);

        facade.set_item("x", &"a".to_string()).await.unwrap();
        facade.set_item("x", &"b".to_string()).await.unwrap();

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_insert());
        assert_eq!(records[1].key, "x");
        assert_eq!(records[1].old_value, Some(ChangeValue::Structured(json!("a"))));
        assert_eq!(records[1].new_value, Some(ChangeValue::Structured(json!("b"))));
    }

    #[tokio::test]
    async fn preview_reflects_store_before_write() {
        let facade = local();
        facade.set_item("n", &1).await.unwrap();
        let previews = record_previews(&facade);

        facade.set_item("n", &2).await.unwrap();

        let previews = previews.lock().unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].old_value, Some(ChangeValue::Structured(json!(1))));
        assert_eq!(previews[0].new_value, Some(ChangeValue::Structured(json!(2))));
        assert!(!previews[0].cancel);
    }

    #[tokio::test]
    async fn cancelled_write_leaves_store_untouched() {
        let facade = local();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        facade.on_changing(move |preview: &mut ChangePreview| -> HandlerResult {
            if preview.key == "locked" {
                *sink.lock().unwrap() = preview.new_value.clone();
                preview.cancel = true;
            }
            Ok(())
        });
        let records = record_changes(&facade);

        let outcome = facade.set_item("locked", &5).await.unwrap();
        assert_eq!(outcome, ChangeOutcome::Cancelled);
        assert!(!facade.contains_key("locked").await.unwrap());
        assert_eq!(
            *seen.lock().unwrap(),
            Some(ChangeValue::Structured(json!(5)))
        );
        assert!(records.lock().unwrap().is_empty());

        assert!(facade.set_item("open", &5).await.unwrap().is_applied());
        assert_eq!(records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_changing_handler_sees_a_cancelled_preview() {
        let facade = local();
        facade.on_changing(|preview: &mut ChangePreview| -> HandlerResult {
            preview.cancel = true;
            Ok(())
        });
        let previews = record_previews(&facade);

        let outcome = facade.set_item("k", &1).await.unwrap();
        assert_eq!(outcome, ChangeOutcome::Cancelled);
        let previews = previews.lock().unwrap();
        assert_eq!(previews.len(), 1);
        assert!(previews[0].cancel);
    }

    #[tokio::test]
    async fn final_cancel_flag_decides() {
        let facade = local();
        facade.on_changing(|preview: &mut ChangePreview| -> HandlerResult {
            preview.cancel = true;
            Ok(())
        });
        facade.on_changing(|preview: &mut ChangePreview| -> HandlerResult {
            preview.cancel = false;
            Ok(())
        });
        assert!(facade.set_item("k", &1).await.unwrap().is_applied());
        assert!(facade.contains_key("k").await.unwrap());
    }

    #[tokio::test]
    async fn string_writes_report_text() {
        let facade = local();
        let records = record_changes(&facade);
        facade.set_item_as_string("s", "one").await.unwrap();
        facade.set_item_as_string("s", "two").await.unwrap();

        let records = records.lock().unwrap();
        assert_eq!(records[1].old_value, Some(ChangeValue::Text("one".into())));
        assert_eq!(records[1].new_value, Some(ChangeValue::Text("two".into())));
    }

    #[tokio::test]
    async fn undecodable_previous_value_is_reported_as_text() {
        let facade = local();
        facade.set_item_as_string("n", "garbage").await.unwrap();
        let records = record_changes(&facade);

        facade.set_item("n", &7u32).await.unwrap();

        let records = records.lock().unwrap();
        assert_eq!(records[0].old_value, Some(ChangeValue::Text("garbage".into())));
        assert_eq!(records[0].new_value, Some(ChangeValue::Structured(json!(7))));
    }

    #[tokio::test]
    async fn unsubscribed_handler_stops_receiving() {
        let facade = local();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = facade.on_changed(move |_: &ChangeRecord| -> HandlerResult {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        facade.set_item("a", &1).await.unwrap();
        assert!(facade.unsubscribe(id));
        facade.set_item("a", &2).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(facade.subscriber_count(Channel::Changed), 0);
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn removing_absent_key_emits_nothing() {
        let facade = local();
        let previews = record_previews(&facade);
        let records = record_changes(&facade);

        let outcome = facade.remove_item("ghost").await.unwrap();
        assert_eq!(outcome, ChangeOutcome::Skipped);
        assert!(previews.lock().unwrap().is_empty());
        assert!(records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_reports_raw_old_value() {
        let facade = local();
        facade.set_item("k", &42).await.unwrap();
        let previews = record_previews(&facade);
        let records = record_changes(&facade);

        assert!(facade.remove_item("k").await.unwrap().is_applied());
        assert!(!facade.contains_key("k").await.unwrap());

        let previews = previews.lock().unwrap();
        assert!(previews[0].is_removal());
        assert_eq!(previews[0].old_value, Some(ChangeValue::Text("42".into())));
        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_removal());
        assert_eq!(records[0].old_value, Some(ChangeValue::Text("42".into())));
    }

    #[tokio::test]
    async fn cancelled_remove_keeps_entry() {
        let facade = local();
        facade.set_item("k", &1).await.unwrap();
        facade.on_changing(|preview: &mut ChangePreview| -> HandlerResult {
            preview.cancel = preview.is_removal();
            Ok(())
        });
        let records = record_changes(&facade);

        assert_eq!(facade.remove_item("k").await.unwrap(), ChangeOutcome::Cancelled);
        assert_eq!(facade.get_item::<i32>("k").await.unwrap(), Some(1));
        assert!(records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_items_treats_keys_independently() {
        let facade = local();
        for k in ["a", "keep", "b"] {
            facade.set_item(k, &1).await.unwrap();
        }
        facade.on_changing(|preview: &mut ChangePreview| -> HandlerResult {
            preview.cancel = preview.key == "keep";
            Ok(())
        });
        let records = record_changes(&facade);

        let outcomes = facade
            .remove_items(["a", "keep", "missing", "b"])
            .await
            .unwrap();
        assert_eq!(
            outcomes,
            vec![
                ChangeOutcome::Applied,
                ChangeOutcome::Cancelled,
                ChangeOutcome::Skipped,
                ChangeOutcome::Applied,
            ]
        );
        assert_eq!(facade.keys().await.unwrap(), vec!["keep"]);
        let removed: Vec<String> = records.lock().unwrap().iter().map(|r| r.key.clone()).collect();
        assert_eq!(removed, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn clear_removes_everything_without_events() {
        let facade = local();
        facade.set_item("a", &1).await.unwrap();
        facade.set_item("b", &2).await.unwrap();
        let previews = record_previews(&facade);
        let records = record_changes(&facade);

        facade.clear().await.unwrap();

        assert_eq!(facade.length().await.unwrap(), 0);
        assert!(facade.keys().await.unwrap().is_empty());
        assert!(previews.lock().unwrap().is_empty());
        assert!(records.lock().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn failing_changing_handler_blocks_the_write() {
        let facade = local();
        facade.on_changing(|_: &mut ChangePreview| -> HandlerResult {
            Err("veto by error".into())
        });
        let records = record_changes(&facade);

        let err = facade.set_item("k", &1).await.unwrap_err();
        match &err {
            StorageError::Subscriber { channel, .. } => assert_eq!(*channel, Channel::Changing),
            other => panic!("expected Subscriber, got: {other}"),
        }
        assert!(err.is_subscriber());
        assert!(!facade.contains_key("k").await.unwrap());
        assert!(records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_changed_handler_surfaces_after_write() {
        let facade = local();
        facade.on_changed(|_: &ChangeRecord| -> HandlerResult { Err("observer broke".into()) });

        let err = facade.set_item("k", &1).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Subscriber { channel: Channel::Changed, .. }
        ));
        assert_eq!(facade.get_item::<i32>("k").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn unserializable_value_emits_nothing() {
        let facade = local();
        let previews = record_previews(&facade);
        let mut value: BTreeMap<(u8, u8), u8> = BTreeMap::new();
        value.insert((1, 2), 3);

        let err = facade.set_item("bad", &value).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }));
        assert!(previews.lock().unwrap().is_empty());
        assert!(!facade.contains_key("bad").await.unwrap());
    }

    #[tokio::test]
    async fn quota_rejection_is_storage_unavailable() {
        init_tracing();
        let store = Arc::new(InMemoryRawStore::with_quota(16));
        let facade = StorageFacade::new(StoreKind::Local, store, StorageOptions::default());
        facade.set_item_as_string("k", "small").await.unwrap();
        let records = record_changes(&facade);

        let err = facade
            .set_item_as_string("k", "far too large for the quota")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::StorageUnavailable(BackendError::QuotaExceeded { .. })
        ));
        assert_eq!(
            facade.get_item_as_string("k").await.unwrap().as_deref(),
            Some("small")
        );
        assert!(records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_key_is_rejected_before_events() {
        let facade = local();
        let previews = record_previews(&facade);
        assert!(matches!(
            facade.set_item("", &1).await,
            Err(StorageError::EmptyKey)
        ));
        assert!(matches!(
            facade.set_item_as_string("", "x").await,
            Err(StorageError::EmptyKey)
        ));
        assert!(matches!(
            facade.remove_item("").await,
            Err(StorageError::EmptyKey)
        ));
        assert!(matches!(
            facade.remove_items(["", "a"]).await,
            Err(StorageError::EmptyKey)
        ));
        assert!(previews.lock().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Explicit type contracts and options
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn contract_based_round_trip() {
        let facade = local();
        let contract = DisplayContract::<Ipv4Addr>::new();
        let records = record_changes(&facade);
        let addr = Ipv4Addr::new(192, 168, 0, 1);

        facade.set_item_with("gateway", &addr, &contract).await.unwrap();
        assert_eq!(
            facade.get_item_as_string("gateway").await.unwrap().as_deref(),
            Some("192.168.0.1")
        );
        assert_eq!(
            facade.get_item_with("gateway", &contract).await.unwrap(),
            Some(addr)
        );
        assert_eq!(
            records.lock().unwrap()[0].new_value,
            Some(ChangeValue::Text("192.168.0.1".into()))
        );
    }

    #[tokio::test]
    async fn contract_decode_failure_is_deserialization_error() {
        let facade = local();
        facade.set_item_as_string("gateway", "not an address").await.unwrap();
        let err = facade
            .get_item_with("gateway", &DisplayContract::<Ipv4Addr>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Deserialization { .. }));
    }

    #[tokio::test]
    async fn web_options_store_camel_case() {
        init_tracing();
        let facade = StorageFacade::from_provider(
            &StoreProvider::in_memory(),
            StoreKind::Local,
            StorageOptions::web(),
        );
        facade.set_item("settings", &settings()).await.unwrap();
        let raw = facade.get_item_as_string("settings").await.unwrap().unwrap();
        assert!(raw.contains("\"fontSize\":14"), "raw: {raw}");
        assert!(raw.contains("\"recentFiles\""), "raw: {raw}");
        assert_eq!(facade.get_item("settings").await.unwrap(), Some(settings()));
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Layout {
        Grid { column_count: u8 },
        Stack(Vec<String>),
        Hidden,
    }

    #[tokio::test]
    async fn web_options_round_trip_maps_and_enums() {
        init_tracing();
        let facade = StorageFacade::from_provider(
            &StoreProvider::in_memory(),
            StoreKind::Local,
            StorageOptions::web(),
        );
        let mut owners = BTreeMap::new();
        owners.insert("Alice".to_string(), 1u32);
        owners.insert("userId".to_string(), 2u32);
        facade.set_item("owners", &owners).await.unwrap();
        assert_eq!(facade.get_item("owners").await.unwrap(), Some(owners));

        for layout in [
            Layout::Grid { column_count: 3 },
            Layout::Stack(vec!["a".into()]),
            Layout::Hidden,
        ] {
            facade.set_item("layout", &layout).await.unwrap();
            assert_eq!(facade.get_item("layout").await.unwrap(), Some(layout));
        }
        let raw = facade.get_item_as_string("layout").await.unwrap().unwrap();
        assert_eq!(raw, "\"Hidden\"");
    }

    #[tokio::test]
    async fn payloads_decode_under_renaming_options() {
        init_tracing();
        let facade = StorageFacade::from_provider(
            &StoreProvider::in_memory(),
            StoreKind::Local,
            StorageOptions::web(),
        );
        facade.set_item("settings", &settings()).await.unwrap();
        let records = record_changes(&facade);

        let mut updated = settings();
        updated.font_size = 9;
        facade.set_item("settings", &updated).await.unwrap();

        let records = records.lock().unwrap();
        let old: Settings = records[0].old_value.as_ref().unwrap().decode().unwrap();
        let new: Settings = records[0].new_value.as_ref().unwrap().decode().unwrap();
        assert_eq!(old, settings());
        assert_eq!(new, updated);
        assert_eq!(
            records[0].new_value.as_ref().and_then(ChangeValue::as_structured).unwrap()["font_size"],
            json!(9)
        );
    }

    // -----------------------------------------------------------------------
    // Shared media
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn facades_of_one_kind_share_a_medium() {
        init_tracing();
        let provider = StoreProvider::in_memory();
        let writer = StorageFacade::local(&provider);
        let reader = StorageFacade::local(&provider);
        let session = StorageFacade::session(&provider);

        writer.set_item("shared", &true).await.unwrap();
        assert_eq!(reader.get_item::<bool>("shared").await.unwrap(), Some(true));
        assert!(!session.contains_key("shared").await.unwrap());
        assert_eq!(session.kind(), StoreKind::Session);
    }

    #[tokio::test]
    async fn file_backed_local_storage_persists() {
        init_tracing();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("local.json");
        {
            let facade = StorageFacade::local(&StoreProvider::with_local_file(&path));
            facade.initialize().await.unwrap();
            facade.set_item("settings", &settings()).await.unwrap();
        }
        let facade = StorageFacade::local(&StoreProvider::with_local_file(&path));
        assert_eq!(facade.get_item("settings").await.unwrap(), Some(settings()));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_writes_form_a_chain() {
        let facade = Arc::new(local());
        let records = record_changes(&facade);

        let mut tasks = Vec::new();
        for n in 0..32u32 {
            let facade = Arc::clone(&facade);
            tasks.push(tokio::spawn(async move {
                facade.set_item("counter", &n).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 32);
        assert_eq!(records[0].old_value, None);
        for pair in records.windows(2) {
            assert_eq!(pair[1].old_value, pair[0].new_value);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_keys_proceed_independently() {
        let facade = Arc::new(local());
        let mut tasks = Vec::new();
        for n in 0..16u32 {
            let facade = Arc::clone(&facade);
            tasks.push(tokio::spawn(async move {
                facade.set_item(&format!("k{n}"), &n).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(facade.length().await.unwrap(), 16);
        assert_eq!(facade.locks.len(), 0);
    }

    proptest::proptest! {
        #[test]
        fn stored_values_read_back_equal(
            key in "[a-z]{1,12}",
            value in proptest::collection::btree_map(".{0,10}", proptest::num::i64::ANY, 0..6),
            web in proptest::bool::ANY,
        ) {
            let options = if web { StorageOptions::web() } else { StorageOptions::default() };
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let facade =
                    StorageFacade::from_provider(&StoreProvider::in_memory(), StoreKind::Local, options);
                facade.set_item(&key, &value).await.unwrap();
                let back: Option<BTreeMap<String, i64>> = facade.get_item(&key).await.unwrap();
                proptest::prop_assert_eq!(back, Some(value));
                Ok(())
            })?;
        }
    }
}
