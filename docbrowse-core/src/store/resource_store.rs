//! `src/store/resource_store.rs`
//! ============================================================================
//! # ResourceStore: keyed async loading state with change notification
//!
//! A single map from [`ResourceKey`] to [`Entry`], shared by every part of the
//! application. `dispatch` runs one asynchronous load and records each of its
//! transitions (started, resolved, rejected) as an immutable snapshot of the
//! whole map, published to every subscriber.
//!
//! Claiming a key is atomic: a second dispatch for a key that is already
//! loading returns [`Dispatch::InFlight`] without running its operation, so
//! concurrent callers never duplicate a fetch or race a stale result in.
//!
//! Failures never escape the store; they land in the entry's `error` field.
//!
//! The map is copy-on-write. While any snapshot is alive (held by a caller or
//! still buffered in the broadcast channel, up to `channel_capacity` of them)
//! the next transition clones the whole map, so a subscribed store costs one
//! O(n) copy per transition and may keep that many old maps in memory.
//!
//! Lock order is map, then watchers. Notifications are sent after the map lock
//! is released, serialized by a separate publish lock that readers never take.

use std::{future::Future, sync::Arc, time::Instant};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, trace, warn};

use super::{
    entry::{Entry, ResourceKey},
    stats::{StoreStats, StoreStatsSnapshot},
};
use crate::{config::StoreConfig, error::DocResult};

/// Immutable view of every entry at one point in time.
pub type StoreSnapshot<T> = Arc<IndexMap<ResourceKey, Entry<T>>>;

/// Outcome of a dispatch, as seen by the caller that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Operation succeeded; the entry holds the new value
    Completed,

    /// Operation failed; the entry holds the error
    Failed,

    /// Another dispatch for the key is still running; nothing was started
    InFlight,

    /// `ensure` found a value and did nothing
    Cached,
}

type KeyWatcher<T> = Arc<watch::Sender<Option<Entry<T>>>>;

struct StoreInner<T> {
    entries: Mutex<StoreSnapshot<T>>,
    publish: Mutex<()>,
    snapshots: broadcast::Sender<StoreSnapshot<T>>,
    watchers: DashMap<ResourceKey, KeyWatcher<T>>,
    stats: StoreStats,
    config: StoreConfig,
}

/// Cheap to clone; clones share the same entries.
pub struct ResourceStore<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Clone for ResourceStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ResourceStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("entries", &self.inner.entries.lock().len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<T> Default for ResourceStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl<T> ResourceStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        let (snapshots, _) = broadcast::channel(config.channel_capacity.max(1));

        info!(
            marker = "STORE_OPERATION",
            operation_type = "store_init",
            channel_capacity = config.channel_capacity,
            enable_stats = config.enable_stats,
            "Resource store initialized"
        );

        Self {
            inner: Arc::new(StoreInner {
                entries: Mutex::new(Arc::new(IndexMap::new())),
                publish: Mutex::new(()),
                snapshots,
                watchers: DashMap::new(),
                stats: StoreStats::default(),
                config,
            }),
        }
    }

    /// Current entry for `key`, if it was ever dispatched.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Entry<T>> {
        self.inner.entries.lock().get(key).cloned()
    }

    /// Whole-map view; later transitions do not affect it.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot<T> {
        Arc::clone(&*self.inner.entries.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// True while any entry is loading.
    #[must_use]
    pub fn any_loading(&self) -> bool {
        self.inner.entries.lock().values().any(|entry| entry.loading)
    }

    /// Every transition from now on, as whole-map snapshots.
    ///
    /// A receiver that falls more than `channel_capacity` snapshots behind
    /// gets `RecvError::Lagged` and should resync with [`Self::snapshot`].
    ///
    /// Up to `channel_capacity` old maps stay alive in the channel, and every
    /// transition while one is alive copies the map.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreSnapshot<T>> {
        self.inner.snapshots.subscribe()
    }

    /// Latest state of one key. The receiver starts with the current entry
    /// (`None` if never dispatched) and only wakes for changes to that key.
    ///
    /// Reading the store while holding a `watch::Ref` is fine; dispatching
    /// while holding one can stall until the `Ref` is dropped.
    #[must_use]
    pub fn subscribe_key(&self, key: impl Into<ResourceKey>) -> watch::Receiver<Option<Entry<T>>> {
        let key = key.into();

        // map lock first so no transition slips between read and register
        let entries = self.inner.entries.lock();
        let current = entries.get(&key).cloned();

        self.inner
            .watchers
            .entry(key)
            .or_insert_with(|| Arc::new(watch::channel(current).0))
            .subscribe()
    }

    #[must_use]
    pub fn stats(&self) -> StoreStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Run `operation` for `key` and record its outcome.
    ///
    /// Publishes `loading = true` (keeping any previous value and error)
    /// before awaiting, then either the value or the error. A key that is
    /// already loading is left alone and `operation` is never called.
    #[instrument(level = "debug", skip(self, key, operation), fields(key = %key))]
    pub async fn dispatch<F, Fut>(&self, key: &ResourceKey, operation: F) -> Dispatch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DocResult<T>>,
    {
        if !self.begin(key) {
            return Dispatch::InFlight;
        }

        self.run_claimed(key, operation).await
    }

    /// Dispatch only when `key` has no entry, or is not loading and has no
    /// value. A failed first load is fetched again; a value that failed to
    /// refresh is kept until [`Self::dispatch`] is called.
    pub async fn ensure<F, Fut>(&self, key: &ResourceKey, operation: F) -> Dispatch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DocResult<T>>,
    {
        match self.get(key.as_str()) {
            Some(entry) if entry.loading => Dispatch::InFlight,
            Some(entry) if !entry.needs_fetch() => Dispatch::Cached,
            _ => self.dispatch(key, operation).await,
        }
    }

    /// Fire-and-forget dispatch on the tokio runtime.
    ///
    /// The key is claimed before this returns, so `get` immediately shows it
    /// loading. Returns `None` if the key was already loading.
    #[must_use = "dropping the handle detaches the task; the load still completes"]
    pub fn spawn_dispatch<F, Fut>(&self, key: ResourceKey, operation: F) -> Option<JoinHandle<Dispatch>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = DocResult<T>> + Send + 'static,
    {
        if !self.begin(&key) {
            return None;
        }

        let store = self.clone();
        Some(tokio::spawn(async move {
            store.run_claimed(&key, operation).await
        }))
    }

    /// Claim `key` for loading. False if someone else holds the claim.
    fn begin(&self, key: &ResourceKey) -> bool {
        let claimed = self.transition(key, |entry| {
            if entry.loading {
                false
            } else {
                entry.start();
                true
            }
        });

        if claimed {
            if self.inner.config.enable_stats {
                self.inner.stats.record_dispatch();
            }
            trace!(
                marker = "STORE_OPERATION",
                operation_type = "dispatch_start",
                key = %key,
                "Dispatch started"
            );
        } else {
            if self.inner.config.enable_stats {
                self.inner.stats.record_in_flight_skip();
            }
            debug!(
                marker = "STORE_OPERATION",
                operation_type = "dispatch_in_flight",
                key = %key,
                "Key already loading; dispatch skipped"
            );
        }

        claimed
    }

    async fn run_claimed<F, Fut>(&self, key: &ResourceKey, operation: F) -> Dispatch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DocResult<T>>,
    {
        let mut guard = ClaimGuard {
            store: self,
            key,
            armed: true,
        };

        let started = Instant::now();
        let result = operation().await;
        let elapsed = started.elapsed();
        guard.armed = false;

        if self.inner.config.enable_stats {
            self.inner.stats.record_load(elapsed, result.is_ok());
        }

        match result {
            Ok(value) => {
                self.transition(key, |entry| {
                    entry.resolve(value);
                    true
                });
                debug!(
                    marker = "STORE_OPERATION",
                    operation_type = "dispatch_resolved",
                    key = %key,
                    elapsed_ms = elapsed.as_millis(),
                    "Dispatch resolved"
                );
                Dispatch::Completed
            }
            Err(error) => {
                let error = error.trace();
                debug!(
                    marker = "STORE_OPERATION",
                    operation_type = "dispatch_rejected",
                    key = %key,
                    error = %error,
                    elapsed_ms = elapsed.as_millis(),
                    "Dispatch rejected"
                );
                self.transition(key, |entry| {
                    entry.reject(error);
                    true
                });
                Dispatch::Failed
            }
        }
    }

    /// Apply `change` to the entry for `key` (created empty if absent) and
    /// publish the result when `change` returns true. The publish lock spans
    /// the change and both sends, so subscribers see transitions in order.
    fn transition(&self, key: &ResourceKey, change: impl FnOnce(&mut Entry<T>) -> bool) -> bool {
        let _publish = self.inner.publish.lock();

        let (current, snapshot, watcher) = {
            let mut entries = self.inner.entries.lock();
            let map = Arc::make_mut(&mut *entries);
            let entry = map.entry(key.clone()).or_default();

            if !change(entry) {
                return false;
            }

            let current = entry.clone();
            let watcher = self
                .inner
                .watchers
                .get(key)
                .map(|watcher| Arc::clone(watcher.value()));

            (current, Arc::clone(&*entries), watcher)
        };

        // waits for outstanding `watch::Ref`s; must not hold the map lock
        if let Some(watcher) = watcher {
            watcher.send_replace(Some(current));
        }

        // no subscribers is not an error
        let _ = self.inner.snapshots.send(snapshot);

        true
    }
}

/// Releases the loading claim if the dispatch future is dropped mid-flight.
struct ClaimGuard<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    store: &'a ResourceStore<T>,
    key: &'a ResourceKey,
    armed: bool,
}

impl<T> Drop for ClaimGuard<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if self.store.inner.config.enable_stats {
            self.store.inner.stats.record_abandoned();
        }
        warn!(
            marker = "STORE_OPERATION",
            operation_type = "dispatch_abandoned",
            key = %self.key,
            "Dispatch dropped before completion"
        );
        self.store.transition(self.key, |entry| {
            entry.abandon();
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocError;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::{sync::oneshot, time::timeout};

    fn store() -> ResourceStore<u32> {
        ResourceStore::default()
    }

    fn key(k: &str) -> ResourceKey {
        ResourceKey::from(k)
    }

    #[tokio::test]
    async fn unknown_key_is_absent() {
        let store = store();

        assert_eq!(store.get("k"), None);
        assert!(store.is_empty());
        assert!(!store.any_loading());
    }

    #[tokio::test]
    async fn success_publishes_loading_then_value() {
        let store = store();
        let mut rx = store.subscribe();

        let outcome = store.dispatch(&key("k"), || async { Ok(1) }).await;

        assert_eq!(outcome, Dispatch::Completed);
        let first = rx.recv().await.unwrap();
        assert_eq!(
            first["k"],
            Entry {
                loading: true,
                error: None,
                value: None
            }
        );
        let second = rx.recv().await.unwrap();
        assert_eq!(
            second["k"],
            Entry {
                loading: false,
                error: None,
                value: Some(1)
            }
        );
        assert_eq!(store.get("k"), Some(second["k"].clone()));
    }

    #[tokio::test]
    async fn failure_keeps_previous_value() {
        let store = store();
        store.dispatch(&key("k"), || async { Ok(1) }).await;

        let outcome = store
            .dispatch(&key("k"), || async {
                Err(DocError::fetch_failed("/markdown/k", "503"))
            })
            .await;

        assert_eq!(outcome, Dispatch::Failed);
        let entry = store.get("k").unwrap();
        assert!(!entry.loading);
        assert_eq!(entry.value, Some(1));
        assert_eq!(entry.error, Some(DocError::fetch_failed("/markdown/k", "503")));
    }

    #[tokio::test]
    async fn failure_publishes_loading_then_error_with_value_kept() {
        let store = store();
        store.dispatch(&key("k"), || async { Ok(1) }).await;
        let mut rx = store.subscribe();

        store
            .dispatch(&key("k"), || async { Err(DocError::not_found("k")) })
            .await;

        let started = rx.recv().await.unwrap();
        assert_eq!(
            started["k"],
            Entry {
                loading: true,
                error: None,
                value: Some(1)
            }
        );
        let failed = rx.recv().await.unwrap();
        assert_eq!(
            failed["k"],
            Entry {
                loading: false,
                error: Some(DocError::not_found("k")),
                value: Some(1)
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn get_is_idempotent() {
        let store = store();
        store.dispatch(&key("ok"), || async { Ok(1) }).await;
        store
            .dispatch(&key("bad"), || async { Err(DocError::not_found("bad")) })
            .await;

        assert_eq!(store.get("ok"), store.get("ok"));
        assert_eq!(store.get("bad"), store.get("bad"));
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reading_while_holding_key_ref_does_not_block_dispatch() {
        let store = store();
        let mut rx = store.subscribe_key("k");

        let reader = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || {
                for _ in 0..2_000 {
                    let held = rx.borrow_and_update();
                    let _ = store.get("k");
                    drop(held);
                }
            })
        };
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..500_u32 {
                    store.dispatch(&key("k"), || async move { Ok(i) }).await;
                }
            })
        };

        timeout(Duration::from_secs(10), async {
            reader.await.unwrap();
            writer.await.unwrap();
        })
        .await
        .expect("reader and writer should both finish");

        assert_eq!(store.get("k").unwrap().value, Some(499));
    }

    #[tokio::test]
    async fn refetch_keeps_error_until_success() {
        let store = store();
        store
            .dispatch(&key("k"), || async { Err(DocError::not_found("k")) })
            .await;

        let (release, wait) = oneshot::channel::<()>();
        let running = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .dispatch(&key("k"), || async move {
                        let _ = wait.await;
                        Ok(2)
                    })
                    .await
            })
        };

        // wait until the second dispatch has claimed the key
        let mut watch = store.subscribe_key("k");
        timeout(
            Duration::from_secs(1),
            watch.wait_for(|entry| entry.as_ref().is_some_and(|e| e.loading)),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(store.get("k").unwrap().error.is_some());

        release.send(()).unwrap();
        assert_eq!(running.await.unwrap(), Dispatch::Completed);

        let entry = store.get("k").unwrap();
        assert_eq!(entry.error, None);
        assert_eq!(entry.value, Some(2));
    }

    #[tokio::test]
    async fn concurrent_dispatch_runs_once() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, wait) = oneshot::channel::<()>();

        let handle = {
            let calls = Arc::clone(&calls);
            store
                .spawn_dispatch(key("k"), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _ = wait.await;
                    Ok(7)
                })
                .unwrap()
        };

        assert!(store.get("k").unwrap().loading);
        assert!(store.any_loading());

        let second = store
            .dispatch(&key("k"), || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(8)
                }
            })
            .await;
        assert_eq!(second, Dispatch::InFlight);
        assert!(
            store
                .spawn_dispatch(key("k"), || async { Ok(9) })
                .is_none()
        );

        release.send(()).unwrap();
        assert_eq!(handle.await.unwrap(), Dispatch::Completed);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("k").unwrap().value, Some(7));
        assert_eq!(store.stats().in_flight_skips, 2);
        assert!(!store.any_loading());
    }

    #[tokio::test]
    async fn ensure_follows_caller_policy() {
        let store = store();
        let calls = AtomicUsize::new(0);
        let load = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(3) }
        };

        assert_eq!(store.ensure(&key("k"), load).await, Dispatch::Completed);
        assert_eq!(store.ensure(&key("k"), load).await, Dispatch::Cached);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store
            .dispatch(&key("bad"), || async { Err(DocError::not_found("bad")) })
            .await;
        assert_eq!(store.ensure(&key("bad"), load).await, Dispatch::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get("bad").unwrap().error, None);
    }

    #[tokio::test]
    async fn ensure_keeps_value_after_failed_refresh() {
        let store = store();
        store.dispatch(&key("k"), || async { Ok(1) }).await;
        store
            .dispatch(&key("k"), || async { Err(DocError::not_found("k")) })
            .await;

        let outcome = store.ensure(&key("k"), || async { Ok(2) }).await;

        assert_eq!(outcome, Dispatch::Cached);
        assert_eq!(store.get("k").unwrap().value, Some(1));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = store();
        store.dispatch(&key("a"), || async { Ok(1) }).await;
        let before = store.get("a");

        store
            .dispatch(&key("b"), || async { Err(DocError::not_found("b")) })
            .await;

        assert_eq!(store.get("a"), before);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn snapshots_are_immutable() {
        let store = store();
        store.dispatch(&key("k"), || async { Ok(1) }).await;
        let held = store.snapshot();

        store.dispatch(&key("k"), || async { Ok(2) }).await;
        store.dispatch(&key("other"), || async { Ok(3) }).await;

        assert_eq!(held["k"].value, Some(1));
        assert_eq!(held.len(), 1);
        assert_eq!(store.snapshot()["k"].value, Some(2));
    }

    #[tokio::test]
    async fn lagging_subscriber_bounds_retained_snapshots() {
        let store: ResourceStore<u32> = ResourceStore::new(StoreConfig {
            channel_capacity: 2,
            ..StoreConfig::default()
        });
        let mut rx = store.subscribe();

        store.dispatch(&key("k"), || async { Ok(1) }).await;
        let first = store.snapshot();
        for i in 2..5 {
            store.dispatch(&key("k"), move || async move { Ok(i) }).await;
        }

        // overwritten in the channel and copied away from by the store
        assert_eq!(Arc::strong_count(&first), 1);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(store.snapshot()["k"].value, Some(4));
    }

    #[tokio::test]
    async fn key_watch_ignores_other_keys() {
        let store = store();
        let mut watch = store.subscribe_key("a");
        assert_eq!(*watch.borrow_and_update(), None);

        store.dispatch(&key("b"), || async { Ok(1) }).await;
        assert!(!watch.has_changed().unwrap());

        store.dispatch(&key("a"), || async { Ok(2) }).await;
        assert!(watch.has_changed().unwrap());
        assert_eq!(
            watch.borrow_and_update().as_ref().and_then(|e| e.value),
            Some(2)
        );
    }

    #[tokio::test]
    async fn dropped_dispatch_releases_claim() {
        let store = store();

        let k = key("k");
        let pending = store.dispatch(&k, || std::future::pending::<DocResult<u32>>());
        let outcome = timeout(Duration::from_millis(20), pending).await;
        assert!(outcome.is_err());

        let entry = store.get("k").unwrap();
        assert!(!entry.loading);
        assert_eq!(entry.value, None);
        assert_eq!(store.stats().abandoned, 1);

        assert_eq!(
            store.dispatch(&key("k"), || async { Ok(5) }).await,
            Dispatch::Completed
        );
    }

    #[tokio::test]
    async fn stats_track_outcomes() {
        let store = store();
        store.dispatch(&key("a"), || async { Ok(1) }).await;
        store
            .dispatch(&key("b"), || async { Err(DocError::not_found("b")) })
            .await;

        let stats = store.stats();

        assert_eq!(stats.dispatches, 2);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn stats_can_be_disabled() {
        let store: ResourceStore<u32> = ResourceStore::new(StoreConfig {
            enable_stats: false,
            ..StoreConfig::default()
        });
        store.dispatch(&key("a"), || async { Ok(1) }).await;

        assert_eq!(store.stats(), StoreStatsSnapshot::default());
    }
}
