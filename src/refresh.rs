use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};

use crate::builder::RefreshCacheBuilder;
use crate::config::RefreshConfig;
use crate::entry::{StorageShape, StoredValue};
use crate::error::RefreshError;
use crate::key_lock::{KeyLockGuard, KeyLockRegistry};
use crate::refresher::Refresher;
use crate::store::Store;
use crate::strategy::{RefreshOutcome, RefreshStrategy};
use crate::trace::TraceSink;

/// Refresh-on-access cache.
///
/// Wraps a [`Store`] and fills it from a [`Refresher`] when readers find an entry
/// missing or, with `serve_stale`, older than the configured lifetime.
///
/// - Without `serve_stale`, values are stored with `default_lifetime` as TTL. A miss
///   blocks the reader on a refresh (bounded by `refresh_timeout`).
/// - With `serve_stale`, values are stored without TTL and stamped with their last
///   update. A stale hit returns the old value at once and refreshes in the
///   background; a fresh hit slides the timestamp forward.
/// - With `serialize_refresh`, at most one refresh per key is in flight.
///
/// Refresh failures and timeouts never reach the reader: they go to the trace sink
/// and the reader gets whatever the store held.
pub struct RefreshCache<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    store: Arc<dyn Store<StoredValue<V>>>,
    refresher: Arc<dyn Refresher<V>>,
    locks: KeyLockRegistry,
    sink: Arc<dyn TraceSink>,
    config: RefreshConfig,
    shape: StorageShape,
}

impl<V> Clone for RefreshCache<V> {
    fn clone(&self) -> Self {
        RefreshCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> RefreshCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache from its parts. `config` must already be validated.
    pub(crate) fn new(
        store: Arc<dyn Store<StoredValue<V>>>,
        refresher: Arc<dyn Refresher<V>>,
        sink: Arc<dyn TraceSink>,
        config: RefreshConfig,
    ) -> Self {
        let shape = if config.serve_stale {
            StorageShape::Tracked
        } else {
            StorageShape::Expiring {
                ttl: config.default_lifetime(),
            }
        };

        RefreshCache {
            inner: Arc::new(Inner {
                store,
                refresher,
                locks: KeyLockRegistry::new(),
                sink,
                config,
                shape,
            }),
        }
    }

    pub fn builder() -> RefreshCacheBuilder<V> {
        RefreshCacheBuilder::new()
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn Store<StoredValue<V>>> {
        &self.inner.store
    }

    /// The per-key locks used by serialized refreshes.
    ///
    /// Hand this to a [`LockSweeper`](crate::LockSweeper) to prune locks of keys
    /// that left the store.
    pub fn lock_registry(&self) -> &KeyLockRegistry {
        &self.inner.locks
    }

    /// Return the value for `key`, refreshing it as configured.
    ///
    /// Returns `None` when the key is absent and the refresh failed or timed out.
    pub async fn get_item(&self, key: &str) -> Option<V> {
        if self.inner.config.serve_stale {
            self.get_serving_stale(key).await
        } else {
            self.get_expiring(key).await
        }
    }

    async fn get_expiring(&self, key: &str) -> Option<V> {
        if let Some(stored) = self.lookup(key).await {
            return Some(stored.into_value());
        }

        tracing::debug!("Cache miss, refreshing: key={}", key);
        self.refresh_and_report(key, true).await;
        self.lookup(key).await.map(StoredValue::into_value)
    }

    async fn get_serving_stale(&self, key: &str) -> Option<V> {
        let lifetime = self.inner.config.default_lifetime();

        match self.lookup(key).await {
            Some(stored) if stored.is_stale(lifetime) => {
                tracing::debug!("Stale hit, refreshing in background: key={}", key);
                self.refresh_and_report(key, false).await;
                Some(stored.into_value())
            }
            Some(stored) => Some(self.touch(key, stored).await),
            None => {
                tracing::debug!("Cache miss, refreshing: key={}", key);
                self.refresh_and_report(key, true).await;
                let stored = self.lookup(key).await?;
                Some(self.touch(key, stored).await)
            }
        }
    }

    /// Run one refresh of `key` with an explicit strategy.
    ///
    /// Queued strategies return [`RefreshOutcome::Queued`] as soon as the refresh is
    /// started; its result is written to the store and reported to the trace sink.
    pub async fn refresh_with(
        &self,
        key: &str,
        strategy: RefreshStrategy,
    ) -> Result<RefreshOutcome, RefreshError> {
        match strategy {
            RefreshStrategy::ParallelBlocking => self.parallel_blocking(key).await,
            RefreshStrategy::SerializedBlocking => self.serialized_blocking(key).await,
            RefreshStrategy::ParallelQueued => Ok(self.parallel_queued(key)),
            RefreshStrategy::SerializedQueued => self.serialized_queued(key).await,
        }
    }

    async fn refresh_and_report(&self, key: &str, blocking: bool) {
        let strategy = RefreshStrategy::select(blocking, self.inner.config.serialize_refresh);
        let result = self.refresh_with(key, strategy).await;
        self.report(key, strategy, &result);
    }

    async fn parallel_blocking(&self, key: &str) -> Result<RefreshOutcome, RefreshError> {
        let handle = self.spawn_refresh(key);
        self.await_refresh(key, handle).await?;
        Ok(RefreshOutcome::Refreshed)
    }

    async fn serialized_blocking(&self, key: &str) -> Result<RefreshOutcome, RefreshError> {
        // A concurrent caller may have just finished refreshing
        if self.is_valid(key).await {
            return Ok(RefreshOutcome::AlreadyValid);
        }

        let timeout = self.inner.config.refresh_timeout();
        let lock = self.inner.locks.get_or_create(key);
        let Some(_guard) = lock.acquire_timeout(timeout).await else {
            return Err(RefreshError::LockTimeout {
                key: key.to_string(),
                timeout,
            });
        };
        tracing::debug!("Refresh lock acquired: key={}", key);

        if self.is_valid(key).await {
            return Ok(RefreshOutcome::AlreadyValid);
        }

        let handle = self.spawn_refresh(key);
        self.await_refresh(key, handle).await?;
        Ok(RefreshOutcome::Refreshed)
    }

    fn parallel_queued(&self, key: &str) -> RefreshOutcome {
        let handle = self.spawn_refresh(key);
        self.on_completion(key, RefreshStrategy::ParallelQueued, handle, None);
        RefreshOutcome::Queued
    }

    async fn serialized_queued(&self, key: &str) -> Result<RefreshOutcome, RefreshError> {
        if self.is_valid(key).await {
            return Ok(RefreshOutcome::AlreadyValid);
        }

        let lock = self.inner.locks.get_or_create(key);
        let Some(guard) = lock.try_acquire() else {
            return Err(RefreshError::LockContended {
                key: key.to_string(),
            });
        };

        if self.is_valid(key).await {
            return Ok(RefreshOutcome::AlreadyValid);
        }

        let handle = self.spawn_refresh(key);
        // The lock travels with the refresh and is released when it completes
        self.on_completion(key, RefreshStrategy::SerializedQueued, handle, Some(guard));
        Ok(RefreshOutcome::Queued)
    }

    /// Run the refresher on its own task and store the result on success.
    ///
    /// The task is detached from whoever waits on it: a reader that stops waiting
    /// does not stop the refresh, and a late result still lands in the store.
    fn spawn_refresh(&self, key: &str) -> JoinHandle<Result<(), RefreshError>> {
        let store = self.inner.store.clone();
        let refresher = self.inner.refresher.clone();
        let shape = self.inner.shape;
        let key = key.to_string();

        tokio::spawn(async move {
            let value = refresher
                .refresh(key.clone())
                .await
                .map_err(|source| RefreshError::Failed {
                    key: key.clone(),
                    source,
                })?;

            let (stored, ttl) = shape.wrap(value);
            store.set(&key, stored, ttl).await?;
            Ok::<(), RefreshError>(())
        })
    }

    async fn await_refresh(
        &self,
        key: &str,
        handle: JoinHandle<Result<(), RefreshError>>,
    ) -> Result<(), RefreshError> {
        let timeout = self.inner.config.refresh_timeout();

        match tokio::time::timeout(timeout, handle).await {
            Ok(joined) => flatten_join(key, joined),
            Err(_) => Err(RefreshError::TimedOut {
                key: key.to_string(),
                timeout,
            }),
        }
    }

    /// Report the result of a queued refresh once it finishes, then release its lock.
    fn on_completion(
        &self,
        key: &str,
        strategy: RefreshStrategy,
        handle: JoinHandle<Result<(), RefreshError>>,
        guard: Option<KeyLockGuard>,
    ) {
        let cache = self.clone();
        let key = key.to_string();

        tokio::spawn(async move {
            let result = flatten_join(&key, handle.await).map(|()| RefreshOutcome::Refreshed);
            drop(guard);
            cache.report(&key, strategy, &result);
        });
    }

    /// Read the store, treating a failed read as a miss.
    async fn lookup(&self, key: &str) -> Option<StoredValue<V>> {
        match self.inner.store.get(key).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(
                    "Store read failed: store={}, key={}, error={}",
                    self.inner.store.name(),
                    key,
                    e
                );
                self.inner
                    .sink
                    .write_info(&format!("read of '{}' failed: {}", key, e));
                None
            }
        }
    }

    /// Present, and not stale when serving stale.
    async fn is_valid(&self, key: &str) -> bool {
        match self.lookup(key).await {
            Some(stored) => {
                !(self.inner.config.serve_stale
                    && stored.is_stale(self.inner.config.default_lifetime()))
            }
            None => false,
        }
    }

    /// Slide the lifetime of a tracked entry forward and return its payload.
    async fn touch(&self, key: &str, stored: StoredValue<V>) -> V {
        if !matches!(stored, StoredValue::Tracked { .. }) {
            return stored.into_value();
        }

        let touched = stored.touch();
        let value = touched.value().clone();
        if let Err(e) = self.inner.store.set(key, touched, None).await {
            tracing::warn!(
                "Failed to persist access time: store={}, key={}, error={}",
                self.inner.store.name(),
                key,
                e
            );
            self.inner
                .sink
                .write_info(&format!("touch of '{}' failed: {}", key, e));
        }
        value
    }

    fn report(
        &self,
        key: &str,
        strategy: RefreshStrategy,
        result: &Result<RefreshOutcome, RefreshError>,
    ) {
        let sink = &self.inner.sink;
        match result {
            Ok(RefreshOutcome::Refreshed) => {
                sink.write_info(&format!("refreshed '{}' ({})", key, strategy));
            }
            Ok(RefreshOutcome::AlreadyValid) => {
                sink.write_info(&format!(
                    "'{}' already refreshed by another caller ({})",
                    key, strategy
                ));
            }
            Ok(RefreshOutcome::Queued) => {
                sink.write_info(&format!("queued refresh of '{}' ({})", key, strategy));
            }
            Err(e) => {
                tracing::warn!("Refresh did not update store: key={}, error={}", key, e);
                sink.write_info(&format!("{} ({})", e, strategy));
            }
        }
    }
}

fn flatten_join(
    key: &str,
    joined: Result<Result<(), RefreshError>, JoinError>,
) -> Result<(), RefreshError> {
    joined.map_err(|e| RefreshError::Failed {
        key: key.to_string(),
        source: Box::new(e),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::TrackedItem;
    use crate::refresher::BoxError;
    use crate::stores::memory::{HashMapStore, HashMapStoreConfig};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingRefresher {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl Refresher<String> for CountingRefresher {
        async fn refresh(&self, _key: String) -> Result<String, BoxError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(format!("value-{}", n))
        }
    }

    fn build(
        serve_stale: bool,
        serialize_refresh: bool,
        delay: Duration,
    ) -> (
        RefreshCache<String>,
        Arc<HashMapStore<StoredValue<String>>>,
        Arc<AtomicUsize>,
    ) {
        let store: Arc<HashMapStore<StoredValue<String>>> =
            Arc::new(HashMapStore::new(HashMapStoreConfig::default()));
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = RefreshCacheBuilder::<String>::new()
            .store(store.clone())
            .refresher(CountingRefresher {
                calls: calls.clone(),
                delay,
            })
            .serve_stale(serve_stale)
            .serialize_refresh(serialize_refresh)
            .default_lifetime(Duration::from_millis(500))
            .refresh_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        (cache, store, calls)
    }

    #[tokio::test]
    async fn test_miss_stores_raw_value_with_ttl() {
        let (cache, store, calls) = build(false, false, Duration::ZERO);

        assert_eq!(cache.get_item("k").await, Some("value-1".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stored = store.get("k").await.unwrap().unwrap();
        assert_eq!(
            stored,
            StoredValue::Raw {
                value: "value-1".to_string()
            }
        );
        assert_eq!(store.ttl_of("k").await, Some(Some(Duration::from_millis(500))));
    }

    #[tokio::test]
    async fn test_serve_stale_stores_tracked_value_without_ttl() {
        let (cache, store, _calls) = build(true, true, Duration::ZERO);

        assert_eq!(cache.get_item("k").await, Some("value-1".to_string()));

        let stored = store.get("k").await.unwrap().unwrap();
        assert!(matches!(stored, StoredValue::Tracked { .. }));
        assert_eq!(store.ttl_of("k").await, Some(None));
    }

    #[tokio::test]
    async fn test_stale_hit_returns_payload_not_wrapper() {
        let (cache, store, calls) = build(true, true, Duration::from_millis(20));
        let old = StoredValue::Tracked {
            item: TrackedItem::wrap_at("old".to_string(), 0),
        };
        store.set("k", old, None).await.unwrap();

        assert_eq!(cache.get_item("k").await, Some("old".to_string()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_item("k").await, Some("value-1".to_string()));
    }

    #[tokio::test]
    async fn test_serialized_blocking_skips_when_valid() {
        let (cache, store, calls) = build(false, true, Duration::ZERO);
        store
            .set(
                "k",
                StoredValue::Raw {
                    value: "present".to_string(),
                },
                None,
            )
            .await
            .unwrap();

        let outcome = cache
            .refresh_with("k", RefreshStrategy::SerializedBlocking)
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::AlreadyValid);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_serialized_blocking_lock_timeout() {
        let (cache, _store, calls) = build(false, true, Duration::ZERO);
        let lock = cache.lock_registry().get_or_create("k");
        let _held = lock.try_acquire().unwrap();

        let err = cache
            .refresh_with("k", RefreshStrategy::SerializedBlocking)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::LockTimeout { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_serialized_queued_contended() {
        let (cache, _store, calls) = build(true, true, Duration::ZERO);
        let lock = cache.lock_registry().get_or_create("k");
        let _held = lock.try_acquire().unwrap();

        let err = cache
            .refresh_with("k", RefreshStrategy::SerializedQueued)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::LockContended { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_serialized_queued_holds_lock_until_refresh_completes() {
        let (cache, store, calls) = build(true, true, Duration::from_millis(100));

        let outcome = cache
            .refresh_with("k", RefreshStrategy::SerializedQueued)
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Queued);

        let lock = cache.lock_registry().get_or_create("k");
        assert!(lock.is_held());
        assert!(store.get("k").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!lock.is_held());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_parallel_queued_returns_before_refresh() {
        let (cache, store, calls) = build(false, false, Duration::from_millis(50));

        let outcome = cache
            .refresh_with("k", RefreshStrategy::ParallelQueued)
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Queued);
        assert!(store.get("k").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get("k").await.unwrap().map(StoredValue::into_value),
            Some("value-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_panicked_task_maps_to_failed() {
        let handle = tokio::spawn(async {
            if true {
                panic!("refresh task died");
            }
            Ok::<(), RefreshError>(())
        });

        let err = flatten_join("k", handle.await).unwrap_err();
        assert!(matches!(&err, RefreshError::Failed { key, .. } if key == "k"));
        assert!(err.to_string().contains("panicked"));
    }

    #[tokio::test]
    async fn test_serialized_blocking_releases_lock_after_panic() {
        let store: Arc<HashMapStore<StoredValue<String>>> =
            Arc::new(HashMapStore::new(HashMapStoreConfig::default()));
        let cache = RefreshCacheBuilder::<String>::new()
            .store(store.clone())
            .refresher(|_key: String| async move {
                if true {
                    panic!("upstream crashed");
                }
                Ok::<String, BoxError>(String::new())
            })
            .build()
            .unwrap();

        let err = cache
            .refresh_with("k", RefreshStrategy::SerializedBlocking)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Failed { .. }));
        assert!(!cache.lock_registry().get_or_create("k").is_held());
        assert!(store.get("k").await.unwrap().is_none());
    }
}
