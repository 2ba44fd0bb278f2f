//! Builder API for creating refresh cache instances.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RefreshConfig;
use crate::entry::StoredValue;
use crate::error::CacheError;
use crate::refresh::RefreshCache;
use crate::refresher::Refresher;
use crate::store::Store;
use crate::trace::{TraceSink, TracingSink};
use crate::utils::duration_ms_u64;

/// Builder for [`RefreshCache`].
///
/// A store and a refresher are required; everything else has a default
/// (see [`RefreshConfig::default`]). Trace lines go to `tracing` unless another
/// sink is set.
///
/// # Example
///
/// ```ignore
/// use refresh_cache::{BoxError, HashMapStore, HashMapStoreConfig, RefreshCacheBuilder};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let store = Arc::new(HashMapStore::new(HashMapStoreConfig::default()));
///
/// let cache = RefreshCacheBuilder::<String>::new()
///     .store(store)
///     .refresher(|key: String| async move {
///         Ok::<_, BoxError>(format!("weather for {}", key))
///     })
///     .serve_stale(true)
///     .default_lifetime(Duration::from_secs(30))
///     .build()?;
///
/// let forecast = cache.get_item("berlin").await;
/// ```
pub struct RefreshCacheBuilder<V> {
    store: Option<Arc<dyn Store<StoredValue<V>>>>,
    refresher: Option<Arc<dyn Refresher<V>>>,
    sink: Arc<dyn TraceSink>,
    config: RefreshConfig,
}

impl<V> RefreshCacheBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new RefreshCacheBuilder.
    pub fn new() -> Self {
        RefreshCacheBuilder {
            store: None,
            refresher: None,
            sink: Arc::new(TracingSink),
            config: RefreshConfig::default(),
        }
    }

    /// Replace all configuration values at once.
    pub fn config(mut self, config: RefreshConfig) -> Self {
        self.config = config;
        self
    }

    /// The store to decorate.
    pub fn store(mut self, store: Arc<dyn Store<StoredValue<V>>>) -> Self {
        self.store = Some(store);
        self
    }

    /// The function that loads values on misses and stale hits.
    pub fn refresher<R>(mut self, refresher: R) -> Self
    where
        R: Refresher<V> + 'static,
    {
        self.refresher = Some(Arc::new(refresher));
        self
    }

    pub fn serve_stale(mut self, serve_stale: bool) -> Self {
        self.config.serve_stale = serve_stale;
        self
    }

    pub fn serialize_refresh(mut self, serialize_refresh: bool) -> Self {
        self.config.serialize_refresh = serialize_refresh;
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.config.refresh_timeout_ms = duration_ms_u64(timeout);
        self
    }

    pub fn default_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.default_lifetime_ms = duration_ms_u64(lifetime);
        self
    }

    pub fn trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Build the cache.
    ///
    /// Fails if the store or refresher is missing or the configuration is invalid.
    pub fn build(self) -> Result<RefreshCache<V>, CacheError> {
        let store = self
            .store
            .ok_or_else(|| CacheError::Config("a store is required".to_string()))?;
        let refresher = self
            .refresher
            .ok_or_else(|| CacheError::Config("a refresher is required".to_string()))?;
        self.config.validate()?;

        Ok(RefreshCache::new(store, refresher, self.sink, self.config))
    }
}

impl<V> Default for RefreshCacheBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
