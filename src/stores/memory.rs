use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::store::Store;

use crate::utils::{duration_ms, now_ms, rand_simple};

/// Configuration for eviction on set operations.
#[derive(Debug, Clone)]
pub struct EvictOnSetConfig {
    /// Provide a number between 0 and 1 to calculate whether eviction should run on each set.
    ///
    /// - `1.0` -> run eviction on every `set`
    /// - `0.5` -> run eviction on every 2nd `set` (on average)
    /// - `0.0` -> disable eviction
    pub frequency: f64,

    /// Remove items until the number of items in the map is lower than `max_items`.
    ///
    /// Entries that expire soonest go first; entries without TTL go last.
    pub max_items: usize,
}

/// Configuration for HashMapStore.
#[derive(Debug, Clone, Default)]
pub struct HashMapStoreConfig {
    /// Remove expired entries on every `set` operation.
    pub evict_on_set: Option<EvictOnSetConfig>,
}

/// Internal stored entry with optional expiration time.
#[derive(Clone)]
struct StoredEntry<V> {
    expires: Option<i64>,
    ttl: Option<Duration>,
    value: V,
}

impl<V> StoredEntry<V> {
    fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// Thread-safe in-memory store using HashMap with RwLock.
///
/// Entries written with a TTL are dropped lazily on the first read after they
/// expire, and in bulk when evict-on-set runs. Entries written without TTL stay
/// until removed.
pub struct HashMapStore<V>
where
    V: Clone + Send + Sync,
{
    state: RwLock<HashMap<String, StoredEntry<V>>>,
    evict_on_set: Option<EvictOnSetConfig>,
}

impl<V> HashMapStore<V>
where
    V: Clone + Send + Sync,
{
    /// Create a new HashMapStore with the given configuration.
    pub fn new(config: HashMapStoreConfig) -> Self {
        HashMapStore {
            state: RwLock::new(HashMap::new()),
            evict_on_set: config.evict_on_set,
        }
    }

    /// Number of entries held, including expired ones not yet dropped.
    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }

    /// The TTL a live entry was written with.
    ///
    /// Returns `None` if the key is absent or expired, `Some(None)` if it was
    /// written without TTL.
    pub async fn ttl_of(&self, key: &str) -> Option<Option<Duration>> {
        let state = self.state.read().await;
        let stored = state.get(key)?;
        if stored.is_expired(now_ms()) {
            return None;
        }
        Some(stored.ttl)
    }

    /// Run eviction if configured and random check passes.
    async fn maybe_evict(&self) {
        let Some(ref config) = self.evict_on_set else {
            return;
        };

        // Check frequency
        if config.frequency <= 0.0 {
            return;
        }

        let should_evict = if config.frequency >= 1.0 {
            true
        } else {
            rand_simple() < config.frequency
        };

        if !should_evict {
            return;
        }

        let mut state = self.state.write().await;
        let now = now_ms();

        // First delete all expired entries
        state.retain(|_, v| !v.is_expired(now));

        // If still over max_items, remove entries closest to expiry
        if state.len() > config.max_items {
            let mut entries: Vec<_> = state
                .iter()
                .map(|(k, v)| (k.clone(), v.expires.unwrap_or(i64::MAX)))
                .collect();
            entries.sort_by_key(|(_, expires)| *expires);

            let to_remove = state.len() - config.max_items;
            for (key, _) in entries.into_iter().take(to_remove) {
                state.remove(&key);
            }
        }
    }
}

#[async_trait]
impl<V> Store<V> for HashMapStore<V>
where
    V: Clone + Send + Sync,
{
    fn name(&self) -> &'static str {
        "hashmap"
    }

    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let state = self.state.read().await;

        let Some(stored) = state.get(key) else {
            return Ok(None);
        };

        if stored.is_expired(now_ms()) {
            // Entry is expired, remove it unless it was replaced meanwhile
            drop(state);
            let mut state = self.state.write().await;
            if state.get(key).is_some_and(|s| s.is_expired(now_ms())) {
                state.remove(key);
            }
            return Ok(None);
        }

        Ok(Some(stored.value.clone()))
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires = ttl.map(|ttl| now_ms().saturating_add(duration_ms(ttl)));

        {
            let mut state = self.state.write().await;
            state.insert(
                key.to_string(),
                StoredEntry {
                    expires,
                    ttl,
                    value,
                },
            );
        }

        self.maybe_evict().await;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), CacheError> {
        let mut state = self.state.write().await;

        for key in keys {
            state.remove(*key);
        }

        Ok(())
    }
}
