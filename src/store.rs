use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;

/// A store is a common interface for storing, reading and deleting key-value pairs.
///
/// The refresh cache decorates a store: it never evicts anything itself, so the
/// store implementation is responsible for expiring entries written with a TTL.
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait Store<V>: Send + Sync {
    /// A name for logs and errors.
    ///
    /// # Example
    /// - "hashmap"
    /// - "moka"
    /// - "redis"
    fn name(&self) -> &'static str;

    /// Return the stored value.
    ///
    /// The response must be `None` for misses and for entries past their TTL.
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    /// Sets the value for the given key, replacing any previous value.
    ///
    /// With `ttl = Some(d)` the entry must expire after `d`.
    /// With `ttl = None` the entry must be retained until removed.
    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Removes the key(s) from the store.
    async fn remove(&self, keys: &[&str]) -> Result<(), CacheError>;
}
