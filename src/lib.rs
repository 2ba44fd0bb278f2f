//! refresh-cache - A refresh-on-access caching decorator for Rust
//!
//! This library wraps any key/value store and fills it from an async refresh
//! function at read time:
//! - Single-flight refresh: at most one refresh per key when serialized
//! - Stale-while-revalidate: serve the old value while refreshing in the background
//! - Bounded waits: readers never wait longer than the refresh timeout
//! - Failures stay local: readers get the cached value (or nothing), never an error
//!
//! # Example
//!
//! ```ignore
//! use refresh_cache::{BoxError, MokaStore, MokaStoreConfig, RefreshCache};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MokaStore::new(MokaStoreConfig::default()));
//!
//!     let cache = RefreshCache::<String>::builder()
//!         .store(store)
//!         .refresher(|city: String| async move {
//!             // Load from an upstream service - 'city' is the requested key
//!             Ok::<_, BoxError>(format!("Sunny in {}", city))
//!         })
//!         .serve_stale(true)
//!         .serialize_refresh(true)
//!         .default_lifetime(Duration::from_secs(30))
//!         .refresh_timeout(Duration::from_secs(2))
//!         .build()?;
//!
//!     let forecast = cache.get_item("berlin").await;
//!     Ok(())
//! }
//! ```

mod builder;
mod config;
mod entry;
mod error;
mod key_lock;
mod refresh;
mod refresher;
mod store;
pub mod stores;
mod strategy;
mod sweep;
mod trace;
mod utils;

// Re-export public API
pub use builder::RefreshCacheBuilder;
pub use config::RefreshConfig;
pub use entry::{StorageShape, StoredValue, TrackedItem};
pub use error::{CacheError, RefreshError};
pub use key_lock::{KeyLock, KeyLockGuard, KeyLockRegistry};
pub use refresh::RefreshCache;
pub use refresher::{BoxError, Refresher};
pub use store::Store;
pub use stores::memory::{EvictOnSetConfig, HashMapStore, HashMapStoreConfig};
pub use stores::moka::{MokaStore, MokaStoreConfig};
pub use stores::redis::{RedisStore, RedisStoreConfig};
pub use strategy::{RefreshOutcome, RefreshStrategy};
pub use sweep::{LockSweeper, sweep_idle_locks};
pub use trace::{NoopSink, TraceSink, TracingSink};
