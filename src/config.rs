//! Refresh coordinator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CacheError;

const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_LIFETIME_MS: u64 = 60_000;

/// Configuration of a [`RefreshCache`](crate::RefreshCache).
///
/// Fixed at construction. Can be embedded in an application config file:
///
/// ```ignore
/// [cache]
/// serve_stale = true
/// serialize_refresh = true
/// refresh_timeout_ms = 2000
/// default_lifetime_ms = 30000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Serve entries past their lifetime while refreshing them in the background.
    ///
    /// When enabled, entries are stored without a TTL and staleness is tracked
    /// by the cache. When disabled, entries are stored with `default_lifetime_ms`
    /// as their TTL and the store expires them.
    pub serve_stale: bool,
    /// Allow at most one in-flight refresh per key.
    pub serialize_refresh: bool,
    /// Upper bound (ms) on each wait a reader makes: for the key lock, and for the refresher.
    pub refresh_timeout_ms: u64,
    /// Entry lifetime (ms): the store TTL, or the staleness threshold when serving stale.
    pub default_lifetime_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            serve_stale: false,
            serialize_refresh: true,
            refresh_timeout_ms: DEFAULT_REFRESH_TIMEOUT_MS,
            default_lifetime_ms: DEFAULT_LIFETIME_MS,
        }
    }
}

impl RefreshConfig {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn default_lifetime(&self) -> Duration {
        Duration::from_millis(self.default_lifetime_ms)
    }

    /// Reject configurations under which no entry could ever be served.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.default_lifetime_ms == 0 {
            return Err(CacheError::Config(
                "default_lifetime_ms must be greater than zero".to_string(),
            ));
        }
        if self.refresh_timeout_ms == 0 {
            return Err(CacheError::Config(
                "refresh_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
