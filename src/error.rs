use std::time::Duration;

use crate::refresher::BoxError;

/// Error type for store and configuration operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// A store operation failed.
    #[error("[{tier}] cache error for key '{key}': {message}")]
    Operation {
        tier: String,
        key: String,
        message: String,
    },
    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The cache was built with an invalid or incomplete configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// Create a new operation error.
    pub fn operation(
        tier: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CacheError::Operation {
            tier: tier.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Reasons a refresh round did not update the store.
///
/// These are recovered by the coordinator: they are reported to the trace sink
/// and the reader gets whatever the store already held.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The refresher returned an error, or the refresh task panicked.
    #[error("refresh of '{key}' failed: {source}")]
    Failed {
        key: String,
        #[source]
        source: BoxError,
    },
    /// The refresher did not complete within the refresh timeout.
    #[error("refresh of '{key}' did not complete within {timeout:?}")]
    TimedOut { key: String, timeout: Duration },
    /// The key lock could not be acquired within the refresh timeout.
    #[error("timed out after {timeout:?} waiting for the refresh lock of '{key}'")]
    LockTimeout { key: String, timeout: Duration },
    /// Another refresh of this key is already in flight.
    #[error("refresh of '{key}' skipped: lock is held by an in-flight refresh")]
    LockContended { key: String },
    /// The refreshed value could not be written to the store.
    #[error(transparent)]
    Store(#[from] CacheError),
}
