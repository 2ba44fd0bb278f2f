//! Informational trace output of the refresh cache.
//!
//! The cache reports refresh activity and every recovered refresh failure as a
//! single line to a [`TraceSink`]. The sink is a side channel: nothing it does
//! affects what readers get back.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::{Arc, Mutex};
//! use refresh_cache::{RefreshCacheBuilder, TraceSink};
//!
//! let lines = Arc::new(Mutex::new(Vec::new()));
//! let sink = {
//!     let lines = lines.clone();
//!     move |message: &str| lines.lock().unwrap().push(message.to_string())
//! };
//!
//! let cache = RefreshCacheBuilder::new()
//!     .store(store)
//!     .refresher(refresher)
//!     .trace_sink(Arc::new(sink))
//!     .build()?;
//! ```

/// Receives informational lines from the refresh cache.
///
/// Called synchronously on the read and refresh paths, so implementations
/// should be fast and must not panic.
pub trait TraceSink: Send + Sync {
    /// Write a single informational line.
    fn write_info(&self, message: &str);
}

impl<F> TraceSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write_info(&self, message: &str) {
        (self)(message)
    }
}

/// Forwards lines to `tracing` at info level. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn write_info(&self, message: &str) {
        tracing::info!(target: "refresh_cache", "{}", message);
    }
}

/// Discards every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn write_info(&self, _message: &str) {}
}
