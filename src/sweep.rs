//! Periodic pruning of the key lock registry.
//!
//! The registry only grows while the cache runs. A [`LockSweeper`] removes locks
//! for keys that have left the store, as long as no refresh holds or is about to
//! take them.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::key_lock::KeyLockRegistry;
use crate::store::Store;

/// Remove idle locks whose key is no longer in the store.
///
/// Returns the number of locks removed. Store read errors keep the lock.
pub async fn sweep_idle_locks<V>(registry: &KeyLockRegistry, store: &dyn Store<V>) -> usize {
    let mut removed = 0;

    for key in registry.idle_keys() {
        match store.get(&key).await {
            Ok(None) => {
                if registry.remove_if_idle(&key) {
                    removed += 1;
                }
            }
            Ok(Some(_)) => {}
            Err(e) => {
                tracing::warn!(
                    "Lock sweep skipped key: store={}, key={}, error={}",
                    store.name(),
                    key,
                    e
                );
            }
        }
    }

    removed
}

/// Background task running [`sweep_idle_locks`] on a fixed interval.
///
/// The sweep stops when [`LockSweeper::stop`] is called or the sweeper is dropped.
pub struct LockSweeper {
    handle: JoinHandle<()>,
}

impl LockSweeper {
    /// Spawn the sweep task. The first pass runs one `interval` after spawning.
    pub fn spawn<V>(
        registry: KeyLockRegistry,
        store: Arc<dyn Store<V>>,
        interval: Duration,
    ) -> Self
    where
        V: Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the first immediate tick
            loop {
                ticker.tick().await;
                let removed = sweep_idle_locks(&registry, store.as_ref()).await;
                if removed > 0 {
                    tracing::debug!(
                        "Swept idle key locks: removed={}, remaining={}",
                        removed,
                        registry.len()
                    );
                }
            }
        });

        LockSweeper { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for LockSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
