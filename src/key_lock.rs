//! Per-key mutual exclusion for refresh attempts.
//!
//! Each key gets one binary lock the first time it is asked for. Locks are kept
//! for the lifetime of the registry unless a [`LockSweeper`](crate::LockSweeper)
//! removes idle ones.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A binary lock dedicated to one key.
#[derive(Debug)]
pub struct KeyLock {
    key: String,
    permits: Arc<Semaphore>,
}

/// Proof of holding a [`KeyLock`]. The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct KeyLockGuard {
    _permit: OwnedSemaphorePermit,
}

impl KeyLock {
    fn new(key: &str) -> Self {
        KeyLock {
            key: key.to_string(),
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait up to `timeout` for the lock.
    ///
    /// Returns `None` if it could not be acquired in time.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Option<KeyLockGuard> {
        match tokio::time::timeout(timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Some(KeyLockGuard { _permit: permit }),
            // The semaphore is never closed
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Take the lock only if it is free right now.
    pub fn try_acquire(&self) -> Option<KeyLockGuard> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| KeyLockGuard { _permit: permit })
    }

    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

/// Concurrent map from key to its [`KeyLock`].
///
/// Cloning the registry shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct KeyLockRegistry {
    locks: Arc<DashMap<String, Arc<KeyLock>>>,
}

impl KeyLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the lock for `key`, creating it if this is the first request.
    ///
    /// Concurrent first requests for the same key all get the same lock.
    pub fn get_or_create(&self, key: &str) -> Arc<KeyLock> {
        if let Some(lock) = self.locks.get(key) {
            return lock.clone();
        }

        // The entry API holds the shard lock across find-or-insert
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(KeyLock::new(key)))
            .clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.locks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Keys of locks that are neither held nor referenced outside the registry.
    pub fn idle_keys(&self) -> Vec<String> {
        self.locks
            .iter()
            .filter(|entry| Self::is_idle(entry.value()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove the lock for `key` if it is still idle.
    ///
    /// Returns `true` if a lock was removed.
    pub fn remove_if_idle(&self, key: &str) -> bool {
        self.locks
            .remove_if(key, |_, lock| Self::is_idle(lock))
            .is_some()
    }

    fn is_idle(lock: &Arc<KeyLock>) -> bool {
        // Checked under the shard lock, so no caller can clone it concurrently
        Arc::strong_count(lock) == 1 && !lock.is_held()
    }
}
