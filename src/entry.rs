use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::{duration_ms, now_ms};

/// A value wrapped with the time it was last refreshed or read.
///
/// Used when serving stale data: the store keeps the item without a TTL and the
/// cache decides staleness from `last_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedItem<V> {
    /// The cached value.
    pub data: V,

    /// Unix timestamp in milliseconds of the last refresh or fresh read.
    pub last_update: i64,
}

impl<V> TrackedItem<V> {
    /// Wrap a freshly loaded value, stamped with the current time.
    pub fn wrap(data: V) -> Self {
        Self::wrap_at(data, now_ms())
    }

    pub fn wrap_at(data: V, now_ms: i64) -> Self {
        TrackedItem {
            data,
            last_update: now_ms,
        }
    }

    /// Check if more than `lifetime` has passed since the last update.
    pub fn is_stale(&self, lifetime: Duration) -> bool {
        self.is_stale_at(now_ms(), lifetime)
    }

    pub fn is_stale_at(&self, now_ms: i64, lifetime: Duration) -> bool {
        now_ms.saturating_sub(self.last_update) > duration_ms(lifetime)
    }

    /// Return the item with `last_update` moved to now. The data is unchanged.
    pub fn touch(self) -> Self {
        self.touch_at(now_ms())
    }

    pub fn touch_at(self, now_ms: i64) -> Self {
        TrackedItem {
            data: self.data,
            last_update: now_ms.max(self.last_update),
        }
    }
}

/// The shape a cache entry takes inside the store.
///
/// Which variant gets written is fixed by [`StorageShape`] at construction;
/// reads accept either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum StoredValue<V> {
    /// The raw value, expired by the store's TTL.
    Raw { value: V },
    /// A timestamp-wrapped value kept without TTL.
    Tracked { item: TrackedItem<V> },
}

impl<V> StoredValue<V> {
    pub fn value(&self) -> &V {
        match self {
            StoredValue::Raw { value } => value,
            StoredValue::Tracked { item } => &item.data,
        }
    }

    /// Unwrap to the payload. Tracking metadata is never handed to readers.
    pub fn into_value(self) -> V {
        match self {
            StoredValue::Raw { value } => value,
            StoredValue::Tracked { item } => item.data,
        }
    }

    /// Raw values are never stale: the store expires them instead.
    pub fn is_stale(&self, lifetime: Duration) -> bool {
        match self {
            StoredValue::Raw { .. } => false,
            StoredValue::Tracked { item } => item.is_stale(lifetime),
        }
    }

    /// Bump the access timestamp of a tracked value.
    pub fn touch(self) -> Self {
        match self {
            StoredValue::Tracked { item } => StoredValue::Tracked { item: item.touch() },
            raw => raw,
        }
    }

    pub fn last_update(&self) -> Option<i64> {
        match self {
            StoredValue::Raw { .. } => None,
            StoredValue::Tracked { item } => Some(item.last_update),
        }
    }
}

/// How refreshed values are written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageShape {
    /// Raw value with the given TTL.
    Expiring { ttl: Duration },
    /// Tracked value with no TTL.
    Tracked,
}

impl StorageShape {
    /// Wrap a refreshed value for storage, returning it with the TTL to store it under.
    pub fn wrap<V>(&self, value: V) -> (StoredValue<V>, Option<Duration>) {
        match *self {
            StorageShape::Expiring { ttl } => (StoredValue::Raw { value }, Some(ttl)),
            StorageShape::Tracked => (
                StoredValue::Tracked {
                    item: TrackedItem::wrap(value),
                },
                None,
            ),
        }
    }
}
