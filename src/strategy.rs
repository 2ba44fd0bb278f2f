//! Refresh strategy selection.

/// One of the four ways a refresh can be run.
///
/// | Strategy | Caller waits | One refresh per key |
/// |---|---|---|
/// | `ParallelBlocking` | yes | no |
/// | `SerializedBlocking` | yes | yes |
/// | `ParallelQueued` | no | no |
/// | `SerializedQueued` | no | yes |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshStrategy {
    /// Every caller runs its own refresh and waits for it.
    ParallelBlocking,
    /// Callers take the key lock in turn; the holder refreshes, the others find the entry valid.
    SerializedBlocking,
    /// Fire the refresh in the background and return immediately.
    ParallelQueued,
    /// Fire the refresh in the background unless one is already in flight for the key.
    SerializedQueued,
}

impl RefreshStrategy {
    pub fn select(blocking: bool, serialized: bool) -> Self {
        match (blocking, serialized) {
            (true, false) => RefreshStrategy::ParallelBlocking,
            (true, true) => RefreshStrategy::SerializedBlocking,
            (false, false) => RefreshStrategy::ParallelQueued,
            (false, true) => RefreshStrategy::SerializedQueued,
        }
    }

    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            RefreshStrategy::ParallelBlocking | RefreshStrategy::SerializedBlocking
        )
    }

    pub fn is_serialized(self) -> bool {
        matches!(
            self,
            RefreshStrategy::SerializedBlocking | RefreshStrategy::SerializedQueued
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RefreshStrategy::ParallelBlocking => "parallel-blocking",
            RefreshStrategy::SerializedBlocking => "serialized-blocking",
            RefreshStrategy::ParallelQueued => "parallel-queued",
            RefreshStrategy::SerializedQueued => "serialized-queued",
        }
    }
}

impl std::fmt::Display for RefreshStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful strategy run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The refresher ran and its value was stored.
    Refreshed,
    /// The entry was already valid, so no refresh ran.
    AlreadyValid,
    /// A background refresh was started; its result goes to the store and the trace sink.
    Queued,
}
