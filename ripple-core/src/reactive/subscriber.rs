//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that can be recorded as depending on an
//! object field and re-run when that field is written. Effects and computed
//! values are both subscribers; the tracker only sees them through the
//! type-erased [`Subscriber`] trait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::tracker::Dep;

/// Unique identifier for a subscriber.
///
/// Each computation gets a unique ID when created. The ID is how subscriber
/// sets deduplicate and how the runner detects re-entrant invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation as seen by the dependency tracker.
pub(crate) trait Subscriber: Send + Sync {
    /// Get the subscriber's unique ID.
    fn id(&self) -> SubscriberId;

    /// Derived values run after plain computations on every trigger.
    fn is_computed(&self) -> bool;

    /// Remember a subscriber set this computation was added to.
    fn record_dep(&self, dep: &Arc<Dep>);

    /// Re-run in response to a write, discarding the result.
    fn notify(self: Arc<Self>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }
}
