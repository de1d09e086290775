//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when an observable field is
//! read, the runtime records the current computation as a subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack of running computations. Running an effect
//! pushes it; the guard returned by [`ReactiveContext::enter`] pops it when
//! dropped, which also happens while unwinding from a panicking callback.
//!
//! Entries are tagged with the runtime that owns the computation, so reads
//! against one runtime are never attributed to another runtime's effect.

use std::cell::RefCell;
use std::sync::Arc;

use super::runtime::RuntimeId;
use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    runtime: RuntimeId,
    subscriber: Arc<dyn Subscriber>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Push `subscriber` as the running computation of `runtime`.
    pub(crate) fn enter(runtime: RuntimeId, subscriber: Arc<dyn Subscriber>) -> Self {
        let subscriber_id = subscriber.id();
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                runtime,
                subscriber,
            });
        });

        Self { subscriber_id }
    }

    /// Check if any computation is running on this thread.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Number of computations currently running on this thread.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// ID of the innermost running computation, of any runtime.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber.id()))
    }

    /// Whether `id` is anywhere on the stack.
    pub fn contains(id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|entry| entry.subscriber.id() == id))
    }

    /// The innermost running computation owned by `runtime`.
    pub(crate) fn current_for(runtime: RuntimeId) -> Option<Arc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .rev()
                .find(|entry| entry.runtime == runtime)
                .map(|entry| Arc::clone(&entry.subscriber))
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The popped subscriber is dropped outside the borrow.
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.subscriber.id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                entry.subscriber.id()
            );
        }
    }
}
