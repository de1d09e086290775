//! Effect Implementation
//!
//! An Effect is a tracked computation: a callback whose dependencies are
//! discovered by running it.
//!
//! # How Effects Work
//!
//! 1. When registered, the effect runs its callback immediately (unless it is
//!    lazy) to establish initial dependencies.
//!
//! 2. While the callback runs, the effect is on the reactive context stack,
//!    so every observable read is recorded against it.
//!
//! 3. When any recorded field is written, the runtime re-runs the effect.
//!
//! # Re-entrancy
//!
//! An effect never runs inside itself. If a run would start while the same
//! effect is already on the stack (for instance because its callback writes a
//! field it also reads), the nested run is skipped and yields `None`.
//!
//! # Dependency bookkeeping
//!
//! Every subscriber set the effect joins is remembered. By default the sets
//! are only remembered; with
//! [`RuntimeConfig::cleanup_stale_dependencies`](crate::RuntimeConfig) the
//! effect leaves all of them before each run and rejoins only the ones it
//! reads again.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

use super::context::ReactiveContext;
use super::runtime::RuntimeId;
use super::subscriber::{Subscriber, SubscriberId};
use super::tracker::Dep;
use super::value::Value;

/// Registration options for a computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectOptions {
    /// Do not run at registration.
    pub lazy: bool,
    /// Run after plain effects when a dependency is written.
    pub computed: bool,
}

impl EffectOptions {
    /// Options used by computed values: lazy and derived.
    pub fn computed() -> Self {
        Self {
            lazy: true,
            computed: true,
        }
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_computed(mut self, computed: bool) -> Self {
        self.computed = computed;
        self
    }
}

type Callback<T> = Box<dyn Fn(&[Value]) -> T + Send + Sync>;

struct EffectInner<T> {
    id: SubscriberId,
    runtime: RuntimeId,
    callback: Callback<T>,
    options: EffectOptions,
    cleanup: bool,
    /// Subscriber sets this effect has joined.
    deps: Mutex<SmallVec<[Weak<Dep>; 4]>>,
    run_count: AtomicUsize,
}

impl<T: 'static> EffectInner<T> {
    fn execute(self: &Arc<Self>, args: &[Value]) -> Option<T> {
        if ReactiveContext::contains(self.id) {
            debug!(subscriber = ?self.id, "effect already running, skipped");
            return None;
        }

        if self.cleanup {
            self.leave_deps();
        }

        let _ctx = ReactiveContext::enter(self.runtime, Arc::clone(self) as Arc<dyn Subscriber>);
        self.run_count.fetch_add(1, Ordering::SeqCst);
        Some((self.callback)(args))
    }

    fn leave_deps(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.remove(self.id);
        }
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn is_computed(&self) -> bool {
        self.options.computed
    }

    fn record_dep(&self, dep: &Arc<Dep>) {
        self.deps.lock().push(Arc::downgrade(dep));
    }

    fn notify(self: Arc<Self>) {
        let _ = self.execute(&[]);
    }
}

/// Handle to a registered computation.
///
/// Clones share the same computation. There is no way to unsubscribe: once a
/// field has recorded an effect, writes to it re-run the effect for as long
/// as the runtime tracks that field.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{EffectOptions, Object, Runtime};
///
/// let runtime = Runtime::new();
/// let state = runtime.reactive(Object::new().with("n", 2));
///
/// let watched = state.clone();
/// let doubled = runtime.effect_with_options(
///     move || watched.get_f64("n").map(|n| n * 2.0),
///     EffectOptions::default().with_lazy(true),
/// );
/// assert_eq!(doubled.run_count(), 0);
/// assert_eq!(doubled.invoke().unwrap().unwrap(), 4.0);
/// ```
pub struct Effect<T: 'static> {
    inner: Arc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    pub(crate) fn new<F>(runtime: RuntimeId, callback: F, options: EffectOptions, cleanup: bool) -> Self
    where
        F: Fn(&[Value]) -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EffectInner {
                id: SubscriberId::new(),
                runtime,
                callback: Box::new(callback),
                options,
                cleanup,
                deps: Mutex::new(SmallVec::new()),
                run_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Run the computation now.
    ///
    /// Returns `None` without running if the computation is already running
    /// further up the stack. A panic in the callback propagates after the
    /// stack has been restored.
    pub fn invoke(&self) -> Option<T> {
        self.inner.execute(&[])
    }

    /// Run the computation with arguments.
    pub fn invoke_with(&self, args: &[Value]) -> Option<T> {
        self.inner.execute(args)
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn options(&self) -> EffectOptions {
        self.inner.options
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.options.lazy
    }

    pub fn is_computed(&self) -> bool {
        self.inner.options.computed
    }

    /// Number of times the callback has started.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of live subscriber sets this computation belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .deps
            .lock()
            .iter()
            .filter(|dep| dep.strong_count() > 0)
            .count()
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("options", &self.inner.options)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
