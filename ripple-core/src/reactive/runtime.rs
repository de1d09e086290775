//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observables and
//! computations. It owns the wrapper tables and the dependency map, and it
//! performs the two tracker operations:
//!
//! 1. [`Runtime::track`] — called on every observable read. Records the
//!    innermost running computation of this runtime (if any) as a subscriber
//!    of the field.
//!
//! 2. [`Runtime::trigger`] — called on every observable write. Re-runs every
//!    subscriber of the field: plain effects first, computed values after.
//!
//! # Ownership
//!
//! A runtime is an explicit value rather than a global. Several runtimes can
//! coexist without sharing any subscriptions, and [`Runtime::reset`] returns
//! one to its initial state. Observables hold a weak reference back to their
//! runtime, so computations capturing observables never keep a runtime alive.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::computed::Computed;
use super::context::ReactiveContext;
use super::effect::{Effect, EffectOptions};
use super::observable::{Observable, ObservableId};
use super::tracker::{self, TargetMap};
use super::value::{Object, ObjectId, Value, WeakObject};
use crate::config::RuntimeConfig;

/// Unique identifier for a runtime instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(u64);

impl RuntimeId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rt#{}", self.0)
    }
}

/// Something that can be made observable: a raw object or an existing
/// observable.
#[derive(Debug, Clone)]
pub enum Target {
    Raw(Object),
    Observed(Observable),
}

impl From<Object> for Target {
    fn from(object: Object) -> Self {
        Target::Raw(object)
    }
}

impl From<&Object> for Target {
    fn from(object: &Object) -> Self {
        Target::Raw(object.clone())
    }
}

impl From<Observable> for Target {
    fn from(observable: Observable) -> Self {
        Target::Observed(observable)
    }
}

impl From<&Observable> for Target {
    fn from(observable: &Observable) -> Self {
        Target::Observed(observable.clone())
    }
}

/// Identity tables are swept once they reach this many entries.
const SWEEP_THRESHOLD: usize = 64;

struct RuntimeInner {
    id: RuntimeId,
    config: RuntimeConfig,
    /// Bumped by every reset.
    epoch: AtomicU64,
    /// raw object -> its observable identity
    observables: DashMap<ObjectId, (ObservableId, WeakObject)>,
    /// observable identity -> its raw object
    raws: DashMap<ObservableId, WeakObject>,
    /// Table size that triggers the next sweep of dead raw objects.
    sweep_at: AtomicUsize,
    targets: Mutex<TargetMap>,
}

/// A reactive system instance.
///
/// Cloning a `Runtime` clones the handle; clones share all state.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Object, Runtime};
///
/// let runtime = Runtime::new();
/// let state = runtime.reactive(Object::new().with("count", 1));
///
/// let watched = state.clone();
/// let effect = runtime.effect(move || watched.get("count").as_f64());
/// assert_eq!(effect.run_count(), 1);
///
/// state.set("count", 2);
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let id = RuntimeId::new();
        debug!(runtime = %id, name = ?config.name, "runtime created");
        Self {
            inner: Arc::new(RuntimeInner {
                id,
                config,
                epoch: AtomicU64::new(0),
                observables: DashMap::new(),
                raws: DashMap::new(),
                sweep_at: AtomicUsize::new(SWEEP_THRESHOLD),
                targets: Mutex::new(TargetMap::default()),
            }),
        }
    }

    pub fn id(&self) -> RuntimeId {
        self.inner.id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.inner))
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------------
    // Interception
    // ------------------------------------------------------------------------

    /// Make `target` observable.
    ///
    /// Idempotent: the same raw object always yields the same observable
    /// identity for as long as the object lives, and an observable of this
    /// runtime is returned unchanged. An observable of another runtime, or
    /// one created before the last [`reset`](Self::reset), is re-wrapped
    /// here by its raw object.
    pub fn reactive(&self, target: impl Into<Target>) -> Observable {
        let raw = match target.into() {
            Target::Observed(observable) => {
                if self.is_reactive(&observable) {
                    return observable;
                }
                observable.raw().clone()
            }
            Target::Raw(raw) => raw,
        };

        let id = match self.inner.observables.entry(raw.id()) {
            Entry::Occupied(entry) => return Observable::new(entry.get().0, raw, self),
            Entry::Vacant(entry) => {
                let id = ObservableId::next();
                entry.insert((id, raw.downgrade()));
                id
            }
        };

        self.inner.raws.insert(id, raw.downgrade());
        trace!(runtime = %self.inner.id, object = ?raw.id(), observable = ?id, "object wrapped");
        self.maybe_sweep();
        Observable::new(id, raw, self)
    }

    /// Whether `observable` was produced by this runtime since its last reset.
    pub fn is_reactive(&self, observable: &Observable) -> bool {
        observable.runtime_id() == self.inner.id
            && observable.epoch() == self.epoch()
            && self.inner.raws.contains_key(&observable.id())
    }

    /// The raw object behind an observable of this runtime.
    pub fn to_raw(&self, observable: &Observable) -> Option<Object> {
        self.inner
            .raws
            .get(&observable.id())
            .and_then(|raw| raw.upgrade())
    }

    // ------------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------------

    /// Record the running computation as a subscriber of `target.key`.
    ///
    /// Outside of any computation of this runtime this is a no-op.
    pub fn track(&self, target: &Object, key: &str) {
        let Some(current) = ReactiveContext::current_for(self.inner.id) else {
            return;
        };

        let dep = self.inner.targets.lock().dep_for(target, key);
        if dep.insert(Arc::clone(&current)) {
            current.record_dep(&dep);
            trace!(
                runtime = %self.inner.id,
                object = ?target.id(),
                key,
                subscriber = ?current.id(),
                "dependency recorded"
            );
        }
    }

    /// Re-run every subscriber of `target.key`.
    ///
    /// With `key` set to `None`, subscribers of every key of `target` run.
    /// Plain effects all complete before any computed value re-evaluates.
    pub fn trigger(&self, target: &Object, key: Option<&str>) {
        let deps = self.inner.targets.lock().deps(target.id(), key);
        if deps.is_empty() {
            return;
        }

        let (effects, computed) = tracker::partition(&deps);
        debug!(
            runtime = %self.inner.id,
            object = ?target.id(),
            key = key.unwrap_or("*"),
            effects = effects.len(),
            computed = computed.len(),
            "triggering subscribers"
        );

        for subscriber in effects {
            subscriber.notify();
        }
        for subscriber in computed {
            subscriber.notify();
        }
    }

    /// Number of computations subscribed to `target.key`.
    pub fn subscriber_count(&self, target: &Object, key: &str) -> usize {
        self.inner.targets.lock().subscriber_count(target.id(), key)
    }

    /// Number of objects with at least one recorded key.
    pub fn tracked_target_count(&self) -> usize {
        self.inner.targets.lock().len()
    }

    /// Number of live raw objects wrapped by this runtime.
    pub fn observable_count(&self) -> usize {
        self.inner
            .observables
            .iter()
            .filter(|entry| entry.value().1.is_alive())
            .count()
    }

    // ------------------------------------------------------------------------
    // Computations
    // ------------------------------------------------------------------------

    /// Register an effect and run it once.
    pub fn effect<F, T>(&self, callback: F) -> Effect<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: 'static,
    {
        self.effect_with_options(callback, EffectOptions::default())
    }

    /// Register a computation; it runs immediately unless `options.lazy`.
    pub fn effect_with_options<F, T>(&self, callback: F, options: EffectOptions) -> Effect<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: 'static,
    {
        self.effect_with_args(move |_: &[Value]| callback(), options)
    }

    /// Register a computation whose callback receives the arguments passed
    /// to [`Effect::invoke_with`]. Runs triggered by writes pass no arguments.
    pub fn effect_with_args<F, T>(&self, callback: F, options: EffectOptions) -> Effect<T>
    where
        F: Fn(&[Value]) -> T + Send + Sync + 'static,
        T: 'static,
    {
        let effect = Effect::new(
            self.inner.id,
            callback,
            options,
            self.inner.config.cleanup_stale_dependencies,
        );
        if !options.lazy {
            effect.invoke();
        }
        effect
    }

    /// Create a lazily evaluated derived value.
    pub fn computed<F, T>(&self, callback: F) -> Computed<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: 'static,
    {
        Computed::new(self.effect_with_options(callback, EffectOptions::computed()))
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Drop table entries whose objects no longer exist.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&self) -> usize {
        let mut removed = self.sweep_identities();
        removed += self.inner.targets.lock().prune();

        debug!(runtime = %self.inner.id, removed, "pruned runtime tables");
        removed
    }

    /// Forget every wrapper and subscription.
    ///
    /// Observables created before the reset become detached: their reads
    /// and writes still reach the raw object but are no longer tracked, and
    /// [`is_reactive`](Self::is_reactive) no longer recognizes them. Wrap
    /// the object again to resume tracking.
    pub fn reset(&self) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        self.inner.observables.clear();
        self.inner.raws.clear();
        self.inner.sweep_at.store(SWEEP_THRESHOLD, Ordering::Relaxed);
        self.inner.targets.lock().clear();
        debug!(runtime = %self.inner.id, epoch = self.epoch(), "runtime reset");
    }

    /// Remove identities of dropped raw objects from both tables.
    fn sweep_identities(&self) -> usize {
        let before = self.inner.observables.len() + self.inner.raws.len();
        self.inner.observables.retain(|_, (_, raw)| raw.is_alive());
        self.inner.raws.retain(|_, raw| raw.is_alive());
        let live = self.inner.observables.len();
        self.inner
            .sweep_at
            .store(live.saturating_mul(2).max(SWEEP_THRESHOLD), Ordering::Relaxed);
        before.saturating_sub(live + self.inner.raws.len())
    }

    /// Sweep once the tables have doubled since the last sweep.
    fn maybe_sweep(&self) {
        if self.inner.observables.len() < self.inner.sweep_at.load(Ordering::Relaxed) {
            return;
        }
        let removed = self.sweep_identities();
        trace!(runtime = %self.inner.id, removed, "swept dead identities");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("name", &self.inner.config.name)
            .field("tracked_targets", &self.tracked_target_count())
            .finish()
    }
}

/// Non-owning handle to a runtime, held by observables.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}
