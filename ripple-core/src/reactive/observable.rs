//! Observable Objects
//!
//! An [`Observable`] stands in for a raw [`Object`] and routes every field
//! access through its runtime:
//!
//! - reads ([`get`](Observable::get), [`has`](Observable::has) and the typed
//!   getters) record the running computation as a dependency of the field;
//! - writes ([`set`](Observable::set), [`remove`](Observable::remove),
//!   [`clear`](Observable::clear)) trigger the field's subscribers.
//!
//! Nested objects are wrapped lazily: reading a field that holds an object
//! returns that object's observable, so the whole reachable graph becomes
//! observable on first access. Writes store values as given; a newly
//! assigned object is wrapped the next time it is read.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use super::runtime::{Runtime, RuntimeId, WeakRuntime};
use super::value::{Object, Value};
use crate::error::{Error, Result};

/// Counter for generating unique observable IDs.
static OBSERVABLE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of an observable.
///
/// Assigned once per raw object per runtime: every handle a runtime hands
/// out for the same object carries the same ID until the runtime is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservableId(u64);

impl ObservableId {
    pub(crate) fn next() -> Self {
        Self(OBSERVABLE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A tracked view of a raw object.
///
/// An `Observable` is a handle: cloning it is cheap, and two handles are
/// equal when they are the same wrapper (same [`ObservableId`]).
#[derive(Clone)]
pub struct Observable {
    id: ObservableId,
    raw: Object,
    runtime_id: RuntimeId,
    /// Runtime epoch at wrap time. A reset detaches older observables.
    epoch: u64,
    runtime: WeakRuntime,
}

impl Observable {
    pub(crate) fn new(id: ObservableId, raw: Object, runtime: &Runtime) -> Self {
        Self {
            id,
            raw,
            runtime_id: runtime.id(),
            epoch: runtime.epoch(),
            runtime: runtime.downgrade(),
        }
    }

    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// The wrapped object. Accessing it directly is untracked.
    pub fn raw(&self) -> &Object {
        &self.raw
    }

    /// ID of the runtime that created this observable.
    pub fn runtime_id(&self) -> RuntimeId {
        self.runtime_id
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The owning runtime, if it is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        self.runtime.upgrade()
    }

    /// Whether two handles refer to the same wrapper.
    pub fn same_as(&self, other: &Observable) -> bool {
        self.id == other.id
    }

    /// Read a field. Missing fields read as [`Value::Null`].
    pub fn get(&self, key: &str) -> Value {
        self.read(key).unwrap_or_default()
    }

    /// Whether the field exists. Tracked like a read of `key`.
    pub fn has(&self, key: &str) -> bool {
        if let Some(runtime) = self.tracking_runtime(key) {
            runtime.track(&self.raw, key);
        }
        self.raw.contains_key(key)
    }

    /// Write a field and trigger its subscribers.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.raw.insert(key.clone(), value);
        if let Some(runtime) = self.tracking_runtime(&key) {
            runtime.trigger(&self.raw, Some(&key));
        }
    }

    /// Delete a field. Subscribers of `key` run only if the field existed.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.raw.remove(key)?;
        if let Some(runtime) = self.tracking_runtime(key) {
            runtime.trigger(&self.raw, Some(key));
        }
        Some(removed)
    }

    /// Delete every field and trigger the subscribers of every key.
    pub fn clear(&self) {
        if !self.raw.clear() {
            return;
        }
        if let Some(runtime) = self.tracking_runtime("*") {
            runtime.trigger(&self.raw, None);
        }
    }

    /// Field names in insertion order. Not tracked.
    pub fn keys(&self) -> Vec<String> {
        self.raw.keys()
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        value.as_f64().ok_or_else(|| mismatch(key, "number", &value))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.require(key)?;
        value.as_bool().ok_or_else(|| mismatch(key, "bool", &value))
    }

    pub fn get_str(&self, key: &str) -> Result<String> {
        let value = self.require(key)?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatch(key, "string", &value))
    }

    /// Read a nested object field as an observable.
    pub fn get_object(&self, key: &str) -> Result<Observable> {
        match self.require(key)? {
            Value::Observed(observable) => Ok(observable),
            other => Err(mismatch(key, "object", &other)),
        }
    }

    /// The tracked read behind every getter.
    fn read(&self, key: &str) -> Option<Value> {
        let value = self.raw.get(key);
        let Some(runtime) = self.tracking_runtime(key) else {
            return value;
        };

        runtime.track(&self.raw, key);
        value.map(|value| match value {
            Value::Object(object) => Value::Observed(runtime.reactive(object)),
            Value::Observed(observable) => Value::Observed(runtime.reactive(observable)),
            scalar => scalar,
        })
    }

    fn require(&self, key: &str) -> Result<Value> {
        self.read(key).ok_or_else(|| Error::MissingKey {
            key: key.to_owned(),
        })
    }

    /// The runtime to track against, or `None` when this observable is
    /// orphaned (runtime dropped) or detached (runtime reset since wrapping).
    fn tracking_runtime(&self, key: &str) -> Option<Runtime> {
        let Some(runtime) = self.runtime.upgrade() else {
            warn!(
                runtime = %self.runtime_id,
                observable = ?self.id,
                key,
                "runtime dropped, access is untracked"
            );
            return None;
        };

        if runtime.epoch() != self.epoch {
            debug!(
                runtime = %self.runtime_id,
                observable = ?self.id,
                key,
                "observable predates runtime reset, access is untracked"
            );
            return None;
        }

        Some(runtime)
    }
}

fn mismatch(key: &str, expected: &'static str, found: &Value) -> Error {
    Error::TypeMismatch {
        key: key.to_owned(),
        expected,
        found: found.kind(),
    }
}

impl PartialEq for Observable {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Observable {}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id)
            .field("raw", &self.raw)
            .field("runtime", &self.runtime_id)
            .field("epoch", &self.epoch)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
