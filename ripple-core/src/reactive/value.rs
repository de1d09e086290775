//! Values and Raw Objects
//!
//! An [`Object`] is the raw, untracked record that callers hand to the
//! runtime. It is a shared handle: cloning it clones the reference, never the
//! record, so two handles to the same object observe each other's writes and
//! compare equal by identity.
//!
//! [`Value`] is the dynamic field type. Objects and observables are the only
//! composite kinds; every other variant is a plain value that passes through
//! reads and writes unchanged. Arrays are leaves: their elements are never
//! intercepted.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::observable::Observable;

/// Counter for generating unique object IDs.
static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of a raw object.
///
/// Stable for the lifetime of the object and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct ObjectInner {
    id: ObjectId,
    fields: RwLock<IndexMap<String, Value>>,
}

/// A raw record of named fields.
///
/// Reading or writing an `Object` directly is never tracked. Wrap it with
/// [`Runtime::reactive`](super::Runtime::reactive) to make it observable.
#[derive(Clone)]
pub struct Object(Arc<ObjectInner>);

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self(Arc::new(ObjectInner {
            id: ObjectId::next(),
            fields: RwLock::new(IndexMap::new()),
        }))
    }

    /// Identity of this object.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Read a field.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.fields.read().get(key).cloned()
    }

    /// Write a field, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.fields.write().insert(key.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Delete a field, preserving the order of the remaining ones.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.fields.write().shift_remove(key)
    }

    /// Delete every field. Returns whether anything was removed.
    pub fn clear(&self) -> bool {
        let mut fields = self.0.fields.write();
        let had_fields = !fields.is_empty();
        fields.clear();
        had_fields
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.fields.read().contains_key(key)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.fields.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.fields.read().is_empty()
    }

    pub(crate) fn downgrade(&self) -> WeakObject {
        WeakObject(Arc::downgrade(&self.0))
    }

    /// Copy of the field table, taken without holding the lock afterwards.
    fn snapshot(&self) -> IndexMap<String, Value> {
        self.0.fields.read().clone()
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    // Fields are not printed: object graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.0.id)
            .field("keys", &self.keys())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self(Arc::new(ObjectInner {
            id: ObjectId::next(),
            fields: RwLock::new(fields),
        }))
    }
}

thread_local! {
    /// Objects currently being serialized on this thread, outermost first.
    static SERIALIZING: RefCell<Vec<ObjectId>> = const { RefCell::new(Vec::new()) };
}

/// Marks an object as in progress for the duration of its serialization.
struct SerializeGuard;

impl SerializeGuard {
    /// `None` when `id` is already being serialized further up the graph.
    fn enter(id: ObjectId) -> Option<Self> {
        SERIALIZING.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&id) {
                return None;
            }
            active.push(id);
            Some(SerializeGuard)
        })
    }
}

impl Drop for SerializeGuard {
    fn drop(&mut self) {
        SERIALIZING.with(|active| {
            active.borrow_mut().pop();
        });
    }
}

/// Largest magnitude at which every integer is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Objects serialize as maps. A graph that reaches an object from inside
/// itself has no tree form and fails with an error; shared objects that do
/// not form a cycle are written once per path.
impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(_guard) = SerializeGuard::enter(self.id()) else {
            return Err(S::Error::custom(format!(
                "cyclic object graph: {:?} contains itself",
                self.id()
            )));
        };
        let fields = self.snapshot();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in &fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Non-owning handle to an object, used by the runtime's tables.
#[derive(Clone)]
pub(crate) struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub(crate) fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// A dynamically typed field value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent or empty value. Reading a missing field yields `Null`.
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// An opaque list. Elements are not intercepted.
    Array(Vec<Value>),
    /// A raw, untracked object.
    Object(Object),
    /// An object already wrapped by a runtime.
    Observed(Observable),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Observed(_) => "observable",
        }
    }

    /// Whether reading this value through an observable wraps it.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Observed(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The observable, if this value came out of a tracked read.
    pub fn as_observable(&self) -> Option<&Observable> {
        match self {
            Value::Observed(observable) => Some(observable),
            _ => None,
        }
    }

    /// The raw object behind a composite value.
    pub fn as_object(&self) -> Option<Object> {
        match self {
            Value::Object(object) => Some(object.clone()),
            Value::Observed(observable) => Some(observable.raw().clone()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Scalars compare by value, composites by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Observed(a), Value::Observed(b)) => a.same_as(b),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(object) => object.serialize(serializer),
            Value::Observed(observable) => observable.raw().serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Observable> for Value {
    fn from(observable: Observable) -> Self {
        Value::Observed(observable)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    /// Builds fresh raw objects for every JSON object in the document.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Object(fields.into_iter().collect()),
        }
    }
}

impl From<serde_json::Value> for Object {
    /// Non-object documents produce an empty object.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(fields) => fields.into_iter().collect(),
            _ => Object::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
