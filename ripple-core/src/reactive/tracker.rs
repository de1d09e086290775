//! Dependency Map
//!
//! Storage for the relation {target object × field key → subscribers}.
//!
//! ```text
//! TargetMap
//!   ObjectId(3) -> { "age":  Dep { effect#1, computed#4 },
//!                    "name": Dep { effect#1 } }
//!   ObjectId(7) -> { "title": Dep { effect#2 } }
//! ```
//!
//! Each [`Dep`] is shared (`Arc`) so that a computation can keep a handle on
//! every set it was added to. The runtime copies subscribers out of the map
//! before running any of them; no lock here is ever held across a callback.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::subscriber::{Subscriber, SubscriberId};
use super::value::{Object, ObjectId, WeakObject};

/// The set of computations subscribed to one field of one object.
pub(crate) struct Dep {
    subscribers: Mutex<IndexMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl Dep {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(IndexMap::new()),
        })
    }

    /// Add a subscriber. Returns `false` if it was already present.
    pub(crate) fn insert(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&subscriber.id()) {
            return false;
        }
        subscribers.insert(subscriber.id(), subscriber);
        true
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().shift_remove(&id).is_some()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        self.subscribers.lock().values().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }
}

struct TargetEntry {
    target: WeakObject,
    keys: HashMap<String, Arc<Dep>>,
}

/// All dependency sets of one runtime, keyed by target identity.
///
/// Targets are held weakly; entries for dropped objects are removed by
/// [`TargetMap::prune`].
#[derive(Default)]
pub(crate) struct TargetMap {
    entries: HashMap<ObjectId, TargetEntry>,
}

impl TargetMap {
    /// Find or create the subscriber set for `target.key`.
    pub(crate) fn dep_for(&mut self, target: &Object, key: &str) -> Arc<Dep> {
        let entry = self.entries.entry(target.id()).or_insert_with(|| TargetEntry {
            target: target.downgrade(),
            keys: HashMap::new(),
        });

        match entry.keys.get(key) {
            Some(dep) => Arc::clone(dep),
            None => {
                let dep = Dep::new();
                entry.keys.insert(key.to_owned(), Arc::clone(&dep));
                dep
            }
        }
    }

    /// Subscriber sets reached by a write to `target.key`.
    ///
    /// `None` selects every key recorded for the target.
    pub(crate) fn deps(&self, target: ObjectId, key: Option<&str>) -> Vec<Arc<Dep>> {
        let Some(entry) = self.entries.get(&target) else {
            return Vec::new();
        };

        match key {
            Some(key) => entry.keys.get(key).cloned().into_iter().collect(),
            None => entry.keys.values().cloned().collect(),
        }
    }

    pub(crate) fn subscriber_count(&self, target: ObjectId, key: &str) -> usize {
        self.entries
            .get(&target)
            .and_then(|entry| entry.keys.get(key))
            .map_or(0, |dep| dep.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop entries whose target object no longer exists.
    pub(crate) fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.target.is_alive());
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Split the subscribers of `deps` into plain and derived computations.
///
/// A computation subscribed through several sets appears once.
pub(crate) fn partition(deps: &[Arc<Dep>]) -> (Vec<Arc<dyn Subscriber>>, Vec<Arc<dyn Subscriber>>) {
    let mut effects: IndexMap<SubscriberId, Arc<dyn Subscriber>> = IndexMap::new();
    let mut computed: IndexMap<SubscriberId, Arc<dyn Subscriber>> = IndexMap::new();

    for dep in deps {
        for subscriber in dep.snapshot() {
            let group = if subscriber.is_computed() {
                &mut computed
            } else {
                &mut effects
            };
            group.entry(subscriber.id()).or_insert(subscriber);
        }
    }

    (effects.into_values().collect(), computed.into_values().collect())
}
