//! Reactive Primitives
//!
//! This module implements transparent dependency tracking over mutable
//! object graphs: observables, effects, and computed values.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An [`Observable`] wraps a raw [`Object`]. Reading one of its fields inside
//! a running computation records that computation as a dependent of the
//! field; writing the field re-runs every dependent. Nested objects become
//! observable the first time they are read.
//!
//! ## Effects
//!
//! An [`Effect`] is a callback whose dependencies are discovered by running
//! it. Effects run once when registered (unless lazy) and again whenever a
//! field they read is written.
//!
//! ## Computed values
//!
//! A [`Computed`] is a lazy effect read through [`Computed::value`]. When a
//! field changes, plain effects re-run before computed values do.
//!
//! # Implementation Notes
//!
//! A thread-local stack records which computation is running. Each runtime
//! keeps a map from (object, key) to the set of subscribed computations,
//! plus weak tables linking raw objects to their observables.
//!
//! Propagation is synchronous: a write returns only after every dependent
//! has run, and writes made by dependents propagate the same way, nested.

mod computed;
mod context;
mod effect;
mod observable;
mod runtime;
mod subscriber;
mod tracker;
mod value;

pub use computed::Computed;
pub use context::ReactiveContext;
pub use effect::{Effect, EffectOptions};
pub use observable::{Observable, ObservableId};
pub use runtime::{Runtime, RuntimeId, Target};
pub use subscriber::SubscriberId;
pub use value::{Object, ObjectId, Value};
