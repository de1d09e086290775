//! Computed Values
//!
//! A computed value is an effect registered as lazy and derived: it never
//! runs at creation, and reading [`Computed::value`] runs it. Reads made
//! during that run are tracked like any other computation, so a computed
//! value subscribes to whatever it reads and is re-run after the plain
//! effects whenever one of those fields is written.
//!
//! The result is not cached between reads; every read re-evaluates.

use std::fmt;

use super::effect::Effect;

/// A lazily evaluated derived value.
pub struct Computed<T: 'static> {
    effect: Effect<T>,
}

impl<T: 'static> Computed<T> {
    pub(crate) fn new(effect: Effect<T>) -> Self {
        Self { effect }
    }

    /// Evaluate the value.
    ///
    /// `None` only when read from inside its own evaluation.
    pub fn value(&self) -> Option<T> {
        self.effect.invoke()
    }

    /// The underlying computation.
    pub fn effect(&self) -> &Effect<T> {
        &self.effect
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
        }
    }
}

impl<T: 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed").field("effect", &self.effect).finish()
    }
}
