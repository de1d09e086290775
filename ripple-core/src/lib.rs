//! Ripple Core
//!
//! Transparent dependency tracking and change propagation over mutable
//! object graphs. It implements:
//!
//! - Observable wrappers that intercept field reads and writes
//! - A dependency map from (object, field) to subscribed computations
//! - Effects with a re-entrancy-guarded run stack
//! - Lazily evaluated computed values
//!
//! # Architecture
//!
//! - `reactive`: observables, effects, computed values and the runtime
//! - `config`: runtime configuration
//! - `error`: error type for typed access and configuration loading
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use ripple_core::reactive::{Object, Runtime};
//!
//! let runtime = Runtime::new();
//! let user = runtime.reactive(Object::new().with("name", "tom"));
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let (watched, log) = (user.clone(), seen.clone());
//! runtime.effect(move || {
//!     log.lock().push(watched.get_str("name").unwrap_or_default());
//! });
//!
//! user.set("name", "rrr");
//! assert_eq!(*seen.lock(), vec!["tom".to_string(), "rrr".to_string()]);
//! ```

pub mod config;
pub mod error;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
