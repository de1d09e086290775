//! Error types.
//!
//! The reactive core itself never fails: suppressed re-entrant runs and
//! writes without subscribers are silent, and callback failures propagate
//! unchanged. Errors only surface from typed field access and from loading
//! configuration.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by typed accessors and configuration loading.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested field is not present on the object.
    #[error("missing key `{key}`")]
    MissingKey { key: String },

    /// The field holds a value of a different kind than requested.
    #[error("key `{key}`: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The configuration document could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}
