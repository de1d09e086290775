//! Runtime Configuration
//!
//! Knobs that change how a [`Runtime`](crate::reactive::Runtime) bookkeeps
//! dependencies. Every field has a default, so a partial (or empty) JSON
//! document is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Label attached to log events emitted by this runtime.
    pub name: Option<String>,

    /// Drop a computation from every subscriber set it belongs to before
    /// each run, so that dependencies reflect only the latest execution.
    ///
    /// Off by default: subscriptions accumulate across runs and a branch
    /// that is no longer read keeps re-triggering the computation.
    pub cleanup_stale_dependencies: bool,
}

impl RuntimeConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the runtime label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enable or disable dependency cleanup between runs.
    pub fn with_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup_stale_dependencies = enabled;
        self
    }
}
