//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Child exit poll interval in milliseconds (default: 100)
    pub poll_interval_ms: u64,

    /// Grace period between SIGTERM and kill after a tool timeout (default: 10)
    pub termination_grace_seconds: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            termination_grace_seconds: 10,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging.
    ///
    /// There is no default tool timeout: the tool runs until it exits.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "poll_interval_ms": self.poll_interval_ms,
            "termination_grace_seconds": self.termination_grace_seconds,
            "properties": {}
        })
    }
}
