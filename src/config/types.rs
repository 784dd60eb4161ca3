use serde::{Deserialize, Serialize};

/// Root configuration for a knot.
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnotConfig {
    /// Name recorded on the knot's tracing span.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub faults: FaultConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Fault channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Faults buffered per receiver before the oldest are dropped (default: 64).
    #[serde(default = "default_fault_capacity")]
    pub capacity: usize,
}

/// Diagnostics emitted by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Log every committed transition at debug level (default: false).
    #[serde(default)]
    pub transitions: bool,
}

impl Default for KnotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            faults: FaultConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            capacity: default_fault_capacity(),
        }
    }
}

fn default_name() -> String {
    "knot".to_string()
}

fn default_fault_capacity() -> usize {
    64
}
