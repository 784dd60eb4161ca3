//! Runtime settings loaded from TOML.

mod loader;
mod types;

pub use loader::{ConfigError, MAX_FAULT_CAPACITY};
pub use types::{FaultConfig, KnotConfig, TracingConfig};
