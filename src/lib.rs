//! A unidirectional state runtime.
//!
//! A [`Knot`] owns a single `State` value which only changes when a `Change`
//! is reduced into it. A reduction may emit an `Action`; actions are turned
//! back into changes asynchronously by action transformers.
//!
//! ```text
//! Event ──┐
//!         ├──→ Change ──→ Reducer ──→ State ──→ observers
//! Action ─┘                  │
//!    ↑                       │
//!    └───────────────────────┘
//! ```

pub mod config;
pub mod logging;
pub mod mvi;
pub mod runtime;

pub use config::{ConfigError, KnotConfig};
pub use mvi::{Action, Change, Effect, Reducer, State, Tagged};
pub use runtime::{
    BuildError, ChangeSender, Disposed, Fault, Knot, KnotBuilder, Observed, Phase, Prime,
    StateReader, StateStream,
};
