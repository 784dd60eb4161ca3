//! Build errors and runtime faults.

use std::any::Any;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::ConfigError;

/// Errors raised by [`KnotBuilder::build`](super::KnotBuilder::build).
///
/// A failed build leaves nothing running.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Initial state must be set")]
    MissingInitialState,

    #[error("At least one reducer must be registered")]
    NoReducers,

    #[error("No tokio runtime: build inside a runtime or pass a handle with `runtime()`")]
    NoRuntime,

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Returned when submitting to a knot that has been disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Knot has been disposed")]
pub struct Disposed;

/// Failures observed while the knot is running.
///
/// Faults never reach the producer that submitted a change; they are
/// reported on the channel returned by
/// [`Knot::observe_faults`](super::Knot::observe_faults).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// An event, action or change transformer panicked. Only its own
    /// subscription was terminated.
    #[error("Producer '{producer}' panicked: {message}")]
    ProducerPanicked { producer: String, message: String },

    /// A reducer panicked. The transition was discarded and the knot disposed.
    #[error("Reducer for {change} panicked: {message}")]
    ReducerPanicked { change: String, message: String },

    /// A watcher callback panicked. The observed value was still forwarded.
    #[error("Watcher on {stream} stream panicked: {message}")]
    WatcherPanicked {
        stream: &'static str,
        message: String,
    },

    /// An interceptor on one of the core streams panicked and the knot was
    /// disposed.
    #[error("Interceptor on {stream} stream panicked: {message}")]
    PipelinePanicked {
        stream: &'static str,
        message: String,
    },
}

/// Logs faults and fans them out to every fault subscriber.
#[derive(Clone)]
pub(crate) struct FaultReporter {
    tx: broadcast::Sender<Fault>,
}

impl FaultReporter {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn report(&self, fault: Fault) {
        match &fault {
            Fault::WatcherPanicked { .. } => tracing::warn!(%fault, "Watcher failed"),
            _ => tracing::error!(%fault, "Knot fault"),
        }
        if self.tx.send(fault).is_err() {
            tracing::trace!("Fault dropped (no subscribers)");
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Fault> {
        self.tx.subscribe()
    }
}

/// Extracts the message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
