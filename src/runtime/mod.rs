//! The knot runtime: change bus, reducer engine, state publication and the
//! action feedback loop.
//!
//! Task layout of a running knot:
//!
//! - one engine task (on the reduce runtime) consuming the bus,
//! - one publication task (on the observe runtime) running the state chain,
//! - one action dispatch task,
//! - one task per event source and per action or change transformer.

mod actions;
mod builder;
mod bus;
mod dispatch;
mod engine;
mod error;
mod intercept;
mod lifecycle;
mod prime;
mod producer;
mod router;
mod store;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::mvi::{Action, Change, State};

pub use builder::KnotBuilder;
pub use bus::ChangeSender;
pub use error::{BuildError, Disposed, Fault};
pub use intercept::{Interceptor, Observed};
pub use lifecycle::Phase;
pub use prime::Prime;
pub use store::{StateReader, StateStream};

use error::FaultReporter;
use lifecycle::Lifecycle;
use producer::catch_panic;
use store::StatePublisher;

/// State owned jointly by the [`Knot`] handle and its core tasks.
struct Shared<S, C> {
    name: String,
    bus: ChangeSender<C>,
    reader: StateReader<S>,
    publisher: Arc<StatePublisher<S>>,
    lifecycle: Lifecycle,
    faults: FaultReporter,
}

impl<S: Clone, C> Shared<S, C> {
    /// Tears the knot down. Only the first call has any effect.
    fn dispose(&self) {
        if !self.lifecycle.begin() {
            return;
        }
        tracing::debug!(knot = %self.name, "Disposing knot");

        self.lifecycle.advance(Phase::CancellingProducers);
        self.lifecycle.cancel_producers();

        self.lifecycle.advance(Phase::ClosingBus);
        self.bus.close();

        self.lifecycle.advance(Phase::ReleasingState);
        self.lifecycle.cancel_core();
        self.publisher.close();

        self.lifecycle.finish();
        tracing::info!(knot = %self.name, "Knot disposed");
    }

    /// Runs a core task. A fault or panic in it is reported and disposes
    /// the knot.
    async fn supervise<F>(self: Arc<Self>, stream: &'static str, task: F)
    where
        F: Future<Output = Result<(), Fault>>,
    {
        let fault = match catch_panic(task).await {
            Ok(Ok(())) => return,
            Ok(Err(fault)) => fault,
            Err(message) => Fault::PipelinePanicked { stream, message },
        };
        self.faults.report(fault);
        self.dispose();
    }
}

/// A running state machine.
///
/// Changes submitted from any task or thread are applied one at a time;
/// every distinct resulting state is published to observers. Dropping the
/// handle disposes the knot.
pub struct Knot<S: State, C: Change, A: Action> {
    shared: Arc<Shared<S, C>>,
    _action: PhantomData<fn() -> A>,
}

impl<S: State, C: Change, A: Action> Knot<S, C, A> {
    pub fn builder() -> KnotBuilder<S, C, A> {
        KnotBuilder::new()
    }

    /// Enqueues a change. Never waits for the reduction.
    ///
    /// # Errors
    ///
    /// Returns [`Disposed`] once the knot has been disposed; the change is
    /// dropped.
    pub fn submit_change(&self, change: C) -> Result<(), Disposed> {
        self.shared.bus.submit(change)
    }

    /// A cloneable handle for submitting changes from elsewhere.
    pub fn sender(&self) -> ChangeSender<C> {
        self.shared.bus.clone()
    }

    /// Subscribes to published states, starting with the latest one.
    pub fn observe_state(&self) -> StateStream<S> {
        self.shared.publisher.subscribe()
    }

    /// The last committed state.
    pub fn current_state(&self) -> S {
        self.shared.reader.get()
    }

    pub fn state_reader(&self) -> StateReader<S> {
        self.shared.reader.clone()
    }

    /// Subscribes to runtime faults. Faults reported before subscribing are
    /// not replayed.
    pub fn observe_faults(&self) -> broadcast::Receiver<Fault> {
        self.shared.faults.subscribe()
    }

    /// Number of live state subscribers.
    pub fn observer_count(&self) -> usize {
        self.shared.publisher.subscriber_count()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn phase(&self) -> Phase {
        self.shared.lifecycle.phase()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lifecycle.is_disposing()
    }

    /// Resolves once the knot has been fully disposed, whether by
    /// [`dispose`](Self::dispose), a drop, or a fatal fault.
    pub async fn disposed(&self) {
        self.shared.lifecycle.wait_finished().await;
    }

    /// Stops accepting changes, cancels every producer and ends every state
    /// stream. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }
}

impl<S: State, C: Change, A: Action> Drop for Knot<S, C, A> {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}
