//! The single consumer of the change bus.
//!
//! Changes are applied strictly one at a time, in arrival order. For each
//! change the engine runs the matching reducers, commits the resulting state,
//! forwards distinct states to publication and any emitted action to the
//! action dispatcher, then routes the change to change transformers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::mvi::{Action, Change, Effect, State};

use super::dispatch::ReducerTable;
use super::error::{panic_message, Fault};
use super::router::Router;
use super::store::{Dedup, StateCell, StatePublisher};

pub(crate) struct Engine<S, C: Change, A> {
    reducers: ReducerTable<S, C, A>,
    transformers: Router<C>,
    cell: Arc<StateCell<S>>,
    dedup: Dedup<S>,
    publisher: Arc<StatePublisher<S>>,
    published: mpsc::UnboundedSender<S>,
    actions: mpsc::UnboundedSender<A>,
    trace_transitions: bool,
    seq: u64,
}

/// Outbound channels of the engine.
pub(crate) struct Outlets<S, A> {
    pub(crate) publisher: Arc<StatePublisher<S>>,
    /// Input of the state interceptor chain.
    pub(crate) published: mpsc::UnboundedSender<S>,
    pub(crate) actions: mpsc::UnboundedSender<A>,
}

impl<S: State, C: Change, A: Action> Engine<S, C, A> {
    pub(crate) fn new(
        reducers: ReducerTable<S, C, A>,
        transformers: Router<C>,
        cell: Arc<StateCell<S>>,
        outlets: Outlets<S, A>,
        trace_transitions: bool,
    ) -> Self {
        let dedup = Dedup::new((*cell.load()).clone());
        Self {
            reducers,
            transformers,
            cell,
            dedup,
            publisher: outlets.publisher,
            published: outlets.published,
            actions: outlets.actions,
            trace_transitions,
            seq: 0,
        }
    }

    /// Consumes changes until cancelled or the bus is exhausted.
    ///
    /// A panicking reducer ends the loop with [`Fault::ReducerPanicked`];
    /// its transition is discarded.
    pub(crate) async fn run(
        mut self,
        mut changes: BoxStream<'static, C>,
        token: CancellationToken,
    ) -> Result<(), Fault> {
        tracing::debug!(reducers = self.reducers.len(), "Engine started");
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => break,
                next = changes.next() => next,
            };
            let Some(change) = next else {
                break;
            };
            self.apply(change)?;
        }
        tracing::debug!(applied = self.seq, "Engine stopped");
        Ok(())
    }

    fn apply(&mut self, change: C) -> Result<(), Fault> {
        self.seq += 1;
        let current = self.cell.load();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.reducers.reduce(&current, &change)
        }));
        match outcome {
            Err(payload) => {
                return Err(Fault::ReducerPanicked {
                    change: format!("{:?}", change.kind()),
                    message: panic_message(payload.as_ref()),
                });
            }
            Ok(None) => {
                tracing::trace!(seq = self.seq, kind = ?change.kind(), "No reducer for change");
            }
            Ok(Some(effect)) => self.commit(effect, &change),
        }

        let delivered = self.transformers.route(&change);
        if delivered > 0 {
            tracing::trace!(seq = self.seq, delivered, "Change routed to transformers");
        }
        Ok(())
    }

    fn commit(&mut self, effect: Effect<S, A>, change: &C) {
        let (state, action) = effect.into_parts();

        let distinct = self.dedup.admit(&state);
        if distinct {
            self.publisher.commit(&self.cell, &state);
            if self.published.send(state).is_err() {
                tracing::trace!("Publication closed, state not published");
            }
        } else {
            self.cell.store(state);
        }

        if self.trace_transitions {
            tracing::debug!(
                seq = self.seq,
                kind = ?change.kind(),
                distinct,
                action = action.is_some(),
                "Transition"
            );
        }

        if let Some(action) = action {
            if self.actions.send(action).is_err() {
                tracing::trace!("Action dispatch closed, action dropped");
            }
        }
    }
}
