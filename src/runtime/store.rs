//! State storage and publication.
//!
//! The committed state lives in an [`ArcSwap`] written only by the engine.
//! Publication is separate: distinct states reach a [`StatePublisher`],
//! which replays the latest value to every new subscriber before forwarding
//! live ones.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwap;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use super::error::Fault;

/// Holder of the committed state.
pub(crate) struct StateCell<S> {
    current: ArcSwap<S>,
}

impl<S> StateCell<S> {
    pub(crate) fn new(initial: S) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub(crate) fn load(&self) -> Arc<S> {
        self.current.load_full()
    }

    pub(crate) fn store(&self, state: S) {
        self.current.store(Arc::new(state));
    }
}

/// Read-only access to the committed state.
///
/// Reading never blocks and never observes a partially written value.
pub struct StateReader<S> {
    cell: Arc<StateCell<S>>,
}

impl<S> Clone for StateReader<S> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<S: Clone> StateReader<S> {
    pub(crate) fn new(cell: Arc<StateCell<S>>) -> Self {
        Self { cell }
    }

    pub fn get(&self) -> S {
        (*self.cell.load()).clone()
    }

    /// Shared snapshot, without cloning the state.
    pub fn snapshot(&self) -> Arc<S> {
        self.cell.load()
    }
}

/// Suppresses consecutive equal states.
pub(crate) struct Dedup<S> {
    last: S,
}

impl<S: Clone + PartialEq> Dedup<S> {
    pub(crate) fn new(initial: S) -> Self {
        Self { last: initial }
    }

    /// Returns true if `state` differs from the last admitted one.
    pub(crate) fn admit(&mut self, state: &S) -> bool {
        if *state == self.last {
            return false;
        }
        self.last = state.clone();
        true
    }
}

/// Multicast of published states with a replay-of-one cache.
///
/// Subscribing and publishing take the same lock, so a subscriber sees the
/// cached value followed by every later publication, with no gap and no
/// duplicate.
///
/// Without state interceptors the publisher is *direct*: the engine
/// publishes every distinct state itself while committing it, so the cache
/// always holds the committed state. Otherwise the interceptor chain
/// publishes, and a subscriber attaching while the chain still has
/// committed states in flight is held back until the chain settles, then
/// starts from the value it settled on.
pub(crate) struct StatePublisher<S> {
    inner: Mutex<PublisherInner<S>>,
}

struct PublisherInner<S> {
    latest: Option<S>,
    direct: bool,
    // Distinct states handed to publication, the initial one included.
    committed: u64,
    // Of those, how many the interceptor chain is done with.
    settled: u64,
    subscribers: Vec<mpsc::UnboundedSender<S>>,
    waiting: Vec<mpsc::UnboundedSender<S>>,
    closed: bool,
}

impl<S> PublisherInner<S> {
    fn broadcast(&mut self, state: S)
    where
        S: Clone,
    {
        self.subscribers
            .retain(|subscriber| subscriber.send(state.clone()).is_ok());
        self.latest = Some(state);
    }
}

impl<S: Clone> StatePublisher<S> {
    pub(crate) fn new(initial: S, direct: bool) -> Self {
        Self {
            inner: Mutex::new(PublisherInner {
                latest: direct.then_some(initial),
                direct,
                committed: 1,
                settled: u64::from(direct),
                subscribers: Vec::new(),
                waiting: Vec::new(),
                closed: false,
            }),
        }
    }

    /// After [`close`](Self::close) the stream yields the last published
    /// value, if any, and ends.
    pub(crate) fn subscribe(&self) -> StateStream<S> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if inner.settled < inner.committed && !inner.closed {
            inner.waiting.push(tx);
        } else {
            if let Some(latest) = &inner.latest {
                let _ = tx.send(latest.clone());
            }
            if !inner.closed {
                inner.subscribers.push(tx);
            }
        }
        StateStream {
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Records a distinct state committed by the engine. The cell is
    /// written under the publisher lock, so anyone who reads the new state
    /// from the cell and then subscribes is replayed that state or a later
    /// one.
    pub(crate) fn commit(&self, cell: &StateCell<S>, state: &S) {
        let mut inner = self.inner.lock();
        cell.store(state.clone());
        if inner.closed {
            return;
        }
        inner.committed += 1;
        if inner.direct {
            inner.settled = inner.committed;
            inner.broadcast(state.clone());
        }
    }

    /// Publishes a value leaving the state interceptor chain. A direct
    /// publisher has already published it.
    pub(crate) fn publish(&self, state: S) {
        let mut inner = self.inner.lock();
        if inner.closed || inner.direct {
            return;
        }
        inner.broadcast(state);
    }

    /// Marks the first `through` committed states as fully handled by the
    /// interceptor chain. Held-back subscribers are released once nothing
    /// committed is left in flight.
    pub(crate) fn settle(&self, through: u64) {
        let mut inner = self.inner.lock();
        if inner.closed || through <= inner.settled {
            return;
        }
        inner.settled = through;
        if inner.settled < inner.committed {
            return;
        }
        let waiting = std::mem::take(&mut inner.waiting);
        for subscriber in waiting {
            if let Some(latest) = &inner.latest {
                if subscriber.send(latest.clone()).is_err() {
                    continue;
                }
            }
            inner.subscribers.push(subscriber);
        }
    }

    /// Ends every subscriber stream and stops accepting publications.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.subscribers.clear();
        let waiting = std::mem::take(&mut inner.waiting);
        if let Some(latest) = &inner.latest {
            for subscriber in waiting {
                let _ = subscriber.send(latest.clone());
            }
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .subscribers
            .iter()
            .chain(inner.waiting.iter())
            .filter(|subscriber| !subscriber.is_closed())
            .count()
    }
}

/// Counts the committed states an interceptor chain pulls from `states`.
///
/// Whenever the chain asks for more and nothing is queued, everything it
/// pulled so far has left the chain, and the publisher is told so.
pub(crate) fn settling<S: Clone + Send + 'static>(
    states: BoxStream<'static, S>,
    publisher: Arc<StatePublisher<S>>,
) -> BoxStream<'static, S> {
    Settling {
        states,
        publisher,
        pulled: 0,
    }
    .boxed()
}

struct Settling<S> {
    states: BoxStream<'static, S>,
    publisher: Arc<StatePublisher<S>>,
    pulled: u64,
}

impl<S: Clone> Stream for Settling<S> {
    type Item = S;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        let this = self.get_mut();
        match this.states.poll_next_unpin(cx) {
            Poll::Ready(Some(state)) => {
                this.pulled += 1;
                Poll::Ready(Some(state))
            }
            idle => {
                this.publisher.settle(this.pulled);
                idle
            }
        }
    }
}

/// Feeds intercepted states into `publisher` until cancelled.
pub(crate) async fn publish_states<S: Clone>(
    mut states: BoxStream<'static, S>,
    publisher: Arc<StatePublisher<S>>,
    token: CancellationToken,
) -> Result<(), Fault> {
    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => break,
            next = states.next() => next,
        };
        let Some(state) = next else {
            break;
        };
        publisher.publish(state);
    }
    Ok(())
}

/// Stream of published states returned by
/// [`Knot::observe_state`](super::Knot::observe_state).
///
/// The first item is the current state. The stream ends when the knot is
/// disposed.
pub struct StateStream<S> {
    inner: UnboundedReceiverStream<S>,
}

impl<S> Stream for StateStream<S> {
    type Item = S;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        self.inner.poll_next_unpin(cx)
    }
}
