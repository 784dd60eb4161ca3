//! Producer subscriptions: event, action and change transformers feeding
//! the bus.

use std::fmt::Debug;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::mvi::Tagged;

use super::bus::ChangeSender;
use super::dispatch::Selector;
use super::error::{panic_message, Fault, FaultReporter};
use super::router::Router;
use super::store::StateReader;

/// Zero-argument source of changes, subscribed once at build time.
pub(crate) type EventTransformer<C> = Box<dyn FnOnce() -> BoxStream<'static, C> + Send>;

/// Turns a stream of `T` (actions, or changes of one kind) into changes.
pub(crate) type StreamTransformer<T, S, C> =
    Box<dyn FnOnce(BoxStream<'static, T>, StateReader<S>) -> BoxStream<'static, C> + Send>;

/// Runs `future`, turning a panic into its message.
pub(crate) async fn catch_panic<F: Future>(future: F) -> Result<F::Output, String> {
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(payload.as_ref()))
}

/// Spawns producer tasks that forward their changes into the bus until the
/// stream ends, the bus closes, or producers are cancelled.
pub(crate) struct ProducerSpawner<C> {
    handle: Handle,
    bus: ChangeSender<C>,
    token: CancellationToken,
    faults: FaultReporter,
    span: tracing::Span,
}

impl<C: Send + 'static> ProducerSpawner<C> {
    pub(crate) fn new(
        handle: Handle,
        bus: ChangeSender<C>,
        token: CancellationToken,
        faults: FaultReporter,
        span: tracing::Span,
    ) -> Self {
        Self {
            handle,
            bus,
            token,
            faults,
            span,
        }
    }

    /// A panic inside `changes` ends this producer only.
    pub(crate) fn spawn(&self, name: String, changes: BoxStream<'static, C>) {
        let bus = self.bus.clone();
        let token = self.token.clone();
        let faults = self.faults.clone();

        let task = async move {
            tracing::debug!(producer = %name, "Producer started");
            match catch_panic(forward(changes, &bus, &token)).await {
                Ok(()) => tracing::debug!(producer = %name, "Producer finished"),
                Err(message) => faults.report(Fault::ProducerPanicked {
                    producer: name,
                    message,
                }),
            }
        };
        self.handle.spawn(task.instrument(self.span.clone()));
    }

    /// Invokes each transformer once with its own inbox stream and spawns
    /// its output as a producer. The returned router feeds the inboxes.
    pub(crate) fn subscribe<T, S>(
        &self,
        label: &str,
        transformers: Vec<(Selector<T::Kind>, StreamTransformer<T, S, C>)>,
        reader: &StateReader<S>,
    ) -> Router<T>
    where
        T: Tagged + Clone + Debug + Send + 'static,
    {
        let mut router = Router::new();
        for (selector, transformer) in transformers {
            let name = match &selector {
                Selector::Kind(kind) => format!("{label}:{kind:?}"),
                Selector::Any => format!("{label}:*"),
            };
            let (inbox, rx) = mpsc::unbounded_channel();
            router.add(selector, inbox);
            let changes = transformer(UnboundedReceiverStream::new(rx).boxed(), reader.clone());
            self.spawn(name, changes);
        }
        router
    }
}

async fn forward<C>(
    mut changes: BoxStream<'static, C>,
    bus: &ChangeSender<C>,
    token: &CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => break,
            next = changes.next() => next,
        };
        let Some(change) = next else {
            break;
        };
        if bus.submit(change).is_err() {
            tracing::trace!("Bus closed, producer stopping");
            break;
        }
    }
}
