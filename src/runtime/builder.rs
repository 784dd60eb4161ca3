use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::Instrument;

use crate::config::KnotConfig;
use crate::mvi::{Action, Change, Effect, Reducer, State};

use super::actions::ActionDispatcher;
use super::bus;
use super::dispatch::ReducerTable;
use super::engine::{Engine, Outlets};
use super::error::{BuildError, FaultReporter};
use super::intercept::Observed;
use super::lifecycle::Lifecycle;
use super::prime::Prime;
use super::producer::ProducerSpawner;
use super::store::{self, StateCell, StatePublisher, StateReader};
use super::{Knot, Shared};

/// Collects the registrations of a [`Knot`].
///
/// Registrations are fixed once [`build`](Self::build) returns.
///
/// ```no_run
/// # use knotline::{Action, Change, Effect, Knot, State, Tagged};
/// # #[derive(Debug, Clone, PartialEq)] struct Count(u32);
/// # impl State for Count {}
/// # #[derive(Debug, Clone)] enum Tick { Up }
/// # impl Tagged for Tick { type Kind = (); fn kind(&self) -> Self::Kind {} }
/// # impl Change for Tick {}
/// # #[derive(Debug, Clone)] enum Never {}
/// # impl Tagged for Never { type Kind = (); fn kind(&self) -> Self::Kind {} }
/// # impl Action for Never {}
/// # async fn demo() -> Result<(), knotline::BuildError> {
/// let knot = Knot::<Count, Tick, Never>::builder()
///     .initial_state(Count(0))
///     .reduce((), |state, _| Effect::only(Count(state.0 + 1)))
///     .build()?;
/// knot.submit_change(Tick::Up).ok();
/// # Ok(())
/// # }
/// ```
pub struct KnotBuilder<S, C: Change, A: Action> {
    initial: Option<S>,
    config: KnotConfig,
    root: Prime<S, C, A>,
    primes: usize,
    reduce_on: Option<Handle>,
    observe_on: Option<Handle>,
    runtime: Option<Handle>,
}

impl<S: State, C: Change, A: Action> Default for KnotBuilder<S, C, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, C: Change, A: Action> KnotBuilder<S, C, A> {
    pub fn new() -> Self {
        Self {
            initial: None,
            config: KnotConfig::default(),
            root: Prime::new(),
            primes: 0,
            reduce_on: None,
            observe_on: None,
            runtime: None,
        }
    }

    pub fn initial_state(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    pub fn config(mut self, config: KnotConfig) -> Self {
        self.config = config;
        self
    }

    /// Merges every registration of `prime`, after the ones made so far.
    pub fn prime(mut self, prime: Prime<S, C, A>) -> Self {
        self.root.merge(prime);
        self.primes += 1;
        self
    }

    fn with_root(mut self, register: impl FnOnce(Prime<S, C, A>) -> Prime<S, C, A>) -> Self {
        self.root = register(self.root);
        self
    }

    // Registrations, documented on `Prime`.

    pub fn reduce<F>(self, kind: C::Kind, reducer: F) -> Self
    where
        F: Fn(&S, &C) -> Effect<S, A> + Send + Sync + 'static,
    {
        self.with_root(|root| root.reduce(kind, reducer))
    }

    pub fn reduce_with<R: Reducer<S, C, A>>(self, kind: C::Kind, reducer: R) -> Self {
        self.with_root(|root| root.reduce_with(kind, reducer))
    }

    pub fn reduce_any<F>(self, reducer: F) -> Self
    where
        F: Fn(&S, &C) -> Effect<S, A> + Send + Sync + 'static,
    {
        self.with_root(|root| root.reduce_any(reducer))
    }

    pub fn event<F, St>(self, source: F) -> Self
    where
        F: FnOnce() -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.with_root(|root| root.event(source))
    }

    pub fn perform<F, St>(self, kind: A::Kind, transformer: F) -> Self
    where
        F: FnOnce(BoxStream<'static, A>, StateReader<S>) -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.with_root(|root| root.perform(kind, transformer))
    }

    pub fn perform_any<F, St>(self, transformer: F) -> Self
    where
        F: FnOnce(BoxStream<'static, A>, StateReader<S>) -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.with_root(|root| root.perform_any(transformer))
    }

    pub fn transform_change<F, St>(self, kind: C::Kind, transformer: F) -> Self
    where
        F: FnOnce(BoxStream<'static, C>, StateReader<S>) -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.with_root(|root| root.transform_change(kind, transformer))
    }

    pub fn intercept_state<F, St>(self, interceptor: F) -> Self
    where
        F: FnOnce(BoxStream<'static, S>) -> St + Send + 'static,
        St: Stream<Item = S> + Send + 'static,
    {
        self.with_root(|root| root.intercept_state(interceptor))
    }

    pub fn intercept_change<F, St>(self, interceptor: F) -> Self
    where
        F: FnOnce(BoxStream<'static, C>) -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.with_root(|root| root.intercept_change(interceptor))
    }

    pub fn intercept_action<F, St>(self, interceptor: F) -> Self
    where
        F: FnOnce(BoxStream<'static, A>) -> St + Send + 'static,
        St: Stream<Item = A> + Send + 'static,
    {
        self.with_root(|root| root.intercept_action(interceptor))
    }

    pub fn watch_state<F>(self, watcher: F) -> Self
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.with_root(|root| root.watch_state(watcher))
    }

    pub fn watch_change<F>(self, watcher: F) -> Self
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        self.with_root(|root| root.watch_change(watcher))
    }

    pub fn watch_action<F>(self, watcher: F) -> Self
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.with_root(|root| root.watch_action(watcher))
    }

    pub fn watch_all<F>(self, watcher: F) -> Self
    where
        F: Fn(Observed<'_, S, C, A>) + Send + Sync + 'static,
    {
        self.with_root(|root| root.watch_all(watcher))
    }

    // Scheduling

    /// Runtime for the engine task, which owns every reducer call.
    pub fn reduce_on(mut self, handle: Handle) -> Self {
        self.reduce_on = Some(handle);
        self
    }

    /// Runtime for the publication task, which runs state interceptors and
    /// feeds observers.
    pub fn observe_on(mut self, handle: Handle) -> Self {
        self.observe_on = Some(handle);
        self
    }

    /// Runtime for producers and action dispatch. Defaults to the runtime
    /// `build` is called from.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Validates the registrations and starts the knot.
    pub fn build(self) -> Result<Knot<S, C, A>, BuildError> {
        let KnotBuilder {
            initial,
            config,
            root,
            primes,
            reduce_on,
            observe_on,
            runtime,
        } = self;
        let interceptors = root.interceptor_count();
        let Prime {
            reducers,
            events,
            action_transformers,
            change_transformers,
            state_chain,
            change_chain,
            action_chain,
        } = root;

        let initial = initial.ok_or(BuildError::MissingInitialState)?;
        if reducers.is_empty() {
            return Err(BuildError::NoReducers);
        }
        config.validate()?;
        let runtime = runtime
            .or_else(|| Handle::try_current().ok())
            .or_else(|| reduce_on.clone())
            .ok_or(BuildError::NoRuntime)?;

        let span = tracing::info_span!("knot", name = %config.name);
        let faults = FaultReporter::new(config.faults.capacity);
        let (sender, bus_output) = bus::channel();
        let cell = Arc::new(StateCell::new(initial.clone()));
        let reader = StateReader::new(Arc::clone(&cell));
        let direct = !state_chain.intercepts();
        let publisher = Arc::new(StatePublisher::new(initial.clone(), direct));

        let shared = Arc::new(Shared {
            name: config.name.clone(),
            bus: sender.clone(),
            reader: reader.clone(),
            publisher: Arc::clone(&publisher),
            lifecycle: Lifecycle::new(),
            faults: faults.clone(),
        });
        let core = shared.lifecycle.core_token();

        let producers = ProducerSpawner::new(
            runtime.clone(),
            sender,
            shared.lifecycle.producer_token(),
            faults.clone(),
            span.clone(),
        );
        let change_router = producers.subscribe("change", change_transformers, &reader);
        let action_router = producers.subscribe("action", action_transformers, &reader);
        let event_count = events.len();
        for (index, source) in events.into_iter().enumerate() {
            producers.spawn(format!("event#{index}"), source());
        }

        // Publication: the initial state goes through the state chain first,
        // like every later one.
        let (published_tx, published_rx) = mpsc::unbounded_channel();
        let _ = published_tx.send(initial);
        let mut published = UnboundedReceiverStream::new(published_rx).boxed();
        if !direct {
            published = store::settling(published, Arc::clone(&publisher));
        }
        let states = state_chain.apply(published, &faults);
        let publication = store::publish_states(states, Arc::clone(&publisher), core.clone());
        observe_on.as_ref().unwrap_or(&runtime).spawn(
            Arc::clone(&shared)
                .supervise("state", publication)
                .instrument(span.clone()),
        );

        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let emitted = UnboundedReceiverStream::new(actions_rx).boxed();
        let actions = action_chain.apply(emitted, &faults);
        let dispatch = ActionDispatcher::new(action_router).run(actions, core.clone());
        runtime.spawn(
            Arc::clone(&shared)
                .supervise("action", dispatch)
                .instrument(span.clone()),
        );

        let reducer_count = reducers.len();
        let engine = Engine::new(
            ReducerTable::new(reducers),
            change_router,
            cell,
            Outlets {
                publisher,
                published: published_tx,
                actions: actions_tx,
            },
            config.tracing.transitions,
        );
        let changes = change_chain.apply(bus_output.boxed(), &faults);
        reduce_on.as_ref().unwrap_or(&runtime).spawn(
            Arc::clone(&shared)
                .supervise("change", engine.run(changes, core))
                .instrument(span.clone()),
        );

        tracing::info!(
            parent: &span,
            reducers = reducer_count,
            events = event_count,
            interceptors,
            primes,
            "Knot started"
        );

        Ok(Knot {
            shared,
            _action: PhantomData,
        })
    }
}
