//! Reusable bundles of registrations.
//!
//! A [`Prime`] groups the reducers, producers, interceptors and watchers of
//! one feature so that several features can be composed into a single knot
//! with [`KnotBuilder::prime`](super::KnotBuilder::prime). A prime has no
//! state and no runtime of its own; it only exists until it is merged.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::mvi::{Action, Change, Effect, Reducer, State};

use super::dispatch::{BoxReducer, Selector};
use super::intercept::{Chain, Observed};
use super::producer::{EventTransformer, StreamTransformer};
use super::store::StateReader;

/// A self-contained set of registrations for part of a knot.
///
/// ```
/// # use knotline::{Action, Change, Effect, Prime, State, Tagged};
/// # #[derive(Debug, Clone, PartialEq)] struct Cart { items: u32 }
/// # impl State for Cart {}
/// # #[derive(Debug, Clone)] enum Edit { Add, Clear }
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)] enum EditKind { Add, Clear }
/// # impl Tagged for Edit {
/// #     type Kind = EditKind;
/// #     fn kind(&self) -> EditKind {
/// #         match self { Edit::Add => EditKind::Add, Edit::Clear => EditKind::Clear }
/// #     }
/// # }
/// # impl Change for Edit {}
/// # #[derive(Debug, Clone)] enum Never {}
/// # impl Tagged for Never { type Kind = (); fn kind(&self) -> Self::Kind {} }
/// # impl Action for Never {}
/// let adding: Prime<Cart, Edit, Never> = Prime::new()
///     .reduce(EditKind::Add, |cart: &Cart, _| Effect::only(Cart { items: cart.items + 1 }));
/// let clearing: Prime<Cart, Edit, Never> = Prime::new()
///     .reduce(EditKind::Clear, |_, _| Effect::only(Cart { items: 0 }));
/// assert_eq!(adding.reducer_count() + clearing.reducer_count(), 2);
/// ```
pub struct Prime<S, C: Change, A: Action> {
    pub(crate) reducers: Vec<(Selector<C::Kind>, BoxReducer<S, C, A>)>,
    pub(crate) events: Vec<EventTransformer<C>>,
    pub(crate) action_transformers: Vec<(Selector<A::Kind>, StreamTransformer<A, S, C>)>,
    pub(crate) change_transformers: Vec<(Selector<C::Kind>, StreamTransformer<C, S, C>)>,
    pub(crate) state_chain: Chain<S>,
    pub(crate) change_chain: Chain<C>,
    pub(crate) action_chain: Chain<A>,
}

impl<S: State, C: Change, A: Action> Default for Prime<S, C, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, C: Change, A: Action> Prime<S, C, A> {
    pub fn new() -> Self {
        Self {
            reducers: Vec::new(),
            events: Vec::new(),
            action_transformers: Vec::new(),
            change_transformers: Vec::new(),
            state_chain: Chain::new("state"),
            change_chain: Chain::new("change"),
            action_chain: Chain::new("action"),
        }
    }

    pub fn reducer_count(&self) -> usize {
        self.reducers.len()
    }

    /// Appends every registration of `other` after this prime's own.
    pub(crate) fn merge(&mut self, other: Prime<S, C, A>) {
        let Prime {
            reducers,
            events,
            action_transformers,
            change_transformers,
            state_chain,
            change_chain,
            action_chain,
        } = other;

        self.reducers.extend(reducers);
        self.events.extend(events);
        self.action_transformers.extend(action_transformers);
        self.change_transformers.extend(change_transformers);
        self.state_chain.append(state_chain);
        self.change_chain.append(change_chain);
        self.action_chain.append(action_chain);
    }

    pub(crate) fn interceptor_count(&self) -> usize {
        self.state_chain.len() + self.change_chain.len() + self.action_chain.len()
    }

    // Reducers

    /// Registers a reducer for one change kind. Reducers sharing a kind run
    /// in registration order, each on the state left by the previous one.
    pub fn reduce<F>(self, kind: C::Kind, reducer: F) -> Self
    where
        F: Fn(&S, &C) -> Effect<S, A> + Send + Sync + 'static,
    {
        self.reduce_with(kind, reducer)
    }

    /// Like [`reduce`](Self::reduce), for any [`Reducer`] implementation.
    pub fn reduce_with<R: Reducer<S, C, A>>(mut self, kind: C::Kind, reducer: R) -> Self {
        self.reducers.push((Selector::Kind(kind), Box::new(reducer)));
        self
    }

    /// Registers a reducer invoked for every change kind.
    pub fn reduce_any<F>(mut self, reducer: F) -> Self
    where
        F: Fn(&S, &C) -> Effect<S, A> + Send + Sync + 'static,
    {
        self.reducers.push((Selector::Any, Box::new(reducer)));
        self
    }

    // Producers

    /// Registers an external source of changes. `source` is called once
    /// when the knot is built.
    pub fn event<F, St>(mut self, source: F) -> Self
    where
        F: FnOnce() -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.events.push(Box::new(move || source().boxed()));
        self
    }

    /// Registers the side effect for one action kind. `transformer` gets
    /// the stream of those actions and returns the changes they produce.
    pub fn perform<F, St>(mut self, kind: A::Kind, transformer: F) -> Self
    where
        F: FnOnce(BoxStream<'static, A>, StateReader<S>) -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.action_transformers
            .push((Selector::Kind(kind), boxed_transformer(transformer)));
        self
    }

    /// Like [`perform`](Self::perform), receiving every action.
    pub fn perform_any<F, St>(mut self, transformer: F) -> Self
    where
        F: FnOnce(BoxStream<'static, A>, StateReader<S>) -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.action_transformers
            .push((Selector::Any, boxed_transformer(transformer)));
        self
    }

    /// Derives further changes from the changes of one kind. The derived
    /// changes go through the bus like any other.
    pub fn transform_change<F, St>(mut self, kind: C::Kind, transformer: F) -> Self
    where
        F: FnOnce(BoxStream<'static, C>, StateReader<S>) -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.change_transformers
            .push((Selector::Kind(kind), boxed_transformer(transformer)));
        self
    }

    // Interceptors and watchers

    /// Wraps the stream of published states, after deduplication.
    ///
    /// An observer attaching while states are still inside the interceptor
    /// chain starts from the value the chain settles on.
    pub fn intercept_state<F, St>(mut self, interceptor: F) -> Self
    where
        F: FnOnce(BoxStream<'static, S>) -> St + Send + 'static,
        St: Stream<Item = S> + Send + 'static,
    {
        self.state_chain.intercept(Box::new(move |states: BoxStream<'static, S>| {
            interceptor(states).boxed()
        }));
        self
    }

    /// Wraps the stream of changes leaving the bus, before reduction.
    pub fn intercept_change<F, St>(mut self, interceptor: F) -> Self
    where
        F: FnOnce(BoxStream<'static, C>) -> St + Send + 'static,
        St: Stream<Item = C> + Send + 'static,
    {
        self.change_chain.intercept(Box::new(move |changes: BoxStream<'static, C>| {
            interceptor(changes).boxed()
        }));
        self
    }

    /// Wraps the stream of emitted actions, before dispatch.
    pub fn intercept_action<F, St>(mut self, interceptor: F) -> Self
    where
        F: FnOnce(BoxStream<'static, A>) -> St + Send + 'static,
        St: Stream<Item = A> + Send + 'static,
    {
        self.action_chain.intercept(Box::new(move |actions: BoxStream<'static, A>| {
            interceptor(actions).boxed()
        }));
        self
    }

    pub fn watch_state<F>(mut self, watcher: F) -> Self
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.state_chain.watch(Arc::new(watcher));
        self
    }

    pub fn watch_change<F>(mut self, watcher: F) -> Self
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        self.change_chain.watch(Arc::new(watcher));
        self
    }

    pub fn watch_action<F>(mut self, watcher: F) -> Self
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.action_chain.watch(Arc::new(watcher));
        self
    }

    /// Registers one watcher on all three streams.
    pub fn watch_all<F>(mut self, watcher: F) -> Self
    where
        F: Fn(Observed<'_, S, C, A>) + Send + Sync + 'static,
    {
        let watcher = Arc::new(watcher);

        let on_state = Arc::clone(&watcher);
        self.state_chain
            .watch(Arc::new(move |state: &S| on_state(Observed::State(state))));
        let on_change = Arc::clone(&watcher);
        self.change_chain
            .watch(Arc::new(move |change: &C| on_change(Observed::Change(change))));
        self.action_chain
            .watch(Arc::new(move |action: &A| watcher(Observed::Action(action))));
        self
    }
}

fn boxed_transformer<T, S, C, F, St>(transformer: F) -> StreamTransformer<T, S, C>
where
    F: FnOnce(BoxStream<'static, T>, StateReader<S>) -> St + Send + 'static,
    St: Stream<Item = C> + Send + 'static,
{
    Box::new(move |input: BoxStream<'static, T>, reader: StateReader<S>| {
        transformer(input, reader).boxed()
    })
}
