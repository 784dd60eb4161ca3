//! Reducer trait for the runtime.

use super::effect::Effect;

/// Reducer transforms state based on changes.
///
/// The reducer is the only place where state transitions happen.
/// It must be a pure function: `(State, Change) -> Effect`. Side effects are
/// expressed through the optional action in the returned [`Effect`].
///
/// Any `Fn(&S, &C) -> Effect<S, A>` closure is a reducer.
pub trait Reducer<S, C, A>: Send + Sync + 'static {
    /// Process a change against the current state.
    fn reduce(&self, state: &S, change: &C) -> Effect<S, A>;
}

impl<S, C, A, F> Reducer<S, C, A> for F
where
    F: Fn(&S, &C) -> Effect<S, A> + Send + Sync + 'static,
{
    fn reduce(&self, state: &S, change: &C) -> Effect<S, A> {
        self(state, change)
    }
}
