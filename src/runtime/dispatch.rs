//! Reducer lookup by change kind.

use std::collections::HashMap;

use crate::mvi::{Effect, Reducer, Tagged};

/// Which values a registration applies to.
pub(crate) enum Selector<K> {
    Kind(K),
    Any,
}

pub(crate) type BoxReducer<S, C, A> = Box<dyn Reducer<S, C, A>>;

/// Dispatch table built once at construction.
///
/// Each kind maps to the reducers registered for it, merged with the
/// catch-all reducers, in registration order.
pub(crate) struct ReducerTable<S, C: Tagged, A> {
    reducers: Vec<BoxReducer<S, C, A>>,
    by_kind: HashMap<C::Kind, Vec<usize>>,
    fallback: Vec<usize>,
}

impl<S: 'static, C: Tagged + 'static, A: 'static> ReducerTable<S, C, A> {
    pub(crate) fn new(registrations: Vec<(Selector<C::Kind>, BoxReducer<S, C, A>)>) -> Self {
        let mut reducers = Vec::with_capacity(registrations.len());
        let mut by_kind: HashMap<C::Kind, Vec<usize>> = HashMap::new();
        let mut fallback = Vec::new();

        for (index, (selector, reducer)) in registrations.into_iter().enumerate() {
            reducers.push(reducer);
            match selector {
                Selector::Kind(kind) => by_kind.entry(kind).or_default().push(index),
                Selector::Any => fallback.push(index),
            }
        }

        for indices in by_kind.values_mut() {
            indices.extend_from_slice(&fallback);
            indices.sort_unstable();
        }

        Self {
            reducers,
            by_kind,
            fallback,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Runs every reducer matching the change, each on the previous one's
    /// state. Returns `None` when nothing is registered for the kind.
    ///
    /// Only the last effect's action survives the chain.
    pub(crate) fn reduce(&self, state: &S, change: &C) -> Option<Effect<S, A>> {
        let indices = self
            .by_kind
            .get(&change.kind())
            .unwrap_or(&self.fallback);

        let (first, rest) = indices.split_first()?;
        let mut effect = self.reducers[*first].reduce(state, change);
        for index in rest {
            effect = self.reducers[*index].reduce(&effect.state, change);
        }
        Some(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Add(i64),
        Mul(i64),
        Noop,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum OpKind {
        Add,
        Mul,
        Noop,
    }

    impl Tagged for Op {
        type Kind = OpKind;

        fn kind(&self) -> OpKind {
            match self {
                Op::Add(_) => OpKind::Add,
                Op::Mul(_) => OpKind::Mul,
                Op::Noop => OpKind::Noop,
            }
        }
    }

    type Fx = Effect<i64, &'static str>;
    type Table = ReducerTable<i64, Op, &'static str>;

    fn entry<R>(
        selector: Selector<OpKind>,
        reducer: R,
    ) -> (Selector<OpKind>, BoxReducer<i64, Op, &'static str>)
    where
        R: Reducer<i64, Op, &'static str>,
    {
        (selector, Box::new(reducer))
    }

    fn add(state: &i64, op: &Op) -> Fx {
        match op {
            Op::Add(n) => Effect::only(state + n),
            _ => Effect::only(*state),
        }
    }

    fn mul(state: &i64, op: &Op) -> Fx {
        match op {
            Op::Mul(n) => Effect::with(state * n, "multiplied"),
            _ => Effect::only(*state),
        }
    }

    #[test]
    fn dispatches_by_kind() {
        let table = Table::new(vec![
            entry(Selector::Kind(OpKind::Add), add),
            entry(Selector::Kind(OpKind::Mul), mul),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.reduce(&2, &Op::Add(3)), Some(Effect::only(5)));
        assert_eq!(table.reduce(&2, &Op::Mul(3)), Some(Effect::with(6, "multiplied")));
    }

    #[test]
    fn unmatched_kind_is_a_noop() {
        let table = Table::new(vec![entry(Selector::Kind(OpKind::Add), add)]);
        assert_eq!(table.reduce(&2, &Op::Noop), None);
    }

    #[test]
    fn same_kind_reducers_chain_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first_seen = Arc::clone(&seen);
        let second_seen = Arc::clone(&seen);

        let table = Table::new(vec![
            entry(
                Selector::Kind(OpKind::Add),
                move |state: &i64, _: &Op| -> Fx {
                    first_seen.lock().push(("first", *state));
                    Effect::only(state + 1)
                },
            ),
            entry(
                Selector::Kind(OpKind::Add),
                move |state: &i64, _: &Op| -> Fx {
                    second_seen.lock().push(("second", *state));
                    Effect::only(state * 10)
                },
            ),
        ]);

        assert_eq!(table.reduce(&1, &Op::Add(0)), Some(Effect::only(20)));
        assert_eq!(*seen.lock(), vec![("first", 1), ("second", 2)]);
    }

    #[test]
    fn last_effect_action_is_authoritative() {
        let table = Table::new(vec![
            entry(Selector::Kind(OpKind::Add), |state: &i64, _: &Op| -> Fx {
                Effect::with(*state, "dropped")
            }),
            entry(Selector::Kind(OpKind::Add), |state: &i64, _: &Op| -> Fx {
                Effect::only(*state)
            }),
        ]);

        assert_eq!(table.reduce(&1, &Op::Add(0)), Some(Effect::only(1)));
    }

    #[test]
    fn catch_all_reducers_interleave_by_registration_order() {
        let table = Table::new(vec![
            entry(Selector::Any, |state: &i64, _: &Op| -> Fx {
                Effect::only(state + 1)
            }),
            entry(Selector::Kind(OpKind::Mul), mul),
            entry(Selector::Any, |state: &i64, _: &Op| -> Fx {
                Effect::only(state - 100)
            }),
        ]);

        // (1 + 1) * 5 - 100
        assert_eq!(table.reduce(&1, &Op::Mul(5)), Some(Effect::only(-90)));
        // unregistered kinds only see the catch-alls
        assert_eq!(table.reduce(&1, &Op::Noop), Some(Effect::only(-98)));
    }
}
