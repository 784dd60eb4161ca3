mod common;

use std::thread;
use std::time::Duration;

use common::*;
use futures::{FutureExt, StreamExt};

fn adder() -> CounterKnot {
    CounterKnot::builder()
        .initial_state(counter(0))
        .reduce(OpKind::Add, arithmetic)
        .reduce(OpKind::Set, arithmetic)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_initial_state_is_published_first() {
    let knot = adder();
    let mut states = knot.observe_state();

    assert_eq!(next(&mut states).await, Some(counter(0)));
    assert_quiet(&mut states).await;
}

/// A reduction producing an equal state is stored but not published.
#[tokio::test]
async fn test_equal_states_are_not_republished() {
    let knot = adder();
    let mut states = knot.observe_state();
    assert_eq!(next(&mut states).await, Some(counter(0)));

    knot.submit_change(Op::Add(0)).unwrap();
    knot.submit_change(Op::Set(0)).unwrap();
    knot.submit_change(Op::Add(1)).unwrap();

    assert_eq!(next(&mut states).await, Some(counter(1)));
    assert_quiet(&mut states).await;
}

/// Deduplication compares consecutive values only.
#[tokio::test]
async fn test_returning_to_an_earlier_state_is_published() {
    let knot = adder();
    let mut states = knot.observe_state();

    knot.submit_change(Op::Set(5)).unwrap();
    knot.submit_change(Op::Set(0)).unwrap();

    assert_eq!(next(&mut states).await, Some(counter(0)));
    assert_eq!(next(&mut states).await, Some(counter(5)));
    assert_eq!(next(&mut states).await, Some(counter(0)));
}

#[tokio::test]
async fn test_late_subscriber_starts_from_current_state() {
    let knot = adder();
    let mut early = knot.observe_state();

    knot.submit_change(Op::Add(1)).unwrap();
    knot.submit_change(Op::Add(2)).unwrap();
    collect_until(&mut early, |state| state.value == 3).await;

    let mut late = knot.observe_state();
    assert_eq!(next(&mut late).await, Some(counter(3)));

    knot.submit_change(Op::Add(1)).unwrap();
    assert_eq!(next(&mut late).await, Some(counter(4)));
    assert_eq!(next(&mut early).await, Some(counter(4)));
    assert_quiet(&mut late).await;
}

/// An observer attaching right after `build` gets the initial state without
/// waiting for any task to run.
#[tokio::test]
async fn test_initial_state_is_available_right_after_build() {
    let knot = adder();
    let first = knot.observe_state().next().now_or_never();
    assert_eq!(first, Some(Some(counter(0))));
}

/// A slow state watcher must not make a late observer start from an older
/// state than the committed one.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_late_subscriber_is_not_held_back_by_watchers() {
    let knot = CounterKnot::builder()
        .initial_state(counter(0))
        .reduce(OpKind::Add, arithmetic)
        .watch_state(|_| thread::sleep(Duration::from_millis(100)))
        .build()
        .unwrap();

    for _ in 0..3 {
        knot.submit_change(Op::Add(1)).unwrap();
    }
    eventually(|| knot.current_state() == counter(3)).await;

    let mut late = knot.observe_state();
    assert_eq!(next(&mut late).await, Some(counter(3)));
    assert_quiet(&mut late).await;
}

/// With a state interceptor in place, a late observer starts from the
/// intercepted current state, never from an earlier one.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_late_subscriber_starts_from_intercepted_current_state() {
    let knot = CounterKnot::builder()
        .initial_state(counter(0))
        .reduce(OpKind::Add, arithmetic)
        .intercept_state(|states| states.map(|state| counter(state.value * 10)))
        .watch_state(|_| thread::sleep(Duration::from_millis(100)))
        .build()
        .unwrap();

    for _ in 0..3 {
        knot.submit_change(Op::Add(1)).unwrap();
    }
    eventually(|| knot.current_state() == counter(3)).await;

    let mut late = knot.observe_state();
    assert_eq!(next(&mut late).await, Some(counter(30)));

    knot.submit_change(Op::Add(1)).unwrap();
    assert_eq!(next(&mut late).await, Some(counter(40)));
}

#[tokio::test]
async fn test_every_observer_sees_the_same_sequence() {
    let knot = adder();
    let mut observers: Vec<_> = (0..3).map(|_| knot.observe_state()).collect();
    assert_eq!(knot.observer_count(), 3);

    for n in 1..=3 {
        knot.submit_change(Op::Add(n)).unwrap();
    }

    for states in &mut observers {
        let seen = collect_until(states, |state| state.value == 6).await;
        assert_eq!(seen, vec![counter(0), counter(1), counter(3), counter(6)]);
    }
}

/// A change kind without a reducer leaves state and observers untouched.
#[tokio::test]
async fn test_unmatched_change_is_inert() {
    let knot = adder();
    let mut states = knot.observe_state();
    assert_eq!(next(&mut states).await, Some(counter(0)));

    knot.submit_change(Op::Mul(10)).unwrap();
    knot.submit_change(Op::Noop).unwrap();
    assert_quiet(&mut states).await;
    assert_eq!(knot.current_state(), counter(0));

    knot.submit_change(Op::Add(2)).unwrap();
    assert_eq!(next(&mut states).await, Some(counter(2)));
}

#[tokio::test]
async fn test_state_reader_follows_commits() {
    let knot = adder();
    let reader = knot.state_reader();
    let mut states = knot.observe_state();

    knot.submit_change(Op::Set(42)).unwrap();
    collect_until(&mut states, |state| state.value == 42).await;

    assert_eq!(reader.get(), counter(42));
    assert_eq!(*reader.snapshot(), counter(42));
}

#[tokio::test]
async fn test_dropped_observers_are_released() {
    let knot = adder();
    let kept = knot.observe_state();
    drop(knot.observe_state());

    let mut states = knot.observe_state();
    knot.submit_change(Op::Add(1)).unwrap();
    collect_until(&mut states, |state| state.value == 1).await;

    assert_eq!(knot.observer_count(), 2);
    drop(kept);
}
