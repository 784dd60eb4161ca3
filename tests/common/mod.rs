//! Shared fixtures for knot integration tests.

#![allow(dead_code)]

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use knotline::{Action, Change, Effect, Knot, State, Tagged};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    pub value: i64,
}

impl State for Counter {}

pub fn counter(value: i64) -> Counter {
    Counter { value }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Add(i64),
    Mul(i64),
    Set(i64),
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    Mul,
    Set,
    Noop,
}

impl Tagged for Op {
    type Kind = OpKind;

    fn kind(&self) -> OpKind {
        match self {
            Op::Add(_) => OpKind::Add,
            Op::Mul(_) => OpKind::Mul,
            Op::Set(_) => OpKind::Set,
            Op::Noop => OpKind::Noop,
        }
    }
}

impl Change for Op {}

#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    /// Asks the feedback loop for this many `Add(1)` changes.
    Emit(u32),
    Echo(i64),
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmdKind {
    Emit,
    Echo,
    Ignore,
}

impl Tagged for Cmd {
    type Kind = CmdKind;

    fn kind(&self) -> CmdKind {
        match self {
            Cmd::Emit(_) => CmdKind::Emit,
            Cmd::Echo(_) => CmdKind::Echo,
            Cmd::Ignore => CmdKind::Ignore,
        }
    }
}

impl Action for Cmd {}

pub type CounterKnot = Knot<Counter, Op, Cmd>;
pub type Fx = Effect<Counter, Cmd>;

/// Plain arithmetic without actions. Register it for the kinds a test needs.
pub fn arithmetic(state: &Counter, op: &Op) -> Fx {
    let value = match op {
        Op::Add(n) => state.value + n,
        Op::Mul(n) => state.value * n,
        Op::Set(n) => *n,
        Op::Noop => state.value,
    };
    Effect::only(counter(value))
}

/// Next item, failing the test after [`WAIT`].
pub async fn next<S>(stream: &mut S) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    tokio::time::timeout(WAIT, stream.next())
        .await
        .expect("Timed out waiting for the next item")
}

/// Reads items until one satisfies `done`; returns all items read.
pub async fn collect_until<S, F>(stream: &mut S, mut done: F) -> Vec<S::Item>
where
    S: Stream + Unpin,
    F: FnMut(&S::Item) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let item = next(stream).await.expect("Stream ended early");
        let finished = done(&item);
        seen.push(item);
        if finished {
            return seen;
        }
    }
}

/// Asserts the stream yields nothing for a short while.
pub async fn assert_quiet<S>(stream: &mut S)
where
    S: Stream + Unpin,
    S::Item: Debug,
{
    if let Ok(item) = tokio::time::timeout(Duration::from_millis(150), stream.next()).await {
        panic!("Unexpected item: {item:?}");
    }
}

/// Polls `condition` until it holds, failing the test after [`WAIT`].
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Sets its flag when dropped. Moved into a stream to detect cancellation.
pub struct DropFlag(pub Arc<AtomicBool>);

impl DropFlag {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (Self(Arc::clone(&flag)), flag)
    }
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
