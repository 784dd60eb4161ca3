//! Interceptor and watcher chains around the state, change and action
//! streams.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;

use super::error::{panic_message, Fault, FaultReporter};

/// Stream middleware, `Stream<T> -> Stream<T>`, applied once when the knot
/// is built.
pub type Interceptor<T> =
    Box<dyn FnOnce(BoxStream<'static, T>) -> BoxStream<'static, T> + Send + 'static>;

pub(crate) type WatchFn<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// A value seen by a [`watch_all`](super::KnotBuilder::watch_all) callback.
#[derive(Debug)]
pub enum Observed<'a, S, C, A> {
    State(&'a S),
    Change(&'a C),
    Action(&'a A),
}

enum Stage<T> {
    Intercept(Interceptor<T>),
    Watch(WatchFn<T>),
}

/// Ordered interceptors for one stream.
pub(crate) struct Chain<T> {
    stream: &'static str,
    stages: Vec<Stage<T>>,
}

impl<T: Send + 'static> Chain<T> {
    pub(crate) fn new(stream: &'static str) -> Self {
        Self {
            stream,
            stages: Vec::new(),
        }
    }

    pub(crate) fn intercept(&mut self, interceptor: Interceptor<T>) {
        self.stages.push(Stage::Intercept(interceptor));
    }

    pub(crate) fn watch(&mut self, watcher: WatchFn<T>) {
        self.stages.push(Stage::Watch(watcher));
    }

    /// Appends the stages of `other` after the existing ones.
    pub(crate) fn append(&mut self, other: Chain<T>) {
        self.stages.extend(other.stages);
    }

    pub(crate) fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether any stage may change the values passing through.
    pub(crate) fn intercepts(&self) -> bool {
        self.stages
            .iter()
            .any(|stage| matches!(stage, Stage::Intercept(_)))
    }

    /// Wraps `source` with every stage, first registered innermost.
    pub(crate) fn apply(
        self,
        source: BoxStream<'static, T>,
        faults: &FaultReporter,
    ) -> BoxStream<'static, T> {
        let Chain { stream: label, stages } = self;
        stages
            .into_iter()
            .fold(source, |stream, stage| match stage {
                Stage::Intercept(interceptor) => interceptor(stream),
                Stage::Watch(watcher) => watching(stream, label, watcher, faults.clone()),
            })
    }
}

/// Forwards every value unchanged after handing it to `watcher`.
fn watching<T: Send + 'static>(
    stream: BoxStream<'static, T>,
    label: &'static str,
    watcher: WatchFn<T>,
    faults: FaultReporter,
) -> BoxStream<'static, T> {
    stream
        .inspect(move |value| {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| watcher(value))) {
                faults.report(Fault::WatcherPanicked {
                    stream: label,
                    message: panic_message(payload.as_ref()),
                });
            }
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> WatchFn<u32> {
        let log = Arc::clone(log);
        Arc::new(move |value: &u32| log.lock().push(format!("{tag}:{value}")))
    }

    #[tokio::test]
    async fn stages_apply_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = Chain::new("change");
        chain.watch(recorder(&log, "before"));
        chain.intercept(Box::new(|s: BoxStream<'static, u32>| s.map(|v| v * 10).boxed()));
        chain.watch(recorder(&log, "after"));
        assert_eq!(chain.len(), 3);

        let faults = FaultReporter::new(4);
        let output: Vec<u32> = chain
            .apply(stream::iter(vec![1, 2]).boxed(), &faults)
            .collect()
            .await;

        assert_eq!(output, vec![10, 20]);
        assert_eq!(
            *log.lock(),
            vec!["before:1", "after:10", "before:2", "after:20"]
        );
    }

    #[tokio::test]
    async fn appended_chain_runs_after_existing_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = Chain::new("state");
        chain.watch(recorder(&log, "own"));
        assert!(!chain.intercepts());

        let mut other = Chain::new("state");
        other.intercept(Box::new(|s: BoxStream<'static, u32>| s.map(|v| v + 1).boxed()));
        other.watch(recorder(&log, "appended"));
        chain.append(other);
        assert!(chain.intercepts());

        let faults = FaultReporter::new(4);
        let output: Vec<u32> = chain
            .apply(stream::iter(vec![1]).boxed(), &faults)
            .collect()
            .await;

        assert_eq!(output, vec![2]);
        assert_eq!(*log.lock(), vec!["own:1", "appended:2"]);
    }

    #[tokio::test]
    async fn interceptors_may_filter() {
        let mut chain = Chain::new("change");
        chain.intercept(Box::new(|s: BoxStream<'static, u32>| {
            s.filter(|v| futures::future::ready(v % 2 == 0)).boxed()
        }));

        let faults = FaultReporter::new(4);
        let output: Vec<u32> = chain
            .apply(stream::iter(1..=6).boxed(), &faults)
            .collect()
            .await;

        assert_eq!(output, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn panicking_watcher_still_forwards_values() {
        let mut chain = Chain::new("state");
        chain.watch(Arc::new(|value: &u32| {
            if *value == 2 {
                panic!("watcher failed on {value}");
            }
        }));

        let faults = FaultReporter::new(4);
        let mut reported = faults.subscribe();
        let output: Vec<u32> = chain
            .apply(stream::iter(1..=3).boxed(), &faults)
            .collect()
            .await;

        assert_eq!(output, vec![1, 2, 3]);
        assert_eq!(
            reported.try_recv().unwrap(),
            Fault::WatcherPanicked {
                stream: "state",
                message: "watcher failed on 2".to_string(),
            }
        );
    }
}
