use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::mvi::Action;

use super::error::Fault;
use super::router::Router;

/// Delivers intercepted actions to the action transformers.
///
/// Actions arrive in the order the engine emitted them. An action no
/// transformer subscribed to is dropped.
pub(crate) struct ActionDispatcher<A: Action> {
    router: Router<A>,
}

impl<A: Action> ActionDispatcher<A> {
    pub(crate) fn new(router: Router<A>) -> Self {
        Self { router }
    }

    pub(crate) async fn run(
        mut self,
        mut actions: BoxStream<'static, A>,
        token: CancellationToken,
    ) -> Result<(), Fault> {
        if self.router.is_empty() {
            tracing::debug!("No action transformers, actions will be dropped");
        }
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => break,
                next = actions.next() => next,
            };
            let Some(action) = next else {
                break;
            };
            if self.router.route(&action) == 0 {
                tracing::trace!(kind = ?action.kind(), "Unhandled action dropped");
            }
        }
        Ok(())
    }
}
