use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Disposal progress of a knot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Running = 0,
    CancellingProducers = 1,
    ClosingBus = 2,
    ReleasingState = 3,
    Disposed = 4,
}

/// Tracks disposal and owns the cancellation tokens of background tasks.
///
/// Producers (event, action and change transformers) and the core tasks
/// (engine, action dispatch, publication) are cancelled separately so that
/// producers are always stopped first.
pub(crate) struct Lifecycle {
    disposing: AtomicBool,
    phase: AtomicU8,
    producers: CancellationToken,
    core: CancellationToken,
    finished: Notify,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            disposing: AtomicBool::new(false),
            phase: AtomicU8::new(Phase::Running as u8),
            producers: CancellationToken::new(),
            core: CancellationToken::new(),
            finished: Notify::new(),
        }
    }

    /// Claims disposal. Returns false if another caller already did.
    pub(crate) fn begin(&self) -> bool {
        !self.disposing.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_disposing(&self) -> bool {
        self.disposing.load(Ordering::SeqCst)
    }

    pub(crate) fn phase(&self) -> Phase {
        match self.phase.load(Ordering::SeqCst) {
            0 => Phase::Running,
            1 => Phase::CancellingProducers,
            2 => Phase::ClosingBus,
            3 => Phase::ReleasingState,
            _ => Phase::Disposed,
        }
    }

    pub(crate) fn advance(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        tracing::debug!(?phase, "Disposal phase");
    }

    /// Marks disposal complete and wakes every [`wait_finished`](Self::wait_finished).
    pub(crate) fn finish(&self) {
        self.advance(Phase::Disposed);
        self.finished.notify_waiters();
    }

    pub(crate) async fn wait_finished(&self) {
        // Register before checking the phase, or a concurrent finish() could
        // notify nobody.
        let notified = self.finished.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.phase() == Phase::Disposed {
            return;
        }
        notified.await;
    }

    pub(crate) fn cancel_producers(&self) {
        self.producers.cancel();
    }

    pub(crate) fn cancel_core(&self) {
        self.core.cancel();
    }

    pub(crate) fn producer_token(&self) -> CancellationToken {
        self.producers.clone()
    }

    pub(crate) fn core_token(&self) -> CancellationToken {
        self.core.clone()
    }
}
