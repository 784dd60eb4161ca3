//! The change bus: many producers, one consumer.
//!
//! Every change, whether submitted directly or produced by a transformer,
//! goes through a single unbounded channel. The engine is the only reader,
//! so reductions happen one at a time in channel order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::error::Disposed;

/// Cloneable handle for submitting changes from any thread.
///
/// Submission never waits for a reduction. Once the knot is disposed every
/// submission is dropped and reported as [`Disposed`].
pub struct ChangeSender<C> {
    tx: mpsc::UnboundedSender<C>,
    open: Arc<AtomicBool>,
}

impl<C> Clone for ChangeSender<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            open: Arc::clone(&self.open),
        }
    }
}

impl<C> ChangeSender<C> {
    pub fn submit(&self, change: C) -> Result<(), Disposed> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Disposed);
        }
        self.tx.send(change).map_err(|_| Disposed)
    }

    pub fn is_closed(&self) -> bool {
        !self.open.load(Ordering::SeqCst) || self.tx.is_closed()
    }

    /// Rejects all further submissions, from every clone.
    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Creates the bus. The stream is handed to the engine.
pub(crate) fn channel<C>() -> (ChangeSender<C>, UnboundedReceiverStream<C>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = ChangeSender {
        tx,
        open: Arc::new(AtomicBool::new(true)),
    };
    (sender, UnboundedReceiverStream::new(rx))
}
