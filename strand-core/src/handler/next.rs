use std::fmt;

use futures_channel::oneshot;

use crate::{AnyError, AnyResult};

pub(crate) enum Signal {
    Continue,
    Abort(AnyError),
}

pub(crate) type SignalReceiver = oneshot::Receiver<Signal>;

pub(crate) fn signal_channel(position: usize) -> (Next, SignalReceiver) {
    let (tx, rx) = oneshot::channel();
    (Next { tx, position }, rx)
}

/// Continuation handed to the handler at `position`.
///
/// Consumed by the first call. Dropping it unused ends the chain once the handler's
/// future settles.
#[must_use = "dropping `Next` without calling it ends the chain"]
pub struct Next {
    tx: oneshot::Sender<Signal>,
    position: usize,
}

impl Next {
    /// Position of the handler holding this continuation.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Run the next handler.
    pub fn proceed(self) {
        self.send(Signal::Continue);
    }

    /// Skip the rest of the chain and hand `err` to the error handler.
    pub fn fail(self, err: impl Into<AnyError>) {
        self.send(Signal::Abort(err.into()));
    }

    /// Continue on `Ok`, fail with the error otherwise.
    pub fn resume(self, result: AnyResult<()>) {
        match result {
            Ok(()) => self.proceed(),
            Err(e) => self.fail(e),
        }
    }

    fn send(self, signal: Signal) {
        if self.tx.send(signal).is_err() {
            // the execution that owns this position is gone
            tracing::trace!(position = self.position, "continuation signalled after chain teardown");
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .finish()
    }
}
