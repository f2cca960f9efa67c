//! Continuation engine.
//!
//! An [`Execution`] walks one compiled chain for one [`InvocationContext`]. A step ends
//! as soon as the current handler signals through its [`Next`](crate::Next):
//!
//! ```text
//! Running(i) --continue--> Running(i + 1)
//! Running(n) ------------> Completed
//! Running(i) --dropped---> Halted(i)
//! Running(i) --error-----> ErrorDispatched(i)   (error handler runs once)
//! ```
//!
//! A handler that continued and is still running keeps being polled next to the handlers
//! after it. If it later fails while the chain is still running, the chain moves to
//! `ErrorDispatched` at its position. [`Execution::run`] waits for every such handler to
//! settle before it returns.
//!
//! `Completed`, `Halted` and `ErrorDispatched` are terminal.

use std::{
    fmt,
    panic::AssertUnwindSafe,
    rc::Rc,
    task::{Context, Poll},
};

use futures::{
    future::{poll_fn, LocalBoxFuture},
    stream::FuturesUnordered,
    FutureExt, StreamExt,
};

use crate::{
    handler::{signal_channel, BoxHandler, ErrorHandler, Signal, SignalReceiver},
    AnyError, HandlerPanic, InvocationContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// The handler at this position is next to run.
    Running(usize),
    /// Every handler continued.
    Completed,
    /// The handler at this position ended the chain without continuing.
    Halted(usize),
    /// The handler at this position failed; the error handler, if any, has been called.
    ErrorDispatched(usize),
}

impl ChainState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChainState::Running(_))
    }
}

enum StepOutcome {
    Continue,
    Halt,
    Fail(usize, AnyError),
}

/// A started handler future, resolving to its position and its error if it failed.
type InFlight = LocalBoxFuture<'static, (usize, Option<AnyError>)>;

pub struct Execution<Req, Res> {
    chain: Rc<[BoxHandler<Req, Res>]>,
    cx: InvocationContext<Req, Res>,
    on_error: Option<ErrorHandler<Req, Res>>,
    state: ChainState,
    upstream: FuturesUnordered<InFlight>,
}

impl<Req, Res> Execution<Req, Res> {
    pub(crate) fn new(
        chain: Rc<[BoxHandler<Req, Res>]>,
        cx: InvocationContext<Req, Res>,
        on_error: Option<ErrorHandler<Req, Res>>,
    ) -> Self {
        Self {
            chain,
            cx,
            on_error,
            state: ChainState::Running(0),
            upstream: FuturesUnordered::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> ChainState {
        self.state
    }

    #[inline]
    pub fn context(&self) -> &InvocationContext<Req, Res> {
        &self.cx
    }

    fn dispatch_error(&self, err: AnyError, position: usize) {
        match &self.on_error {
            Some(on_error) => {
                tracing::debug!(method = %self.cx.method(), position, error = %err, "dispatching handler error");
                on_error(err, &self.cx);
            }
            None => {
                // nobody is told about this failure except the log
                tracing::warn!(
                    method = %self.cx.method(),
                    position,
                    error = %err,
                    "handler failed and no error handler is configured, chain stopped"
                );
            }
        }
    }
}

impl<Req: 'static, Res: 'static> Execution<Req, Res> {
    /// Run the chain until the current handler signals, and return the new state.
    ///
    /// Handlers that continued but have not settled are polled meanwhile. Dropping the
    /// execution drops them too.
    pub async fn step(&mut self) -> ChainState {
        let position = match self.state {
            ChainState::Running(position) => position,
            terminal => return terminal,
        };
        let Some(handler) = self.chain.get(position).cloned() else {
            tracing::debug!(method = %self.cx.method(), len = position, "chain completed");
            self.state = ChainState::Completed;
            return self.state;
        };

        let (fut, mut signal) = start(handler, self.cx.clone(), position);
        let mut current = Some(fut);
        let upstream = &mut self.upstream;
        let outcome =
            poll_fn(|task| poll_step(task, upstream, &mut current, &mut signal, position)).await;
        if let Some(fut) = current {
            self.upstream.push(fut);
        }

        self.state = match outcome {
            StepOutcome::Continue => ChainState::Running(position + 1),
            StepOutcome::Halt => {
                tracing::debug!(method = %self.cx.method(), position, "chain halted by handler");
                ChainState::Halted(position)
            }
            StepOutcome::Fail(at, err) => {
                self.dispatch_error(err, at);
                ChainState::ErrorDispatched(at)
            }
        };
        self.state
    }

    /// Drive the chain until it reaches a terminal state and every started handler
    /// has settled.
    pub async fn run(mut self) -> (ChainState, InvocationContext<Req, Res>) {
        while !self.step().await.is_terminal() {}
        while let Some((position, settled)) = self.upstream.next().await {
            if let Some(err) = settled {
                tracing::warn!(
                    method = %self.cx.method(),
                    position,
                    state = ?self.state,
                    error = %err,
                    "handler failed after the chain ended, error dropped"
                );
            }
        }
        (self.state, self.cx)
    }
}

impl<Req, Res> fmt::Debug for Execution<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("method", &self.cx.method())
            .field("len", &self.chain.len())
            .field("state", &self.state)
            .field("upstream", &self.upstream.len())
            .finish()
    }
}

fn start<Req: 'static, Res: 'static>(
    handler: BoxHandler<Req, Res>,
    cx: InvocationContext<Req, Res>,
    position: usize,
) -> (InFlight, SignalReceiver) {
    let (next, signal) = signal_channel(position);
    let fut = async move {
        let called = std::panic::catch_unwind(AssertUnwindSafe(|| handler.call(cx, next)));
        let settled = match called {
            Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
            Err(payload) => Err(payload),
        };
        let err: Option<AnyError> = match settled {
            Err(payload) => Some(HandlerPanic::from_payload(payload).into()),
            Ok(Err(err)) => Some(err),
            Ok(Ok(())) => None,
        };
        (position, err)
    };
    (Box::pin(fut), signal)
}

fn poll_step(
    task: &mut Context<'_>,
    upstream: &mut FuturesUnordered<InFlight>,
    current: &mut Option<InFlight>,
    signal: &mut SignalReceiver,
    position: usize,
) -> Poll<StepOutcome> {
    while let Poll::Ready(Some((at, settled))) = upstream.poll_next_unpin(task) {
        if let Some(err) = settled {
            return Poll::Ready(StepOutcome::Fail(at, err));
        }
    }
    // a result returned in the same poll as the signal takes precedence
    if let Some(fut) = current {
        if let Poll::Ready((_, settled)) = fut.poll_unpin(task) {
            *current = None;
            if let Some(err) = settled {
                return Poll::Ready(StepOutcome::Fail(position, err));
            }
        }
    }
    match signal.poll_unpin(task) {
        Poll::Ready(Ok(Signal::Continue)) => Poll::Ready(StepOutcome::Continue),
        Poll::Ready(Ok(Signal::Abort(err))) => Poll::Ready(StepOutcome::Fail(position, err)),
        // a dropped continuation halts only once its handler settled without error
        Poll::Ready(Err(_canceled)) if current.is_none() => Poll::Ready(StepOutcome::Halt),
        Poll::Ready(Err(_)) | Poll::Pending => Poll::Pending,
    }
}
