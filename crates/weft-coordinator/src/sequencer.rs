//! Serializing action queue
//!
//! A [`Sequencer`] owns a piece of state and runs actions against it one
//! at a time, in the order they were enqueued. Action N+1 starts only
//! after action N has settled, whether it succeeded, failed, or panicked.
//!
//! ```text
//! enqueue(a1) ─┐
//! enqueue(a2) ─┼─► mpsc ─► worker: a1(&mut S) ─► a2(&mut S) ─► a3(&mut S)
//! enqueue(a3) ─┘                     │             │             │
//!                                    ▼             ▼             ▼
//!                                 Pending       Pending       Pending
//! ```
//!
//! Enqueueing is synchronous, so arrival order is the order in which the
//! `enqueue` calls return, not the order in which their results are
//! awaited.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, Span, debug, error};
use weft_core::SequencerError;

/// A queued unit of work, already bound to its reply channel
type Job<S> = Box<dyn for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, ()> + Send>;

fn job<S, F>(f: F) -> Job<S>
where
    F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(f)
}

/// Single-writer action queue over `S`
pub struct Sequencer<S> {
    queue: mpsc::UnboundedSender<Job<S>>,
}

impl<S> Clone for Sequencer<S> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<S: Send + 'static> Sequencer<S> {
    /// Move `state` into a new worker task running inside `span`
    ///
    /// Must be called from within a tokio runtime. The worker exits once
    /// every `Sequencer` handle has been dropped and the queue is drained.
    pub fn spawn(state: S, span: Span) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::run(state, rx).instrument(span));
        Self { queue }
    }

    async fn run(mut state: S, mut rx: mpsc::UnboundedReceiver<Job<S>>) {
        debug!("Sequencer worker started");
        let mut settled: u64 = 0;
        while let Some(job) = rx.recv().await {
            job(&mut state).await;
            settled += 1;
        }
        debug!(settled, "Sequencer worker stopped");
    }

    /// Append `action` to the queue
    ///
    /// The returned [`Pending`] resolves with the action's output once it
    /// has run. Dropping it does not cancel the action.
    pub fn enqueue<T, F>(&self, action: F) -> Pending<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, T> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let queued = job(move |state: &mut S| {
            async move {
                let outcome = AssertUnwindSafe(action(state))
                    .catch_unwind()
                    .await
                    .map_err(|_| {
                        error!("Sequenced action panicked");
                        SequencerError::ActionPanicked
                    });
                // The caller may have stopped waiting; the action still ran.
                let _ = reply.send(outcome);
            }
            .boxed()
        });

        if self.queue.send(queued).is_err() {
            // The job (and its reply sender) was dropped, so `rx` reports Closed.
            debug!("Enqueue on a stopped sequencer");
        }
        Pending { rx }
    }
}

/// Result of an enqueued action that may not have run yet
#[must_use = "a Pending does nothing unless awaited"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, SequencerError>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, SequencerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(SequencerError::Closed)))
    }
}
