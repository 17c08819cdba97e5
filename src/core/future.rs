//! Write-once completion slots and the futures that observe them.
//!
//! Every admitted task owns one [`CompletionSlot`]. The slot is settled exactly
//! once: with a success value, a failure, or a cancellation. Whoever settles
//! first wins; later attempts are ignored and report `false`.
//!
//! The caller side sees the slot through a [`BuildFuture`], which can be waited
//! on from a blocking thread (`Condvar`, no polling) or awaited from async code.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::cancel::CancellationToken;
use super::error::BuildError;

/// Outcome delivered by a settled build future.
pub type BuildOutcome<R> = Result<Arc<R>, Arc<BuildError>>;

/// Observable state of a task's completion slot.
#[derive(Debug)]
pub enum TaskState<R> {
    /// Not settled yet.
    Pending,
    /// The task produced a result.
    Success(Arc<R>),
    /// The task failed.
    Failure(Arc<BuildError>),
    /// The task was cancelled before producing a result.
    Cancelled,
}

impl<R> Clone for TaskState<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Pending => Self::Pending,
            Self::Success(value) => Self::Success(Arc::clone(value)),
            Self::Failure(err) => Self::Failure(Arc::clone(err)),
            Self::Cancelled => Self::Cancelled,
        }
    }
}

impl<R> TaskState<R> {
    /// Whether the slot is still unsettled.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether the slot was settled by cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short lowercase name of the state, for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
            Self::Cancelled => "cancelled",
        }
    }

    /// The outcome of a settled slot, `None` while pending.
    #[must_use]
    pub fn outcome(&self) -> Option<BuildOutcome<R>> {
        match self {
            Self::Pending => None,
            Self::Success(value) => Some(Ok(Arc::clone(value))),
            Self::Failure(err) => Some(Err(Arc::clone(err))),
            Self::Cancelled => Some(Err(Arc::new(BuildError::Cancelled))),
        }
    }
}

struct SlotInner<R> {
    state: TaskState<R>,
    waker: Option<Waker>,
}

/// Write-once slot paired with a Condvar for blocking waiters and a waker
/// for async ones.
pub(crate) struct CompletionSlot<R> {
    inner: Mutex<SlotInner<R>>,
    settled: Condvar,
    token: CancellationToken,
}

impl<R> CompletionSlot<R> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: TaskState::Pending,
                waker: None,
            }),
            settled: Condvar::new(),
            token: CancellationToken::new(),
        }
    }

    pub(crate) const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Settle the slot if still pending. Cancelling also flips the token while
    /// the slot lock is held, so a worker never sees a cancelled slot with a
    /// live token.
    fn settle(&self, state: TaskState<R>) -> bool {
        let waker = {
            let mut inner = self.inner.lock();
            if !inner.state.is_pending() {
                return false;
            }
            if state.is_cancelled() {
                self.token.cancel();
            }
            inner.state = state;
            inner.waker.take()
        };
        self.settled.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    pub(crate) fn succeed(&self, value: Arc<R>) -> bool {
        self.settle(TaskState::Success(value))
    }

    pub(crate) fn fail(&self, err: BuildError) -> bool {
        self.settle(TaskState::Failure(Arc::new(err)))
    }

    pub(crate) fn cancel(&self) -> bool {
        self.settle(TaskState::Cancelled)
    }

    pub(crate) fn state(&self) -> TaskState<R> {
        self.inner.lock().state.clone()
    }

    /// Block until settled or until `deadline` passes. Spurious wakeups are
    /// absorbed by re-checking the state.
    fn wait_until(&self, deadline: Option<Instant>) -> Option<BuildOutcome<R>> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(outcome) = inner.state.outcome() {
                return Some(outcome);
            }
            match deadline {
                None => self.settled.wait(&mut inner),
                Some(deadline) => {
                    if self.settled.wait_until(&mut inner, deadline).timed_out() {
                        return inner.state.outcome();
                    }
                }
            }
        }
    }

    fn poll_outcome(&self, cx: &Context<'_>) -> Poll<BuildOutcome<R>> {
        let mut inner = self.inner.lock();
        if let Some(outcome) = inner.state.outcome() {
            return Poll::Ready(outcome);
        }
        let stale = inner
            .waker
            .as_ref()
            .is_none_or(|waker| !waker.will_wake(cx.waker()));
        if stale {
            inner.waker = Some(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Handle to the eventual outcome of one admitted build task.
///
/// Dropping the future does not cancel the task; call [`BuildFuture::cancel`]
/// for that.
pub struct BuildFuture<R> {
    slot: Arc<CompletionSlot<R>>,
}

impl<R> BuildFuture<R> {
    pub(crate) const fn new(slot: Arc<CompletionSlot<R>>) -> Self {
        Self { slot }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> TaskState<R> {
        self.slot.state()
    }

    /// Whether the task has settled (any outcome).
    #[must_use]
    pub fn is_done(&self) -> bool {
        !self.slot.state().is_pending()
    }

    /// Whether the task was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.slot.state().is_cancelled()
    }

    /// Cancel the task.
    ///
    /// A task that has not started is skipped by the worker. A running task is
    /// not interrupted; it can observe the cancellation through its token, and
    /// whatever it returns is discarded. Returns `false` if the task had
    /// already settled.
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    /// A cloneable handle that can only cancel and observe this task.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle<R> {
        CancelHandle {
            slot: Arc::clone(&self.slot),
        }
    }

    /// The outcome if already settled, without blocking.
    #[must_use]
    pub fn try_get(&self) -> Option<BuildOutcome<R>> {
        self.slot.state().outcome()
    }

    /// Block the current thread until the task settles.
    ///
    /// # Errors
    ///
    /// Returns the task's [`BuildError`] if it failed or was cancelled.
    pub fn wait(&self) -> BuildOutcome<R> {
        match self.slot.wait_until(None) {
            Some(outcome) => outcome,
            None => Err(Arc::new(BuildError::Cancelled)),
        }
    }

    /// Block until the task settles or `timeout` elapses. Returns `None` on
    /// timeout.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BuildOutcome<R>> {
        let deadline = Instant::now().checked_add(timeout);
        self.slot.wait_until(deadline)
    }
}

impl<R> Future for BuildFuture<R> {
    type Output = BuildOutcome<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.slot.poll_outcome(cx)
    }
}

impl<R> fmt::Debug for BuildFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildFuture")
            .field("state", &self.slot.state().label())
            .finish()
    }
}

/// Cancel-only view of a task, cheap to clone and store.
pub struct CancelHandle<R> {
    slot: Arc<CompletionSlot<R>>,
}

impl<R> Clone for CancelHandle<R> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<R> CancelHandle<R> {
    /// Cancel the task. See [`BuildFuture::cancel`].
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    /// Whether the task has settled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        !self.slot.state().is_pending()
    }
}

impl<R> fmt::Debug for CancelHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("state", &self.slot.state().label())
            .finish()
    }
}
