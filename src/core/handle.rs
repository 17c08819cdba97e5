//! Admitted unit of work: a task, its cancellation token and its completion slot.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use super::error::BuildError;
use super::future::{BuildFuture, CompletionSlot};
use super::task::BuildTask;
use super::CancellationToken;

/// What happened when a worker ran a handle.
#[derive(Debug)]
pub(crate) enum RunOutcome<R> {
    /// The token was set before execution began; `perform` was not called.
    Skipped,
    /// The task produced a result and won the race to settle its future.
    Completed(Arc<R>),
    /// The task failed and its future now carries the failure.
    Failed,
    /// The task ran but its future had already been cancelled; output dropped.
    Abandoned,
}

/// One admitted task coupled with the slot its future observes.
pub(crate) struct TaskHandle<S, R> {
    task: Box<dyn BuildTask<S, R>>,
    slot: Arc<CompletionSlot<R>>,
}

impl<S, R> TaskHandle<S, R> {
    /// Wrap a task, returning the handle for the queue and the caller's future.
    pub(crate) fn new(task: Box<dyn BuildTask<S, R>>) -> (Self, BuildFuture<R>) {
        let slot = Arc::new(CompletionSlot::new());
        let future = BuildFuture::new(Arc::clone(&slot));
        (Self { task, slot }, future)
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        self.slot.token()
    }

    /// Settle the future as cancelled. Returns `false` if it had already settled.
    pub(crate) fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    /// Execute the task with the worker's scratch and settle the future.
    ///
    /// The cancellation check only guards the start of `perform`; a task
    /// cancelled while running still runs to completion and its output is
    /// dropped. Panics inside the task are caught and reported as failures so
    /// the calling worker keeps serving the queue.
    pub(crate) fn run(mut self, scratch: &mut S) -> RunOutcome<R> {
        if self.token().is_cancelled() {
            return RunOutcome::Skipped;
        }

        let token = self.slot.token().clone();
        let task = &mut self.task;
        let performed = panic::catch_unwind(AssertUnwindSafe(|| task.perform(scratch, &token)));

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.release_resources())) {
            warn!(
                panic = %panic_message(payload.as_ref()),
                "Task panicked while releasing resources"
            );
        }

        let settled = match performed {
            Ok(Ok(Some(value))) => {
                let value = Arc::new(value);
                if self.slot.succeed(Arc::clone(&value)) {
                    return RunOutcome::Completed(value);
                }
                false
            }
            // Producing nothing is legitimate only for a cancelled task.
            Ok(Ok(None)) if token.is_cancelled() => {
                self.slot.cancel();
                false
            }
            Ok(Ok(None)) => self.slot.fail(BuildError::MissingResult),
            Ok(Err(err)) => self.slot.fail(BuildError::Task(err)),
            Err(payload) => self
                .slot
                .fail(BuildError::Panicked(panic_message(payload.as_ref()))),
        };

        if settled {
            RunOutcome::Failed
        } else {
            RunOutcome::Abandoned
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
