//! Error types for scheduler and task operations.

use thiserror::Error;

/// Errors produced by scheduler lifecycle and admission operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A task was submitted while the executor is stopped.
    #[error("executor is stopped")]
    Stopped,
    /// Lifecycle state and live worker threads disagree.
    #[error("lifecycle violation: {0}")]
    LifecycleViolation(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A session-scoped operation was called without an active session.
    #[error("no active build session")]
    NoActiveSession,
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Failure delivered through a task's future.
///
/// Failures are scoped to the single task they belong to and never affect
/// the worker that ran it.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The task returned an error from `perform`.
    #[error("task failed: {0:#}")]
    Task(anyhow::Error),
    /// The task panicked inside `perform`.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task returned no result without having been cancelled.
    #[error("no result was produced by the task")]
    MissingResult,
    /// The task was cancelled before it produced a result.
    #[error("task was cancelled")]
    Cancelled,
}

impl BuildError {
    /// Whether this failure represents a cancellation rather than an error.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
