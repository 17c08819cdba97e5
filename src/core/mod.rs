//! Core scheduling: tasks, futures, the worker pool and the builder facade.

pub mod cancel;
pub mod error;
pub mod future;
mod handle;
pub mod scaler;
pub mod scheduler;
pub mod task;
pub mod worker_pool;

pub use cancel::CancellationToken;
pub use error::{AppResult, BuildError, SchedulerError};
pub use future::{BuildFuture, BuildOutcome, CancelHandle, TaskState};
pub use scaler::{admission_budget, PoolScaler, ScaleDecision, ScalingPolicy};
pub use scheduler::ChunkBuilder;
pub use task::{task_fn, BoxedTask, BuildTask, FnTask, ScratchFactory};
pub use worker_pool::SchedulerStats;
