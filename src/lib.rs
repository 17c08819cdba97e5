//! # Chunk Build Scheduler
//!
//! An adaptive background scheduler for building chunk geometry off the main
//! loop.
//!
//! A render loop produces far more rebuild requests than it can mesh in a
//! frame. This crate runs those rebuilds on a pool of dedicated worker threads
//! that starts small and grows while there is work, and hands finished results
//! back to the render thread at its next synchronization point.
//!
//! ## Key Features
//!
//! - **Adaptive Pool**: Starts with a few workers, ramps quickly up to a
//!   target, then slowly up to a hard limit
//! - **Admission Budget**: Tells the producer how many tasks to submit each
//!   frame so the queue never builds a backlog
//! - **Per-Worker Scratch**: Each worker owns reusable build buffers created on
//!   its own thread
//! - **Cooperative Cancellation**: Cancelled tasks are skipped before they
//!   start, and running tasks can observe the flag
//! - **Blocking and Async Futures**: Wait on a `Condvar` or `.await`
//! - **Clean Lifecycle**: `stop` joins every worker and settles every pending
//!   future
//!
//! ## ChunkBuilder
//!
//! ```rust,ignore
//! use chunk_build_scheduler::config::BuilderConfig;
//! use chunk_build_scheduler::core::{task_fn, CancellationToken, ChunkBuilder};
//!
//! let builder = ChunkBuilder::new(BuilderConfig::new().with_render_distance(16))?;
//! builder.start(|_worker_id| Vec::<u8>::with_capacity(1 << 16))?;
//!
//! let future = builder.submit(task_fn(|buffer: &mut Vec<u8>, _cancel: &CancellationToken| {
//!     buffer.clear();
//!     buffer.extend_from_slice(b"mesh");
//!     Ok(Some(buffer.len()))
//! }))?;
//! assert_eq!(*future.wait()?, 4);
//!
//! for len in builder.drain_results() {
//!     println!("built {len} bytes");
//! }
//! builder.stop();
//! ```
//!
//! ## ChunkBuildService
//!
//! [`session::ChunkBuildService`] binds a builder to a world session: it owns a
//! snapshot cache, prepares rebuild tasks through a
//! [`session::SnapshotSource`] and [`session::TaskFactory`], and forwards
//! drained results to an [`session::UploadSink`].
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - Builder lifecycle and scaling
//! - `tests/session_test.rs` - World sessions and uploads

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling: tasks, futures, the worker pool and the builder facade.
pub mod core;
/// Builder configuration and thread count resolution.
pub mod config;
/// Queues shared between the consumer thread and the workers.
pub mod infra;
/// World-bound build sessions.
pub mod session;
/// Shared utilities.
pub mod util;

pub use crate::config::BuilderConfig;
pub use crate::core::{BuildError, BuildFuture, BuildTask, ChunkBuilder, SchedulerError};
pub use crate::session::ChunkBuildService;
pub use crate::util::ChunkPos;
