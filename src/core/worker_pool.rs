//! Dynamically sized pool of dedicated build threads.
//!
//! Workers are plain OS threads that block on the build queue's channel. The
//! pool only tracks their join handles and spawn timing; growth decisions are
//! made by [`PoolScaler`](super::PoolScaler) and lifecycle by the scheduler.

mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use serde::Serialize;
use tracing::{debug, error, info};

use super::error::SchedulerError;
use super::handle::TaskHandle;
use super::task::ScratchFactory;
use crate::config::BuilderConfig;
use crate::infra::ResultQueue;

use worker::WorkerContext;

/// Point-in-time view of the scheduler's pool and counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Worker threads currently alive.
    pub live_workers: usize,
    /// Count the pool ramps up to quickly.
    pub target_workers: usize,
    /// Count the pool never exceeds.
    pub hard_limit: usize,
    /// Tasks waiting in the build queue.
    pub queued_tasks: usize,
    /// Results waiting to be drained.
    pub pending_results: usize,
    /// Tasks accepted by `submit`.
    pub submitted_tasks: u64,
    /// Tasks that produced a published result.
    pub completed_tasks: u64,
    /// Tasks that failed or panicked.
    pub failed_tasks: u64,
    /// Tasks cancelled by shutdown, or whose output was dropped.
    pub cancelled_tasks: u64,
    /// Tasks popped with their token already set and never performed.
    pub skipped_tasks: u64,
}

/// Lock-free counters shared with every worker.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub skipped: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Copy the counters into a stats record. Pool sizes are left to the caller.
    pub(crate) fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            submitted_tasks: self.submitted.load(Ordering::Relaxed),
            completed_tasks: self.completed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled.load(Ordering::Relaxed),
            skipped_tasks: self.skipped.load(Ordering::Relaxed),
            ..SchedulerStats::default()
        }
    }
}

/// Session state of a running pool: where workers get work and scratch from.
struct Session<S, R> {
    receiver: Receiver<TaskHandle<S, R>>,
    scratch: Arc<dyn ScratchFactory<S>>,
}

/// Worker threads of one builder. Only the scheduler mutates it.
pub(crate) struct WorkerPool<S, R> {
    threads: Vec<JoinHandle<()>>,
    session: Option<Session<S, R>>,
    last_spawn: Instant,
    hard_limit: usize,
    running: Arc<AtomicBool>,
    results: Arc<ResultQueue<R>>,
    counters: Arc<PoolCounters>,
    name_prefix: String,
    stack_size: Option<usize>,
}

impl<S, R> WorkerPool<S, R>
where
    S: 'static,
    R: Send + Sync + 'static,
{
    pub(crate) fn new(
        config: &BuilderConfig,
        hard_limit: usize,
        running: Arc<AtomicBool>,
        results: Arc<ResultQueue<R>>,
        counters: Arc<PoolCounters>,
    ) -> Self {
        Self {
            threads: Vec::with_capacity(hard_limit),
            session: None,
            last_spawn: Instant::now(),
            hard_limit,
            running,
            results,
            counters,
            name_prefix: config.thread_name_prefix.clone(),
            stack_size: config.thread_stack_size,
        }
    }

    /// Number of worker threads that have not been joined.
    pub(crate) fn live(&self) -> usize {
        self.threads.len()
    }

    pub(crate) fn since_last_spawn(&self) -> Duration {
        self.last_spawn.elapsed()
    }

    /// Bind the pool to a fresh queue receiver and scratch factory.
    pub(crate) fn begin(
        &mut self,
        receiver: Receiver<TaskHandle<S, R>>,
        scratch: Arc<dyn ScratchFactory<S>>,
    ) {
        self.session = Some(Session { receiver, scratch });
    }

    /// Spawn one worker bound to the current session.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::LifecycleViolation`] outside a session and
    /// [`SchedulerError::Spawn`] if the OS refuses the thread.
    pub(crate) fn spawn(&mut self) -> Result<(), SchedulerError> {
        let Some(session) = &self.session else {
            return Err(SchedulerError::LifecycleViolation(
                "cannot spawn a worker outside a running session".into(),
            ));
        };

        let worker_id = self.threads.len();
        let ctx = WorkerContext {
            worker_id,
            receiver: session.receiver.clone(),
            scratch: Arc::clone(&session.scratch),
            running: Arc::clone(&self.running),
            results: Arc::clone(&self.results),
            counters: Arc::clone(&self.counters),
        };
        let name = format!("{} #{}", self.name_prefix, worker_id + 1);
        let thread = worker::spawn_worker(name, self.stack_size, ctx)?;

        self.threads.push(thread);
        self.last_spawn = Instant::now();
        debug!(worker_id, live = self.threads.len(), "Spawned build worker");

        if self.threads.len() == self.hard_limit {
            info!(hard_limit = self.hard_limit, "Reached maximum number of build workers");
        }
        Ok(())
    }

    /// Join every worker and release the session. Blocks until all threads
    /// have exited; returns how many were joined.
    pub(crate) fn join_all(&mut self) -> usize {
        self.session = None;

        let count = self.threads.len();
        for (worker_id, thread) in self.threads.drain(..).enumerate() {
            if thread.join().is_err() {
                error!(worker_id, "Build worker panicked outside of a task");
            }
        }
        count
    }
}
