//! The chunk builder: admission, lifecycle and result draining.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::error::SchedulerError;
use super::future::BuildFuture;
use super::handle::TaskHandle;
use super::scaler::{admission_budget, PoolScaler, ScaleDecision};
use super::task::{BuildTask, ScratchFactory};
use super::worker_pool::{PoolCounters, SchedulerStats, WorkerPool};
use crate::config::{BuilderConfig, ThreadLimits};
use crate::infra::{BuildQueue, ResultDrain, ResultQueue};

/// Adaptive pool of build workers fed through a shared FIFO.
///
/// The consumer thread submits tasks, asks for the admission budget once per
/// scheduling period, calls [`grow_if_needed`](Self::grow_if_needed) and
/// drains finished results at its synchronization point. Workers are spawned
/// by `start`, grown gradually up to the hard limit, and joined by `stop`.
///
/// `S` is the per-worker scratch type, `R` the build result.
///
/// # Example
///
/// ```rust,ignore
/// let builder = ChunkBuilder::new(BuilderConfig::from_env()?)?;
/// builder.start(|worker_id| MeshBuffers::new(worker_id))?;
///
/// for _ in 0..builder.admission_budget() {
///     let Some(section) = dirty.pop() else { break };
///     builder.submit(RebuildTask::new(section))?;
/// }
/// builder.grow_if_needed()?;
///
/// for mesh in builder.drain_results() {
///     upload(&mesh);
/// }
/// ```
pub struct ChunkBuilder<S, R> {
    config: BuilderConfig,
    scaler: PoolScaler,
    running: Arc<AtomicBool>,
    queue: BuildQueue<TaskHandle<S, R>>,
    results: Arc<ResultQueue<R>>,
    counters: Arc<PoolCounters>,
    pool: Mutex<WorkerPool<S, R>>,
}

impl<S, R> ChunkBuilder<S, R>
where
    S: 'static,
    R: Send + Sync + 'static,
{
    /// Create a stopped builder, resolving thread counts against the number
    /// of logical cores.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if validation fails.
    pub fn new(config: BuilderConfig) -> Result<Self, SchedulerError> {
        Self::with_logical_cores(config, num_cpus::get())
    }

    /// Create a stopped builder as if the machine had `logical_cores` cores.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if validation fails.
    pub fn with_logical_cores(
        config: BuilderConfig,
        logical_cores: usize,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        let limits = config.resolve(logical_cores);
        let scaler = PoolScaler::new(limits, config.scaling_policy());
        let policy = scaler.policy();

        let running = Arc::new(AtomicBool::new(false));
        let results = Arc::new(ResultQueue::new());
        let counters = Arc::new(PoolCounters::default());
        let pool = WorkerPool::new(
            &config,
            limits.hard_limit,
            Arc::clone(&running),
            Arc::clone(&results),
            Arc::clone(&counters),
        );

        info!(
            initial = limits.initial,
            target = limits.target,
            hard_limit = limits.hard_limit,
            quick_interval = ?policy.quick_interval,
            slow_interval = ?policy.slow_interval,
            "Chunk builder configured"
        );

        Ok(Self {
            config,
            scaler,
            running,
            queue: BuildQueue::new(),
            results,
            counters,
            pool: Mutex::new(pool),
        })
    }

    /// Spawn the initial workers. No-op if already running.
    ///
    /// `scratch` is invoked once on each worker thread to build its private
    /// resources.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::LifecycleViolation`] if worker threads are
    /// still alive while stopped, or [`SchedulerError::Spawn`] if the OS
    /// refuses a thread. A failed start leaves the builder stopped.
    pub fn start<F>(&self, scratch: F) -> Result<(), SchedulerError>
    where
        F: ScratchFactory<S>,
    {
        let mut pool = self.pool.lock();
        if self.running.load(Ordering::Acquire) {
            return Ok(());
        }
        if pool.live() != 0 {
            error!(live = pool.live(), "Worker threads are still alive while stopped");
            return Err(SchedulerError::LifecycleViolation(format!(
                "{} worker threads are still alive while stopped",
                pool.live()
            )));
        }

        self.queue.open();
        pool.begin(self.queue.receiver(), Arc::new(scratch));
        self.running.store(true, Ordering::Release);

        for _ in 0..self.limits().initial {
            if let Err(err) = pool.spawn() {
                error!(error = %err, "Failed to start build workers");
                self.shutdown(&mut pool);
                return Err(err);
            }
        }

        info!(workers = pool.live(), "Started build workers");
        Ok(())
    }

    /// Stop every worker and discard pending work. No-op if already stopped.
    ///
    /// Blocks until every worker thread has exited. Afterwards both queues are
    /// empty and every future from this session is settled.
    pub fn stop(&self) {
        let mut pool = self.pool.lock();
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        if pool.live() == 0 {
            error!("No worker threads are alive but the builder is running");
        }
        info!(workers = pool.live(), "Stopping build workers");
        self.shutdown(&mut pool);
    }

    fn shutdown(&self, pool: &mut WorkerPool<S, R>) {
        self.running.store(false, Ordering::Release);
        self.queue.close();

        let joined = pool.join_all();

        let dropped = self.results.clear();
        let mut cancelled = 0;
        for handle in self.queue.drain() {
            if handle.cancel() {
                cancelled += 1;
            }
        }
        PoolCounters::add(&self.counters.cancelled, cancelled);

        debug!(joined, dropped, cancelled, "Build workers stopped");
    }

    /// Queue a task and return its future immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Stopped`] if the builder is not running; the
    /// task is dropped without being queued.
    pub fn submit<T>(&self, task: T) -> Result<BuildFuture<R>, SchedulerError>
    where
        T: BuildTask<S, R> + 'static,
    {
        if !self.running.load(Ordering::Acquire) {
            return Err(SchedulerError::Stopped);
        }
        let (handle, future) = TaskHandle::new(Box::new(task));
        if self.queue.push(handle).is_err() {
            return Err(SchedulerError::Stopped);
        }
        PoolCounters::bump(&self.counters.submitted);
        Ok(future)
    }

    /// Tasks the producer may still submit this scheduling period.
    #[must_use]
    pub fn admission_budget(&self) -> usize {
        admission_budget(
            self.live_workers(),
            self.limits().target,
            self.config.per_worker_queue_limit,
            self.queue.len(),
        )
    }

    /// Take every finished result published so far.
    #[must_use]
    pub fn drain_results(&self) -> ResultDrain<R> {
        if self.results.is_empty() {
            return ResultDrain::empty();
        }
        self.results.drain()
    }

    /// Spawn one more worker if the scaling policy allows it. Returns whether
    /// a worker was spawned.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Spawn`] if the OS refuses the thread.
    pub fn grow_if_needed(&self) -> Result<bool, SchedulerError> {
        let mut pool = self.pool.lock();
        if !self.running.load(Ordering::Acquire) {
            return Ok(false);
        }
        match self.scaler.decide(pool.live(), pool.since_last_spawn()) {
            ScaleDecision::Grow => {
                pool.spawn().inspect_err(|err| {
                    warn!(error = %err, "Failed to grow build worker pool");
                })?;
                Ok(true)
            }
            ScaleDecision::Wait | ScaleDecision::AtLimit => Ok(false),
        }
    }

    /// Whether no tasks are waiting to be picked up.
    #[must_use]
    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of results waiting to be drained.
    #[must_use]
    pub fn pending_results(&self) -> usize {
        self.results.len()
    }

    /// Whether the builder is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of live worker threads.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.pool.lock().live()
    }

    /// Resolved thread counts.
    #[must_use]
    pub const fn limits(&self) -> ThreadLimits {
        self.scaler.limits()
    }

    /// Configuration this builder was created with.
    #[must_use]
    pub const fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Snapshot of pool sizes, queue depths and task counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let limits = self.limits();
        SchedulerStats {
            live_workers: self.live_workers(),
            target_workers: limits.target,
            hard_limit: limits.hard_limit,
            queued_tasks: self.queue.len(),
            pending_results: self.results.len(),
            ..self.counters.snapshot()
        }
    }
}

impl<S, R> Drop for ChunkBuilder<S, R> {
    fn drop(&mut self) {
        // Workers are detached rather than joined; a worker mid-task finishes
        // it, then sees the closed queue and exits.
        if self.running.swap(false, Ordering::AcqRel) {
            self.queue.close();
            for handle in self.queue.drain() {
                handle.cancel();
            }
            debug!("ChunkBuilder dropped without stop, workers detached");
        }
    }
}
