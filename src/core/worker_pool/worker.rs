//! Build worker thread.
//!
//! A worker creates its scratch on its own thread, then loops: block on the
//! queue, check the running flag, run the task, publish the result. It exits
//! when the queue's channel disconnects or when it pops work after shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use super::PoolCounters;
use crate::core::error::SchedulerError;
use crate::core::handle::{RunOutcome, TaskHandle};
use crate::core::task::ScratchFactory;
use crate::infra::ResultQueue;
use crate::util::WorkerId;

/// Everything a worker thread shares with its scheduler.
pub(crate) struct WorkerContext<S, R> {
    pub worker_id: WorkerId,
    pub receiver: Receiver<TaskHandle<S, R>>,
    pub scratch: Arc<dyn ScratchFactory<S>>,
    pub running: Arc<AtomicBool>,
    pub results: Arc<ResultQueue<R>>,
    pub counters: Arc<PoolCounters>,
}

/// Spawn a named worker thread.
pub(super) fn spawn_worker<S, R>(
    name: String,
    stack_size: Option<usize>,
    ctx: WorkerContext<S, R>,
) -> Result<JoinHandle<()>, SchedulerError>
where
    S: 'static,
    R: Send + Sync + 'static,
{
    let mut builder = thread::Builder::new().name(name);
    if let Some(bytes) = stack_size {
        builder = builder.stack_size(bytes);
    }
    builder
        .spawn(move || run_worker(ctx))
        .map_err(SchedulerError::Spawn)
}

fn run_worker<S: 'static, R>(ctx: WorkerContext<S, R>) {
    let WorkerContext {
        worker_id,
        receiver,
        scratch,
        running,
        results,
        counters,
    } = ctx;

    debug!(worker_id, "Build worker started");
    let mut scratch = scratch.create_scratch(worker_id);

    loop {
        // Blocks until work arrives; a closed queue disconnects once empty.
        let Ok(handle) = receiver.recv() else {
            debug!(worker_id, "Build queue closed, exiting");
            break;
        };

        if !running.load(Ordering::Acquire) {
            if handle.cancel() {
                PoolCounters::bump(&counters.cancelled);
            }
            debug!(worker_id, "Builder stopped while work was pending, exiting");
            break;
        }

        match handle.run(&mut scratch) {
            RunOutcome::Completed(result) => {
                PoolCounters::bump(&counters.completed);
                results.push(result);
            }
            RunOutcome::Failed => {
                PoolCounters::bump(&counters.failed);
                warn!(worker_id, "Build task failed");
            }
            RunOutcome::Skipped => PoolCounters::bump(&counters.skipped),
            RunOutcome::Abandoned => PoolCounters::bump(&counters.cancelled),
        }
    }

    debug!(worker_id, "Build worker exiting");
}
