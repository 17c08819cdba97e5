//! World-bound build sessions on top of [`ChunkBuilder`].
//!
//! A session ties the builder to one world: it owns the world handle, the
//! render pass setup and a snapshot cache, and it is torn down with every
//! `stop`. Chunk rebuilds are prepared on the calling thread (a snapshot of the
//! section and its neighbours) and built on the workers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BuilderConfig;
use crate::core::{
    BoxedTask, BuildFuture, CancelHandle, ChunkBuilder, SchedulerError, SchedulerStats,
};
use crate::infra::ResultDrain;
use crate::util::{ChunkPos, WorkerId};

/// Takes snapshots of world data so builds can run off the owning thread.
pub trait SnapshotSource: Send + Sync + 'static {
    /// World handle a session is bound to.
    type World: Send + Sync + 'static;
    /// Per-session cache of copied section data.
    type Cache: Send + Sync + 'static;
    /// Everything a rebuild needs, detached from the world.
    type Context: Send + 'static;

    /// Create an empty cache for a new session.
    fn create_cache(&self, world: &Self::World) -> Self::Cache;

    /// Snapshot the section at `pos`. `None` means there is nothing to build,
    /// for example an all-air section.
    fn prepare(
        &self,
        world: &Self::World,
        cache: &Self::Cache,
        pos: ChunkPos,
    ) -> Option<Self::Context>;

    /// Drop cached data for the section at `pos` after it changed.
    fn invalidate(&self, cache: &Self::Cache, pos: ChunkPos);
}

/// Creates build tasks and the worker scratch they run with.
pub trait TaskFactory<P: SnapshotSource>: Send + Sync + 'static {
    /// Render pass setup shared by every worker of a session.
    type RenderPasses: Send + Sync + 'static;
    /// Per-worker scratch, created on the worker thread.
    type Scratch: 'static;
    /// Finished build handed to the uploader.
    type Output: Send + Sync + 'static;

    /// Build the scratch for one worker of the session.
    fn create_scratch(
        &self,
        world: &P::World,
        passes: &Self::RenderPasses,
        worker_id: WorkerId,
    ) -> Self::Scratch;

    /// Task that rebuilds the section at `pos` from its snapshot.
    fn rebuild_task(
        &self,
        pos: ChunkPos,
        context: P::Context,
    ) -> BoxedTask<Self::Scratch, Self::Output>;

    /// Task that produces the result for a section with nothing to build.
    fn empty_task(&self, pos: ChunkPos) -> BoxedTask<Self::Scratch, Self::Output>;
}

/// Receives finished builds at the consumer's synchronization point.
pub trait UploadSink<R> {
    /// Upload every result in `results`.
    fn upload(&mut self, results: ResultDrain<R>);
}

impl<R, F> UploadSink<R> for F
where
    F: FnMut(ResultDrain<R>),
{
    fn upload(&mut self, results: ResultDrain<R>) {
        self(results);
    }
}

struct BuildSession<P: SnapshotSource, F: TaskFactory<P>> {
    id: Uuid,
    world: Arc<P::World>,
    cache: P::Cache,
    // Held for the session's lifetime; workers keep their own clones.
    _passes: Arc<F::RenderPasses>,
}

/// Chunk builder bound to a world session.
pub struct ChunkBuildService<P, F>
where
    P: SnapshotSource,
    F: TaskFactory<P>,
{
    snapshots: P,
    factory: Arc<F>,
    builder: ChunkBuilder<F::Scratch, F::Output>,
    session: RwLock<Option<BuildSession<P, F>>>,
    in_flight: Mutex<HashMap<ChunkPos, CancelHandle<F::Output>>>,
}

impl<P, F> ChunkBuildService<P, F>
where
    P: SnapshotSource,
    F: TaskFactory<P>,
{
    /// Create a stopped service.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if validation fails.
    pub fn new(config: BuilderConfig, snapshots: P, factory: F) -> Result<Self, SchedulerError> {
        Ok(Self::with_builder(
            ChunkBuilder::new(config)?,
            snapshots,
            factory,
        ))
    }

    /// Create a stopped service around an existing builder.
    pub fn with_builder(
        builder: ChunkBuilder<F::Scratch, F::Output>,
        snapshots: P,
        factory: F,
    ) -> Self {
        Self {
            snapshots,
            factory: Arc::new(factory),
            builder,
            session: RwLock::new(None),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Bind to `world` and start the workers, replacing any running session.
    ///
    /// A running session is stopped first, which cancels all of its pending
    /// work. Returns the new session's id.
    ///
    /// # Errors
    ///
    /// Propagates [`ChunkBuilder::start`] failures; no session is active
    /// afterwards.
    pub fn configure_and_start(
        &self,
        world: P::World,
        passes: F::RenderPasses,
    ) -> Result<Uuid, SchedulerError> {
        self.stop();

        let world = Arc::new(world);
        let passes = Arc::new(passes);
        let cache = self.snapshots.create_cache(&world);

        let scratch = {
            let factory = Arc::clone(&self.factory);
            let world = Arc::clone(&world);
            let passes = Arc::clone(&passes);
            move |worker_id: WorkerId| factory.create_scratch(&world, &passes, worker_id)
        };
        self.builder.start(scratch)?;

        let id = Uuid::new_v4();
        *self.session.write() = Some(BuildSession {
            id,
            world,
            cache,
            _passes: passes,
        });
        info!(session = %id, "Build session started");
        Ok(id)
    }

    /// Stop the workers and drop the session. No-op if already stopped.
    pub fn stop(&self) {
        self.builder.stop();
        self.in_flight.lock().clear();
        if let Some(session) = self.session.write().take() {
            info!(session = %session.id, "Build session ended");
        }
    }

    /// Snapshot the section at `pos` and queue its rebuild.
    ///
    /// Any rebuild of the same section still in flight is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Stopped`] when no session is running.
    pub fn schedule_rebuild(&self, pos: ChunkPos) -> Result<BuildFuture<F::Output>, SchedulerError> {
        let session = self.session.read();
        let Some(session) = session.as_ref() else {
            return Err(SchedulerError::Stopped);
        };

        let mut in_flight = self.in_flight.lock();
        if let Some(previous) = in_flight.remove(&pos) {
            if previous.cancel() {
                debug!(%pos, "Cancelled superseded rebuild");
            }
        }

        let task = match self.snapshots.prepare(&session.world, &session.cache, pos) {
            Some(context) => self.factory.rebuild_task(pos, context),
            None => self.factory.empty_task(pos),
        };
        let future = self.builder.submit(task)?;
        in_flight.insert(pos, future.cancel_handle());
        Ok(future)
    }

    /// Hand every finished build to `sink`. Returns `false` if nothing was
    /// pending.
    pub fn perform_pending_uploads<U>(&self, sink: &mut U) -> bool
    where
        U: UploadSink<F::Output>,
    {
        let results = self.builder.drain_results();
        if results.is_empty() {
            return false;
        }
        sink.upload(results);
        self.in_flight.lock().retain(|_, handle| !handle.is_done());
        true
    }

    /// Forget cached data for the section at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoActiveSession`] when no session is running.
    pub fn invalidate(&self, pos: ChunkPos) -> Result<(), SchedulerError> {
        let session = self.session.read();
        let session = session.as_ref().ok_or(SchedulerError::NoActiveSession)?;
        self.snapshots.invalidate(&session.cache, pos);
        Ok(())
    }

    /// Id of the running session.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.read().as_ref().map(|s| s.id)
    }

    /// Tasks the caller may still schedule this frame.
    #[must_use]
    pub fn admission_budget(&self) -> usize {
        self.builder.admission_budget()
    }

    /// Spawn one more worker if the scaling policy allows it.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Spawn`] if the OS refuses the thread.
    pub fn grow_if_needed(&self) -> Result<bool, SchedulerError> {
        self.builder.grow_if_needed()
    }

    /// Whether no rebuilds are waiting for a worker.
    #[must_use]
    pub fn is_queue_empty(&self) -> bool {
        self.builder.is_queue_empty()
    }

    /// Number of rebuilds currently tracked as in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Scheduler statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.builder.stats()
    }

    /// The underlying builder.
    #[must_use]
    pub const fn builder(&self) -> &ChunkBuilder<F::Scratch, F::Output> {
        &self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{task_fn, CancellationToken};
    use std::collections::HashSet;

    /// World where sections with `y < 0` are empty.
    struct FlatSnapshots;

    impl SnapshotSource for FlatSnapshots {
        type World = String;
        type Cache = Mutex<HashSet<ChunkPos>>;
        type Context = ChunkPos;

        fn create_cache(&self, _world: &String) -> Self::Cache {
            Mutex::new(HashSet::new())
        }

        fn prepare(&self, _world: &String, cache: &Self::Cache, pos: ChunkPos) -> Option<ChunkPos> {
            cache.lock().insert(pos);
            (pos.y >= 0).then_some(pos)
        }

        fn invalidate(&self, cache: &Self::Cache, pos: ChunkPos) {
            cache.lock().remove(&pos);
        }
    }

    struct LabelFactory;

    impl TaskFactory<FlatSnapshots> for LabelFactory {
        type RenderPasses = u8;
        type Scratch = String;
        type Output = String;

        fn create_scratch(&self, world: &String, passes: &u8, worker_id: WorkerId) -> String {
            format!("{world}/{passes}/{worker_id}")
        }

        fn rebuild_task(&self, pos: ChunkPos, _context: ChunkPos) -> BoxedTask<String, String> {
            Box::new(task_fn(move |_: &mut String, _: &CancellationToken| {
                Ok(Some(format!("mesh {pos}")))
            }))
        }

        fn empty_task(&self, pos: ChunkPos) -> BoxedTask<String, String> {
            Box::new(task_fn(move |_: &mut String, _: &CancellationToken| {
                Ok(Some(format!("empty {pos}")))
            }))
        }
    }

    fn service() -> ChunkBuildService<FlatSnapshots, LabelFactory> {
        let config = BuilderConfig::new()
            .with_initial_threads(1)
            .with_target_threads(1)
            .with_max_threads(1);
        ChunkBuildService::new(config, FlatSnapshots, LabelFactory).unwrap()
    }

    #[test]
    fn test_schedule_without_session_fails() {
        let service = service();
        assert!(matches!(
            service.schedule_rebuild(ChunkPos::new(0, 0, 0)),
            Err(SchedulerError::Stopped)
        ));
        assert!(matches!(
            service.invalidate(ChunkPos::new(0, 0, 0)),
            Err(SchedulerError::NoActiveSession)
        ));
    }

    #[test]
    fn test_session_lifecycle() {
        let service = service();
        let first = service.configure_and_start("overworld".into(), 2).unwrap();
        assert_eq!(service.session_id(), Some(first));
        let second = service.configure_and_start("nether".into(), 2).unwrap();
        assert_ne!(first, second);
        service.stop();
        assert_eq!(service.session_id(), None);
        assert!(!service.builder().is_running());
    }

    #[test]
    fn test_empty_section_uses_empty_task() {
        let service = service();
        service.configure_and_start("overworld".into(), 0).unwrap();
        let future = service.schedule_rebuild(ChunkPos::new(1, -1, 1)).unwrap();
        assert_eq!(future.wait().unwrap().as_str(), "empty [1, -1, 1]");
        service.stop();
    }
}
