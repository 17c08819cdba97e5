//! Build task capability and per-worker scratch resources.

use super::cancel::CancellationToken;
use super::error::AppResult;
use crate::util::WorkerId;

/// A unit of work that turns a prepared chunk snapshot into a result.
///
/// `S` is the worker's thread-local scratch (resource caches, reusable build
/// buffers) and `R` the result handed to the upload side. A task runs at most
/// once, on whichever worker pops it.
///
/// # Example
///
/// ```rust,ignore
/// struct RebuildTask { snapshot: SectionSnapshot }
///
/// impl BuildTask<MeshBuffers, ChunkMesh> for RebuildTask {
///     fn perform(
///         &mut self,
///         buffers: &mut MeshBuffers,
///         cancel: &CancellationToken,
///     ) -> anyhow::Result<Option<ChunkMesh>> {
///         for block in self.snapshot.blocks() {
///             if cancel.is_cancelled() {
///                 return Ok(None);
///             }
///             buffers.push_block(block)?;
///         }
///         Ok(Some(buffers.take_mesh()))
///     }
/// }
/// ```
pub trait BuildTask<S, R>: Send {
    /// Build the result using this worker's scratch resources.
    ///
    /// Returning `Ok(None)` is only legal once `cancel` has been set; a task
    /// that produces nothing without being cancelled is reported as a
    /// [`BuildError::MissingResult`](super::BuildError::MissingResult).
    ///
    /// # Errors
    ///
    /// Any error is delivered to this task's future and does not affect the
    /// worker.
    fn perform(&mut self, scratch: &mut S, cancel: &CancellationToken) -> AppResult<Option<R>>;

    /// Release transient resources held by the task. Called after every
    /// `perform`, whatever its outcome.
    fn release_resources(&mut self) {}
}

impl<S, R, T> BuildTask<S, R> for Box<T>
where
    T: BuildTask<S, R> + ?Sized,
{
    fn perform(
        &mut self,
        scratch: &mut S,
        cancel: &CancellationToken,
    ) -> AppResult<Option<R>> {
        (**self).perform(scratch, cancel)
    }

    fn release_resources(&mut self) {
        (**self).release_resources();
    }
}

/// Type-erased task as stored in the build queue.
pub type BoxedTask<S, R> = Box<dyn BuildTask<S, R>>;

/// Task backed by a closure. Mostly useful for empty builds and tests.
pub struct FnTask<F> {
    body: F,
}

/// Wrap a closure as a [`BuildTask`].
pub fn task_fn<S, R, F>(body: F) -> FnTask<F>
where
    F: FnMut(&mut S, &CancellationToken) -> AppResult<Option<R>> + Send,
{
    FnTask { body }
}

impl<S, R, F> BuildTask<S, R> for FnTask<F>
where
    F: FnMut(&mut S, &CancellationToken) -> AppResult<Option<R>> + Send,
{
    fn perform(
        &mut self,
        scratch: &mut S,
        cancel: &CancellationToken,
    ) -> AppResult<Option<R>> {
        (self.body)(scratch, cancel)
    }
}

/// Creates the thread-local scratch resources of each worker.
///
/// Called once on the worker thread itself, so the scratch type never has to
/// be `Send`.
pub trait ScratchFactory<S>: Send + Sync + 'static {
    /// Build the scratch for the worker with the given id.
    fn create_scratch(&self, worker_id: WorkerId) -> S;
}

impl<S, F> ScratchFactory<S> for F
where
    F: Fn(WorkerId) -> S + Send + Sync + 'static,
{
    fn create_scratch(&self, worker_id: WorkerId) -> S {
        self(worker_id)
    }
}
