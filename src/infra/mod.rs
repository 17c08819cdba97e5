//! Infrastructure: the concurrent queues that move work between threads.

pub mod queue;

pub use queue::{BuildQueue, ResultDrain, ResultQueue};
