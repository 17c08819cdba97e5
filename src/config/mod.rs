//! Configuration models for the builder and its worker pool.

pub mod builder;

pub use builder::{
    default_initial_threads, default_target_threads, BuilderConfig, ThreadLimits,
    DEFAULT_PER_WORKER_QUEUE_LIMIT, MAX_WORKER_THREADS,
};
