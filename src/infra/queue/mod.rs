//! Queue backends.
//!
//! Both queues are unbounded crossbeam channels. The build queue carries
//! admitted tasks from the consumer thread to any worker; the result queue
//! carries finished results back for a one-shot drain on the consumer thread.

pub mod build;
pub mod results;

pub use build::BuildQueue;
pub use results::{ResultDrain, ResultQueue};
