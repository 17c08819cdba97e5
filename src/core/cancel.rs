//! Cooperative cancellation flag shared between the admitting thread and a worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A set-once flag a pending or in-flight task can observe to abandon work early.
///
/// Cancellation is cooperative: setting the token never interrupts a running
/// task, it only stops a worker from starting one and lets task code bail out
/// at its own checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the token to cancelled. Returns `true` if this call flipped it.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    /// Whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_set_once() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
