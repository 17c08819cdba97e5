//! Worker growth decisions and admission budgeting.
//!
//! Both functions here are pure: they look at counts and elapsed time and
//! never touch threads, so the scheduler can call them under its own locks.

use std::time::Duration;

use crate::config::ThreadLimits;

/// Minimum spacing between worker spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingPolicy {
    /// Spacing while the pool is below its target count.
    pub quick_interval: Duration,
    /// Spacing once the pool has reached its target count.
    /// `Duration::MAX` disables growth beyond the target.
    pub slow_interval: Duration,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            quick_interval: Duration::from_secs(1),
            slow_interval: Duration::from_secs(10),
        }
    }
}

/// Result of asking the scaler whether to spawn a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Spawn one worker now.
    Grow,
    /// Growth is allowed, but the last spawn was too recent.
    Wait,
    /// The pool is at its hard limit.
    AtLimit,
}

/// Decides when the pool may add one more worker.
#[derive(Debug, Clone, Copy)]
pub struct PoolScaler {
    limits: ThreadLimits,
    policy: ScalingPolicy,
}

impl PoolScaler {
    /// Create a scaler for the given limits and spawn spacing.
    #[must_use]
    pub const fn new(limits: ThreadLimits, policy: ScalingPolicy) -> Self {
        Self { limits, policy }
    }

    /// Limits this scaler enforces.
    #[must_use]
    pub const fn limits(&self) -> ThreadLimits {
        self.limits
    }

    /// Spawn spacing this scaler enforces.
    #[must_use]
    pub const fn policy(&self) -> ScalingPolicy {
        self.policy
    }

    /// The spacing that applies with `live` workers running.
    #[must_use]
    pub const fn interval_for(&self, live: usize) -> Duration {
        if live < self.limits.target {
            self.policy.quick_interval
        } else {
            self.policy.slow_interval
        }
    }

    /// Whether to spawn a worker given the live count and the time since the
    /// last spawn. Growth needs the elapsed time to strictly exceed the
    /// applicable interval, so `Duration::MAX` never grows.
    #[must_use]
    pub const fn decide(&self, live: usize, since_last_spawn: Duration) -> ScaleDecision {
        if live >= self.limits.hard_limit {
            return ScaleDecision::AtLimit;
        }
        let interval = self.interval_for(live);
        if since_last_spawn.as_nanos() > interval.as_nanos() {
            ScaleDecision::Grow
        } else {
            ScaleDecision::Wait
        }
    }
}

/// Number of tasks a producer may still submit without building a backlog.
///
/// Counts every worker the pool is expected to have, live or not yet spawned,
/// as able to hold `per_worker` queued tasks, then subtracts the queue depth.
#[must_use]
pub fn admission_budget(live: usize, target: usize, per_worker: usize, queued: usize) -> usize {
    live.max(target)
        .saturating_mul(per_worker)
        .saturating_sub(queued)
}
