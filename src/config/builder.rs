//! Chunk builder configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::ScalingPolicy;

/// Queued tasks allowed per worker before the admission budget hits zero.
pub const DEFAULT_PER_WORKER_QUEUE_LIMIT: usize = 2;

/// Absolute cap on worker threads, whatever the configuration asks for.
pub const MAX_WORKER_THREADS: usize = 64;

/// Default interval between spawns while ramping up to the target count.
pub const DEFAULT_QUICK_INTERVAL_MS: u64 = 1_000;

/// Default interval between spawns beyond the target count.
pub const DEFAULT_SLOW_INTERVAL_MS: u64 = 10_000;

/// Prefix of the environment variables read by [`BuilderConfig::from_env`].
pub const ENV_PREFIX: &str = "CHUNK_BUILDER_";

/// Resolved worker counts, satisfying `0 < initial <= target <= hard_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadLimits {
    /// Workers spawned by `start`.
    pub initial: usize,
    /// Count the pool ramps up to quickly.
    pub target: usize,
    /// Count the pool never exceeds.
    pub hard_limit: usize,
}

impl ThreadLimits {
    /// Build limits, checking the ordering invariant.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated bound.
    pub fn new(initial: usize, target: usize, hard_limit: usize) -> Result<Self, String> {
        if initial == 0 {
            return Err("initial thread count must be greater than 0".into());
        }
        if initial > target {
            return Err(format!("initial threads ({initial}) exceed target ({target})"));
        }
        if target > hard_limit {
            return Err(format!("target threads ({target}) exceed hard limit ({hard_limit})"));
        }
        Ok(Self {
            initial,
            target,
            hard_limit,
        })
    }
}

/// Builder configuration. Thread counts of `0` mean "pick automatically".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Workers started with the pool (`0` derives it from the render distance).
    pub initial_threads: usize,
    /// Workers to ramp up to quickly (`0` derives it from the core count).
    pub target_threads: usize,
    /// Upper bound on workers (`0` uses the logical core count).
    pub max_threads: usize,
    /// Minimum milliseconds between spawns below the target count.
    pub quick_interval_ms: u64,
    /// Minimum milliseconds between spawns above the target count.
    /// `u64::MAX` disables growth beyond the target.
    pub slow_interval_ms: u64,
    /// Queued tasks allowed per worker when computing the admission budget.
    pub per_worker_queue_limit: usize,
    /// View distance in chunks, used for the default initial count.
    pub render_distance: u32,
    /// Stack size for worker threads; the platform default if unset.
    pub thread_stack_size: Option<usize>,
    /// Worker thread names are `"{prefix} #{n}"`.
    pub thread_name_prefix: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            initial_threads: 0,
            target_threads: 0,
            max_threads: 0,
            quick_interval_ms: DEFAULT_QUICK_INTERVAL_MS,
            slow_interval_ms: DEFAULT_SLOW_INTERVAL_MS,
            per_worker_queue_limit: DEFAULT_PER_WORKER_QUEUE_LIMIT,
            render_distance: 12,
            thread_stack_size: None,
            thread_name_prefix: "chunk-builder".into(),
        }
    }
}

impl BuilderConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial worker count.
    #[must_use]
    pub const fn with_initial_threads(mut self, count: usize) -> Self {
        self.initial_threads = count;
        self
    }

    /// Set the target worker count.
    #[must_use]
    pub const fn with_target_threads(mut self, count: usize) -> Self {
        self.target_threads = count;
        self
    }

    /// Set the maximum worker count.
    #[must_use]
    pub const fn with_max_threads(mut self, count: usize) -> Self {
        self.max_threads = count;
        self
    }

    /// Set both spawn intervals in milliseconds.
    #[must_use]
    pub const fn with_intervals_ms(mut self, quick: u64, slow: u64) -> Self {
        self.quick_interval_ms = quick;
        self.slow_interval_ms = slow;
        self
    }

    /// Set the per-worker queue limit.
    #[must_use]
    pub const fn with_per_worker_queue_limit(mut self, limit: usize) -> Self {
        self.per_worker_queue_limit = limit;
        self
    }

    /// Set the render distance used for the default initial count.
    #[must_use]
    pub const fn with_render_distance(mut self, chunks: u32) -> Self {
        self.render_distance = chunks;
        self
    }

    /// Set the worker stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.per_worker_queue_limit == 0 {
            return Err("per_worker_queue_limit must be greater than 0".into());
        }
        if self.thread_stack_size == Some(0) {
            return Err("thread_stack_size must be greater than 0".into());
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Resolve thread counts against the machine's logical core count.
    ///
    /// `hard_limit` is the configured maximum (or the core count) capped at
    /// [`MAX_WORKER_THREADS`]; `target` and `initial` are clamped below it.
    #[must_use]
    pub fn resolve(&self, logical_cores: usize) -> ThreadLimits {
        let requested_max = if self.max_threads == 0 {
            logical_cores
        } else {
            self.max_threads
        };
        let hard_limit = requested_max.clamp(1, MAX_WORKER_THREADS);

        let target = if self.target_threads == 0 {
            default_target_threads(logical_cores)
        } else {
            self.target_threads
        }
        .min(hard_limit);

        let initial = if self.initial_threads == 0 {
            default_initial_threads(self.render_distance)
        } else {
            self.initial_threads
        }
        .min(target);

        ThreadLimits {
            initial,
            target,
            hard_limit,
        }
    }

    /// Spawn intervals as a scaling policy.
    #[must_use]
    pub fn scaling_policy(&self) -> ScalingPolicy {
        ScalingPolicy {
            quick_interval: interval(self.quick_interval_ms),
            slow_interval: interval(self.slow_interval_ms),
        }
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `CHUNK_BUILDER_*` environment variables,
    /// loading a `.env` file first if one exists. Unset variables keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or the
    /// validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(v) = env_var("INITIAL_THREADS")? {
            cfg.initial_threads = v;
        }
        if let Some(v) = env_var("TARGET_THREADS")? {
            cfg.target_threads = v;
        }
        if let Some(v) = env_var("MAX_THREADS")? {
            cfg.max_threads = v;
        }
        if let Some(v) = env_var("QUICK_INTERVAL_MS")? {
            cfg.quick_interval_ms = v;
        }
        if let Some(v) = env_var("SLOW_INTERVAL_MS")? {
            cfg.slow_interval_ms = v;
        }
        if let Some(v) = env_var("PER_WORKER_QUEUE_LIMIT")? {
            cfg.per_worker_queue_limit = v;
        }
        if let Some(v) = env_var("RENDER_DISTANCE")? {
            cfg.render_distance = v;
        }
        if let Some(v) = env_var("THREAD_STACK_SIZE")? {
            cfg.thread_stack_size = Some(v);
        }
        if let Some(v) = env_var::<String>("THREAD_NAME_PREFIX")? {
            cfg.thread_name_prefix = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Roughly a third of the cores, leaving six for the rest of the process on
/// big machines, clamped to `1..=10`.
#[must_use]
pub fn default_target_threads(logical_cores: usize) -> usize {
    (logical_cores / 3)
        .max(logical_cores.saturating_sub(6))
        .clamp(1, 10)
}

/// Two workers plus one per ten chunks of view distance.
#[must_use]
pub const fn default_initial_threads(render_distance: u32) -> usize {
    (render_distance / 10) as usize + 2
}

fn interval(ms: u64) -> Duration {
    if ms == u64::MAX {
        Duration::MAX
    } else {
        Duration::from_millis(ms)
    }
}

fn env_var<T: FromStr>(suffix: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    let name = format!("{ENV_PREFIX}{suffix}");
    match env::var(&name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{name}: {e}")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("{name}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target_threads() {
        assert_eq!(default_target_threads(1), 1);
        assert_eq!(default_target_threads(4), 1);
        assert_eq!(default_target_threads(8), 2);
        assert_eq!(default_target_threads(12), 6);
        assert_eq!(default_target_threads(32), 10);
    }

    #[test]
    fn test_default_initial_threads() {
        assert_eq!(default_initial_threads(0), 2);
        assert_eq!(default_initial_threads(12), 3);
        assert_eq!(default_initial_threads(32), 5);
    }

    #[test]
    fn test_resolve_clamps_chain() {
        let cfg = BuilderConfig::new()
            .with_initial_threads(16)
            .with_target_threads(12)
            .with_max_threads(6);
        let limits = cfg.resolve(32);
        assert_eq!(
            limits,
            ThreadLimits {
                initial: 6,
                target: 6,
                hard_limit: 6
            }
        );
    }

    #[test]
    fn test_resolve_caps_hard_limit() {
        let limits = BuilderConfig::new().resolve(256);
        assert_eq!(limits.hard_limit, MAX_WORKER_THREADS);
        assert_eq!(limits.target, 10);
        assert_eq!(limits.initial, 3);
    }

    #[test]
    fn test_resolve_single_core() {
        let limits = BuilderConfig::new().resolve(1);
        assert_eq!(limits, ThreadLimits::new(1, 1, 1).unwrap());
    }

    #[test]
    fn test_explicit_max_is_not_bound_by_cores() {
        let limits = BuilderConfig::new()
            .with_initial_threads(2)
            .with_target_threads(4)
            .with_max_threads(8)
            .resolve(2);
        assert_eq!(limits, ThreadLimits::new(2, 4, 8).unwrap());
    }

    #[test]
    fn test_thread_limits_invariant() {
        assert!(ThreadLimits::new(0, 1, 1).is_err());
        assert!(ThreadLimits::new(3, 2, 4).is_err());
        assert!(ThreadLimits::new(1, 5, 4).is_err());
    }

    #[test]
    fn test_unbounded_slow_interval() {
        let policy = BuilderConfig::new()
            .with_intervals_ms(0, u64::MAX)
            .scaling_policy();
        assert_eq!(policy.quick_interval, Duration::ZERO);
        assert_eq!(policy.slow_interval, Duration::MAX);
    }
}
