//! Tests for pool growth decisions

use std::time::Duration;

use chunk_build_scheduler::config::{BuilderConfig, ThreadLimits};
use chunk_build_scheduler::core::{PoolScaler, ScaleDecision, ScalingPolicy};

fn scaler(slow: Duration) -> PoolScaler {
    PoolScaler::new(
        ThreadLimits::new(2, 4, 8).unwrap(),
        ScalingPolicy {
            quick_interval: Duration::ZERO,
            slow_interval: slow,
        },
    )
}

#[test]
fn test_ramp_to_target_then_stall() {
    let s = scaler(Duration::MAX);
    let tick = Duration::from_millis(1);
    let mut live = 2;
    while s.decide(live, tick) == ScaleDecision::Grow {
        live += 1;
    }
    assert_eq!(live, 4);
    assert_eq!(s.decide(live, Duration::from_secs(3600)), ScaleDecision::Wait);
}

#[test]
fn test_slow_growth_up_to_hard_limit() {
    let s = scaler(Duration::from_secs(10));
    let mut live = 4;
    while s.decide(live, Duration::from_secs(11)) == ScaleDecision::Grow {
        live += 1;
    }
    assert_eq!(live, 8);
    assert_eq!(s.decide(live, Duration::from_secs(11)), ScaleDecision::AtLimit);
}

#[test]
fn test_zero_elapsed_never_grows() {
    let s = scaler(Duration::ZERO);
    assert_eq!(s.decide(2, Duration::ZERO), ScaleDecision::Wait);
    assert_eq!(s.decide(5, Duration::ZERO), ScaleDecision::Wait);
}

#[test]
fn test_interval_selection() {
    let s = scaler(Duration::from_secs(10));
    assert_eq!(s.interval_for(3), Duration::ZERO);
    assert_eq!(s.interval_for(4), Duration::from_secs(10));
    assert_eq!(s.interval_for(7), Duration::from_secs(10));
}

#[test]
fn test_policy_from_config() {
    let cfg = BuilderConfig::new().with_intervals_ms(250, 5_000);
    let s = PoolScaler::new(cfg.resolve(8), cfg.scaling_policy());
    assert_eq!(s.policy().quick_interval, Duration::from_millis(250));
    assert_eq!(s.policy().slow_interval, Duration::from_secs(5));
}

#[test]
fn test_default_policy() {
    let policy = ScalingPolicy::default();
    assert_eq!(policy, BuilderConfig::default().scaling_policy());
}
