//! Tests for configuration validation and resolution

use chunk_build_scheduler::config::{
    default_target_threads, BuilderConfig, ThreadLimits, DEFAULT_PER_WORKER_QUEUE_LIMIT,
    MAX_WORKER_THREADS,
};
use chunk_build_scheduler::core::ChunkBuilder;

#[test]
fn test_default_config_is_valid() {
    let cfg = BuilderConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.per_worker_queue_limit, DEFAULT_PER_WORKER_QUEUE_LIMIT);
    assert_eq!(cfg.thread_name_prefix, "chunk-builder");
    assert_eq!(cfg.thread_stack_size, None);
}

#[test]
fn test_invalid_queue_limit() {
    let cfg = BuilderConfig::new().with_per_worker_queue_limit(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_stack_size() {
    let cfg = BuilderConfig::new().with_thread_stack_size(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_thread_prefix() {
    let cfg = BuilderConfig::new().with_thread_name_prefix("   ");
    assert!(cfg.validate().is_err());
}

#[test]
fn test_out_of_order_explicit_counts_are_clamped() {
    let cfg = BuilderConfig::new()
        .with_initial_threads(6)
        .with_target_threads(4)
        .with_max_threads(8);
    assert!(cfg.validate().is_ok());
    let builder = ChunkBuilder::<(), u32>::with_logical_cores(cfg, 16).unwrap();
    assert_eq!(builder.limits(), ThreadLimits::new(4, 4, 8).unwrap());

    let cfg = BuilderConfig::new()
        .with_initial_threads(2)
        .with_target_threads(6)
        .with_max_threads(4);
    assert!(cfg.validate().is_ok());
    let builder = ChunkBuilder::<(), u32>::with_logical_cores(cfg, 16).unwrap();
    assert_eq!(builder.limits(), ThreadLimits::new(2, 4, 4).unwrap());
}

#[test]
fn test_resolved_limits_are_ordered() {
    for cores in [1, 2, 3, 4, 6, 8, 12, 16, 24, 32, 64, 128] {
        for render_distance in [2, 8, 12, 32, 64] {
            let limits = BuilderConfig::new()
                .with_render_distance(render_distance)
                .resolve(cores);
            assert!(limits.initial >= 1, "cores={cores}");
            assert!(limits.initial <= limits.target, "cores={cores}");
            assert!(limits.target <= limits.hard_limit, "cores={cores}");
            assert!(limits.hard_limit <= MAX_WORKER_THREADS, "cores={cores}");
            assert_eq!(limits.target, default_target_threads(cores).min(limits.hard_limit));
        }
    }
}

#[test]
fn test_explicit_counts_win() {
    let limits = BuilderConfig::new()
        .with_initial_threads(3)
        .with_target_threads(5)
        .with_max_threads(7)
        .resolve(16);
    assert_eq!(limits, ThreadLimits::new(3, 5, 7).unwrap());
}

#[test]
fn test_from_json_fills_defaults() {
    let cfg = BuilderConfig::from_json_str(
        r#"{ "initial_threads": 2, "target_threads": 4, "max_threads": 8, "slow_interval_ms": 18446744073709551615 }"#,
    )
    .unwrap();
    assert_eq!(cfg.initial_threads, 2);
    assert_eq!(cfg.slow_interval_ms, u64::MAX);
    assert_eq!(cfg.quick_interval_ms, BuilderConfig::default().quick_interval_ms);
    assert_eq!(cfg.resolve(1), ThreadLimits::new(2, 4, 8).unwrap());
}

#[test]
fn test_from_json_rejects_invalid() {
    assert!(BuilderConfig::from_json_str("{ not json").is_err());
    assert!(BuilderConfig::from_json_str(r#"{ "per_worker_queue_limit": 0 }"#).is_err());
}

#[test]
fn test_config_round_trips_through_json() {
    let cfg = BuilderConfig::new()
        .with_render_distance(24)
        .with_thread_stack_size(4 << 20);
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(BuilderConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_from_env_overrides_defaults() {
    std::env::set_var("CHUNK_BUILDER_TARGET_THREADS", "3");
    std::env::set_var("CHUNK_BUILDER_MAX_THREADS", " 6 ");
    std::env::set_var("CHUNK_BUILDER_THREAD_NAME_PREFIX", "mesher");
    let cfg = BuilderConfig::from_env().unwrap();
    assert_eq!(cfg.target_threads, 3);
    assert_eq!(cfg.max_threads, 6);
    assert_eq!(cfg.thread_name_prefix, "mesher");

    std::env::set_var("CHUNK_BUILDER_MAX_THREADS", "many");
    let err = BuilderConfig::from_env().unwrap_err();
    assert!(err.starts_with("CHUNK_BUILDER_MAX_THREADS"), "{err}");

    for suffix in ["TARGET_THREADS", "MAX_THREADS", "THREAD_NAME_PREFIX"] {
        std::env::remove_var(format!("CHUNK_BUILDER_{suffix}"));
    }
}
