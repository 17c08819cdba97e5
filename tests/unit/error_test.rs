//! Tests for error types

use std::error::Error;
use std::io;

use anyhow::Context;
use chunk_build_scheduler::core::{
    AppResult, BuildError, BuildTask, CancellationToken, SchedulerError,
};

#[test]
fn test_stopped_error() {
    let err = SchedulerError::Stopped;
    assert_eq!(format!("{}", err), "executor is stopped");
}

#[test]
fn test_lifecycle_violation_error() {
    let err = SchedulerError::LifecycleViolation("2 worker threads are still alive".to_string());
    assert_eq!(
        format!("{}", err),
        "lifecycle violation: 2 worker threads are still alive"
    );
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("per_worker_queue_limit must be greater than 0".into());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: per_worker_queue_limit must be greater than 0"
    );
}

#[test]
fn test_no_active_session_error() {
    assert_eq!(
        SchedulerError::NoActiveSession.to_string(),
        "no active build session"
    );
}

#[test]
fn test_spawn_error_keeps_source() {
    let err = SchedulerError::Spawn(io::Error::other("thread limit reached"));
    assert_eq!(
        format!("{}", err),
        "failed to spawn worker thread: thread limit reached"
    );
    assert!(err.source().is_some());
}

#[test]
fn test_build_errors() {
    assert_eq!(BuildError::Cancelled.to_string(), "task was cancelled");
    assert_eq!(
        BuildError::MissingResult.to_string(),
        "no result was produced by the task"
    );
    assert_eq!(
        BuildError::Panicked("index out of bounds".into()).to_string(),
        "task panicked: index out of bounds"
    );
    assert!(!BuildError::Task(anyhow::anyhow!("io")).is_cancelled());
}

struct DecodeSection {
    palette: Vec<u8>,
}

impl BuildTask<(), u8> for DecodeSection {
    fn perform(&mut self, _: &mut (), _: &CancellationToken) -> AppResult<Option<u8>> {
        let first = self.palette.first().context("section palette is empty")?;
        Ok(Some(*first))
    }
}

#[test]
fn test_task_errors_carry_context() {
    let token = CancellationToken::new();
    let mut ok = DecodeSection { palette: vec![4, 2] };
    assert_eq!(ok.perform(&mut (), &token).unwrap(), Some(4));

    let mut empty = DecodeSection { palette: Vec::new() };
    let err = BuildError::Task(empty.perform(&mut (), &token).unwrap_err());
    assert_eq!(err.to_string(), "task failed: section palette is empty");
}

#[test]
fn test_error_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SchedulerError>();
    assert_send_sync::<BuildError>();
}
