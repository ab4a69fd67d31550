//! Integration tests for credential rotation and quota exhaustion

use super::support::{entity, make_runner, officer, selection, FnSource};
use dart_officer_monitor::pool::CredentialPool;
use dart_officer_monitor::runner::{JobStatus, ScanJob, StopReason};
use dart_officer_monitor::source::FetchError;
use dart_officer_monitor::state::{CheckpointStore, JsonCheckpointStore};
use dart_officer_monitor::ReportVariant;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[tokio::test]
async fn test_exhausted_pool_stops_job_resumable() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let source = FnSource::new(calls.clone(), |_, _, _, _| Ok(Vec::new()));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(source),
    );

    // 3 work items, 2 credentials with 1 call each: the third item finds
    // the pool dry and the job must stop, not fail.
    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["kw"], (2022, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    let mut pool = CredentialPool::new(vec!["key1".to_string(), "key2".to_string()], 1);

    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Stopped);
    assert_eq!(outcome.stop_reason, Some(StopReason::PoolExhausted));
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.total, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let store = JsonCheckpointStore::new(dir.path()).unwrap();
    let state = store.load(&job_id).unwrap();
    assert_eq!(state.status, JobStatus::Stopped);
    assert_eq!(state.last_completed_offset, 2);
}

#[tokio::test]
async fn test_remote_quota_error_rotates_and_retries_same_item() {
    let dir = TempDir::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicU64::new(0));
    let source = {
        let seen = seen.clone();
        FnSource::new(calls, move |credential, _, year, _| {
            seen.lock().unwrap().push((credential.to_string(), year));
            if credential == "key1" {
                Err(FetchError::QuotaExceeded("status 020".to_string()))
            } else {
                Ok(vec![officer("Kim", "foo")])
            }
        })
    };
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(source),
    );

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2024, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let mut pool = CredentialPool::new(vec!["key1".to_string(), "key2".to_string()], 100);

    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.matched_count, 1);
    assert_eq!(outcome.skipped_count, 0);

    // Same work item, first with the rejected key and then the next one.
    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![("key1".to_string(), 2024), ("key2".to_string(), 2024)]
    );
}

#[tokio::test]
async fn test_transient_and_malformed_errors_skip_the_item() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let source = FnSource::new(calls, |_, _, year, _| match year {
        2022 => Err(FetchError::Transient("timeout".to_string())),
        2023 => Err(FetchError::Malformed("status 999".to_string())),
        _ => Ok(vec![officer("Kim", "foo")]),
    });
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(source),
    );

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2022, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);

    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.processed, 3);
    assert_eq!(outcome.skipped_count, 2);
    assert_eq!(outcome.matched_count, 1);
}

#[tokio::test]
async fn test_empty_pool_is_rejected_up_front() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let source = FnSource::new(calls, |_, _, _, _| Ok(Vec::new()));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(source),
    );

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["kw"], (2024, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let mut pool = CredentialPool::new(Vec::new(), 100);

    assert!(runner.start(job, &mut pool).await.is_err());
}
