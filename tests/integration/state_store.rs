//! Integration tests for durable job state across runs

use super::support::{entity, make_runner, officer, selection, FnSource};
use dart_officer_monitor::pool::CredentialPool;
use dart_officer_monitor::runner::{JobStatus, ScanJob};
use dart_officer_monitor::state::{CheckpointStore, JsonCheckpointStore};
use dart_officer_monitor::ReportVariant;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_stopped_job_is_listed_as_unfinished() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let source = FnSource::new(calls, |_, _, _, _| Ok(vec![officer("Kim", "foo")]));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(source),
    );

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2020, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 2);
    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Stopped);

    let store = JsonCheckpointStore::new(dir.path()).unwrap();
    let unfinished = store.find_unfinished().unwrap();
    assert_eq!(unfinished.len(), 1);
    assert_eq!(unfinished[0].job_id, job_id);
    assert_eq!(unfinished[0].last_completed_offset, 2);
    assert_eq!(unfinished[0].matched_count, 2);
}

#[tokio::test]
async fn test_completed_job_is_not_listed() {
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
        selection(&["foo"], (2024, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);
    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);

    let store = JsonCheckpointStore::new(dir.path()).unwrap();
    assert!(store.find_unfinished().unwrap().is_empty());
}

#[tokio::test]
async fn test_state_file_carries_schema_version_and_fingerprint() {
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
        selection(&["foo"], (2024, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);
    runner.start(job, &mut pool).await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join(format!("{job_id}.json"))).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["schema_version"], "1.0.0");
    assert!(value["fingerprint"].as_str().unwrap().len() == 64);
    assert_eq!(value["status"], "completed");
    assert!(value["completed_at"].is_i64());
}

#[tokio::test]
async fn test_catalog_failure_at_start_marks_job_failed() {
    use super::support::FailingEntitySource;
    use dart_officer_monitor::catalog::EntityCatalog;
    use dart_officer_monitor::runner::BatchRunner;
    use std::time::Duration;

    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let source = FnSource::new(calls.clone(), |_, _, _, _| Ok(Vec::new()));
    let catalog = EntityCatalog::new(
        Box::new(FailingEntitySource),
        dir.path().join("corp_index.json"),
        Duration::from_secs(3600),
    );
    let runner = BatchRunner::new(dir.path())
        .unwrap()
        .with_catalog(catalog)
        .with_source(Box::new(source));

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2024, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);

    assert!(runner.start(job, &mut pool).await.is_err());
    // No record fetch was ever attempted.
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);

    let store = JsonCheckpointStore::new(dir.path()).unwrap();
    let state = store.load(&job_id).unwrap();
    assert_eq!(state.status, JobStatus::Failed);
    assert!(state.completed_at.is_some());
    // Failed jobs are not resumable and must not be listed.
    assert!(store.find_unfinished().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkpoint_offset_tracks_every_item() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let source = FnSource::new(calls, |_, _, _, _| Ok(Vec::new()));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(source),
    );

    // Stop after the first item; the checkpoint on disk must already
    // reflect it, not wait for a larger batch.
    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2020, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 1);
    runner.start(job, &mut pool).await.unwrap();

    let store = JsonCheckpointStore::new(dir.path()).unwrap();
    assert_eq!(store.load(&job_id).unwrap().last_completed_offset, 1);
}
