//! Integration tests for checkpoint resume behavior

use super::support::{entity, make_runner, officer, selection, FnSource};
use dart_officer_monitor::pool::CredentialPool;
use dart_officer_monitor::runner::{JobStatus, RunnerError, ScanJob, StopReason};
use dart_officer_monitor::shutdown::ShutdownCoordinator;
use dart_officer_monitor::sink::{JsonlResultSink, ResultSink};
use dart_officer_monitor::state::JobLock;
use dart_officer_monitor::ReportVariant;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Source yielding one distinct match per year, so duplicates are visible.
fn per_year_source(calls: Arc<AtomicU64>) -> FnSource {
    FnSource::new(calls, |_, _, year, _| {
        Ok(vec![officer(&format!("Kim-{year}"), "foo career")])
    })
}

#[tokio::test]
async fn test_cancelled_run_resumes_without_duplicate_matches() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();

    // First run: request shutdown during the second fetch, so the scan
    // stops before the third of five items.
    let calls = Arc::new(AtomicU64::new(0));
    let source = {
        let shutdown = shutdown.clone();
        let calls = calls.clone();
        FnSource::new(calls.clone(), move |_, _, year, _| {
            if calls.load(Ordering::SeqCst) == 2 {
                shutdown.request_shutdown();
            }
            Ok(vec![officer(&format!("Kim-{year}"), "foo career")])
        })
    };
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(source),
    )
    .with_shutdown(shutdown);

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2020, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);

    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Stopped);
    assert_eq!(outcome.stop_reason, Some(StopReason::Cancelled));
    assert_eq!(outcome.processed, 2);

    // Second run: same state dir, fresh runner, no shutdown.
    let resume_calls = Arc::new(AtomicU64::new(0));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(per_year_source(resume_calls.clone())),
    );
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);
    let outcome = runner.resume(&job_id, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.processed, 5);
    assert_eq!(outcome.matched_count, 5);
    // Only the three unprocessed items were fetched again.
    assert_eq!(resume_calls.load(Ordering::SeqCst), 3);

    // The accumulated matches equal those of an uninterrupted run: one per
    // year, in order, no replays.
    let sink = JsonlResultSink::open(dir.path(), &job_id).unwrap();
    let names: Vec<String> = sink
        .all()
        .unwrap()
        .into_iter()
        .map(|m| m.officer_name)
        .collect();
    assert_eq!(
        names,
        vec!["Kim-2020", "Kim-2021", "Kim-2022", "Kim-2023", "Kim-2024"]
    );
}

#[tokio::test]
async fn test_resume_rejects_selection_drift() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(per_year_source(calls)),
    );

    // Stop the job by exhausting a one-call pool.
    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2020, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 1);
    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Stopped);

    // Tamper with the persisted selection behind the fingerprint's back.
    let state_path = dir.path().join(format!("{job_id}.json"));
    let mut state: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    state["selection"]["year_end"] = serde_json::json!(2030);
    std::fs::write(&state_path, serde_json::to_string_pretty(&state).unwrap()).unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(per_year_source(calls)),
    );
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);
    let err = runner.resume(&job_id, &mut pool).await.unwrap_err();
    assert!(matches!(err, RunnerError::State(_)), "got: {err}");
}

#[tokio::test]
async fn test_resume_rejects_completed_job() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(per_year_source(calls)),
    );

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2024, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);
    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);

    let calls = Arc::new(AtomicU64::new(0));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(per_year_source(calls)),
    );
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);
    let err = runner.resume(&job_id, &mut pool).await.unwrap_err();
    assert!(matches!(err, RunnerError::InvalidJob(_)), "got: {err}");
}

#[tokio::test]
async fn test_resume_refuses_while_lock_is_held() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(per_year_source(calls)),
    );

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2020, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 1);
    runner.start(job, &mut pool).await.unwrap();

    let _held = JobLock::try_acquire(dir.path(), &job_id).unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(per_year_source(calls)),
    );
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);
    let err = runner.resume(&job_id, &mut pool).await.unwrap_err();
    assert!(matches!(err, RunnerError::State(_)), "got: {err}");
}

#[tokio::test]
async fn test_resume_rejects_checkpoint_beyond_shrunken_queue() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001"), entity("B", "Beta", "000002")],
        Box::new(per_year_source(calls)),
    );

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["foo"], (2020, 2024), &[ReportVariant::Annual]),
    )
    .unwrap();
    let job_id = job.job_id.clone();
    // 10 items total; 6 calls leave the checkpoint past a one-entity queue.
    let mut pool = CredentialPool::new(vec!["key".to_string()], 6);
    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Stopped);
    assert_eq!(outcome.processed, 6);

    // Resume against a directory that lost an entity. The cached copy has
    // to be dropped for the smaller directory to be visible.
    std::fs::remove_file(dir.path().join("corp_index.json")).unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(per_year_source(calls)),
    );
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);
    let err = runner.resume(&job_id, &mut pool).await.unwrap_err();
    assert!(matches!(err, RunnerError::InvalidJob(_)), "got: {err}");
}
