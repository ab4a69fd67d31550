//! Integration tests for work queue enumeration order and edge cases

use super::support::{entity, make_runner, selection, FnSource};
use dart_officer_monitor::pool::CredentialPool;
use dart_officer_monitor::runner::{JobStatus, ScanJob};
use dart_officer_monitor::ReportVariant;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[tokio::test]
async fn test_enumeration_is_entity_major_then_year_then_variant() {
    let dir = TempDir::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicU64::new(0));
    let source = {
        let seen = seen.clone();
        FnSource::new(calls, move |_, corp_code, year, variant| {
            seen.lock()
                .unwrap()
                .push((corp_code.to_string(), year, variant));
            Ok(Vec::new())
        })
    };
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001"), entity("B", "Beta", "")],
        Box::new(source),
    );

    let variants = [ReportVariant::HalfYear, ReportVariant::Annual];
    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["kw"], (2023, 2024), &variants),
    )
    .unwrap();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);

    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.processed, 8);

    let seen = seen.lock().unwrap();
    let expected: Vec<(String, i32, ReportVariant)> = [
        ("A", 2023, ReportVariant::HalfYear),
        ("A", 2023, ReportVariant::Annual),
        ("A", 2024, ReportVariant::HalfYear),
        ("A", 2024, ReportVariant::Annual),
        ("B", 2023, ReportVariant::HalfYear),
        ("B", 2023, ReportVariant::Annual),
        ("B", 2024, ReportVariant::HalfYear),
        ("B", 2024, ReportVariant::Annual),
    ]
    .iter()
    .map(|(c, y, v)| (c.to_string(), *y, *v))
    .collect();
    assert_eq!(*seen, expected);
}

#[tokio::test]
async fn test_empty_variant_selection_completes_without_calls() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let source = FnSource::new(calls.clone(), |_, _, _, _| Ok(Vec::new()));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(source),
    );

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["kw"], (2023, 2024), &[]),
    )
    .unwrap();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);

    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.total, 0);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_inverted_year_range_completes_without_calls() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let source = FnSource::new(calls.clone(), |_, _, _, _| Ok(Vec::new()));
    let runner = make_runner(
        dir.path(),
        vec![entity("A", "Alpha", "000001")],
        Box::new(source),
    );

    let job = ScanJob::new(
        "user@example.com".to_string(),
        selection(&["kw"], (2024, 2023), &[ReportVariant::Annual]),
    )
    .unwrap();
    let mut pool = CredentialPool::new(vec!["key".to_string()], 100);

    let outcome = runner.start(job, &mut pool).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.total, 0);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}
