//! Batch runner: drives the work queue against the record source.

use crate::catalog::{filter_entities, DartEntitySource, EntityCatalog};
use crate::enumerate::WorkQueue;
use crate::notify::{Attachment, Notifier};
use crate::pool::{CredentialPool, PoolError};
use crate::runner::config::{CATALOG_CACHE_TTL, CHECKPOINT_INTERVAL_ITEMS, PROGRESS_LOG_INTERVAL};
use crate::runner::{JobStatus, RunOutcome, RunnerError, ScanJob, StopReason};
use crate::shutdown::SharedShutdown;
use crate::sink::{export_csv, JsonlResultSink, ResultSink};
use crate::source::{DartRecordSource, FetchError, RecordSource};
use crate::state::{CheckpointStore, JobLock, JobState, JsonCheckpointStore};
use crate::{KeywordSet, MatchRecord};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Progress callback: (items processed, total items).
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Orchestrates a scan end to end: directory load, enumeration, fetch,
/// match, durable accumulation, checkpointing, and the completion report.
pub struct BatchRunner {
    catalog: EntityCatalog,
    source: Box<dyn RecordSource>,
    store: Box<dyn CheckpointStore>,
    state_dir: PathBuf,
    notifier: Option<Box<dyn Notifier>>,
    shutdown: Option<SharedShutdown>,
    checkpoint_interval: u64,
    on_progress: Option<ProgressFn>,
}

impl BatchRunner {
    /// Runner with production defaults, persisting under `state_dir`.
    pub fn new<P: Into<PathBuf>>(state_dir: P) -> Result<Self, RunnerError> {
        let state_dir = state_dir.into();
        let store = JsonCheckpointStore::new(&state_dir)?;
        let catalog = EntityCatalog::new(
            Box::new(DartEntitySource::new()),
            state_dir.join("corp_index.json"),
            CATALOG_CACHE_TTL,
        );
        Ok(Self {
            catalog,
            source: Box::new(DartRecordSource::new()),
            store: Box::new(store),
            state_dir,
            notifier: None,
            shutdown: None,
            checkpoint_interval: CHECKPOINT_INTERVAL_ITEMS,
            on_progress: None,
        })
    }

    /// Replace the company directory catalog.
    pub fn with_catalog(mut self, catalog: EntityCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the record source.
    pub fn with_source(mut self, source: Box<dyn RecordSource>) -> Self {
        self.source = source;
        self
    }

    /// Attach a completion report channel.
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Override the checkpoint interval (in work items, minimum 1).
    pub fn with_checkpoint_interval(mut self, items: u64) -> Self {
        self.checkpoint_interval = items.max(1);
        self
    }

    /// Attach a progress callback invoked after every completed work item.
    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Start a new scan from offset zero.
    pub async fn start(
        &self,
        job: ScanJob,
        pool: &mut CredentialPool,
    ) -> Result<RunOutcome, RunnerError> {
        if pool.is_empty() {
            return Err(RunnerError::InvalidJob(
                "credential pool is empty".to_string(),
            ));
        }
        let _lock = JobLock::try_acquire(&self.state_dir, &job.job_id)?;

        let keywords = KeywordSet::new(job.selection.keywords.clone());
        let mut state = JobState::new(job.job_id, job.recipient, job.selection);
        self.store.save(&state)?;

        // A directory failure at start aborts before any quota is spent,
        // and the job is not resumable: there is no offset to honor yet.
        let queue = match self.build_queue(pool, &state.selection).await {
            Ok(queue) => queue,
            Err(e) => {
                state.status = JobStatus::Failed;
                state.touch();
                state.completed_at = Some(state.updated_at);
                if let Err(save_err) = self.store.save(&state) {
                    warn!(job_id = %state.job_id, error = %save_err, "failed to persist failed status");
                }
                return Err(e);
            }
        };

        state.status = JobStatus::Running;
        state.touch();
        self.store.save(&state)?;

        let mut sink = JsonlResultSink::open(&self.state_dir, &state.job_id)?;
        self.run_queue(state, &queue, pool, &mut sink, &keywords)
            .await
    }

    /// Resume a previously stopped (or crashed) scan from its checkpoint.
    pub async fn resume(
        &self,
        job_id: &str,
        pool: &mut CredentialPool,
    ) -> Result<RunOutcome, RunnerError> {
        if pool.is_empty() {
            return Err(RunnerError::InvalidJob(
                "credential pool is empty".to_string(),
            ));
        }
        let _lock = JobLock::try_acquire(&self.state_dir, job_id)?;

        let mut state = self.store.load(job_id)?;
        state.verify_fingerprint()?;
        if state.status.is_terminal() {
            return Err(RunnerError::InvalidJob(format!(
                "job {job_id} is already {}",
                state.status
            )));
        }

        let keywords = KeywordSet::new(state.selection.keywords.clone());
        let queue = self.build_queue(pool, &state.selection).await?;
        if state.last_completed_offset > queue.len() as u64 {
            // The company directory shrank underneath the checkpoint; the
            // offset no longer addresses the items it was written against.
            return Err(RunnerError::InvalidJob(format!(
                "checkpoint offset {} exceeds queue length {}",
                state.last_completed_offset,
                queue.len()
            )));
        }

        let mut sink = JsonlResultSink::open(&self.state_dir, job_id)?;
        // The sink is the durable truth for the match count.
        state.matched_count = sink.matched_count();

        state.status = JobStatus::Running;
        state.touch();
        self.store.save(&state)?;
        info!(
            job_id,
            offset = state.last_completed_offset,
            matched = state.matched_count,
            "resuming scan"
        );

        self.run_queue(state, &queue, pool, &mut sink, &keywords)
            .await
    }

    /// Load the directory, apply the listing filter, and enumerate.
    async fn build_queue(
        &self,
        pool: &mut CredentialPool,
        selection: &crate::state::Selection,
    ) -> Result<WorkQueue, RunnerError> {
        // Directory downloads are not counted against the daily quota.
        let entities = self.catalog.load(pool.current().token()).await?;
        let entities = filter_entities(&entities, selection.entity_class);
        Ok(WorkQueue::build(
            entities,
            selection.year_start,
            selection.year_end,
            &selection.variants,
        ))
    }

    async fn run_queue(
        &self,
        mut state: JobState,
        queue: &WorkQueue,
        pool: &mut CredentialPool,
        sink: &mut dyn ResultSink,
        keywords: &KeywordSet,
    ) -> Result<RunOutcome, RunnerError> {
        let total = queue.len() as u64;
        info!(
            job_id = %state.job_id,
            total,
            offset = state.last_completed_offset,
            "scan running"
        );

        while state.last_completed_offset < total {
            if let Some(shutdown) = &self.shutdown {
                if shutdown.is_shutdown_requested() {
                    return self.stop(state, StopReason::Cancelled, total);
                }
            }

            if let Err(e) = pool.ensure_available() {
                match e {
                    PoolError::Exhausted => {
                        return self.stop(state, StopReason::PoolExhausted, total)
                    }
                    other => return Err(other.into()),
                }
            }
            let token = pool.current().token().to_string();

            let item = queue
                .get(state.last_completed_offset as usize)
                .ok_or_else(|| {
                    RunnerError::InvalidJob(format!(
                        "offset {} out of bounds",
                        state.last_completed_offset
                    ))
                })?;

            match self
                .source
                .fetch(&token, &item.entity.corp_code, item.year, item.variant)
                .await
            {
                Ok(records) => {
                    pool.record_usage(1)?;
                    for record in records {
                        let matched_keywords = keywords.matches(&record.career);
                        if matched_keywords.is_empty() {
                            continue;
                        }
                        let matched = MatchRecord {
                            corp_code: item.entity.corp_code.clone(),
                            corp_name: item.entity.corp_name.clone(),
                            stock_code: item.entity.stock_code.clone(),
                            year: item.year,
                            variant: item.variant,
                            officer_name: record.name,
                            title: record.title,
                            career: record.career,
                            matched_keywords,
                        };
                        sink.append(&matched)?;
                        state.matched_count += 1;
                        debug!(
                            corp = %matched.corp_name,
                            officer = %matched.officer_name,
                            "keyword match"
                        );
                    }
                }
                Err(FetchError::QuotaExceeded(msg)) => {
                    // Remote is authoritative; zero the local counter and
                    // retry the same item with the next credential.
                    warn!(
                        offset = state.last_completed_offset,
                        %msg,
                        "remote quota exceeded, rotating credential"
                    );
                    pool.mark_exhausted();
                    continue;
                }
                Err(e) => {
                    warn!(
                        offset = state.last_completed_offset,
                        corp_code = %item.entity.corp_code,
                        year = item.year,
                        error = %e,
                        "skipping work item"
                    );
                    pool.record_usage(1)?;
                    state.skipped_count += 1;
                }
            }

            state.last_completed_offset += 1;
            if state.last_completed_offset % self.checkpoint_interval == 0
                || state.last_completed_offset == total
            {
                state.touch();
                self.store.save(&state)?;
            }
            if state.last_completed_offset % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    job_id = %state.job_id,
                    processed = state.last_completed_offset,
                    total,
                    matched = state.matched_count,
                    "scan progress"
                );
            }
            if let Some(on_progress) = &self.on_progress {
                on_progress(state.last_completed_offset, total);
            }
        }

        state.status = JobStatus::Completed;
        state.touch();
        state.completed_at = Some(state.updated_at);
        self.store.save(&state)?;
        info!(
            job_id = %state.job_id,
            matched = state.matched_count,
            skipped = state.skipped_count,
            "scan completed"
        );

        self.report(&state, sink).await;

        Ok(RunOutcome {
            job_id: state.job_id,
            status: JobStatus::Completed,
            stop_reason: None,
            processed: state.last_completed_offset,
            total,
            matched_count: state.matched_count,
            skipped_count: state.skipped_count,
        })
    }

    /// Persist the interrupted state; the job stays resumable.
    fn stop(
        &self,
        mut state: JobState,
        reason: StopReason,
        total: u64,
    ) -> Result<RunOutcome, RunnerError> {
        state.status = JobStatus::Stopped;
        state.touch();
        self.store.save(&state)?;
        warn!(
            job_id = %state.job_id,
            reason = %reason,
            processed = state.last_completed_offset,
            total,
            "scan stopped"
        );
        Ok(RunOutcome {
            job_id: state.job_id,
            status: JobStatus::Stopped,
            stop_reason: Some(reason),
            processed: state.last_completed_offset,
            total,
            matched_count: state.matched_count,
            skipped_count: state.skipped_count,
        })
    }

    /// Best-effort completion report. Failures are logged, never retried,
    /// and never change the job outcome.
    async fn report(&self, state: &JobState, sink: &dyn ResultSink) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let subject = format!("Officer scan {} completed", state.job_id);
        let body = format!(
            "Scan completed with {} matches across {} work items ({} skipped).",
            state.matched_count, state.last_completed_offset, state.skipped_count
        );
        let attachments = if state.matched_count > 0 {
            match sink.all().and_then(|records| export_csv(&records)) {
                Ok(csv) => vec![Attachment {
                    filename: format!("{}-matches.csv", state.job_id),
                    content: csv,
                }],
                Err(e) => {
                    warn!(error = %e, "failed to render CSV attachment");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        if let Err(e) = notifier
            .send(&state.recipient, &subject, &body, &attachments)
            .await
        {
            warn!(recipient = %state.recipient, error = %e, "completion report delivery failed");
        }
    }
}
