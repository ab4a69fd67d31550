//! Scan job specification and status tracking

use super::RunnerError;
use crate::notify::validate_recipient;
use crate::state::Selection;
use crate::KeywordSet;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created but not yet started
    Pending,
    /// A runner currently owns (or crashed while owning) the job
    Running,
    /// All work items processed
    Completed,
    /// Interrupted with progress intact; resumable
    Stopped,
    /// Aborted on an unrecoverable error
    Failed,
}

impl JobStatus {
    /// Whether the job can never make further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Stopped => "stopped",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a run stopped short of completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Shutdown was requested (Ctrl+C or programmatic)
    Cancelled,
    /// Every credential in the pool ran out of quota
    PoolExhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Cancelled => "cancelled",
            StopReason::PoolExhausted => "pool exhausted",
        };
        f.write_str(s)
    }
}

/// Validated specification for a new scan.
#[derive(Debug, Clone)]
pub struct ScanJob {
    /// Unique job identity, generated at creation
    pub job_id: String,
    /// Completion report recipient
    pub recipient: String,
    /// Filter parameters the work queue derives from
    pub selection: Selection,
}

impl ScanJob {
    /// Validate the inputs and mint a job id.
    ///
    /// Rejects a malformed recipient and an effectively empty keyword list.
    /// An empty variant list is allowed; the job completes immediately.
    pub fn new(recipient: String, selection: Selection) -> Result<Self, RunnerError> {
        validate_recipient(&recipient).map_err(|e| RunnerError::InvalidJob(e.to_string()))?;
        if KeywordSet::new(selection.keywords.clone()).keywords().is_empty() {
            return Err(RunnerError::InvalidJob(
                "keyword list is empty".to_string(),
            ));
        }
        Ok(Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            recipient,
            selection,
        })
    }
}

/// Final accounting of one run (initial or resumed).
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Job identity
    pub job_id: String,
    /// Status the job ended this run in
    pub status: JobStatus,
    /// Set when `status` is [`JobStatus::Stopped`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Work items fully processed across all runs of this job
    pub processed: u64,
    /// Total work items in the queue
    pub total: u64,
    /// Match records accumulated across all runs
    pub matched_count: u64,
    /// Work items skipped on per-item errors
    pub skipped_count: u64,
}
