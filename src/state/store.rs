//! Job state persistence with atomic writes and schema versioning.

use crate::catalog::EntityClass;
use crate::runner::JobStatus;
use crate::ReportVariant;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current job state schema version
const SCHEMA_VERSION: &str = "1.0.0";

/// Checkpoint store errors
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Lock error (another runner owns this job)
    #[error("lock error: {0}")]
    Lock(String),

    /// No state file for the requested job id
    #[error("job not found: {0}")]
    NotFound(String),

    /// Schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// The persisted selection no longer matches its fingerprint; the
    /// checkpoint offset would address different work items
    #[error("selection fingerprint mismatch for job {job_id}")]
    SelectionMismatch {
        /// Affected job id
        job_id: String,
    },
}

/// The filter/selection parameters a job was started with.
///
/// Resume re-derives the work queue from this exact value; the fingerprint
/// detects any drift that would invalidate the checkpoint offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Keywords in declaration order
    pub keywords: Vec<String>,
    /// Listing-marker filter
    pub entity_class: EntityClass,
    /// First business year (inclusive)
    pub year_start: i32,
    /// Last business year (inclusive)
    pub year_end: i32,
    /// Report variants in declaration order
    pub variants: Vec<ReportVariant>,
}

impl Selection {
    /// SHA-256 over the canonical JSON encoding.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).expect("selection serializes");
        let digest = Sha256::digest(&json);
        format!("{digest:x}")
    }
}

/// Durable record of a job's identity, progress, and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    schema_version: String,
    /// Job identity
    pub job_id: String,
    /// Report recipient
    pub recipient: String,
    /// Current status
    pub status: JobStatus,
    /// The selection the work queue derives from
    pub selection: Selection,
    /// Fingerprint of `selection` at job creation
    pub fingerprint: String,
    /// Work items fully processed so far
    pub last_completed_offset: u64,
    /// Match records accumulated so far
    pub matched_count: u64,
    /// Work items skipped on per-item errors
    pub skipped_count: u64,
    /// Creation timestamp (Unix millis)
    pub created_at: i64,
    /// Last checkpoint timestamp (Unix millis)
    pub updated_at: i64,
    /// Completion timestamp, set on terminal states
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl JobState {
    /// Fresh state for a newly created job.
    pub fn new(job_id: String, recipient: String, selection: Selection) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let fingerprint = selection.fingerprint();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            job_id,
            recipient,
            status: JobStatus::Pending,
            selection,
            fingerprint,
            last_completed_offset: 0,
            matched_count: 0,
            skipped_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Stamp `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    /// Verify the persisted selection still matches its fingerprint.
    pub fn verify_fingerprint(&self) -> Result<(), StateError> {
        if self.selection.fingerprint() != self.fingerprint {
            return Err(StateError::SelectionMismatch {
                job_id: self.job_id.clone(),
            });
        }
        Ok(())
    }
}

/// One line in a job listing.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    /// Job identity
    pub job_id: String,
    /// Report recipient
    pub recipient: String,
    /// Last known status
    pub status: JobStatus,
    /// Work items fully processed
    pub last_completed_offset: u64,
    /// Matches accumulated
    pub matched_count: u64,
    /// Last checkpoint timestamp (Unix millis)
    pub updated_at: i64,
}

impl From<&JobState> for JobSummary {
    fn from(state: &JobState) -> Self {
        Self {
            job_id: state.job_id.clone(),
            recipient: state.recipient.clone(),
            status: state.status,
            last_completed_offset: state.last_completed_offset,
            matched_count: state.matched_count,
            updated_at: state.updated_at,
        }
    }
}

/// External durable record of job identity, status, and offset.
pub trait CheckpointStore: Send + Sync {
    /// Persist the full state, overwriting any previous checkpoint.
    fn save(&self, state: &JobState) -> Result<(), StateError>;

    /// Load the state for `job_id`.
    fn load(&self, job_id: &str) -> Result<JobState, StateError>;

    /// List jobs whose last known status is resumable.
    fn find_unfinished(&self) -> Result<Vec<JobSummary>, StateError>;

    /// Overwrite only the status of an existing job.
    fn update_status(&self, job_id: &str, status: JobStatus) -> Result<(), StateError>;
}

/// File-per-job JSON checkpoint store.
pub struct JsonCheckpointStore {
    dir: PathBuf,
}

impl JsonCheckpointStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self, StateError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StateError::Io(e.to_string()))?;
        Ok(Self { dir })
    }

    /// The directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{job_id}.json"))
    }
}

impl CheckpointStore for JsonCheckpointStore {
    /// Atomic write: serialize to a temp file in the same directory, fsync,
    /// then rename over the target, so a crash never leaves a torn state
    /// file behind.
    fn save(&self, state: &JobState) -> Result<(), StateError> {
        let path = self.state_path(&state.job_id);
        debug!(
            job_id = %state.job_id,
            offset = state.last_completed_offset,
            status = ?state.status,
            "saving job checkpoint"
        );

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StateError::Serialization(e.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| StateError::Io(format!("failed to create temp file: {e}")))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| StateError::Io(format!("failed to write temp file: {e}")))?;
        temp.flush()
            .map_err(|e| StateError::Io(format!("failed to flush temp file: {e}")))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StateError::Io(format!("failed to sync temp file: {e}")))?;
        temp.persist(&path)
            .map_err(|e| StateError::Io(format!("failed to persist state file: {e}")))?;

        // Fsync the directory so the rename itself is durable.
        if let Ok(dir) = std::fs::File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        Ok(())
    }

    fn load(&self, job_id: &str) -> Result<JobState, StateError> {
        let path = self.state_path(job_id);
        if !path.exists() {
            return Err(StateError::NotFound(job_id.to_string()));
        }
        let contents =
            std::fs::read_to_string(&path).map_err(|e| StateError::Io(e.to_string()))?;
        let state: JobState = serde_json::from_str(&contents).map_err(|e| {
            warn!(job_id, error = %e, "failed to deserialize job state");
            StateError::Deserialization(e.to_string())
        })?;
        if state.schema_version != SCHEMA_VERSION {
            return Err(StateError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: state.schema_version,
            });
        }
        Ok(state)
    }

    fn find_unfinished(&self) -> Result<Vec<JobSummary>, StateError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StateError::Io(e.to_string()))?;
        let mut unfinished = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StateError::Io(e.to_string()))?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(stem) {
                Ok(state) if state.status == JobStatus::Stopped => {
                    unfinished.push(JobSummary::from(&state));
                }
                Ok(_) => {}
                Err(e) => {
                    // A foreign or corrupt file in the state dir is not a
                    // reason to hide every other job.
                    warn!(path = %path.display(), error = %e, "skipping unreadable state file");
                }
            }
        }
        unfinished.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(unfinished)
    }

    fn update_status(&self, job_id: &str, status: JobStatus) -> Result<(), StateError> {
        let mut state = self.load(job_id)?;
        state.status = status;
        state.touch();
        if status.is_terminal() {
            state.completed_at = Some(state.updated_at);
        }
        info!(job_id, status = ?status, "updated job status");
        self.save(&state)
    }
}
