//! Scan orchestration: work queue execution with checkpoints, credential
//! rotation, and graceful stop.
//!
//! # Overview
//!
//! A scan walks the cross product of companies, business years, and report
//! variants in a fixed order, fetching officer records for each cell and
//! accumulating keyword matches durably:
//!
//! 1. **Job Creation**: validate the inputs with [`job::ScanJob`]
//! 2. **Execution**: run the job with [`executor::BatchRunner`]
//! 3. **Quota**: credentials rotate via [`crate::pool::CredentialPool`]
//! 4. **Resume**: per-item checkpoints via [`crate::state::CheckpointStore`]
//!
//! # Error Handling
//!
//! Per-item fetch failures never fail the job: quota errors rotate the
//! credential and retry the same item, transient and malformed responses
//! skip the item. Running out of credentials stops the job resumable. Only
//! infrastructure failures (state dir, lock, sink) surface as errors.

use crate::catalog::CatalogError;
use crate::pool::PoolError;
use crate::sink::SinkError;
use crate::state::StateError;

pub mod config;
pub mod executor;
pub mod job;

pub use executor::BatchRunner;
pub use job::{JobStatus, RunOutcome, ScanJob, StopReason};

/// Runner errors
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Job parameters failed validation or the job is in the wrong state
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// Company directory failure
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Checkpoint or lock failure
    #[error(transparent)]
    State(#[from] StateError),

    /// Match sink failure
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Credential pool failure
    #[error(transparent)]
    Pool(#[from] PoolError),
}
