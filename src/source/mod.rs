//! Officer-record data sources.
//!
//! The batch runner consumes the [`RecordSource`] trait and pattern-matches
//! on [`FetchError`] to decide skip-vs-rotate-vs-abort; concrete transports
//! live in submodules.

use crate::{OfficerRecord, ReportVariant};
use async_trait::async_trait;

pub mod dart;

pub use dart::DartRecordSource;

/// Fetch failure taxonomy. The distinction drives the runner's reaction:
/// quota errors rotate credentials and retry the same item, everything else
/// skips the item and moves on.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The remote side signaled that the credential's quota is spent
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Network failure, timeout, or a server-side hiccup worth skipping
    #[error("transient error: {0}")]
    Transient(String),

    /// The response arrived but could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Abstract per-cell data source: one call per (entity, year, variant).
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch officer records for one work item.
    async fn fetch(
        &self,
        credential: &str,
        corp_code: &str,
        year: i32,
        variant: ReportVariant,
    ) -> Result<Vec<OfficerRecord>, FetchError>;
}
