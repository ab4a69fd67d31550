//! Scan configuration constants

use std::time::Duration;

/// Default daily call ceiling per credential.
/// DART grants 20,000 calls per key per day, resetting at midnight KST.
/// The local counter is conservative; the remote side remains authoritative
/// and corrects drift through quota-exceeded responses.
pub const DEFAULT_QUOTA_CEILING: u32 = 20_000;

/// Checkpoint interval in work items.
/// Match records are appended to the durable sink before their work item is
/// checkpointed, so a checkpoint that lags behind the sink would replay
/// items on resume and duplicate their matches. One checkpoint per item
/// keeps the two files in lockstep; each item already costs a network round
/// trip, so the extra write is not the bottleneck.
pub const CHECKPOINT_INTERVAL_ITEMS: u64 = 1;

/// How long a cached company directory stays fresh.
/// The directory changes rarely (listings and renames), and refetching it
/// costs a multi-megabyte download per run. One day matches the quota
/// window cadence.
pub const CATALOG_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Log a progress line every N completed work items.
/// 50 items is a few seconds of wall time at typical API latency, frequent
/// enough to show liveness without flooding the log.
pub const PROGRESS_LOG_INTERVAL: u64 = 50;
