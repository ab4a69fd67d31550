//! # DART Officer Career Monitor
//!
//! A batch enumeration engine for the Korean DART open-data API. Given a
//! cartesian product of (company, business year, report variant), it calls
//! the rate-limited officer-status endpoint for each combination, filters
//! returned records against a keyword set, and accumulates matches into a
//! durable, resumable report.
//!
//! ## Features
//!
//! - **Resumable batch jobs**: per-item checkpointing and durable match
//!   storage survive process restarts; a stopped job continues from its
//!   last completed offset
//! - **Multi-credential quota handling**: an ordered credential pool with
//!   daily quota windows rotates keys on exhaustion instead of failing
//! - **Deterministic enumeration**: the work queue supports random access
//!   by offset, so a resume addresses exactly the items a fresh run would
//! - **Partial-failure tolerance**: a transient error on one work item is
//!   skipped and counted, never fatal to the job
//!
//! ## Quick Start
//!
//! ```no_run
//! use dart_officer_monitor::catalog::EntityClass;
//! use dart_officer_monitor::pool::CredentialPool;
//! use dart_officer_monitor::runner::{BatchRunner, ScanJob};
//! use dart_officer_monitor::state::Selection;
//! use dart_officer_monitor::ReportVariant;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let selection = Selection {
//!     keywords: vec!["삼일".to_string()],
//!     entity_class: EntityClass::Listed,
//!     year_start: 2023,
//!     year_end: 2024,
//!     variants: vec![ReportVariant::Annual],
//! };
//! let job = ScanJob::new("analyst@example.com".to_string(), selection)?;
//!
//! let mut pool = CredentialPool::new(vec!["my-api-key".to_string()], 20_000);
//! let runner = BatchRunner::new(".dart-monitor")?;
//! let outcome = runner.start(job, &mut pool).await?;
//! println!("{} matches", outcome.matched_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`pool`] - credential pool with time-windowed quota budgets
//! - [`catalog`] - cached, filterable company directory
//! - [`enumerate`] - deterministic work queue construction
//! - [`runner`] - the batch runner state machine (the core)
//! - [`state`] - durable job checkpoint store
//! - [`sink`] - append-only match record sinks and CSV export
//! - [`source`] - officer-record data source
//! - [`notify`] - end-of-job notification contract

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Entity directory loading and filtering
pub mod catalog;

/// CLI command implementations
pub mod cli;

/// Deterministic work queue enumeration
pub mod enumerate;

/// End-of-job notification contract
pub mod notify;

/// Credential pool with quota windows
pub mod pool;

/// Batch runner state machine
pub mod runner;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Match record sinks and export
pub mod sink;

/// Officer record data sources
pub mod source;

/// Durable job checkpoint store
pub mod state;

/// One enumerable company in the external directory.
///
/// Identity is `corp_code`; entities are immutable once loaded from the
/// catalog. An empty `stock_code` marks an unlisted company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// DART corporation code (8 digits)
    pub corp_code: String,
    /// Display name
    pub corp_name: String,
    /// Stock ticker; empty for unlisted companies
    #[serde(default)]
    pub stock_code: String,
}

impl Entity {
    /// Whether the entity carries a listing marker.
    pub fn is_listed(&self) -> bool {
        !self.stock_code.is_empty()
    }
}

/// Periodic report variant, mapped to DART `reprt_code` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportVariant {
    /// First-quarter report (11013)
    #[serde(rename = "q1")]
    FirstQuarter,
    /// Half-year report (11012)
    #[serde(rename = "half")]
    HalfYear,
    /// Third-quarter report (11014)
    #[serde(rename = "q3")]
    ThirdQuarter,
    /// Annual business report (11011)
    #[serde(rename = "annual")]
    Annual,
}

impl ReportVariant {
    /// The wire code DART expects in the `reprt_code` parameter.
    pub fn reprt_code(&self) -> &'static str {
        match self {
            ReportVariant::FirstQuarter => "11013",
            ReportVariant::HalfYear => "11012",
            ReportVariant::ThirdQuarter => "11014",
            ReportVariant::Annual => "11011",
        }
    }
}

impl std::fmt::Display for ReportVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReportVariant::FirstQuarter => "q1",
            ReportVariant::HalfYear => "half",
            ReportVariant::ThirdQuarter => "q3",
            ReportVariant::Annual => "annual",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ReportVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "q1" | "11013" => Ok(ReportVariant::FirstQuarter),
            "half" | "11012" => Ok(ReportVariant::HalfYear),
            "q3" | "11014" => Ok(ReportVariant::ThirdQuarter),
            "annual" | "11011" => Ok(ReportVariant::Annual),
            _ => Err(format!("Invalid report variant: {s}")),
        }
    }
}

/// One officer row as returned by the record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerRecord {
    /// Officer name
    pub name: String,
    /// Position title
    pub title: String,
    /// Free-text career field the keyword predicate runs against
    pub career: String,
}

/// One officer record whose career field satisfied the keyword predicate.
///
/// Append-only; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Corporation code of the source entity
    pub corp_code: String,
    /// Corporation display name
    pub corp_name: String,
    /// Stock ticker; empty for unlisted companies
    pub stock_code: String,
    /// Business year of the source report
    pub year: i32,
    /// Report variant of the source report
    pub variant: ReportVariant,
    /// Officer name
    pub officer_name: String,
    /// Position title
    pub title: String,
    /// The career text that matched
    pub career: String,
    /// All keywords found in the career text, in declaration order
    pub matched_keywords: Vec<String>,
}

/// An ordered set of search keywords with a substring match predicate.
///
/// Matching is a plain `contains` check: case-sensitive, not tokenized,
/// not fuzzy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    /// Build from an ordered keyword list. Blank entries are dropped and
    /// duplicates keep their first position.
    pub fn new(keywords: Vec<String>) -> Self {
        let mut seen: Vec<String> = Vec::new();
        for kw in keywords {
            let kw = kw.trim().to_string();
            if !kw.is_empty() && !seen.contains(&kw) {
                seen.push(kw);
            }
        }
        Self { keywords: seen }
    }

    /// Parse a comma-separated keyword list.
    pub fn parse(input: &str) -> Result<Self, String> {
        let set = Self::new(input.split(',').map(str::to_string).collect());
        if set.keywords.is_empty() {
            return Err("keyword list is empty".to_string());
        }
        Ok(set)
    }

    /// All keywords contained in `text`, in declaration order.
    pub fn matches(&self, text: &str) -> Vec<String> {
        self.keywords
            .iter()
            .filter(|kw| text.contains(kw.as_str()))
            .cloned()
            .collect()
    }

    /// The keywords in declaration order.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}
