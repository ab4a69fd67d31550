//! DART officer-status record source.
//!
//! One GET against `exctvSttus.json` per work item. DART wraps every
//! response in a `{status, message}` envelope; the envelope status is the
//! authoritative error signal, not the HTTP status line.

use super::{FetchError, RecordSource};
use crate::{OfficerRecord, ReportVariant};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://opendart.fss.or.kr";
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Envelope status: normal response with a record list.
const STATUS_OK: &str = "000";
/// Envelope status: query was valid but matched no data.
const STATUS_NO_DATA: &str = "013";
/// Envelope statuses for spent per-key or per-query quotas.
const STATUS_QUOTA: [&str; 2] = ["020", "021"];
/// Envelope status: scheduled maintenance; retryable on a later run.
const STATUS_MAINTENANCE: &str = "800";

/// Record source backed by the DART officer-status endpoint.
pub struct DartRecordSource {
    client: reqwest::Client,
    base_url: String,
}

impl DartRecordSource {
    /// Create a source against the production DART host.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a source against a custom host (tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for DartRecordSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    list: Vec<OfficerRow>,
}

#[derive(Debug, Deserialize)]
struct OfficerRow {
    #[serde(default)]
    nm: String,
    #[serde(default)]
    ofcps: String,
    #[serde(default)]
    main_career: String,
}

/// Map a parsed envelope onto the fetch taxonomy.
fn classify_envelope(envelope: Envelope) -> Result<Vec<OfficerRecord>, FetchError> {
    match envelope.status.as_str() {
        STATUS_OK => Ok(envelope
            .list
            .into_iter()
            .map(|row| OfficerRecord {
                name: row.nm,
                title: row.ofcps,
                career: row.main_career,
            })
            .collect()),
        STATUS_NO_DATA => Ok(Vec::new()),
        s if STATUS_QUOTA.contains(&s) => Err(FetchError::QuotaExceeded(format!(
            "{s}: {}",
            envelope.message
        ))),
        STATUS_MAINTENANCE => Err(FetchError::Transient(format!(
            "{}: {}",
            envelope.status, envelope.message
        ))),
        s => Err(FetchError::Malformed(format!("{s}: {}", envelope.message))),
    }
}

#[async_trait]
impl RecordSource for DartRecordSource {
    async fn fetch(
        &self,
        credential: &str,
        corp_code: &str,
        year: i32,
        variant: ReportVariant,
    ) -> Result<Vec<OfficerRecord>, FetchError> {
        let url = format!("{}/api/exctvSttus.json", self.base_url);
        debug!(corp_code, year, variant = %variant, "fetching officer status");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("crtfc_key", credential),
                ("corp_code", corp_code),
                ("bsns_year", &year.to_string()),
                ("reprt_code", variant.reprt_code()),
            ])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(FetchError::QuotaExceeded(format!("HTTP {status}")));
        }
        if status.is_server_error() {
            return Err(FetchError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Malformed(format!("HTTP {status}")));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        classify_envelope(envelope)
    }
}
