//! Durable accumulation of match records and CSV export.

use crate::MatchRecord;

pub mod jsonl;

pub use jsonl::JsonlResultSink;

/// Result sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(String),
}

/// Destination for match records.
///
/// Appends must be durable before the caller checkpoints the work item that
/// produced them; otherwise a resume would replay the item and duplicate
/// its matches.
pub trait ResultSink: Send {
    /// Append one match record.
    fn append(&mut self, record: &MatchRecord) -> Result<(), SinkError>;

    /// All records accumulated so far, in append order.
    fn all(&self) -> Result<Vec<MatchRecord>, SinkError>;

    /// Number of records accumulated so far.
    fn matched_count(&self) -> u64;
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<MatchRecord>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultSink for MemorySink {
    fn append(&mut self, record: &MatchRecord) -> Result<(), SinkError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn all(&self) -> Result<Vec<MatchRecord>, SinkError> {
        Ok(self.records.clone())
    }

    fn matched_count(&self) -> u64 {
        self.records.len() as u64
    }
}

/// Render match records as a CSV document.
///
/// Matched keywords are joined with commas inside a single quoted field.
pub fn export_csv(records: &[MatchRecord]) -> Result<Vec<u8>, SinkError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "corp_name",
            "stock_code",
            "officer_name",
            "title",
            "career",
            "matched_keywords",
            "year",
            "report",
        ])
        .map_err(|e| SinkError::Csv(e.to_string()))?;

    for record in records {
        let keywords = record.matched_keywords.join(",");
        let year = record.year.to_string();
        let report = record.variant.to_string();
        writer
            .write_record([
                record.corp_name.as_str(),
                record.stock_code.as_str(),
                record.officer_name.as_str(),
                record.title.as_str(),
                record.career.as_str(),
                keywords.as_str(),
                year.as_str(),
                report.as_str(),
            ])
            .map_err(|e| SinkError::Csv(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| SinkError::Csv(e.to_string()))
}
