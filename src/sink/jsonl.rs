//! Append-only JSONL sink backing a job's accumulated matches.

use super::{ResultSink, SinkError};
use crate::MatchRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One JSON-encoded match record per line, flushed and synced per append so
/// a record is on disk before the work item that produced it is checkpointed.
pub struct JsonlResultSink {
    path: PathBuf,
    file: File,
    count: u64,
}

impl JsonlResultSink {
    /// Open (or create) the sink for `job_id` under `dir`.
    ///
    /// On reopen the existing line count is recovered so `matched_count`
    /// continues from where the previous run left off.
    pub fn open(dir: &Path, job_id: &str) -> Result<Self, SinkError> {
        std::fs::create_dir_all(dir).map_err(|e| SinkError::Io(e.to_string()))?;
        let path = dir.join(format!("{job_id}.matches.jsonl"));

        let count = if path.exists() {
            let reader = BufReader::new(
                File::open(&path).map_err(|e| SinkError::Io(e.to_string()))?,
            );
            reader.lines().filter_map(Result::ok).count() as u64
        } else {
            0
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::Io(e.to_string()))?;

        debug!(path = %path.display(), recovered = count, "opened match sink");
        Ok(Self { path, file, count })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonlResultSink {
    fn append(&mut self, record: &MatchRecord) -> Result<(), SinkError> {
        let mut line =
            serde_json::to_vec(record).map_err(|e| SinkError::Serialization(e.to_string()))?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .map_err(|e| SinkError::Io(e.to_string()))?;
        self.file
            .sync_data()
            .map_err(|e| SinkError::Io(e.to_string()))?;
        self.count += 1;
        Ok(())
    }

    fn all(&self) -> Result<Vec<MatchRecord>, SinkError> {
        let reader = BufReader::new(
            File::open(&self.path).map_err(|e| SinkError::Io(e.to_string()))?,
        );
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| SinkError::Io(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // A torn trailing line from an interrupted write is
                    // tolerable; anything mid-file is not.
                    warn!(path = %self.path.display(), error = %e, "skipping malformed match line");
                }
            }
        }
        Ok(records)
    }

    fn matched_count(&self) -> u64 {
        self.count
    }
}
