//! Jobs listing command

use super::run::{Cli, OutputFormat};
use super::CliError;
use crate::state::{CheckpointStore, JsonCheckpointStore};
use clap::Parser;

/// List unfinished jobs in the state directory
#[derive(Parser, Debug)]
pub struct JobsCommand {}

impl JobsCommand {
    /// Execute the jobs command.
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let store = JsonCheckpointStore::new(&cli.state_dir)?;
        let jobs = store.find_unfinished()?;

        match cli.output_format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&jobs).unwrap_or_default()
                );
            }
            OutputFormat::Human => {
                if jobs.is_empty() {
                    println!("No unfinished jobs in {}", cli.state_dir.display());
                    return Ok(());
                }
                println!(
                    "{:<38} {:<10} {:>10} {:>8}  {}",
                    "JOB ID", "STATUS", "PROCESSED", "MATCHED", "LAST UPDATE"
                );
                for job in &jobs {
                    let updated = chrono::DateTime::from_timestamp_millis(job.updated_at)
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                        .unwrap_or_else(|| job.updated_at.to_string());
                    println!(
                        "{:<38} {:<10} {:>10} {:>8}  {}",
                        job.job_id,
                        job.status.to_string(),
                        job.last_completed_offset,
                        job.matched_count,
                        updated
                    );
                }
            }
        }
        Ok(())
    }
}
