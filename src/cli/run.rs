//! Run, resume, and validate command implementations

use crate::catalog::EntityClass;
use crate::notify::{validate_recipient, OutboxNotifier};
use crate::pool::CredentialPool;
use crate::runner::config::DEFAULT_QUOTA_CEILING;
use crate::runner::{BatchRunner, JobStatus, RunOutcome, ScanJob};
use crate::shutdown::SharedShutdown;
use crate::sink::{export_csv, JsonlResultSink, ResultSink};
use crate::state::Selection;
use crate::{KeywordSet, ReportVariant};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use super::{CliError, JobsCommand};

/// Output formats for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Officer career keyword monitor for DART periodic reports
#[derive(Parser, Debug)]
#[command(name = "dart-officer-monitor")]
#[command(about = "Scan DART officer disclosures for career keywords", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Directory for job state, locks, match files, and the directory cache
    #[arg(long, global = true, default_value = ".dart-monitor")]
    pub state_dir: PathBuf,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new scan
    Run(RunArgs),

    /// Resume a stopped scan from its checkpoint
    Resume(ResumeArgs),

    /// List unfinished jobs
    Jobs(JobsCommand),

    /// Validate scan parameters without spending quota
    Validate(ValidateArgs),
}

/// Arguments for starting a new scan
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// DART API keys in priority order, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub api_keys: Vec<String>,

    /// Career keywords to search for, comma separated
    #[arg(long)]
    pub keywords: String,

    /// Report variants (annual, half, q1, q3), comma separated
    #[arg(long, value_delimiter = ',', default_value = "annual")]
    pub variants: Vec<ReportVariant>,

    /// Company filter: listed, unlisted, or all
    #[arg(long, default_value = "listed")]
    pub listing: EntityClass,

    /// First business year (inclusive)
    #[arg(long)]
    pub start_year: i32,

    /// Last business year (inclusive)
    #[arg(long)]
    pub end_year: i32,

    /// Completion report recipient
    #[arg(long)]
    pub recipient: String,

    /// Daily call ceiling per API key
    #[arg(long, default_value_t = DEFAULT_QUOTA_CEILING)]
    pub quota_ceiling: u32,

    /// Write the accumulated matches as CSV to this path after the run
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl RunArgs {
    fn selection(&self) -> Result<Selection, CliError> {
        let keywords = KeywordSet::parse(&self.keywords)
            .map_err(CliError::InvalidArgument)?;
        Ok(Selection {
            keywords: keywords.keywords().to_vec(),
            entity_class: self.listing,
            year_start: self.start_year,
            year_end: self.end_year,
            variants: self.variants.clone(),
        })
    }

    /// Execute the run command.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let job = ScanJob::new(self.recipient.clone(), self.selection()?)?;
        let job_id = job.job_id.clone();
        let mut pool = CredentialPool::new(self.api_keys.clone(), self.quota_ceiling);

        info!(job_id = %job_id, keys = pool.len(), "starting scan");
        let runner = build_runner(cli, shutdown)?;
        let (runner, progress) = attach_progress(runner, cli.output_format);

        let outcome = runner.start(job, &mut pool).await?;
        progress.finish_and_clear();

        if let Some(path) = &self.export {
            export_matches(cli, &outcome.job_id, path)?;
        }
        print_outcome(&outcome, cli.output_format);
        Ok(())
    }
}

/// Arguments for resuming a stopped scan
#[derive(Parser, Debug)]
pub struct ResumeArgs {
    /// Job id from a previous run
    #[arg(long)]
    pub job_id: String,

    /// DART API keys in priority order, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub api_keys: Vec<String>,

    /// Daily call ceiling per API key
    #[arg(long, default_value_t = DEFAULT_QUOTA_CEILING)]
    pub quota_ceiling: u32,

    /// Write the accumulated matches as CSV to this path after the run
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl ResumeArgs {
    /// Execute the resume command.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let mut pool = CredentialPool::new(self.api_keys.clone(), self.quota_ceiling);

        info!(job_id = %self.job_id, keys = pool.len(), "resuming scan");
        let runner = build_runner(cli, shutdown)?;
        let (runner, progress) = attach_progress(runner, cli.output_format);

        let outcome = runner.resume(&self.job_id, &mut pool).await?;
        progress.finish_and_clear();

        if let Some(path) = &self.export {
            export_matches(cli, &outcome.job_id, path)?;
        }
        print_outcome(&outcome, cli.output_format);
        Ok(())
    }
}

/// Arguments for validating scan parameters
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Career keywords to search for, comma separated
    #[arg(long)]
    pub keywords: String,

    /// Report variants (annual, half, q1, q3), comma separated
    #[arg(long, value_delimiter = ',', default_value = "annual")]
    pub variants: Vec<ReportVariant>,

    /// Company filter: listed, unlisted, or all
    #[arg(long, default_value = "listed")]
    pub listing: EntityClass,

    /// First business year (inclusive)
    #[arg(long)]
    pub start_year: i32,

    /// Last business year (inclusive)
    #[arg(long)]
    pub end_year: i32,

    /// Completion report recipient
    #[arg(long)]
    pub recipient: String,
}

impl ValidateArgs {
    /// Execute the validate command. No network, no quota.
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let keywords =
            KeywordSet::parse(&self.keywords).map_err(CliError::InvalidArgument)?;
        validate_recipient(&self.recipient)?;
        if self.end_year < self.start_year {
            println!(
                "Warning: year range {}..{} is empty; a run would complete immediately",
                self.start_year, self.end_year
            );
        }
        if self.variants.is_empty() {
            println!("Warning: no report variants selected; a run would complete immediately");
        }

        match cli.output_format {
            OutputFormat::Json => {
                let summary = serde_json::json!({
                    "valid": true,
                    "keywords": keywords.keywords(),
                    "listing": self.listing.to_string(),
                    "years": [self.start_year, self.end_year],
                    "variants": self.variants.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
                    "recipient": self.recipient,
                });
                println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
            }
            OutputFormat::Human => {
                println!("Configuration valid:");
                println!("  keywords:  {}", keywords.keywords().join(", "));
                println!("  listing:   {}", self.listing);
                println!("  years:     {}..={}", self.start_year, self.end_year);
                println!(
                    "  variants:  {}",
                    self.variants
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                println!("  recipient: {}", self.recipient);
            }
        }
        Ok(())
    }
}

fn build_runner(cli: &Cli, shutdown: SharedShutdown) -> Result<BatchRunner, CliError> {
    let runner = BatchRunner::new(&cli.state_dir)?
        .with_shutdown(shutdown)
        .with_notifier(Box::new(OutboxNotifier::new(cli.state_dir.join("outbox"))));
    Ok(runner)
}

/// Attach an indicatif bar unless JSON output was requested.
fn attach_progress(runner: BatchRunner, format: OutputFormat) -> (BatchRunner, ProgressBar) {
    let bar = match format {
        OutputFormat::Json => ProgressBar::hidden(),
        OutputFormat::Human => {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .expect("hardcoded template is valid")
                    .progress_chars("#>-"),
            );
            bar.set_message("Scanning reports");
            bar
        }
    };
    let handle = bar.clone();
    let runner = runner.with_progress(Box::new(move |processed, total| {
        if handle.length() != Some(total) {
            handle.set_length(total);
        }
        handle.set_position(processed);
    }));
    (runner, bar)
}

fn export_matches(cli: &Cli, job_id: &str, path: &PathBuf) -> Result<(), CliError> {
    let sink = JsonlResultSink::open(&cli.state_dir, job_id)?;
    let csv = export_csv(&sink.all()?)?;
    std::fs::write(path, csv).map_err(|e| CliError::Io(e.to_string()))?;
    println!("Exported matches to {}", path.display());
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(outcome).unwrap_or_default()
            );
        }
        OutputFormat::Human => {
            match outcome.status {
                JobStatus::Completed => println!("Scan completed"),
                JobStatus::Stopped => {
                    let reason = outcome
                        .stop_reason
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!("Scan stopped ({reason}); resume with:");
                    println!(
                        "  dart-officer-monitor resume --job-id {} --api-keys <keys>",
                        outcome.job_id
                    );
                }
                other => println!("Scan ended: {other}"),
            }
            println!("  job id:    {}", outcome.job_id);
            println!("  processed: {}/{}", outcome.processed, outcome.total);
            println!("  matched:   {}", outcome.matched_count);
            println!("  skipped:   {}", outcome.skipped_count);
        }
    }
}
