//! CLI command implementations

pub mod error;
pub mod jobs;
pub mod run;

pub use error::CliError;
pub use jobs::JobsCommand;
pub use run::{Cli, Commands, OutputFormat, ResumeArgs, RunArgs, ValidateArgs};
