//! CLI error types and conversions

use crate::catalog::CatalogError;
use crate::notify::NotifyError;
use crate::runner::RunnerError;
use crate::sink::SinkError;
use crate::state::StateError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Runner error
    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),

    /// State error
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Catalog error
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Sink error
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Notification error
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}
