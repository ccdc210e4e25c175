//! Error types

use crate::models::ModelSource;
use std::time::Duration;
use thiserror::Error;

/// Engine-level errors surfaced to registry callers
///
/// Per-source and per-record failures never show up here; they are absorbed
/// into reduced results plus a log entry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Source '{0}' cannot be discovered")]
    UnknownSource(ModelSource),

    #[error("No adapter configured for source '{0}'")]
    SourceNotConfigured(ModelSource),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Failure of a single source adapter
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hub request failed: {0}")]
    Hub(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}
