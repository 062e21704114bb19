use lyrisync_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the command line front end
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read lyrics file {path}: {source}")]
    ReadLyrics {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to serialize timeline: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to watch lyrics file: {0}")]
    Watch(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, CliError>;
