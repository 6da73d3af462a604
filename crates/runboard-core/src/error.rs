//! Error types for runboard-core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunboardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid page request: page {page}, size {page_size} (both must be at least 1)")]
    InvalidPage { page: usize, page_size: usize },

    #[error("Poller has been stopped")]
    PollerStopped,

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Unknown step status '{0}' (expected one of: incomplete, running, completed, failed, uncacheable)")]
    UnknownStatus(String),
}

pub type Result<T> = std::result::Result<T, RunboardError>;
