//! Typed error taxonomy for the orchestration core.
//!
//! Callers at the crate boundary match on variants to decide retry policy;
//! the core itself never retries and never swallows a failure silently.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the orchestration core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A download link did not match the nxm:// grammar. Never retried.
    #[error("malformed download link: {0}")]
    MalformedLink(String),

    /// Transport-level failure talking to the metadata service.
    #[error("network error: {0}")]
    Network(String),

    /// The metadata service throttled us (HTTP 429).
    #[error("rate limited by the metadata service")]
    RateLimit,

    /// Credentials were rejected by the metadata service (HTTP 401/403).
    #[error("authentication rejected by the metadata service")]
    Auth,

    /// The requested resource does not exist (yet). Not necessarily fatal.
    #[error("not found: {0}")]
    NotFound(String),

    /// The deployment engine reported a failure. Fatal to the current
    /// removal batch; blocks any file deletion.
    #[error("deployment failed: {0}")]
    Deployment(String),

    /// A per-item file-system failure. Collected and reported in aggregate,
    /// does not abort sibling items.
    #[error("file system error on {path:?}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An update check for this game context is already in flight.
    #[error("update check already running for '{0}'")]
    UpdateCheckRunning(String),
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
