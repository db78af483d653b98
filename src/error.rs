use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a single job run.
#[derive(Error, Debug)]
pub enum JobError {
    /// Odds provider answered with a non-success status.
    #[error("odds provider {endpoint} returned {status}: {body}")]
    UpstreamRequest {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Transport or decode failure while talking to the odds provider.
    #[error("odds provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),

    /// The stored log is not a JSON object with an `entries` array.
    #[error("log {key} is corrupt: {source}")]
    LogCorrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of an object-storage backend or the local staging file.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{op} {bucket}/{key} failed ({status}): {body}")]
    Status {
        op: &'static str,
        bucket: String,
        key: String,
        status: u16,
        body: String,
    },

    #[error("{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage i/o on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage credentials unavailable: {0}")]
    Credentials(String),

    #[error("invalid storage endpoint: {0}")]
    Endpoint(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
