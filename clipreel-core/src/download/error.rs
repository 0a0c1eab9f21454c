use std::path::PathBuf;

use thiserror::Error;

use crate::resolver::ResolveError;

/// Failure of a single download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("invalid media url {0}")]
    InvalidUrl(String),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("re-resolution failed: {0}")]
    Resolve(#[from] ResolveError),
}

impl From<reqwest::Error> for DownloadError {
    fn from(error: reqwest::Error) -> Self {
        DownloadError::Network(error.to_string())
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;

/// Terminal, per-clip failure. Never aborts the run.
#[derive(Debug, Error)]
pub enum ClipFailure {
    #[error("clip {clip_id}: {source}")]
    Resolution {
        clip_id: String,
        #[source]
        source: ResolveError,
    },
    #[error("clip {clip_id}: download failed after {attempts} attempt(s): {source}")]
    Download {
        clip_id: String,
        attempts: u32,
        #[source]
        source: DownloadError,
    },
    #[error("clip {clip_id}: download task aborted: {reason}")]
    Aborted { clip_id: String, reason: String },
}

impl ClipFailure {
    pub fn clip_id(&self) -> &str {
        match self {
            ClipFailure::Resolution { clip_id, .. }
            | ClipFailure::Download { clip_id, .. }
            | ClipFailure::Aborted { clip_id, .. } => clip_id,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ClipFailure::Resolution { .. } => 0,
            ClipFailure::Download { attempts, .. } => *attempts,
            ClipFailure::Aborted { .. } => 0,
        }
    }
}
