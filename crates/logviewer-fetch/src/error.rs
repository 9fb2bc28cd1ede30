//! Error types for logviewer-fetch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid source '{0}'")]
    InvalidSource(String),

    #[error("source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("download of {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("invalid SHA-256 digest '{0}'")]
    InvalidChecksum(String),

    #[error("max retries exceeded ({count} attempts): {last}")]
    MaxRetriesExceeded { count: u32, last: Box<Error> },

    #[error("cannot write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot start the transfer runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl Error {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
