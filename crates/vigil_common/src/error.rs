//! Error types for fetching and caching agent output.
//!
//! All of these are recoverable: a failed fetch or a broken cache entry
//! degrades to a severity classification for that one host, it never
//! aborts the collection cycle.

use std::time::Duration;
use thiserror::Error;

/// A fetch attempt against one host's agent failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("agent did not respond within {0:?}")]
    ConnectTimeout(Duration),

    #[error("connection refused by agent")]
    ConnectionRefused,

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed agent payload: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Collapse an I/O error into the taxonomy, pulling out the cases the
    /// exit spec distinguishes.
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => FetchError::ConnectionRefused,
            _ => FetchError::Io(err),
        }
    }
}

/// A cache read or write failed.
///
/// Read failures are treated as a cache miss by the caller; write failures
/// are logged and the fetched payload is still handed upward uncached.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to read cache entry for {host}: {reason}")]
    Read { host: String, reason: String },

    #[error("failed to write cache entry for {host}: {reason}")]
    Write { host: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn refused_io_error_is_promoted() {
        let err = FetchError::from_io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(matches!(err, FetchError::ConnectionRefused));
    }

    #[test]
    fn other_io_errors_stay_io() {
        let err = FetchError::from_io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(matches!(err, FetchError::Io(_)));
    }
}
