//! Error types for the ingestion pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that abort a run before or during setup.
///
/// Per-file problems (an unreadable manifest, a failed download attempt, a
/// corrupt candidate) are recovered locally and logged; only failures that
/// make the run itself impossible surface here.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Failed to list or read a directory.
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or create a directory.
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to construct the HTTP client.
    #[error("failed to create HTTP client: {0}")]
    ClientCreation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_failed_display() {
        let err = IngestError::ReadFailed {
            path: PathBuf::from("/data/manifest"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such directory"),
        };
        assert!(err.to_string().contains("/data/manifest"));
        assert!(err.to_string().contains("no such directory"));
    }

    #[test]
    fn test_invalid_config_display() {
        let err = IngestError::InvalidConfig("partition must be 1, 2 or 3".to_string());
        assert!(err.to_string().contains("invalid configuration"));
    }
}
