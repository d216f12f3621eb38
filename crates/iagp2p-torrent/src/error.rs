//! Error types for metainfo generation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for metainfo operations.
pub type TorrentResult<T> = Result<T, TorrentError>;

/// Errors produced while hashing, encoding or writing metainfo.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// IO failures while reading archived content or writing descriptors.
    #[error("torrent io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Malformed input or an unrepresentable value.
    #[error("torrent invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl TorrentError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: Option<String>) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value,
        }
    }
}
