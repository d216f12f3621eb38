//! # Design
//!
//! - Provide structured, constant-message errors for the ingest pipeline.
//! - Capture operation context (paths, fields, inputs) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for ingest operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors produced by the ingest pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// IO failures while interacting with the filesystem.
    #[error("ingest io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory listing failures.
    #[error("ingest walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Directory being listed.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// A move refused to replace an existing file.
    #[error("ingest destination already exists")]
    DestinationExists {
        /// Operation that found the destination occupied.
        operation: &'static str,
        /// Occupied destination path.
        path: PathBuf,
    },
    /// Input validation failures.
    #[error("ingest invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The descriptor builder rejected an archived file.
    #[error("descriptor build failed")]
    DescriptorBuild {
        /// Name of the archived file.
        file: String,
        /// Underlying builder failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl IngestError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wrap a builder-specific failure for the archived file `file`.
    pub fn descriptor_build(
        file: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::DescriptorBuild {
            file: file.into(),
            source: source.into(),
        }
    }
}
