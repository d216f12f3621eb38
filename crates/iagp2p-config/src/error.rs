//! Error types for configuration loading.
//!
//! # Design
//! - Keep messages constant; the offending key and value travel as fields.
//! - Preserve IO sources so callers can report the underlying failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration source failed.
    #[error("configuration io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A key contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Key that failed validation.
        field: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A required key was absent or empty.
    #[error("missing configuration field")]
    MissingField {
        /// Name of the missing key.
        field: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        field: impl Into<String>,
        reason: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason,
            value: Some(value.into()),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
