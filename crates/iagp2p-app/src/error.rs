//! # Design
//!
//! - Centralize application-level errors for bootstrap and the ingest loop.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration was missing.
    #[error("missing environment configuration")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: &'static str,
    },
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: iagp2p_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: iagp2p_telemetry::TelemetryError,
    },
    /// Ingest pipeline operations failed.
    #[error("ingest operation failed")]
    Ingest {
        /// Operation identifier.
        operation: &'static str,
        /// Source ingest error.
        source: iagp2p_ingest::IngestError,
    },
    /// Descriptor output setup failed.
    #[error("torrent operation failed")]
    Torrent {
        /// Operation identifier.
        operation: &'static str,
        /// Source torrent error.
        source: iagp2p_torrent::TorrentError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: iagp2p_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: iagp2p_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn ingest(
        operation: &'static str,
        source: iagp2p_ingest::IngestError,
    ) -> Self {
        Self::Ingest { operation, source }
    }

    pub(crate) const fn torrent(
        operation: &'static str,
        source: iagp2p_torrent::TorrentError,
    ) -> Self {
        Self::Torrent { operation, source }
    }
}
