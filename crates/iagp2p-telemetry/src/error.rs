//! # Design
//!
//! - Constant messages; the failing metric or log format travels as a field.
//! - Prometheus and subscriber errors stay reachable through `source()`.

use std::string::FromUtf8Error;

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::init::LogFormat;

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Failures while wiring logging or the ingest metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Format that was being installed.
        format: LogFormat,
        /// Underlying subscriber error.
        source: TryInitError,
    },
    /// A collector definition was rejected.
    #[error("failed to build ingest metric")]
    MetricBuild {
        /// Metric name.
        metric: &'static str,
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// A collector clashed with one already in the registry.
    #[error("failed to register ingest metric")]
    MetricRegister {
        /// Metric name.
        metric: &'static str,
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// The text exposition could not be encoded.
    #[error("failed to encode ingest metrics")]
    MetricsEncode {
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// The encoded exposition was not UTF-8.
    #[error("ingest metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Underlying conversion error.
        source: FromUtf8Error,
    },
}
