//! Service-wide span carrying the identity of the running ingest service.
//!
//! # Design
//! - Entered once at startup; every event the service logs from the bootstrap
//!   task inherits its fields.
//! - Fields are plain values so this crate stays independent of the config model.

use std::path::Path;

use tracing::span::EnteredSpan;

use crate::init::build_sha;

/// Identity recorded on the service span.
#[derive(Debug, Clone, Copy)]
pub struct ServiceContext<'a> {
    /// Run mode, e.g. `ingest`.
    pub mode: &'a str,
    /// Landing directory being polled.
    pub source_dir: &'a Path,
    /// Number of configured agency codes.
    pub agencies: usize,
}

/// Keeps the service span entered until dropped.
pub struct ServiceSpanGuard {
    span: EnteredSpan,
}

impl ServiceSpanGuard {
    /// Create and enter the `iagp2p_service` span for `context`.
    #[must_use]
    pub fn enter(context: &ServiceContext<'_>) -> Self {
        let span = tracing::info_span!(
            "iagp2p_service",
            mode = context.mode,
            source_dir = %context.source_dir.display(),
            agencies = context.agencies,
            build_sha = build_sha(),
        )
        .entered();
        Self { span }
    }

    /// Metadata name of the entered span, when a subscriber enabled it.
    #[must_use]
    pub fn span_name(&self) -> Option<&'static str> {
        self.span.metadata().map(tracing::Metadata::name)
    }
}
