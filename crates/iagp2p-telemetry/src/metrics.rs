//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters/gauges the ingest pipeline reports.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    cycles_total: IntCounter,
    cycle_failures_total: IntCounter,
    files_total: IntCounterVec,
    quarantined_total: IntCounterVec,
    last_cycle_files: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Completed ingest cycles.
    pub cycles_total: u64,
    /// Cycles that ended with an error or panic.
    pub cycle_failures_total: u64,
    /// Valid files processed during the most recent cycle.
    pub last_cycle_files: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let cycles_total = IntCounter::with_opts(Opts::new(
            "ingest_cycles_total",
            "Completed ingest cycles",
        ))
        .map_err(|source| collector("ingest_cycles_total", source))?;
        let cycle_failures_total = IntCounter::with_opts(Opts::new(
            "ingest_cycle_failures_total",
            "Ingest cycles aborted by an error or panic",
        ))
        .map_err(|source| collector("ingest_cycle_failures_total", source))?;
        let files_total = IntCounterVec::new(
            Opts::new("ingest_files_total", "Valid files processed by outcome"),
            &["outcome"],
        )
        .map_err(|source| collector("ingest_files_total", source))?;
        let quarantined_total = IntCounterVec::new(
            Opts::new("ingest_quarantined_total", "Files quarantined by reason"),
            &["reason"],
        )
        .map_err(|source| collector("ingest_quarantined_total", source))?;
        let last_cycle_files = IntGauge::with_opts(Opts::new(
            "ingest_last_cycle_files",
            "Valid files processed during the latest cycle",
        ))
        .map_err(|source| collector("ingest_last_cycle_files", source))?;

        register(&registry, "ingest_cycles_total", cycles_total.clone())?;
        register(
            &registry,
            "ingest_cycle_failures_total",
            cycle_failures_total.clone(),
        )?;
        register(&registry, "ingest_files_total", files_total.clone())?;
        register(
            &registry,
            "ingest_quarantined_total",
            quarantined_total.clone(),
        )?;
        register(&registry, "ingest_last_cycle_files", last_cycle_files.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                cycles_total,
                cycle_failures_total,
                files_total,
                quarantined_total,
                last_cycle_files,
            }),
        })
    }

    /// Increment the completed cycle counter.
    pub fn inc_cycle(&self) {
        self.inner.cycles_total.inc();
    }

    /// Increment the failed cycle counter.
    pub fn inc_cycle_failure(&self) {
        self.inner.cycle_failures_total.inc();
    }

    /// Increment the per-file outcome counter.
    pub fn inc_file_outcome(&self, outcome: &str) {
        self.inner.files_total.with_label_values(&[outcome]).inc();
    }

    /// Increment the quarantine counter for a reason.
    pub fn inc_quarantined(&self, reason: &str) {
        self.inner
            .quarantined_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record how many valid files the latest cycle processed.
    pub fn set_last_cycle_files(&self, count: usize) {
        self.inner
            .last_cycle_files
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Current value of the per-file outcome counter.
    #[must_use]
    pub fn file_outcome_count(&self, outcome: &str) -> u64 {
        self.inner.files_total.with_label_values(&[outcome]).get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the cycle counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_total: self.inner.cycles_total.get(),
            cycle_failures_total: self.inner.cycle_failures_total.get(),
            last_cycle_files: self.inner.last_cycle_files.get(),
        }
    }
}

const fn collector(metric: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricBuild { metric, source }
}

fn register<C>(registry: &Registry, metric: &'static str, collector: C) -> TelemetryResult<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricRegister { metric, source })
}
