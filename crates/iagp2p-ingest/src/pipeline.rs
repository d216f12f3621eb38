//! One ingest cycle: classify, quarantine, stage, describe.
//!
//! # Design
//! - Every per-file failure is recorded and the batch continues; a panicking
//!   descriptor builder counts as that file's build failure.
//! - Progress lives on disk: an archived file whose source still exists is
//!   re-described next cycle without another copy.
//! - Descriptor failures are retried forever unless a retry limit is configured.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, Utc};
use iagp2p_config::IngestConfig;
use iagp2p_telemetry::Metrics;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::archive::ArchiveStager;
use crate::classify::{FileClassifier, Partitioned, snapshot_directory};
use crate::descriptor::DescriptorBuilder;
use crate::error::{IngestError, IngestResult};
use crate::model::{
    ArchiveRecord, CycleReport, Descriptor, FailureKind, FileCandidate, SummaryResult,
};
use crate::order::order_chronologically;
use crate::quarantine::{ErrorQuarantine, QuarantineOutcome, QuarantineStatus};

const HEALTH_COMPONENT: &str = "ingest";
const DESCRIPTOR_BUILT: &str = "descriptor_built";

/// Runs ingest cycles against the configured directories.
pub struct PipelineRunner {
    source_dir: PathBuf,
    classifier: FileClassifier,
    stager: ArchiveStager,
    quarantine: ErrorQuarantine,
    builder: Arc<dyn DescriptorBuilder>,
    metrics: Metrics,
    retry_limit: Option<u32>,
    descriptor_failures: Mutex<HashMap<String, u32>>,
    health_degraded: Mutex<bool>,
}

impl PipelineRunner {
    /// Runner over the directories and agencies in `config`.
    #[must_use]
    pub fn new(
        config: &IngestConfig,
        builder: Arc<dyn DescriptorBuilder>,
        metrics: Metrics,
    ) -> Self {
        Self {
            source_dir: config.source_dir.clone(),
            classifier: FileClassifier::new(config.agencies.clone()),
            stager: ArchiveStager::new(config.archive_dir.clone()),
            quarantine: ErrorQuarantine::new(config.error_dir.clone()),
            builder,
            metrics,
            retry_limit: config.descriptor_retry_limit,
            descriptor_failures: Mutex::new(HashMap::new()),
            health_degraded: Mutex::new(false),
        }
    }

    /// Create the source, archive and error directories when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when any directory cannot be created.
    pub fn prepare(&self) -> IngestResult<()> {
        for dir in [
            self.source_dir.as_path(),
            self.stager.archive_dir(),
            self.quarantine.error_dir(),
        ] {
            fs::create_dir_all(dir)
                .map_err(|source| IngestError::io("pipeline.prepare", dir, source))?;
        }
        Ok(())
    }

    /// Whether the last cycle recorded any failure.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        *self.lock_health_flag()
    }

    /// Run a single cycle over the current directory contents.
    ///
    /// # Errors
    ///
    /// Returns an error only when the source directory cannot be listed;
    /// per-file failures are reported in the returned [`CycleReport`].
    pub fn run_cycle(&self) -> IngestResult<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("ingest_cycle", cycle_id = %cycle_id);
        let _entered = span.enter();
        let mut report = CycleReport::new(cycle_id, Utc::now());

        let snapshot = match snapshot_directory(&self.source_dir) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.mark_degraded("source directory listing failed");
                return Err(err);
            }
        };
        self.prune_failures(&snapshot.iter().map(|file| file.name.as_str()).collect());

        let Partitioned { valid, invalid } = self.classifier.partition(snapshot);
        for entry in invalid {
            report.quarantined.push(self.quarantine_file(
                &entry.candidate,
                entry.reason,
                &entry.diagnostic,
            ));
        }

        for file in order_chronologically(valid) {
            let result = self.process_valid(&file, &mut report);
            report.summary.push(file.name, result);
        }

        for line in report.summary.render_lines(Local::now()) {
            info!("{line}");
        }

        self.metrics.inc_cycle();
        self.metrics.set_last_cycle_files(report.summary.len());
        if report.has_failures() {
            self.mark_degraded("ingest cycle recorded failures");
        } else {
            self.mark_recovered();
        }
        Ok(report)
    }

    fn process_valid(&self, file: &FileCandidate, report: &mut CycleReport) -> SummaryResult {
        let record = match self.stager.stage(file) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, file = %file.name, "failed to stage file into archive");
                return self.failed(FailureKind::CopyToArchiveFailure);
            }
        };

        match self.build_contained(&record) {
            Ok(descriptor) => {
                self.clear_failures(&file.name);
                remove_source(file);
                info!(
                    file = %file.name,
                    descriptor = %descriptor.name,
                    fingerprint = descriptor.fingerprint.as_deref().unwrap_or(""),
                    freshly_copied = record.freshly_copied,
                    "descriptor built"
                );
                self.metrics.inc_file_outcome(DESCRIPTOR_BUILT);
                SummaryResult::Descriptor(descriptor.name)
            }
            Err(err) => {
                let attempts = self.record_failure(&file.name);
                warn!(
                    error = %err,
                    file = %file.name,
                    attempts,
                    "descriptor build failed; source kept for retry"
                );
                if let Some(limit) = self.retry_limit
                    && attempts >= limit
                {
                    let diagnostic = format!("Descriptor build failed after {attempts} attempts");
                    let outcome =
                        self.quarantine_file(file, FailureKind::DescriptorBuildFailure, &diagnostic);
                    if outcome.status.succeeded() || outcome.status.vanished() {
                        self.clear_failures(&file.name);
                    }
                    report.quarantined.push(outcome);
                }
                self.failed(FailureKind::DescriptorBuildFailure)
            }
        }
    }

    /// Run the builder for one file; a panic becomes that file's build failure.
    fn build_contained(&self, record: &ArchiveRecord) -> IngestResult<Descriptor> {
        panic::catch_unwind(AssertUnwindSafe(|| self.builder.build(record))).unwrap_or_else(
            |payload| {
                let detail = panic_detail(payload.as_ref());
                error!(file = %record.file_name, detail, "descriptor builder panicked");
                Err(IngestError::descriptor_build(
                    record.file_name.clone(),
                    format!("descriptor builder panicked: {detail}"),
                ))
            },
        )
    }

    fn failed(&self, kind: FailureKind) -> SummaryResult {
        self.metrics.inc_file_outcome(kind.as_str());
        SummaryResult::Failed(kind)
    }

    fn quarantine_file(
        &self,
        file: &FileCandidate,
        reason: FailureKind,
        diagnostic: &str,
    ) -> QuarantineOutcome {
        let status = self.quarantine.quarantine(file, diagnostic);
        match &status {
            QuarantineStatus::Moved(record) => {
                self.metrics.inc_quarantined(reason.as_str());
                if record.sidecar_path.is_none() && !diagnostic.is_empty() {
                    self.metrics
                        .inc_file_outcome(FailureKind::SidecarWriteFailure.as_str());
                }
            }
            QuarantineStatus::Failed(_) => {
                self.metrics
                    .inc_file_outcome(FailureKind::QuarantineMoveFailure.as_str());
            }
            QuarantineStatus::Vanished => {}
        }
        QuarantineOutcome {
            file_name: file.name.clone(),
            reason,
            status,
        }
    }

    fn record_failure(&self, name: &str) -> u32 {
        let mut ledger = self.lock_failures();
        let attempts = ledger.entry(name.to_string()).or_insert(0);
        *attempts = attempts.saturating_add(1);
        *attempts
    }

    fn clear_failures(&self, name: &str) {
        self.lock_failures().remove(name);
    }

    fn prune_failures(&self, present: &HashSet<&str>) {
        self.lock_failures()
            .retain(|name, _| present.contains(name.as_str()));
    }

    fn mark_degraded(&self, detail: &str) {
        let mut guard = self.lock_health_flag();
        if *guard {
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "ingest pipeline still degraded"
            );
        } else {
            *guard = true;
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "ingest pipeline degraded"
            );
        }
    }

    fn mark_recovered(&self) {
        let mut guard = self.lock_health_flag();
        if std::mem::take(&mut *guard) {
            drop(guard);
            info!(component = HEALTH_COMPONENT, "ingest pipeline recovered");
        }
    }

    fn lock_health_flag(&self) -> MutexGuard<'_, bool> {
        match self.health_degraded.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("ingest health mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    fn lock_failures(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        match self.descriptor_failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("descriptor failure ledger poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn remove_source(file: &FileCandidate) {
    match fs::remove_file(&file.path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(
                error = %err,
                file = %file.name,
                "failed to remove source after describing it; next cycle reuses the archive copy"
            );
        }
    }
}
