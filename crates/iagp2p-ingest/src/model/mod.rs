//! Domain models for the ingest pipeline.
//!
//! # Design
//! - Candidates and summaries live for a single cycle only.
//! - Archive and error records describe files on disk; nothing here is cached across cycles.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::quarantine::QuarantineOutcome;

const SUMMARY_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// One directory entry observed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// File name (lossy UTF-8).
    pub name: String,
    /// Absolute path of the entry in the source directory.
    pub path: PathBuf,
    /// Last modification time reported by the filesystem.
    pub modified: SystemTime,
}

/// Outcome of classifying a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    /// Allowed extension and configured agency.
    Valid,
    /// Extension outside the allowlist.
    InvalidType,
    /// Agency prefix not configured.
    InvalidAgency,
}

/// Candidate paired with its classification and diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEntry {
    /// Classified candidate.
    pub candidate: FileCandidate,
    /// Classification result.
    pub classification: Classification,
    /// Human-readable diagnostic for invalid entries.
    pub diagnostic: Option<String>,
}

/// Candidate bound for quarantine, with the failure it is filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Rejected candidate.
    pub candidate: FileCandidate,
    /// Quarantine reason.
    pub reason: FailureKind,
    /// Text written to the `.ERROR` sidecar.
    pub diagnostic: String,
}

/// Durable copy of a source file in the archive directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    /// File name shared by the source and the archive copy.
    pub file_name: String,
    /// Location of the archive copy.
    pub path: PathBuf,
    /// `false` when an earlier cycle had already archived the file.
    pub freshly_copied: bool,
}

/// Artifact produced by a descriptor builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    /// Descriptor file name reported in summaries.
    pub name: String,
    /// Location of the descriptor file.
    pub path: PathBuf,
    /// Builder-specific content fingerprint (the info-hash for metainfo).
    pub fingerprint: Option<String>,
}

/// File moved into the error directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Name of the quarantined file.
    pub original_name: String,
    /// Location inside the error directory.
    pub moved_path: PathBuf,
    /// Diagnostic stored in the sidecar.
    pub diagnostic: String,
    /// Sidecar location when it was written.
    pub sidecar_path: Option<PathBuf>,
}

/// Failure taxonomy reported in summaries and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// Extension outside the allowlist.
    InvalidFileType,
    /// Agency prefix not configured.
    InvalidHomeAgency,
    /// Archive staging failed; the source stays for retry.
    CopyToArchiveFailure,
    /// Descriptor builder failed; the source stays for retry.
    DescriptorBuildFailure,
    /// Moving into the error directory failed.
    QuarantineMoveFailure,
    /// The `.ERROR` sidecar could not be written.
    SidecarWriteFailure,
}

impl FailureKind {
    /// Stable name used in summaries and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFileType => "InvalidFileType",
            Self::InvalidHomeAgency => "InvalidHomeAgency",
            Self::CopyToArchiveFailure => "CopyToArchiveFailure",
            Self::DescriptorBuildFailure => "DescriptorBuildFailure",
            Self::QuarantineMoveFailure => "QuarantineMoveFailure",
            Self::SidecarWriteFailure => "SidecarWriteFailure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Result recorded for one valid file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SummaryResult {
    /// Descriptor name produced for the file.
    Descriptor(String),
    /// Failure kind that left the file for retry.
    Failed(FailureKind),
}

/// One line of the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    /// Source file name.
    pub source_name: String,
    /// Descriptor or failure.
    pub result: SummaryResult,
}

impl fmt::Display for SummaryEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            SummaryResult::Descriptor(name) => write!(formatter, "{} -> {name}", self.source_name),
            SummaryResult::Failed(kind) => {
                write!(formatter, "{}: ERROR: {kind}", self.source_name)
            }
        }
    }
}

/// Per-cycle list of processed valid files, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    entries: Vec<SummaryEntry>,
}

impl RunSummary {
    /// Append an entry.
    pub fn push(&mut self, source_name: impl Into<String>, result: SummaryResult) {
        self.entries.push(SummaryEntry {
            source_name: source_name.into(),
            result,
        });
    }

    /// Recorded entries.
    #[must_use]
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    /// Entry recorded for `source_name`.
    #[must_use]
    pub fn get(&self, source_name: &str) -> Option<&SummaryResult> {
        self.entries
            .iter()
            .find(|entry| entry.source_name == source_name)
            .map(|entry| &entry.result)
    }

    /// Count of processed valid files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no valid file was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry.result, SummaryResult::Failed(_)))
    }

    /// Timestamped header followed by one line per entry; empty when nothing was processed.
    #[must_use]
    pub fn render_lines(&self, at: DateTime<Local>) -> Vec<String> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let mut lines = Vec::with_capacity(self.entries.len() + 1);
        lines.push(format!(
            "{} ingest summary",
            at.format(SUMMARY_TIMESTAMP_FORMAT)
        ));
        lines.extend(self.entries.iter().map(ToString::to_string));
        lines
    }
}

/// Everything one cycle observed and did.
#[derive(Debug)]
pub struct CycleReport {
    /// Correlation identifier logged with every event of the cycle.
    pub cycle_id: Uuid,
    /// Cycle start time.
    pub started_at: DateTime<Utc>,
    /// Processed valid files.
    pub summary: RunSummary,
    /// Quarantine attempts, invalid entries first.
    pub quarantined: Vec<QuarantineOutcome>,
}

impl CycleReport {
    pub(crate) fn new(cycle_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id,
            started_at,
            summary: RunSummary::default(),
            quarantined: Vec::new(),
        }
    }

    /// Whether any file failed or any quarantine move failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.summary.has_failures()
            || self
                .quarantined
                .iter()
                .any(|outcome| !outcome.status.succeeded() && !outcome.status.vanished())
    }
}

/// `path` with `suffix` appended to its final component.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}
