//! Error-directory quarantine with `.ERROR` sidecars.
//!
//! # Design
//! - A move never replaces an existing file in the error directory.
//! - Cross-device moves fall back to a create-new copy, then remove the source.
//! - The sidecar is written once, only after the move succeeded.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{IngestError, IngestResult};
use crate::model::{ErrorRecord, FailureKind, FileCandidate, with_suffix};
use crate::transfer::move_no_clobber;

const SIDECAR_SUFFIX: &str = ".ERROR";
const QUARANTINE_MOVE: &str = "quarantine.move";

/// Result of one quarantine attempt.
#[derive(Debug)]
pub enum QuarantineStatus {
    /// The file now lives in the error directory.
    Moved(ErrorRecord),
    /// The source disappeared before it could be moved.
    Vanished,
    /// The move failed; the source stays where it was.
    Failed(IngestError),
}

impl QuarantineStatus {
    /// Whether the file reached the error directory.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Moved(_))
    }

    /// Whether the source was gone before the move.
    #[must_use]
    pub const fn vanished(&self) -> bool {
        matches!(self, Self::Vanished)
    }
}

/// Quarantine attempt for one file, as reported by a cycle.
#[derive(Debug)]
pub struct QuarantineOutcome {
    /// Name of the file being quarantined.
    pub file_name: String,
    /// Why the file was quarantined.
    pub reason: FailureKind,
    /// What happened to it.
    pub status: QuarantineStatus,
}

/// Moves rejected files into the error directory.
#[derive(Debug, Clone)]
pub struct ErrorQuarantine {
    error_dir: PathBuf,
}

impl ErrorQuarantine {
    /// Quarantine writing into `error_dir`.
    #[must_use]
    pub fn new(error_dir: impl Into<PathBuf>) -> Self {
        Self {
            error_dir: error_dir.into(),
        }
    }

    /// Directory receiving quarantined files.
    #[must_use]
    pub fn error_dir(&self) -> &Path {
        &self.error_dir
    }

    /// Move `file` into the error directory and record `diagnostic` beside it.
    ///
    /// An empty diagnostic moves the file without a sidecar. A sidecar that
    /// cannot be written is logged and leaves the move in place.
    #[must_use]
    pub fn quarantine(&self, file: &FileCandidate, diagnostic: &str) -> QuarantineStatus {
        let file_name = file
            .path
            .file_name()
            .map_or_else(|| file.name.clone().into(), ToOwned::to_owned);
        let destination = self.error_dir.join(file_name);

        if matches!(file.path.try_exists(), Ok(false)) {
            debug!(file = %file.name, "quarantine skipped; source vanished");
            return QuarantineStatus::Vanished;
        }

        if let Err(err) = move_no_clobber(&file.path, &destination, QUARANTINE_MOVE) {
            if matches!(file.path.try_exists(), Ok(false)) {
                debug!(file = %file.name, "quarantine skipped; source vanished during move");
                return QuarantineStatus::Vanished;
            }
            warn!(
                error = %err,
                file = %file.name,
                destination = %destination.display(),
                kind = %FailureKind::QuarantineMoveFailure,
                "failed to move file into error directory"
            );
            return QuarantineStatus::Failed(err);
        }

        let sidecar_path = if diagnostic.is_empty() {
            None
        } else {
            let sidecar = with_suffix(&destination, SIDECAR_SUFFIX);
            match write_sidecar(&sidecar, &file.name, diagnostic) {
                Ok(()) => Some(sidecar),
                Err(err) => {
                    warn!(
                        error = %err,
                        file = %file.name,
                        sidecar = %sidecar.display(),
                        kind = %FailureKind::SidecarWriteFailure,
                        "failed to write error sidecar"
                    );
                    None
                }
            }
        };

        info!(file = %file.name, diagnostic, "quarantined file");
        QuarantineStatus::Moved(ErrorRecord {
            original_name: file.name.clone(),
            moved_path: destination,
            diagnostic: diagnostic.to_string(),
            sidecar_path,
        })
    }
}

fn write_sidecar(sidecar: &Path, original_name: &str, diagnostic: &str) -> IngestResult<()> {
    let mut handle = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(sidecar)
        .map_err(|err| IngestError::io("quarantine.sidecar_create", sidecar, err))?;
    handle
        .write_all(format!("{original_name}\n{diagnostic}").as_bytes())
        .and_then(|()| handle.sync_all())
        .map_err(|err| IngestError::io("quarantine.sidecar_write", sidecar, err))
}
