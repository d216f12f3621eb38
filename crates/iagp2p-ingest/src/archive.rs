//! Idempotent staging of source files into the archive directory.
//!
//! # Design
//! - An existing archive copy is authoritative; staging never overwrites it.
//! - Bytes land in `<name>.part` first and are linked into place only once
//!   complete; a destination that appears meanwhile is left alone.
//! - The source file is never touched here.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{IngestError, IngestResult};
use crate::model::{ArchiveRecord, FileCandidate, with_suffix};
use crate::transfer::move_no_clobber;

const PART_SUFFIX: &str = ".part";

/// Copies source files into the archive directory at most once per file name.
#[derive(Debug, Clone)]
pub struct ArchiveStager {
    archive_dir: PathBuf,
}

impl ArchiveStager {
    /// Stager writing into `archive_dir`.
    #[must_use]
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    /// Directory receiving archive copies.
    #[must_use]
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Archive location for `file`.
    ///
    /// # Errors
    ///
    /// Returns an error when the source path has no file name component.
    pub fn destination_for(&self, file: &FileCandidate) -> IngestResult<PathBuf> {
        file.path
            .file_name()
            .map(|name| self.archive_dir.join(name))
            .ok_or_else(|| IngestError::InvalidInput {
                field: "source_path",
                reason: "missing_file_name",
                value: Some(file.path.to_string_lossy().into_owned()),
            })
    }

    /// Ensure an archive copy of `file` exists and describe it.
    ///
    /// # Errors
    ///
    /// Returns an error when the copy or the final publish fails, including
    /// when another writer claimed the destination first. The archive
    /// destination is never replaced.
    pub fn stage(&self, file: &FileCandidate) -> IngestResult<ArchiveRecord> {
        let destination = self.destination_for(file)?;
        let exists = destination
            .try_exists()
            .map_err(|source| IngestError::io("archive.probe", &destination, source))?;
        if exists {
            debug!(file = %file.name, "archive copy already present");
            return Ok(ArchiveRecord {
                file_name: file.name.clone(),
                path: destination,
                freshly_copied: false,
            });
        }

        let part = with_suffix(&destination, PART_SUFFIX);
        if let Err(err) = copy_durably(&file.path, &part) {
            discard_partial(&part);
            return Err(err);
        }
        if let Err(err) = move_no_clobber(&part, &destination, "archive.publish") {
            discard_partial(&part);
            return Err(err);
        }

        debug!(file = %file.name, destination = %destination.display(), "archived source file");
        Ok(ArchiveRecord {
            file_name: file.name.clone(),
            path: destination,
            freshly_copied: true,
        })
    }
}

fn copy_durably(source: &Path, part: &Path) -> IngestResult<()> {
    fs::copy(source, part).map_err(|err| IngestError::io("archive.copy", part, err))?;
    OpenOptions::new()
        .write(true)
        .open(part)
        .and_then(|handle| handle.sync_all())
        .map_err(|err| IngestError::io("archive.sync", part, err))
}

fn discard_partial(part: &Path) {
    if let Err(err) = fs::remove_file(part)
        && err.kind() != io::ErrorKind::NotFound
    {
        warn!(error = %err, path = %part.display(), "failed to remove partial archive copy");
    }
}
