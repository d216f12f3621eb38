//! No-clobber moves shared by archive publishing and quarantine.
//!
//! # Design
//! - The destination is claimed with `hard_link` or `create_new`, so an existing
//!   file is never replaced, including one created by another process after a check.
//! - Filesystems without hard links (and cross-device moves) fall back to a
//!   create-new copy followed by removing the source.
//! - A source that disappears after the destination was claimed leaves the
//!   destination in place; it holds the only remaining bytes.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{IngestError, IngestResult};

/// Move `source` to `destination`, refusing to replace an existing file.
///
/// An occupied destination yields [`IngestError::DestinationExists`] tagged
/// with `operation`; the source is left untouched in that case.
pub(crate) fn move_no_clobber(
    source: &Path,
    destination: &Path,
    operation: &'static str,
) -> IngestResult<()> {
    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(occupied(operation, destination));
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(IngestError::io(operation, source, err));
        }
        Err(err) => {
            debug!(
                error = %err,
                destination = %destination.display(),
                "hard link unavailable; copying instead"
            );
            return copy_no_clobber(source, destination, operation);
        }
    }
    release_source(source, destination, operation)
}

/// Copy `source` into a freshly created `destination`, then remove `source`.
pub(crate) fn copy_no_clobber(
    source: &Path,
    destination: &Path,
    operation: &'static str,
) -> IngestResult<()> {
    let mut reader = File::open(source).map_err(|err| IngestError::io(operation, source, err))?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .map_err(|err| {
            if err.kind() == io::ErrorKind::AlreadyExists {
                occupied(operation, destination)
            } else {
                IngestError::io(operation, destination, err)
            }
        })?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    drop(writer);
    if let Err(err) = copied {
        discard(destination);
        return Err(IngestError::io(operation, destination, err));
    }
    release_source(source, destination, operation)
}

fn release_source(source: &Path, destination: &Path, operation: &'static str) -> IngestResult<()> {
    match fs::remove_file(source) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            discard(destination);
            Err(IngestError::io(operation, source, err))
        }
    }
}

fn occupied(operation: &'static str, destination: &Path) -> IngestError {
    IngestError::DestinationExists {
        operation,
        path: destination.to_path_buf(),
    }
}

fn discard(destination: &Path) {
    if let Err(err) = fs::remove_file(destination)
        && err.kind() != io::ErrorKind::NotFound
    {
        warn!(error = %err, path = %destination.display(), "failed to roll back moved file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn temp_dir() -> Result<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix("iagp2p-transfer-")
            .tempdir()?)
    }

    #[test]
    fn move_relocates_bytes() -> Result<()> {
        let temp = temp_dir()?;
        let source = temp.path().join("007a.itag");
        let destination = temp.path().join("moved.itag");
        fs::write(&source, b"payload")?;

        move_no_clobber(&source, &destination, "test.move")?;
        assert!(!source.exists());
        assert_eq!(fs::read(&destination)?, b"payload");
        Ok(())
    }

    #[test]
    fn move_refuses_occupied_destination() -> Result<()> {
        let temp = temp_dir()?;
        let source = temp.path().join("007a.itag");
        let destination = temp.path().join("taken.itag");
        fs::write(&source, b"incoming")?;
        fs::write(&destination, b"resident")?;

        let result = move_no_clobber(&source, &destination, "test.move");
        assert!(matches!(
            result,
            Err(IngestError::DestinationExists {
                operation: "test.move",
                ..
            })
        ));
        assert_eq!(fs::read(&destination)?, b"resident");
        assert_eq!(fs::read(&source)?, b"incoming");
        Ok(())
    }

    #[test]
    fn missing_source_is_an_io_error() -> Result<()> {
        let temp = temp_dir()?;
        let result = move_no_clobber(
            &temp.path().join("absent.itag"),
            &temp.path().join("moved.itag"),
            "test.move",
        );
        assert!(matches!(result, Err(IngestError::Io { .. })));
        assert!(!temp.path().join("moved.itag").exists());
        Ok(())
    }

    #[test]
    fn copy_fallback_copies_then_removes_source() -> Result<()> {
        let temp = temp_dir()?;
        let source = temp.path().join("999x.itag");
        let destination = temp.path().join("copied.itag");
        fs::write(&source, b"bytes")?;

        copy_no_clobber(&source, &destination, "test.copy")?;
        assert!(!source.exists());
        assert_eq!(fs::read(&destination)?, b"bytes");

        fs::write(&source, b"other")?;
        let result = copy_no_clobber(&source, &destination, "test.copy");
        assert!(matches!(result, Err(IngestError::DestinationExists { .. })));
        assert_eq!(fs::read(&destination)?, b"bytes");
        assert_eq!(fs::read(&source)?, b"other");
        Ok(())
    }
}
