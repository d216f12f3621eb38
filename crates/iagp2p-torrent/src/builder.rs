//! Descriptor builder writing `.torrent` files next to the archive.
//!
//! # Design
//! - Metainfo is hashed from the archive copy, never from the source.
//! - Output lands in `<name>.torrent.part` and is renamed into place, so a
//!   reader never sees a torn descriptor.
//! - Rebuilding an existing descriptor replaces it; the content only differs
//!   in `creation date`.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use iagp2p_config::TorrentSettings;
use iagp2p_ingest::{ArchiveRecord, Descriptor, DescriptorBuilder, IngestError, IngestResult};
use tracing::{debug, warn};

use crate::error::{TorrentError, TorrentResult};
use crate::metainfo::{InfoDictionary, Metainfo};

const TORRENT_SUFFIX: &str = ".torrent";
const PART_SUFFIX: &str = ".part";

/// Builds single-file metainfo for each archived file.
#[derive(Debug, Clone)]
pub struct TorrentDescriptorBuilder {
    settings: TorrentSettings,
}

impl TorrentDescriptorBuilder {
    /// Builder using `settings` for every descriptor.
    #[must_use]
    pub fn new(settings: &TorrentSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Create the output directory when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn prepare(&self) -> TorrentResult<()> {
        fs::create_dir_all(&self.settings.output_dir)
            .map_err(|err| TorrentError::io("torrent.prepare", &self.settings.output_dir, err))
    }

    /// Output location of the descriptor for `file_name`.
    #[must_use]
    pub fn descriptor_path(&self, file_name: &str) -> PathBuf {
        self.settings
            .output_dir
            .join(format!("{file_name}{TORRENT_SUFFIX}"))
    }

    /// Hash `archived` and write its metainfo.
    ///
    /// # Errors
    ///
    /// Returns an error when the archive copy cannot be read or the
    /// descriptor cannot be written.
    pub fn write_descriptor(&self, archived: &ArchiveRecord) -> TorrentResult<Descriptor> {
        let info = InfoDictionary::from_file(
            &archived.path,
            &archived.file_name,
            self.settings.piece_length,
        )?;
        let fingerprint = info.info_hash_hex()?;
        let metainfo = Metainfo {
            announce: self.settings.announce_url.clone(),
            created_by: self.settings.created_by.clone(),
            creation_date: Utc::now().timestamp(),
            info,
        };
        let bytes = metainfo.encode()?;

        let path = self.descriptor_path(&archived.file_name);
        let mut part = path.clone().into_os_string();
        part.push(PART_SUFFIX);
        let part = PathBuf::from(part);
        if let Err(err) = write_durably(&part, &bytes) {
            discard_partial(&part);
            return Err(err);
        }
        if let Err(err) = fs::rename(&part, &path) {
            discard_partial(&part);
            return Err(TorrentError::io("torrent.rename", &path, err));
        }

        debug!(
            file = %archived.file_name,
            descriptor = %path.display(),
            info_hash = %fingerprint,
            pieces = metainfo.info.pieces.len(),
            "wrote metainfo"
        );
        Ok(Descriptor {
            name: format!("{}{TORRENT_SUFFIX}", archived.file_name),
            path,
            fingerprint: Some(fingerprint),
        })
    }
}

impl DescriptorBuilder for TorrentDescriptorBuilder {
    fn build(&self, archived: &ArchiveRecord) -> IngestResult<Descriptor> {
        self.write_descriptor(archived)
            .map_err(|err| IngestError::descriptor_build(archived.file_name.clone(), err))
    }
}

fn write_durably(part: &Path, bytes: &[u8]) -> TorrentResult<()> {
    let mut handle = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(part)
        .map_err(|err| TorrentError::io("torrent.create", part, err))?;
    handle
        .write_all(bytes)
        .and_then(|()| handle.sync_all())
        .map_err(|err| TorrentError::io("torrent.write", part, err))
}

fn discard_partial(part: &Path) {
    if let Err(err) = fs::remove_file(part)
        && err.kind() != io::ErrorKind::NotFound
    {
        warn!(error = %err, path = %part.display(), "failed to remove partial descriptor");
    }
}
