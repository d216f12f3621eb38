//! Typed configuration consumed by the ingest pipeline.
//!
//! # Design
//! - Built once at startup and passed by reference into constructors.
//! - No hot reload; a changed file takes effect on restart.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::agency::AgencyIdSet;

/// Immutable snapshot of the ingest service configuration.
#[derive(Debug, Clone, Serialize)]
pub struct IngestConfig {
    /// Valid agency codes.
    pub agencies: AgencyIdSet,
    /// Directory watched for incoming data files.
    pub source_dir: PathBuf,
    /// Directory receiving byte-identical archive copies.
    pub archive_dir: PathBuf,
    /// Directory receiving quarantined files and their sidecars.
    pub error_dir: PathBuf,
    /// Delay between directory scans.
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    /// Quarantine a file after this many failed descriptor builds; `None` retries forever.
    pub descriptor_retry_limit: Option<u32>,
    /// Metainfo generation settings.
    pub torrent: TorrentSettings,
}

/// Settings for the metainfo descriptor builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentSettings {
    /// Directory receiving generated `.torrent` files.
    pub output_dir: PathBuf,
    /// Tracker announce URL written into each metainfo file.
    pub announce_url: Option<String>,
    /// Piece size in bytes.
    pub piece_length: u64,
    /// Value of the metainfo `created by` field.
    pub created_by: String,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}
