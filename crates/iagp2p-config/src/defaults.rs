//! Default keys and values for the properties file.
//!
//! # Design
//! - Centralize key names so the loader and its tests agree.
//! - Keep time and size defaults explicit.

pub(crate) const HOME_AGENCY_KEY: &str = "home_agency_id";
pub(crate) const CHILD_AGENCY_MARKER: &str = "child_agency";
pub(crate) const SOURCE_DIR_KEY: &str = "home_file_directory";
pub(crate) const ARCHIVE_DIR_KEY: &str = "home_file_archive_directory";
pub(crate) const ERROR_DIR_KEY: &str = "home_file_error_directory";
pub(crate) const TORRENT_DIR_KEY: &str = "home_torrent_directory";
pub(crate) const ANNOUNCE_URL_KEY: &str = "tracker_announce_url";
pub(crate) const PIECE_LENGTH_KEY: &str = "torrent_piece_length";
pub(crate) const CREATED_BY_KEY: &str = "torrent_created_by";
pub(crate) const POLL_INTERVAL_KEY: &str = "poll_interval_seconds";
pub(crate) const RETRY_LIMIT_KEY: &str = "descriptor_retry_limit";

/// Seconds between directory scans.
pub(crate) const POLL_INTERVAL_SECS: u64 = 5;
/// Bytes hashed per metainfo piece.
pub(crate) const PIECE_LENGTH: u64 = 256 * 1024;
/// Smallest piece size accepted by common clients.
pub(crate) const MIN_PIECE_LENGTH: u64 = 16 * 1024;
/// Value written to the metainfo `created by` field.
pub(crate) const CREATED_BY: &str = "iagp2p";
