//! Properties → [`IngestConfig`] conversion.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::agency::AgencyIdSet;
use crate::defaults::{
    ANNOUNCE_URL_KEY, ARCHIVE_DIR_KEY, CREATED_BY, CREATED_BY_KEY, ERROR_DIR_KEY,
    MIN_PIECE_LENGTH, PIECE_LENGTH, PIECE_LENGTH_KEY, POLL_INTERVAL_KEY, POLL_INTERVAL_SECS,
    RETRY_LIMIT_KEY, SOURCE_DIR_KEY, TORRENT_DIR_KEY,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{IngestConfig, TorrentSettings};
use crate::properties::Properties;

/// Read and validate a properties file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or fails validation.
pub fn load_from_path(path: &Path) -> ConfigResult<IngestConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "load.read",
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration file");
    load_from_str(&raw)
}

/// Parse and validate a properties document.
///
/// # Errors
///
/// Returns an error when the document is malformed or fails validation.
pub fn load_from_str(raw: &str) -> ConfigResult<IngestConfig> {
    let properties = Properties::parse(raw)?;
    IngestConfig::from_properties(&properties)
}

impl IngestConfig {
    /// Build the configuration from parsed properties.
    ///
    /// # Errors
    ///
    /// Returns an error when a required key is missing or a value is invalid.
    pub fn from_properties(properties: &Properties) -> ConfigResult<Self> {
        let agencies = AgencyIdSet::from_properties(properties)?;
        if agencies.is_empty() {
            return Err(ConfigError::MissingField {
                field: "home_agency_id",
            });
        }

        let poll_interval = match optional(properties, POLL_INTERVAL_KEY) {
            Some(value) => {
                let secs = parse_u64(POLL_INTERVAL_KEY, value)?;
                if secs == 0 {
                    return Err(ConfigError::invalid(POLL_INTERVAL_KEY, "zero", value));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(POLL_INTERVAL_SECS),
        };

        let descriptor_retry_limit = optional(properties, RETRY_LIMIT_KEY)
            .map(|value| {
                let limit = u32::try_from(parse_u64(RETRY_LIMIT_KEY, value)?)
                    .map_err(|_| ConfigError::invalid(RETRY_LIMIT_KEY, "out_of_range", value))?;
                if limit == 0 {
                    return Err(ConfigError::invalid(RETRY_LIMIT_KEY, "zero", value));
                }
                Ok(limit)
            })
            .transpose()?;

        Ok(Self {
            agencies,
            source_dir: required_dir(properties, SOURCE_DIR_KEY)?,
            archive_dir: required_dir(properties, ARCHIVE_DIR_KEY)?,
            error_dir: required_dir(properties, ERROR_DIR_KEY)?,
            poll_interval,
            descriptor_retry_limit,
            torrent: TorrentSettings::from_properties(properties)?,
        })
    }
}

impl TorrentSettings {
    /// Build the metainfo settings from parsed properties.
    ///
    /// # Errors
    ///
    /// Returns an error when the output directory is missing or the piece
    /// length is not a power of two of at least 16 KiB.
    pub fn from_properties(properties: &Properties) -> ConfigResult<Self> {
        let piece_length = match optional(properties, PIECE_LENGTH_KEY) {
            Some(value) => {
                let parsed = parse_u64(PIECE_LENGTH_KEY, value)?;
                if parsed < MIN_PIECE_LENGTH || !parsed.is_power_of_two() {
                    return Err(ConfigError::invalid(
                        PIECE_LENGTH_KEY,
                        "not_power_of_two_min_16k",
                        value,
                    ));
                }
                parsed
            }
            None => PIECE_LENGTH,
        };

        Ok(Self {
            output_dir: required_dir(properties, TORRENT_DIR_KEY)?,
            announce_url: optional(properties, ANNOUNCE_URL_KEY).map(str::to_string),
            piece_length,
            created_by: optional(properties, CREATED_BY_KEY)
                .unwrap_or(CREATED_BY)
                .to_string(),
        })
    }
}

fn optional<'a>(properties: &'a Properties, key: &str) -> Option<&'a str> {
    properties
        .get(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn required_dir(properties: &Properties, key: &'static str) -> ConfigResult<PathBuf> {
    optional(properties, key)
        .map(PathBuf::from)
        .ok_or(ConfigError::MissingField { field: key })
}

fn parse_u64(key: &str, value: &str) -> ConfigResult<u64> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid(key, "not_unsigned_integer", value))
}
