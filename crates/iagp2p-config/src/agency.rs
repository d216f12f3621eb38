//! Agency code set derived from the home and child agency keys.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::defaults::{CHILD_AGENCY_MARKER, HOME_AGENCY_KEY};
use crate::error::{ConfigError, ConfigResult};
use crate::properties::Properties;

/// Immutable set of valid 3-digit agency codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AgencyIdSet {
    codes: BTreeSet<String>,
}

impl AgencyIdSet {
    /// Collect `home_agency_id` and every key containing `child_agency`.
    ///
    /// Empty values are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when a non-empty value is not an integer in `0..=999`.
    pub fn from_properties(properties: &Properties) -> ConfigResult<Self> {
        let mut codes = BTreeSet::new();
        for (key, value) in properties.iter() {
            if key != HOME_AGENCY_KEY && !key.contains(CHILD_AGENCY_MARKER) {
                continue;
            }
            let trimmed = value.trim();
            if trimmed.is_empty() {
                continue;
            }
            codes.insert(format_agency_id(key, trimmed)?);
        }
        Ok(Self { codes })
    }

    /// Build a set from already-normalised codes or raw integers.
    ///
    /// # Errors
    ///
    /// Returns an error when any value is not an integer in `0..=999`.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a str>) -> ConfigResult<Self> {
        let codes = values
            .into_iter()
            .map(|value| format_agency_id(HOME_AGENCY_KEY, value.trim()))
            .collect::<ConfigResult<BTreeSet<_>>>()?;
        Ok(Self { codes })
    }

    /// Whether `code` is one of the configured agencies.
    #[must_use]
    pub fn is_valid(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Configured codes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    /// Number of configured codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no agency was configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Parse `value` as an integer and render it zero-padded to three digits.
///
/// # Errors
///
/// Returns an error when the value is not an integer in `0..=999`.
pub fn format_agency_id(field: &str, value: &str) -> ConfigResult<String> {
    let parsed: i64 = value
        .parse()
        .map_err(|_| ConfigError::invalid(field, "not_integer", value))?;
    if !(0..=999).contains(&parsed) {
        return Err(ConfigError::invalid(field, "out_of_range", value));
    }
    Ok(format!("{parsed:03}"))
}
