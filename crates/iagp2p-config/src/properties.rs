//! Java-style `.properties` parsing.
//!
//! Supports `key=value`, `key:value` and `key value` separators, `#`/`!`
//! comments, backslash line continuations and the usual escape sequences.

use std::collections::BTreeMap;

use crate::error::{ConfigError, ConfigResult};

/// Flat key/value view of a properties document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// Parse a properties document. Later keys replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns an error when a `\u` escape is not followed by four hex digits.
    pub fn parse(input: &str) -> ConfigResult<Self> {
        let mut entries = BTreeMap::new();
        for (line_no, logical) in logical_lines(input) {
            let (key, value) = split_entry(&logical);
            let key = unescape(key, line_no)?;
            let value = unescape(value, line_no)?;
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    /// Value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document contained no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::default();
        for (key, value) in iter {
            properties.insert(key, value);
        }
        properties
    }
}

/// Join continuation lines and drop blanks/comments, keeping the first line number.
fn logical_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, raw) in input.lines().enumerate() {
        let trimmed = raw.trim_start();
        let (line_no, mut buffer) = match pending.take() {
            Some(open) => open,
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                (index + 1, String::new())
            }
        };

        if ends_with_continuation(trimmed) {
            buffer.push_str(&trimmed[..trimmed.len() - 1]);
            pending = Some((line_no, buffer));
        } else {
            buffer.push_str(trimmed);
            lines.push((line_no, buffer));
        }
    }

    if let Some(open) = pending {
        lines.push(open);
    }
    lines
}

fn ends_with_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|ch| *ch == '\\').count();
    trailing % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (offset, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = offset;
                break;
            }
            ch if ch.is_whitespace() => {
                key_end = offset;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start();
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start();
    }
    (key, rest)
}

fn unescape(raw: &str, line_no: usize) -> ConfigResult<String> {
    let mut output = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => output.push('\t'),
            Some('n') => output.push('\n'),
            Some('r') => output.push('\r'),
            Some('f') => output.push('\u{000c}'),
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|_| digits.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        ConfigError::invalid(
                            format!("line {line_no}"),
                            "invalid_unicode_escape",
                            digits.clone(),
                        )
                    })?;
                output.push(decoded);
            }
            Some(other) => output.push(other),
            None => {}
        }
    }
    Ok(output)
}
