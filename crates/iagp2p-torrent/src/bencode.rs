//! Bencode value model and canonical encoder.
//!
//! # Design
//! - Dictionaries are `BTreeMap`s keyed by raw bytes, so encoding is always
//!   in the canonical sorted order.
//! - Reading values back is only needed to check written descriptors, so the
//!   strict decoder and accessors are compiled for tests only.

use std::collections::BTreeMap;

#[cfg(test)]
use crate::error::{TorrentError, TorrentResult};

#[cfg(test)]
const MAX_DEPTH: usize = 64;

/// A bencoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `i<n>e`
    Int(i64),
    /// `<len>:<bytes>`
    Bytes(Vec<u8>),
    /// `l...e`
    List(Vec<Value>),
    /// `d...e` with byte-string keys.
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    /// Byte string holding UTF-8 `text`.
    #[must_use]
    pub fn string(text: &str) -> Self {
        Self::Bytes(text.as_bytes().to_vec())
    }

    /// Dictionary built from `(key, value)` pairs.
    #[must_use]
    pub fn dict<'a>(entries: impl IntoIterator<Item = (&'a str, Self)>) -> Self {
        Self::Dict(
            entries
                .into_iter()
                .map(|(key, value)| (key.as_bytes().to_vec(), value))
                .collect(),
        )
    }

    /// Canonical encoding of this value.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int(value) => {
                out.push(b'i');
                out.extend_from_slice(value.to_string().as_bytes());
                out.push(b'e');
            }
            Self::Bytes(bytes) => encode_bytes(bytes, out),
            Self::List(items) => {
                out.push(b'l');
                for item in items {
                    item.encode_into(out);
                }
                out.push(b'e');
            }
            Self::Dict(entries) => {
                out.push(b'd');
                for (key, value) in entries {
                    encode_bytes(key, out);
                    value.encode_into(out);
                }
                out.push(b'e');
            }
        }
    }
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

#[cfg(test)]
impl Value {
    /// Integer payload.
    #[must_use]
    pub(crate) const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Byte-string payload.
    #[must_use]
    pub(crate) fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Byte-string payload when it is valid UTF-8.
    #[must_use]
    pub(crate) fn as_str(&self) -> Option<&str> {
        self.as_bytes()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Dictionary entry for `key`.
    #[must_use]
    pub(crate) fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Dict(entries) => entries.get(key.as_bytes()),
            _ => None,
        }
    }
}

/// Decode exactly one value spanning all of `input`.
///
/// Malformed, non-canonical or truncated input yields
/// [`TorrentError::InvalidInput`] carrying the byte offset.
#[cfg(test)]
pub(crate) fn decode(input: &[u8]) -> TorrentResult<Value> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.value(0)?;
    if parser.pos != input.len() {
        return Err(parser.error("trailing_bytes"));
    }
    Ok(value)
}

#[cfg(test)]
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

#[cfg(test)]
impl Parser<'_> {
    fn value(&mut self, depth: usize) -> TorrentResult<Value> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting_too_deep"));
        }
        match self.peek()? {
            b'i' => {
                self.pos += 1;
                self.integer(b'e').map(Value::Int)
            }
            b'l' => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b'e' {
                    items.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(Value::List(items))
            }
            b'd' => {
                self.pos += 1;
                let mut entries = BTreeMap::new();
                let mut previous: Option<Vec<u8>> = None;
                while self.peek()? != b'e' {
                    let key = self.bytes()?;
                    if previous.as_ref().is_some_and(|last| *last >= key) {
                        return Err(self.error("unsorted_keys"));
                    }
                    let value = self.value(depth + 1)?;
                    previous = Some(key.clone());
                    entries.insert(key, value);
                }
                self.pos += 1;
                Ok(Value::Dict(entries))
            }
            b'0'..=b'9' => self.bytes().map(Value::Bytes),
            _ => Err(self.error("unexpected_byte")),
        }
    }

    fn peek(&self) -> TorrentResult<u8> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error("unexpected_end"))
    }

    fn integer(&mut self, terminator: u8) -> TorrentResult<i64> {
        let start = self.pos;
        let end = self.input[start..]
            .iter()
            .position(|byte| *byte == terminator)
            .map(|offset| start + offset)
            .ok_or_else(|| self.error("unterminated_integer"))?;
        let digits = &self.input[start..end];
        if matches!(digits, [] | [b'-'] | [b'-', b'0', ..] | [b'0', _, ..]) {
            return Err(self.error("non_canonical_integer"));
        }
        let value = std::str::from_utf8(digits)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| self.error("invalid_integer"))?;
        self.pos = end + 1;
        Ok(value)
    }

    fn bytes(&mut self) -> TorrentResult<Vec<u8>> {
        if !self.peek()?.is_ascii_digit() {
            return Err(self.error("expected_byte_string"));
        }
        let declared = self.integer(b':')?;
        let end = usize::try_from(declared)
            .ok()
            .and_then(|len| self.pos.checked_add(len))
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| self.error("truncated_byte_string"))?;
        let bytes = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(bytes)
    }

    fn error(&self, reason: &'static str) -> TorrentError {
        TorrentError::invalid("bencode", reason, Some(self.pos.to_string()))
    }
}
