//! Single-file BitTorrent v1 metainfo.
//!
//! # Design
//! - Pieces are hashed while streaming the file; memory use is one piece.
//! - The info-hash is the SHA-1 of the canonical bencoding of the info dictionary.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::bencode::Value;
use crate::error::{TorrentError, TorrentResult};

/// Length of one SHA-1 piece hash.
pub const PIECE_HASH_LEN: usize = 20;

/// Stream `reader` into `piece_length` chunks and hash each one.
///
/// Returns the total byte count and the piece hashes in order. The final
/// piece may be shorter than `piece_length`.
///
/// # Errors
///
/// Returns the underlying IO error when reading fails.
pub fn hash_pieces(
    mut reader: impl Read,
    piece_length: usize,
) -> io::Result<(u64, Vec<[u8; PIECE_HASH_LEN]>)> {
    let mut buffer = vec![0_u8; piece_length.max(1)];
    let mut pieces = Vec::new();
    let mut total: u64 = 0;

    loop {
        let filled = fill(&mut reader, &mut buffer)?;
        if filled == 0 {
            break;
        }
        pieces.push(sha1(&buffer[..filled]));
        total += filled as u64;
        if filled < buffer.len() {
            break;
        }
    }
    Ok((total, pieces))
}

pub(crate) fn sha1(bytes: &[u8]) -> [u8; PIECE_HASH_LEN] {
    let mut hash = [0_u8; PIECE_HASH_LEN];
    hash.copy_from_slice(&Sha1::digest(bytes));
    hash
}

fn fill(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// The `info` dictionary of a single-file torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoDictionary {
    /// Suggested file name.
    pub name: String,
    /// File length in bytes.
    pub length: u64,
    /// Piece size in bytes.
    pub piece_length: u64,
    /// SHA-1 of every piece, in order.
    pub pieces: Vec<[u8; PIECE_HASH_LEN]>,
}

impl InfoDictionary {
    /// Hash the file at `path` and describe it under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the piece length is unusable or the file cannot be read.
    pub fn from_file(path: &Path, name: &str, piece_length: u64) -> TorrentResult<Self> {
        let chunk = usize::try_from(piece_length)
            .ok()
            .filter(|chunk| *chunk > 0)
            .ok_or_else(|| {
                TorrentError::invalid(
                    "piece_length",
                    "unusable_piece_length",
                    Some(piece_length.to_string()),
                )
            })?;
        let file = File::open(path).map_err(|err| TorrentError::io("metainfo.open", path, err))?;
        let (length, pieces) =
            hash_pieces(file, chunk).map_err(|err| TorrentError::io("metainfo.read", path, err))?;
        Ok(Self {
            name: name.to_string(),
            length,
            piece_length,
            pieces,
        })
    }

    /// Bencode value of this dictionary.
    ///
    /// # Errors
    ///
    /// Returns an error when a length does not fit a bencode integer.
    pub fn to_value(&self) -> TorrentResult<Value> {
        let pieces = self.pieces.concat();
        Ok(Value::dict([
            ("length", Value::Int(to_int("length", self.length)?)),
            ("name", Value::string(&self.name)),
            (
                "piece length",
                Value::Int(to_int("piece_length", self.piece_length)?),
            ),
            ("pieces", Value::Bytes(pieces)),
        ]))
    }

    /// SHA-1 of the bencoded dictionary.
    ///
    /// # Errors
    ///
    /// Returns an error when the dictionary cannot be encoded.
    pub fn info_hash(&self) -> TorrentResult<[u8; PIECE_HASH_LEN]> {
        Ok(sha1(&self.to_value()?.encode()))
    }

    /// Lower-case hex of [`Self::info_hash`].
    ///
    /// # Errors
    ///
    /// Returns an error when the dictionary cannot be encoded.
    pub fn info_hash_hex(&self) -> TorrentResult<String> {
        let hash = self.info_hash()?;
        let mut hex = String::with_capacity(hash.len() * 2);
        for byte in hash {
            let _ = write!(hex, "{byte:02x}");
        }
        Ok(hex)
    }
}

/// A complete metainfo document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metainfo {
    /// Tracker announce URL.
    pub announce: Option<String>,
    /// `created by` field.
    pub created_by: String,
    /// Creation time as seconds since the Unix epoch.
    pub creation_date: i64,
    /// Description of the content.
    pub info: InfoDictionary,
}

impl Metainfo {
    /// Bencode value of the whole document.
    ///
    /// # Errors
    ///
    /// Returns an error when the info dictionary cannot be encoded.
    pub fn to_value(&self) -> TorrentResult<Value> {
        let mut entries = vec![
            ("created by", Value::string(&self.created_by)),
            ("creation date", Value::Int(self.creation_date)),
            ("info", self.info.to_value()?),
        ];
        if let Some(announce) = &self.announce {
            entries.push(("announce", Value::string(announce)));
        }
        Ok(Value::dict(entries))
    }

    /// Canonical `.torrent` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the info dictionary cannot be encoded.
    pub fn encode(&self) -> TorrentResult<Vec<u8>> {
        Ok(self.to_value()?.encode())
    }
}

fn to_int(field: &'static str, value: u64) -> TorrentResult<i64> {
    i64::try_from(value)
        .map_err(|_| TorrentError::invalid(field, "exceeds_bencode_integer", Some(value.to_string())))
}
