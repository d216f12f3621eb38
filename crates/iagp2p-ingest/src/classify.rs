//! Directory snapshot and file classification.
//!
//! # Design
//! - Classification is a pure function of the candidate and the agency set.
//! - Name slicing is character based so short or non-ASCII names never panic.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use iagp2p_config::AgencyIdSet;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{IngestError, IngestResult};
use crate::model::{Classification, ClassifiedEntry, FailureKind, FileCandidate, RejectedEntry};

const ALLOWED_SUFFIXES: [&str; 3] = [".itag", ".iclp", ".itgu"];
const TYPE_DIAGNOSTIC_CHARS: usize = 4;
const AGENCY_PREFIX_CHARS: usize = 3;

/// List the regular files directly inside `dir`, in file-name order.
///
/// Directories are excluded. Entries that disappear between listing and
/// `stat` are skipped.
///
/// # Errors
///
/// Returns an error when `dir` itself cannot be listed.
pub fn snapshot_directory(dir: &Path) -> IngestResult<Vec<FileCandidate>> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(IngestError::walkdir("snapshot.list", dir, err));
            }
            Err(err) => {
                warn!(error = %err, dir = %dir.display(), "skipping unreadable directory entry");
                continue;
            }
        };

        let path = entry.path();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "entry vanished before stat");
                continue;
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "skipping entry without metadata");
                continue;
            }
        };
        if metadata.is_dir() {
            continue;
        }

        candidates.push(FileCandidate {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: path.to_path_buf(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    Ok(candidates)
}

/// Candidates split by classification, each side in listing order.
#[derive(Debug, Default)]
pub struct Partitioned {
    /// Entries eligible for archiving.
    pub valid: Vec<FileCandidate>,
    /// Entries bound for quarantine, with their reasons.
    pub invalid: Vec<RejectedEntry>,
}

/// Classifies candidates by extension and agency prefix.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    agencies: AgencyIdSet,
}

impl FileClassifier {
    /// Classifier over a fixed agency set.
    #[must_use]
    pub const fn new(agencies: AgencyIdSet) -> Self {
        Self { agencies }
    }

    /// Classify a single candidate.
    #[must_use]
    pub fn classify(&self, candidate: FileCandidate) -> ClassifiedEntry {
        let lowered = candidate.name.to_lowercase();
        let (classification, diagnostic) = if !has_allowed_suffix(&lowered) {
            (
                Classification::InvalidType,
                Some(format!(
                    "Invalid file type: {}",
                    last_chars(&candidate.name, TYPE_DIAGNOSTIC_CHARS)
                )),
            )
        } else {
            let prefix = first_chars(&lowered, AGENCY_PREFIX_CHARS);
            if self.agencies.is_valid(prefix) {
                (Classification::Valid, None)
            } else {
                (
                    Classification::InvalidAgency,
                    Some(format!(
                        "Invalid home agency: {}",
                        first_chars(&candidate.name, AGENCY_PREFIX_CHARS)
                    )),
                )
            }
        };

        ClassifiedEntry {
            candidate,
            classification,
            diagnostic,
        }
    }

    /// Classify a whole snapshot.
    #[must_use]
    pub fn partition(&self, candidates: Vec<FileCandidate>) -> Partitioned {
        let mut partitioned = Partitioned::default();
        for candidate in candidates {
            let ClassifiedEntry {
                candidate,
                classification,
                diagnostic,
            } = self.classify(candidate);
            let reason = match classification {
                Classification::Valid => {
                    partitioned.valid.push(candidate);
                    continue;
                }
                Classification::InvalidType => FailureKind::InvalidFileType,
                Classification::InvalidAgency => FailureKind::InvalidHomeAgency,
            };
            partitioned.invalid.push(RejectedEntry {
                candidate,
                reason,
                diagnostic: diagnostic.unwrap_or_default(),
            });
        }
        partitioned
    }
}

fn has_allowed_suffix(lowered: &str) -> bool {
    ALLOWED_SUFFIXES
        .iter()
        .any(|suffix| lowered.ends_with(suffix))
}

fn first_chars(value: &str, count: usize) -> &str {
    value
        .char_indices()
        .nth(count)
        .map_or(value, |(offset, _)| &value[..offset])
}

fn last_chars(value: &str, count: usize) -> &str {
    let total = value.chars().count();
    if total <= count {
        return value;
    }
    value
        .char_indices()
        .nth(total - count)
        .map_or(value, |(offset, _)| &value[offset..])
}
