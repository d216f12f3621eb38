//! Processing order for valid files.

use crate::model::FileCandidate;

/// Oldest modification time first; ties keep their listing order.
#[must_use]
pub fn order_chronologically(mut files: Vec<FileCandidate>) -> Vec<FileCandidate> {
    files.sort_by_key(|file| file.modified);
    files
}
