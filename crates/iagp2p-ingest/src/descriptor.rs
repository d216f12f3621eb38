//! Seam between the pipeline and whatever produces descriptors.

use crate::error::IngestResult;
use crate::model::{ArchiveRecord, Descriptor};

/// Produces a descriptor from an archived file.
///
/// Implementations run on blocking worker threads and must not assume they
/// are called from an async context.
pub trait DescriptorBuilder: Send + Sync {
    /// Build the descriptor for `archived`.
    ///
    /// # Errors
    ///
    /// Returns an error when the archived content cannot be described; the
    /// pipeline leaves the source in place for the next cycle.
    fn build(&self, archived: &ArchiveRecord) -> IngestResult<Descriptor>;
}

impl<F> DescriptorBuilder for F
where
    F: Fn(&ArchiveRecord) -> IngestResult<Descriptor> + Send + Sync,
{
    fn build(&self, archived: &ArchiveRecord) -> IngestResult<Descriptor> {
        self(archived)
    }
}
