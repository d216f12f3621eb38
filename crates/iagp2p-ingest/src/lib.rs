#![forbid(unsafe_code)]
#![deny(
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Ingest pipeline for agency data files.
//!
//! Layout: `classify.rs` (snapshot + classification), `order.rs` (processing
//! order), `archive.rs` (idempotent staging), `quarantine.rs` (error
//! directory), `transfer.rs` (no-clobber moves), `descriptor.rs` (builder
//! seam), `pipeline.rs` (one cycle), `poller.rs` (cadence + shutdown).

pub mod archive;
pub mod classify;
pub mod descriptor;
pub mod error;
pub mod model;
pub mod order;
pub mod pipeline;
pub mod poller;
pub mod quarantine;
mod transfer;

pub use archive::ArchiveStager;
pub use classify::{FileClassifier, Partitioned, snapshot_directory};
pub use descriptor::DescriptorBuilder;
pub use error::{IngestError, IngestResult};
pub use model::{
    ArchiveRecord, Classification, ClassifiedEntry, CycleReport, Descriptor, ErrorRecord,
    FailureKind, FileCandidate, RejectedEntry, RunSummary, SummaryEntry, SummaryResult,
};
pub use order::order_chronologically;
pub use pipeline::PipelineRunner;
pub use poller::{
    CycleEvent, CycleRunner, IntervalTicker, ManualTicker, PollingLoop, PollingStats,
    ShutdownSignal, ShutdownTrigger, TickSender, Ticker, manual_ticker, shutdown_channel,
};
pub use quarantine::{ErrorQuarantine, QuarantineOutcome, QuarantineStatus};
