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

//! Properties-backed configuration for the ingest service.
//!
//! Layout: `properties.rs` (file syntax), `agency.rs` (agency code set),
//! `model.rs` (typed configuration), `loader.rs` (properties → model).

pub mod agency;
mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod properties;

pub use agency::{AgencyIdSet, format_agency_id};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_path, load_from_str};
pub use model::{IngestConfig, TorrentSettings};
pub use properties::Properties;
