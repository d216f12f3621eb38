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

//! BitTorrent v1 metainfo descriptors for archived agency files.
//!
//! Layout: `bencode.rs` (value model and canonical encoder), `metainfo.rs`
//! (piece hashing and the info dictionary), `builder.rs` (the
//! [`iagp2p_ingest::DescriptorBuilder`] writing `.torrent` files).

pub mod bencode;
pub mod builder;
pub mod error;
pub mod metainfo;

pub use bencode::Value;
pub use builder::TorrentDescriptorBuilder;
pub use error::{TorrentError, TorrentResult};
pub use metainfo::{InfoDictionary, Metainfo, PIECE_HASH_LEN, hash_pieces};
