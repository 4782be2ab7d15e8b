//! On-disk persistence.
//!
//! Every file holds exactly one frame:
//!
//! ```text
//! [u32 LE payload length][bincode payload][u32 LE crc32 of payload]
//! ```
//!
//! Shards are stored one file per shard location, metadata one file per
//! index. Writes go to a temporary sibling and are renamed into place.

pub mod codec;
mod file;
mod metadata;

pub use file::{FileShardStore, SHARD_EXTENSION};
pub use metadata::{IndexMetadataStore, METADATA_EXTENSION};
