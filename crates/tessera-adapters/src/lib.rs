//! # tessera-adapters
//!
//! Adapters layer for Tessera: persistence backends behind the contracts
//! defined in `tessera-core`.
//!
//! ## Modules
//!
//! - [`storage`] - File-backed shard store and index metadata files

pub mod storage;

pub use storage::{FileShardStore, IndexMetadataStore};
