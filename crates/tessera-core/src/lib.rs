//! # tessera-core
//!
//! Core layer for Tessera: the bounded object cache and the sharded
//! attribute index built on top of it.
//!
//! This crate provides the storage substrate every query runs against. It
//! depends only on `tessera-common`; persistence and schema are reached
//! through the [`ShardStore`](index::ShardStore) and
//! [`AttributeResolver`](schema::AttributeResolver) contracts.
//!
//! ## Modules
//!
//! - [`cache`] - Size-bounded LRU cache with pinning and discard notification
//! - [`index`] - Composite keys, index shards, and the sharded index engine
//! - [`schema`] - Domain objects and attribute descriptors

pub mod cache;
pub mod index;
pub mod schema;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheObject, CachePriority, Cached, ObjectCache};
pub use index::{
    AttributeIndex, CompositeKey, CompositeKeyDefinition, IndexConfig, IndexMetadata, IndexShard,
    IndexStats, IndexTypeRegistry, MemoryShardStore, SetStrategy, ShardStore,
    ShardedAttributeIndex,
};
pub use schema::{AttributeCatalog, AttributeDescriptor, AttributeResolver, DbObject};
