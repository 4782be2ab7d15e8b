//! Composite-key attribute indices.
//!
//! - [`key`] - Key definitions and deriving keys from objects
//! - [`shard`] - One ordered partition of an index
//! - [`store`] - Where shards are persisted
//! - [`sharded`] - The hash-sharded index engine
//! - [`registry`] - Index types selectable by tag
//!
//! ```text
//! DbObject ──build_keys──▶ {CompositeKey} ──stable_hash % n──▶ shard id
//!                                                                │
//!                         ShardCache::get_or_load ◀──────────────┘
//!                                   │ miss
//!                                   ▼
//!                         ShardStore::load_or_create
//! ```

pub mod key;
pub mod metadata;
pub mod registry;
pub mod shard;
pub mod sharded;
pub mod store;
mod traits;

pub use key::{CompositeKey, CompositeKeyDefinition, build_keys};
pub use metadata::{IndexConfig, IndexMetadata, IndexStats};
pub use registry::{IndexFactory, IndexTypeRegistry};
pub use shard::{IndexShard, RemoveOutcome, SetOutcome, SetStrategy, ShardConflict};
pub use sharded::{IndexResources, ShardCache, ShardedAttributeIndex};
pub use store::{MemoryShardStore, ShardStore, shard_location};
pub use traits::{AttributeIndex, IndexScan};
