//! # Tessera
//!
//! An embeddable graph database storage layer: a size-bounded object cache
//! and composite-key attribute indices split across hash-routed shards.
//!
//! Start with [`TesseraDB`]. Define the attributes your objects carry,
//! create indices over them, and route every object insert, update, and
//! removal through the database so each index of the object's type stays
//! current.
//!
//! ## Quick Start
//!
//! ```rust
//! use tessera::{
//!     AttributeDescriptor, AttributeId, CompositeKey, CompositeKeyDefinition, DbObject,
//!     IndexConfig, ObjectId, TesseraDB, TypeId,
//! };
//!
//! const EMAIL: AttributeId = AttributeId::new(1);
//! const USERS: TypeId = TypeId::new(1);
//!
//! let db = TesseraDB::new_in_memory();
//! db.define_attribute(AttributeDescriptor::single(EMAIL, "email", ""));
//! let by_email = db.create_index(
//!     "sharded",
//!     "user_email",
//!     USERS,
//!     CompositeKeyDefinition::new([EMAIL]),
//!     IndexConfig::unique().with_shard_count(4),
//! )?;
//!
//! db.insert(DbObject::new(ObjectId::new(1), USERS).with_attribute(EMAIL, "a@x"))?;
//! let clash = db.insert(DbObject::new(ObjectId::new(2), USERS).with_attribute(EMAIL, "a@x"));
//! assert!(clash.unwrap_err().is_unique_violation());
//! assert!(by_email.contains_key(&CompositeKey::single("a@x"))?);
//! # Ok::<(), tessera::Error>(())
//! ```
//!
//! ## Crates
//!
//! | Crate | Contents |
//! | ----- | -------- |
//! | `tessera-common` | identifiers, values, locations, errors, stable hashing |
//! | `tessera-core` | object cache, key model, shards, the sharded index |
//! | `tessera-adapters` | file-backed shard and metadata storage |
//! | `tessera-engine` | configuration, index catalog, database lifecycle |

// Re-export the main database API
pub use tessera_engine::{Config, DomainObjectCache, IndexCatalog, TesseraDB};

// Re-export core types - you'll need these for working with IDs and values
pub use tessera_common::types::{AttributeId, ObjectId, ObjectLocation, ShardId, TypeId, Value};
pub use tessera_common::utils::error::{Error, Result};

// Re-export the index and cache API
pub use tessera_core::{
    AttributeCatalog, AttributeDescriptor, AttributeIndex, AttributeResolver, CacheConfig,
    CacheObject, CachePriority, Cached, CompositeKey, CompositeKeyDefinition, DbObject,
    IndexConfig, IndexMetadata, IndexStats, IndexTypeRegistry, MemoryShardStore, ObjectCache,
    ShardStore, ShardedAttributeIndex,
};

// Re-export the storage backends
pub use tessera_adapters::{FileShardStore, IndexMetadataStore};

// Lower-level modules, for custom index types and shard stores
pub use tessera_core::{cache, index, schema};
