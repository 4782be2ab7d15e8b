//! The interface every index type implements.

use super::key::CompositeKey;
use super::metadata::{IndexMetadata, IndexStats};
use crate::schema::DbObject;
use std::sync::Arc;
use tessera_common::types::ObjectId;
use tessera_common::utils::error::Result;
use tessera_common::utils::hash::FxHashSet;

/// A lazy, single-pass scan over an index. Each item may fail, since shards
/// are loaded as the scan reaches them.
pub type IndexScan<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// An index over one attribute combination of one object type.
///
/// Scans observe live shard state one shard at a time; mutating the index
/// while a scan is in progress gives unspecified (but memory-safe) results.
pub trait AttributeIndex: Send + Sync {
    /// Index name.
    fn name(&self) -> &str;

    /// Current layout. Fails unless the index is active.
    fn metadata(&self) -> Result<Arc<IndexMetadata>>;

    /// Indexes every key `object` contributes.
    ///
    /// On a uniqueness violation, keys written earlier in the same call stay
    /// written.
    fn insert(&self, object: &DbObject) -> Result<()>;

    /// Re-indexes an object whose attributes may have changed.
    fn update(&self, object: &DbObject) -> Result<()>;

    /// Removes every key `object` contributes.
    fn remove(&self, object: &DbObject) -> Result<()>;

    /// Returns true if any key derived from `object` maps to its id.
    fn contains(&self, object: &DbObject) -> Result<bool>;

    /// Returns true if `key` maps to at least one object.
    fn contains_key(&self, key: &CompositeKey) -> Result<bool>;

    /// Objects stored under `key`.
    fn get_values(&self, key: &CompositeKey) -> Result<FxHashSet<ObjectId>>;

    /// Every key, shard by shard.
    fn get_all_keys(&self) -> Result<IndexScan<CompositeKey>>;

    /// Every stored id, shard by shard, once per key it appears under.
    fn get_all_values(&self) -> Result<IndexScan<ObjectId>>;

    /// Every key/id pair, shard by shard.
    fn get_key_value_pairs(&self) -> Result<IndexScan<(CompositeKey, ObjectId)>>;

    /// Key/id pairs with keys between `from` and `to`.
    ///
    /// Results are ordered within each shard only.
    fn range(
        &self,
        from: &CompositeKey,
        to: &CompositeKey,
        include_from: bool,
        include_to: bool,
    ) -> Result<IndexScan<(CompositeKey, ObjectId)>>;

    /// Clears the index and re-inserts `objects`.
    fn rebuild(&self, objects: &[DbObject]) -> Result<()>;

    /// Rewrites the index under a new shard count. Must not run
    /// concurrently with other operations on this index.
    fn reshard(&self, shard_count: u32, objects: &[DbObject]) -> Result<()>;

    /// Erases all shards. The index is unusable afterwards.
    fn drop_index(&self) -> Result<()>;

    /// Distinct keys with at least one value.
    fn key_count(&self) -> u64;

    /// Key/id pairs.
    fn value_count(&self) -> u64;

    /// Counter snapshot.
    fn stats(&self) -> Result<IndexStats>;
}
