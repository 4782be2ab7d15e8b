//! Shard persistence contract.

use super::shard::IndexShard;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tessera_common::types::{ObjectLocation, ShardId};
use tessera_common::utils::error::{Result, StorageError};
use tessera_common::utils::hash::FxHashMap;

/// Where shard data is persisted.
///
/// Implementations must be safe to call from many threads at once.
pub trait ShardStore: Send + Sync {
    /// Returns the shard persisted at `location`, or an empty shard with
    /// `shard_id` if nothing is stored there yet.
    fn load_or_create(&self, location: &ObjectLocation, shard_id: ShardId) -> Result<IndexShard>;

    /// Persists `shard` at `location`.
    ///
    /// With `overwrite == false` an existing object at `location` is an
    /// error ([`StorageError::AlreadyExists`]).
    fn store(&self, location: &ObjectLocation, shard: &IndexShard, overwrite: bool) -> Result<()>;

    /// Deletes whatever is persisted at `location`. Returns true if
    /// something was deleted.
    fn erase(&self, location: &ObjectLocation) -> Result<bool>;
}

/// Location of one shard of an index.
///
/// `base + "Indices/" + name + "#" + edition + shard_id`, with no separator
/// inserted: callers pass a base that already ends in `/`.
#[must_use]
pub fn shard_location(
    base: &ObjectLocation,
    name: &str,
    edition: &str,
    shard_id: ShardId,
) -> ObjectLocation {
    base.concat(&format!("Indices/{name}#{edition}{shard_id}"))
}

/// Volatile shard store. Loads hand out copies, so cached shards never
/// alias stored ones.
#[derive(Default)]
pub struct MemoryShardStore {
    shards: RwLock<FxHashMap<ObjectLocation, IndexShard>>,
    loads: AtomicU64,
    stores: AtomicU64,
}

impl MemoryShardStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.read().len()
    }

    /// Returns true if nothing is persisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.read().is_empty()
    }

    /// Returns true if a shard is persisted at `location`.
    #[must_use]
    pub fn contains(&self, location: &ObjectLocation) -> bool {
        self.shards.read().contains_key(location)
    }

    /// How many times a shard was loaded.
    #[must_use]
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// How many times a shard was written.
    #[must_use]
    pub fn store_count(&self) -> u64 {
        self.stores.load(Ordering::Relaxed)
    }
}

impl ShardStore for MemoryShardStore {
    fn load_or_create(&self, location: &ObjectLocation, shard_id: ShardId) -> Result<IndexShard> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .shards
            .read()
            .get(location)
            .cloned()
            .unwrap_or_else(|| IndexShard::new(shard_id)))
    }

    fn store(&self, location: &ObjectLocation, shard: &IndexShard, overwrite: bool) -> Result<()> {
        let mut shards = self.shards.write();
        if !overwrite && shards.contains_key(location) {
            return Err(StorageError::AlreadyExists(location.to_string()).into());
        }
        shards.insert(location.clone(), shard.clone());
        self.stores.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn erase(&self, location: &ObjectLocation) -> Result<bool> {
        Ok(self.shards.write().remove(location).is_some())
    }
}
