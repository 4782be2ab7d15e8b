//! The sharded attribute index engine.
//!
//! Keys are routed to one of `shard_count` shards by a stable hash. Each
//! shard is persisted on its own and materialized through the shard cache
//! on demand. The index never holds on to a shard between calls: every
//! operation fetches the shards it needs, so the cache is free to evict any
//! of them in between.
//!
//! Aggregate `key_count` and `value_count` are kept in atomics beside the
//! shards. Inserts bump `value_count` before `key_count` and removals lower
//! `key_count` before `value_count`, so `value_count >= key_count` holds at
//! every point a reader can observe.
//!
//! Every shard mutation is written back through the [`ShardStore`] before
//! the operation returns. Cached shards are therefore always clean and
//! eviction never loses data.
//!
//! Materializing and mutating a shard both happen under that shard's lock
//! stripe. A writer therefore always starts from the last stored state, even
//! when the cache could not keep the shard resident, and two writers never
//! hold diverging copies of one shard.

use super::key::{CompositeKey, build_keys};
use super::metadata::{IndexMetadata, IndexStats};
use super::shard::{IndexShard, RemoveOutcome, SetStrategy};
use super::store::ShardStore;
use super::traits::{AttributeIndex, IndexScan};
use crate::cache::ObjectCache;
use crate::schema::{AttributeResolver, DbObject};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tessera_common::types::{ObjectId, ObjectLocation, ShardId};
use tessera_common::utils::error::{IndexError, Result};
use tessera_common::utils::hash::FxHashSet;

/// Cache of materialized shards, shared by every index of a database.
pub type ShardCache = ObjectCache<RwLock<IndexShard>>;

/// Collaborators an index needs: where shards are cached, where they are
/// persisted, and how attributes resolve.
#[derive(Clone)]
pub struct IndexResources {
    /// Shard cache.
    pub cache: Arc<ShardCache>,
    /// Shard persistence.
    pub store: Arc<dyn ShardStore>,
    /// Attribute lookup for key derivation.
    pub resolver: Arc<dyn AttributeResolver>,
}

impl IndexResources {
    fn fetch(&self, location: &ObjectLocation, shard_id: ShardId) -> Result<Arc<RwLock<IndexShard>>> {
        self.cache.get_or_load(location, || {
            self.store
                .load_or_create(location, shard_id)
                .map(RwLock::new)
        })
    }
}

/// Lock stripes per index. Shards beyond this count share stripes.
const SHARD_LOCK_STRIPES: usize = 64;

/// Per-shard serialization of load, mutate, and store.
///
/// Striped by shard id, so a reshard keeps using the same stripes.
struct ShardLocks {
    stripes: Box<[Mutex<()>]>,
}

impl ShardLocks {
    fn new() -> Self {
        Self {
            stripes: (0..SHARD_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock(&self, shard_id: ShardId) -> MutexGuard<'_, ()> {
        self.stripes[shard_id as usize % self.stripes.len()].lock()
    }

    /// Materializes a shard while holding its stripe, so the copy handed out
    /// (and possibly cached) reflects the last completed write.
    fn fetch(
        &self,
        resources: &IndexResources,
        location: &ObjectLocation,
        shard_id: ShardId,
    ) -> Result<Arc<RwLock<IndexShard>>> {
        let _serial = self.lock(shard_id);
        resources.fetch(location, shard_id)
    }
}

enum IndexState {
    Uninitialized,
    Active(Arc<IndexMetadata>),
    Dropped,
}

/// A composite-key index split across hash-routed shards.
pub struct ShardedAttributeIndex {
    name: String,
    state: RwLock<IndexState>,
    key_count: AtomicU64,
    value_count: AtomicU64,
    resources: IndexResources,
    shard_locks: Arc<ShardLocks>,
}

impl ShardedAttributeIndex {
    /// Creates an uninitialized index.
    pub fn new(name: impl Into<String>, resources: IndexResources) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(IndexState::Uninitialized),
            key_count: AtomicU64::new(0),
            value_count: AtomicU64::new(0),
            resources,
            shard_locks: Arc::new(ShardLocks::new()),
        }
    }

    /// Activates the index with its layout.
    ///
    /// Counters are recomputed from whatever the store already holds, so
    /// reopening a persisted index restores them.
    pub fn initialize(&self, metadata: IndexMetadata) -> Result<()> {
        metadata.validate()?;
        if metadata.name != self.name {
            return Err(IndexError::InvalidConfig(format!(
                "metadata for '{}' given to index '{}'",
                metadata.name, self.name
            ))
            .into());
        }
        {
            let mut state = self.state.write();
            match *state {
                IndexState::Uninitialized => {}
                IndexState::Active(_) => {
                    return Err(IndexError::InvalidConfig(format!(
                        "index '{}' is already initialized",
                        self.name
                    ))
                    .into());
                }
                IndexState::Dropped => return Err(IndexError::Dropped(self.name.clone()).into()),
            }
            *state = IndexState::Active(Arc::new(metadata));
        }

        let (keys, values) = self.recount()?;
        self.key_count.store(keys, Ordering::SeqCst);
        self.value_count.store(values, Ordering::SeqCst);
        tracing::debug!(index = %self.name, keys, values, "index initialized");
        Ok(())
    }

    /// Counts keys and values by scanning every shard.
    pub fn recount(&self) -> Result<(u64, u64)> {
        let layout = self.layout()?;
        let mut keys = 0u64;
        let mut values = 0u64;
        for shard_id in 0..layout.shard_count {
            let (k, v) = self.with_shard(&layout, shard_id, |shard| {
                (shard.key_count() as u64, shard.value_count() as u64)
            })?;
            keys += k;
            values += v;
        }
        Ok((keys, values))
    }

    /// Returns true once the index has been initialized and not dropped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(*self.state.read(), IndexState::Active(_))
    }

    fn layout(&self) -> Result<Arc<IndexMetadata>> {
        match &*self.state.read() {
            IndexState::Active(layout) => Ok(Arc::clone(layout)),
            IndexState::Uninitialized => Err(IndexError::NotInitialized(self.name.clone()).into()),
            IndexState::Dropped => Err(IndexError::Dropped(self.name.clone()).into()),
        }
    }

    fn route(layout: &IndexMetadata, key: &CompositeKey) -> ShardId {
        (key.stable_hash() % u64::from(layout.shard_count)) as ShardId
    }

    fn with_shard<R>(
        &self,
        layout: &IndexMetadata,
        shard_id: ShardId,
        read: impl FnOnce(&IndexShard) -> R,
    ) -> Result<R> {
        let location = layout.shard_location(shard_id);
        let shard = self.shard_locks.fetch(&self.resources, &location, shard_id)?;
        let guard = shard.read();
        Ok(read(&guard))
    }

    /// Applies `apply` to a shard and writes the shard back if it reports a
    /// change. The shard's stripe is held from the fetch until the store
    /// completes. If the write fails the cached copy is dropped so the next
    /// access reloads the persisted state.
    fn with_shard_mut<R>(
        &self,
        layout: &IndexMetadata,
        shard_id: ShardId,
        apply: impl FnOnce(&mut IndexShard) -> (R, bool),
    ) -> Result<R> {
        let location = layout.shard_location(shard_id);
        let _serial = self.shard_locks.lock(shard_id);
        let shard = self.resources.fetch(&location, shard_id)?;
        let result = {
            let mut guard = shard.write();
            let (result, dirty) = apply(&mut guard);
            if dirty {
                if let Err(err) = self.resources.store.store(&location, &guard, true) {
                    drop(guard);
                    self.resources.cache.remove(&location, false);
                    return Err(err);
                }
            }
            result
        };
        self.resources.cache.refresh(&location);
        Ok(result)
    }

    fn insert_into(&self, layout: &IndexMetadata, object: &DbObject) -> Result<()> {
        let keys = build_keys(object, &layout.definition, self.resources.resolver.as_ref())?;
        for key in keys {
            self.insert_key(layout, key, object.id)?;
        }
        Ok(())
    }

    fn insert_key(&self, layout: &IndexMetadata, key: CompositeKey, id: ObjectId) -> Result<()> {
        let shard_id = Self::route(layout, &key);
        let strategy = if layout.unique {
            SetStrategy::UniqueInsert
        } else {
            SetStrategy::Merge
        };
        tracing::trace!(index = %self.name, %key, %id, shard_id, "insert");

        let outcome = self
            .with_shard_mut(layout, shard_id, |shard| {
                let outcome = shard.set(key, [id], strategy);
                let dirty = outcome.as_ref().is_ok_and(|o| o.changed());
                (outcome, dirty)
            })?
            .map_err(|conflict| IndexError::UniqueConstraintViolation {
                index: self.name.clone(),
                key: conflict.key.to_string(),
            })?;

        if outcome.values_added > 0 {
            self.value_count
                .fetch_add(outcome.values_added as u64, Ordering::SeqCst);
        }
        if outcome.key_added {
            self.key_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn apply_removal(&self, outcome: RemoveOutcome) {
        if outcome.keys_removed > 0 {
            self.key_count
                .fetch_sub(outcome.keys_removed as u64, Ordering::SeqCst);
        }
        if outcome.values_removed > 0 {
            self.value_count
                .fetch_sub(outcome.values_removed as u64, Ordering::SeqCst);
        }
    }

    fn remove_everywhere(&self, layout: &IndexMetadata, id: ObjectId) -> Result<()> {
        for shard_id in 0..layout.shard_count {
            let outcome = self.with_shard_mut(layout, shard_id, |shard| {
                let outcome = shard.remove_id(id);
                (outcome, outcome.changed())
            })?;
            self.apply_removal(outcome);
        }
        Ok(())
    }

    fn erase_shards(&self, layout: &IndexMetadata) -> Result<()> {
        for (shard_id, location) in layout.shard_locations() {
            let _serial = self.shard_locks.lock(shard_id);
            self.resources.cache.remove(&location, false);
            self.resources.store.erase(&location)?;
        }
        Ok(())
    }

    fn scan<T: Send + 'static>(
        &self,
        extract: impl Fn(&IndexShard) -> Vec<T> + Send + 'static,
    ) -> Result<IndexScan<T>> {
        Ok(Box::new(ShardScan {
            resources: self.resources.clone(),
            locks: Arc::clone(&self.shard_locks),
            layout: self.layout()?,
            next_shard: 0,
            buffered: Vec::new().into_iter(),
            extract: Box::new(extract),
            failed: false,
        }))
    }
}

impl AttributeIndex for ShardedAttributeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> Result<Arc<IndexMetadata>> {
        self.layout()
    }

    fn insert(&self, object: &DbObject) -> Result<()> {
        let layout = self.layout()?;
        self.insert_into(&layout, object)
    }

    fn update(&self, object: &DbObject) -> Result<()> {
        let layout = self.layout()?;
        // Derive first so an unindexable object is rejected before anything is removed.
        let keys = build_keys(object, &layout.definition, self.resources.resolver.as_ref())?;
        self.remove_everywhere(&layout, object.id)?;
        for key in keys {
            self.insert_key(&layout, key, object.id)?;
        }
        Ok(())
    }

    fn remove(&self, object: &DbObject) -> Result<()> {
        let layout = self.layout()?;
        let keys = build_keys(object, &layout.definition, self.resources.resolver.as_ref())?;
        for key in keys {
            let shard_id = Self::route(&layout, &key);
            tracing::trace!(index = %self.name, %key, id = %object.id, shard_id, "remove");
            let outcome = self.with_shard_mut(&layout, shard_id, |shard| {
                let outcome = shard.remove_value(&key, object.id);
                (outcome, outcome.changed())
            })?;
            self.apply_removal(outcome);
        }
        Ok(())
    }

    fn contains(&self, object: &DbObject) -> Result<bool> {
        let layout = self.layout()?;
        let keys = build_keys(object, &layout.definition, self.resources.resolver.as_ref())?;
        for key in &keys {
            let shard_id = Self::route(&layout, key);
            if self.with_shard(&layout, shard_id, |shard| shard.contains(key, object.id))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn contains_key(&self, key: &CompositeKey) -> Result<bool> {
        let layout = self.layout()?;
        layout.definition.check_arity(key)?;
        self.with_shard(&layout, Self::route(&layout, key), |shard| {
            shard.contains_key(key)
        })
    }

    fn get_values(&self, key: &CompositeKey) -> Result<FxHashSet<ObjectId>> {
        let layout = self.layout()?;
        layout.definition.check_arity(key)?;
        self.with_shard(&layout, Self::route(&layout, key), |shard| {
            shard.get(key).cloned().unwrap_or_default()
        })
    }

    fn get_all_keys(&self) -> Result<IndexScan<CompositeKey>> {
        self.scan(|shard| shard.keys().cloned().collect())
    }

    fn get_all_values(&self) -> Result<IndexScan<ObjectId>> {
        self.scan(|shard| shard.values().collect())
    }

    fn get_key_value_pairs(&self) -> Result<IndexScan<(CompositeKey, ObjectId)>> {
        self.scan(|shard| {
            shard
                .iter()
                .flat_map(|(key, ids)| ids.iter().map(move |id| (key.clone(), *id)))
                .collect()
        })
    }

    fn range(
        &self,
        from: &CompositeKey,
        to: &CompositeKey,
        include_from: bool,
        include_to: bool,
    ) -> Result<IndexScan<(CompositeKey, ObjectId)>> {
        let layout = self.layout()?;
        layout.definition.check_arity(from)?;
        layout.definition.check_arity(to)?;
        let (from, to) = (from.clone(), to.clone());
        // Hash routing scatters adjacent keys, so every shard is visited.
        self.scan(move |shard| {
            shard
                .range(&from, &to, include_from, include_to)
                .flat_map(|(key, ids)| ids.iter().map(move |id| (key.clone(), *id)))
                .collect()
        })
    }

    fn rebuild(&self, objects: &[DbObject]) -> Result<()> {
        let layout = self.layout()?;
        tracing::info!(index = %self.name, objects = objects.len(), "rebuilding index");
        self.erase_shards(&layout)?;
        self.key_count.store(0, Ordering::SeqCst);
        self.value_count.store(0, Ordering::SeqCst);
        for object in objects {
            self.insert_into(&layout, object)?;
        }
        Ok(())
    }

    fn reshard(&self, shard_count: u32, objects: &[DbObject]) -> Result<()> {
        let layout = self.layout()?;
        let mut resized = IndexMetadata::clone(&layout);
        resized.shard_count = shard_count;
        resized.validate()?;

        tracing::info!(
            index = %self.name,
            from = layout.shard_count,
            to = shard_count,
            "resharding index"
        );
        self.erase_shards(&layout)?;
        *self.state.write() = IndexState::Active(Arc::new(resized));
        self.rebuild(objects)
    }

    fn drop_index(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.write(), IndexState::Dropped);
        match previous {
            IndexState::Active(layout) => self.erase_shards(&layout)?,
            IndexState::Uninitialized => {}
            IndexState::Dropped => return Err(IndexError::Dropped(self.name.clone()).into()),
        }
        self.key_count.store(0, Ordering::SeqCst);
        self.value_count.store(0, Ordering::SeqCst);
        tracing::info!(index = %self.name, "index dropped");
        Ok(())
    }

    fn key_count(&self) -> u64 {
        self.key_count.load(Ordering::SeqCst)
    }

    fn value_count(&self) -> u64 {
        self.value_count.load(Ordering::SeqCst)
    }

    fn stats(&self) -> Result<IndexStats> {
        let layout = self.layout()?;
        Ok(IndexStats {
            name: self.name.clone(),
            key_count: self.key_count(),
            value_count: self.value_count(),
            shard_count: layout.shard_count,
            unique: layout.unique,
        })
    }
}

/// Walks shards in id order, materializing one shard's worth of items at a
/// time.
struct ShardScan<T> {
    resources: IndexResources,
    locks: Arc<ShardLocks>,
    layout: Arc<IndexMetadata>,
    next_shard: ShardId,
    buffered: std::vec::IntoIter<T>,
    extract: Box<dyn Fn(&IndexShard) -> Vec<T> + Send>,
    failed: bool,
}

impl<T> Iterator for ShardScan<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffered.next() {
                return Some(Ok(item));
            }
            if self.failed || self.next_shard >= self.layout.shard_count {
                return None;
            }
            let shard_id = self.next_shard;
            self.next_shard += 1;
            let location = self.layout.shard_location(shard_id);
            match self.locks.fetch(&self.resources, &location, shard_id) {
                Ok(shard) => self.buffered = (self.extract)(&shard.read()).into_iter(),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
