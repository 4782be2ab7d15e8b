//! The bounded, pin-aware LRU object cache.

use super::entry::{CacheEntry, CacheObject, CachePriority, Cached};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tessera_common::types::ObjectLocation;
use tessera_common::utils::error::{CacheError, Result};
use tessera_common::utils::hash::{FxHashMap, FxHashSet};

/// Default cache budget: 64 MiB.
pub const DEFAULT_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Invoked once per location the cache discards.
pub type DiscardCallback = Arc<dyn Fn(&ObjectLocation) + Send + Sync>;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Byte budget for resident entries.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from memory.
    pub hits: u64,
    /// Lookups that had to load.
    pub misses: u64,
    /// Entries evicted to make room.
    pub evictions: u64,
    /// Stores the cache could not retain.
    pub rejected: u64,
    /// Resident entries.
    pub entries: usize,
    /// Sum of resident entry sizes in bytes.
    pub fill_level: usize,
    /// Byte budget.
    pub capacity: usize,
}

struct CacheState<T> {
    entries: FxHashMap<ObjectLocation, CacheEntry<T>>,
    /// tick -> location, oldest first.
    lru: BTreeMap<u64, ObjectLocation>,
    pinned: FxHashSet<ObjectLocation>,
    fill_level: usize,
    next_tick: u64,
}

impl<T> CacheState<T> {
    fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            lru: BTreeMap::new(),
            pinned: FxHashSet::default(),
            fill_level: 0,
            next_tick: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    /// Moves an entry to the most-recently-used position.
    fn touch(&mut self, location: &ObjectLocation) -> Option<Arc<T>> {
        let tick = self.tick();
        let entry = self.entries.get_mut(location)?;
        self.lru.remove(&entry.tick);
        entry.tick = tick;
        self.lru.insert(tick, location.clone());
        Some(Arc::clone(&entry.object))
    }

    fn insert(&mut self, location: ObjectLocation, object: Arc<T>, size: usize) {
        let tick = self.tick();
        self.lru.insert(tick, location.clone());
        self.fill_level += size;
        self.entries.insert(location, CacheEntry { object, size, tick });
    }

    fn take(&mut self, location: &ObjectLocation) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(location)?;
        self.lru.remove(&entry.tick);
        self.fill_level -= entry.size;
        Some(entry)
    }

    fn lru_victim(&self) -> Option<ObjectLocation> {
        self.lru
            .values()
            .find(|location| !location.is_root() && !self.pinned.contains(*location))
            .cloned()
    }

    /// Evicts until `fill_level + needed < capacity`.
    fn evict_for_space(
        &mut self,
        needed: usize,
        capacity: usize,
        evicted: &mut Vec<(ObjectLocation, Arc<T>)>,
    ) -> bool {
        while self.fill_level + needed >= capacity {
            let Some(victim) = self.lru_victim() else {
                return false;
            };
            if let Some(entry) = self.take(&victim) {
                evicted.push((victim, entry.object));
            }
        }
        true
    }
}

/// Size-bounded, pin-aware LRU cache keyed by [`ObjectLocation`].
///
/// `fill_level` always equals the sum of the recorded sizes of resident
/// entries. The root location and pinned locations are never evicted.
pub struct ObjectCache<T: CacheObject> {
    capacity: usize,
    state: Mutex<CacheState<T>>,
    on_discard: RwLock<Option<DiscardCallback>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    rejected: AtomicU64,
}

impl<T: CacheObject> ObjectCache<T> {
    /// Creates a cache from configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_capacity(config.capacity)
    }

    /// Creates a cache with a byte budget.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::new()),
            on_discard: RwLock::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Builder-style discard callback registration.
    #[must_use]
    pub fn with_discard_callback(self, callback: DiscardCallback) -> Self {
        *self.on_discard.write() = Some(callback);
        self
    }

    /// Installs (or replaces) the discard callback.
    pub fn set_discard_callback(&self, callback: DiscardCallback) {
        *self.on_discard.write() = Some(callback);
    }

    /// Returns a resident object and marks it most recently used.
    pub fn get(&self, location: &ObjectLocation) -> Option<Arc<T>> {
        let found = self.state.lock().touch(location);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Like [`get`](Self::get), but a missing location is an error.
    pub fn lookup(&self, location: &ObjectLocation) -> Result<Arc<T>> {
        self.get(location)
            .ok_or_else(|| CacheError::LocatorNotFound(location.to_string()).into())
    }

    /// Returns true if the location is resident. Does not affect LRU order.
    #[must_use]
    pub fn contains(&self, location: &ObjectLocation) -> bool {
        self.state.lock().entries.contains_key(location)
    }

    /// Returns the resident object, or loads, caches, and returns it.
    ///
    /// The loader runs without the cache lock held. If another thread cached
    /// the same location meanwhile, its object wins and the freshly loaded
    /// one is dropped, so every caller observes a single instance. Loader
    /// failures surface as [`CacheError::ShardLoadFailed`] and leave the
    /// cache untouched.
    pub fn get_or_load<F>(&self, location: &ObjectLocation, loader: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(object) = self.state.lock().touch(location) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(object);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(%location, "cache miss, loading");
        let object = loader().map_err(|cause| CacheError::ShardLoadFailed {
            location: location.to_string(),
            cause: Box::new(cause),
        })?;
        let object = Arc::new(object);
        let size = object.estimated_size();

        let mut evicted = Vec::new();
        let result = {
            let mut state = self.state.lock();
            if let Some(existing) = state.touch(location) {
                existing
            } else {
                self.store_locked(
                    &mut state,
                    location.clone(),
                    Arc::clone(&object),
                    size,
                    &mut evicted,
                );
                object
            }
        };
        self.notify(evicted);
        Ok(result)
    }

    /// Inserts or replaces the entry at `location`.
    ///
    /// With [`CachePriority::Pinned`] the location also joins the pin set.
    /// Objects larger than the whole budget, or that cannot be made room
    /// for, come back as [`Cached::Transient`]. A replaced entry is reported
    /// to the discard callback like an evicted one.
    pub fn store(&self, location: ObjectLocation, object: T, priority: CachePriority) -> Cached<T> {
        self.store_arc(location, Arc::new(object), priority)
    }

    /// [`store`](Self::store) for an already shared object.
    pub fn store_arc(
        &self,
        location: ObjectLocation,
        object: Arc<T>,
        priority: CachePriority,
    ) -> Cached<T> {
        let size = object.estimated_size();
        let mut evicted = Vec::new();
        let resident = {
            let mut state = self.state.lock();
            if priority == CachePriority::Pinned {
                state.pinned.insert(location.clone());
            }
            if let Some(replaced) = state.take(&location) {
                evicted.push((location.clone(), replaced.object));
            }
            self.store_locked(&mut state, location, Arc::clone(&object), size, &mut evicted)
        };
        self.notify(evicted);
        if resident {
            Cached::Resident(object)
        } else {
            Cached::Transient(object)
        }
    }

    fn store_locked(
        &self,
        state: &mut CacheState<T>,
        location: ObjectLocation,
        object: Arc<T>,
        size: usize,
        evicted: &mut Vec<(ObjectLocation, Arc<T>)>,
    ) -> bool {
        if size > self.capacity {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%location, size, capacity = self.capacity, "object exceeds cache capacity, not cached");
            return false;
        }
        let before = evicted.len();
        let made_room = state.evict_for_space(size, self.capacity, evicted);
        self.evictions
            .fetch_add((evicted.len() - before) as u64, Ordering::Relaxed);
        if !made_room {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%location, size, "no evictable entries left, not cached");
            return false;
        }
        state.insert(location, object, size);
        true
    }

    /// Evicts least-recently-used entries until `needed` more bytes fit.
    ///
    /// Returns false when only pinned or root entries remain and the space
    /// still is not available. Entries evicted before giving up stay evicted.
    pub fn evict_for_space(&self, needed: usize) -> bool {
        let mut evicted = Vec::new();
        let made_room = self
            .state
            .lock()
            .evict_for_space(needed, self.capacity, &mut evicted);
        self.evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        self.notify(evicted);
        made_room
    }

    /// Removes `location`, or with `recursive` also every descendant
    /// location. Returns the number of entries removed.
    pub fn remove(&self, location: &ObjectLocation, recursive: bool) -> usize {
        let mut removed = Vec::new();
        {
            let mut state = self.state.lock();
            let targets: Vec<ObjectLocation> = if recursive {
                state
                    .entries
                    .keys()
                    .filter(|l| *l == location || l.is_descendant_of(location))
                    .cloned()
                    .collect()
            } else {
                vec![location.clone()]
            };
            for target in targets {
                if let Some(entry) = state.take(&target) {
                    removed.push((target, entry.object));
                }
            }
        }
        let count = removed.len();
        self.notify(removed);
        count
    }

    /// Marks a location as never evictable. Idempotent.
    pub fn set_pinned(&self, location: ObjectLocation) {
        self.state.lock().pinned.insert(location);
    }

    /// Removes a location from the pin set.
    pub fn unpin(&self, location: &ObjectLocation) -> bool {
        self.state.lock().pinned.remove(location)
    }

    /// Returns true if the location is in the pin set.
    #[must_use]
    pub fn is_pinned(&self, location: &ObjectLocation) -> bool {
        self.state.lock().pinned.contains(location)
    }

    /// Re-estimates the size of a resident entry after its payload changed.
    ///
    /// Evicts other entries if the cache is now over budget. Returns false if
    /// the location is not resident.
    pub fn refresh(&self, location: &ObjectLocation) -> bool {
        let Some(object) = self
            .state
            .lock()
            .entries
            .get(location)
            .map(|entry| Arc::clone(&entry.object))
        else {
            return false;
        };
        // Sized without the cache lock: estimating may take the payload's own lock.
        let size = object.estimated_size();

        let mut evicted = Vec::new();
        let refreshed = {
            let mut state = self.state.lock();
            match state.entries.get_mut(location) {
                Some(entry) if Arc::ptr_eq(&entry.object, &object) => {
                    let old = std::mem::replace(&mut entry.size, size);
                    state.fill_level = state.fill_level - old + size;
                    if state.fill_level >= self.capacity {
                        state.evict_for_space(0, self.capacity, &mut evicted);
                    }
                    true
                }
                _ => false,
            }
        };
        self.evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        drop(object);
        self.notify(evicted);
        refreshed
    }

    /// Removes every entry, disposing payloads. The pin set is kept.
    pub fn clear(&self) {
        let drained: Vec<(ObjectLocation, Arc<T>)> = {
            let mut state = self.state.lock();
            state.lru.clear();
            state.fill_level = 0;
            state
                .entries
                .drain()
                .map(|(location, entry)| (location, entry.object))
                .collect()
        };
        for (_, object) in &drained {
            object.dispose();
        }
        self.notify(drained);
    }

    /// Current sum of resident entry sizes.
    #[must_use]
    pub fn fill_level(&self) -> usize {
        self.state.lock().fill_level
    }

    /// Byte budget.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if nothing is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Snapshot of counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let (entries, fill_level) = {
            let state = self.state.lock();
            (state.entries.len(), state.fill_level)
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            entries,
            fill_level,
            capacity: self.capacity,
        }
    }

    /// Fires the discard callback for each released entry. Must be called
    /// without the state lock held.
    fn notify(&self, released: Vec<(ObjectLocation, Arc<T>)>) {
        if released.is_empty() {
            return;
        }
        let callback = self.on_discard.read().clone();
        for (location, object) in released {
            tracing::debug!(%location, "discarded from cache");
            drop(object);
            if let Some(callback) = &callback {
                callback(&location);
            }
        }
    }
}
