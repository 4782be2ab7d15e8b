//! Bounded cache of domain objects.
//!
//! Objects are addressed as `<base>Objects/<type>/<id>`, so every object of
//! a type sits below one location and can be dropped with a single
//! recursive removal.

use std::sync::Arc;
use tessera_common::types::{ObjectId, ObjectLocation, TypeId};
use tessera_common::utils::error::Result;
use tessera_core::cache::CacheStats;
use tessera_core::{CachePriority, Cached, DbObject, ObjectCache};

/// Domain objects held in memory up to a byte budget.
pub struct DomainObjectCache {
    cache: ObjectCache<DbObject>,
    root: ObjectLocation,
}

impl DomainObjectCache {
    /// Creates a cache rooted below `base`.
    #[must_use]
    pub fn new(base: &ObjectLocation, capacity: usize) -> Self {
        Self {
            cache: ObjectCache::with_capacity(capacity),
            root: base.join("Objects/"),
        }
    }

    /// Location every object of `type_id` lives below.
    #[must_use]
    pub fn type_location(&self, type_id: TypeId) -> ObjectLocation {
        self.root.join(&type_id.to_string())
    }

    /// Location of one object.
    #[must_use]
    pub fn location_of(&self, type_id: TypeId, id: ObjectId) -> ObjectLocation {
        self.type_location(type_id).join(&id.to_string())
    }

    /// Returns a cached object.
    pub fn get(&self, type_id: TypeId, id: ObjectId) -> Option<Arc<DbObject>> {
        self.cache.get(&self.location_of(type_id, id))
    }

    /// Returns the cached object, or loads and caches it.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, wrapped as a cache load failure.
    pub fn get_or_load<F>(&self, type_id: TypeId, id: ObjectId, loader: F) -> Result<Arc<DbObject>>
    where
        F: FnOnce() -> Result<DbObject>,
    {
        self.cache.get_or_load(&self.location_of(type_id, id), loader)
    }

    /// Caches `object`, replacing any previous version.
    pub fn put(&self, object: DbObject) -> Cached<DbObject> {
        let location = self.location_of(object.type_id, object.id);
        self.cache.store(location, object, CachePriority::Normal)
    }

    /// Drops one object. Returns true if it was cached.
    pub fn invalidate(&self, type_id: TypeId, id: ObjectId) -> bool {
        self.cache.remove(&self.location_of(type_id, id), false) > 0
    }

    /// Drops every cached object of a type. Returns how many were removed.
    pub fn invalidate_type(&self, type_id: TypeId) -> usize {
        let removed = self.cache.remove(&self.type_location(type_id), true);
        tracing::debug!(%type_id, removed, "invalidated cached objects of type");
        removed
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of cached objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Counter snapshot of the underlying cache.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
