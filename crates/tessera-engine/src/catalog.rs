//! Index catalog: creation, lookup, per-type dispatch, and maintenance.
//!
//! The catalog owns every live index of a database. Index metadata is
//! written to the [`IndexMetadataStore`] when an index is created or
//! resharded, and removed when it is dropped, so a persistent database
//! reopens with the same set of indices.

use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;
use tessera_adapters::IndexMetadataStore;
use tessera_common::types::TypeId;
use tessera_common::utils::error::{IndexError, Result};
use tessera_common::utils::hash::FxHashMap;
use tessera_core::index::IndexResources;
use tessera_core::index::registry::SHARDED;
use tessera_core::{AttributeIndex, DbObject, IndexMetadata, IndexStats, IndexTypeRegistry};

struct CatalogEntry {
    type_id: TypeId,
    index: Arc<dyn AttributeIndex>,
}

/// All indices of one database, by name.
pub struct IndexCatalog {
    registry: IndexTypeRegistry,
    resources: IndexResources,
    metadata_store: Option<IndexMetadataStore>,
    indices: RwLock<FxHashMap<String, CatalogEntry>>,
}

impl IndexCatalog {
    /// Creates an empty catalog. Without a metadata store, indices live only
    /// as long as the catalog.
    #[must_use]
    pub fn new(
        registry: IndexTypeRegistry,
        resources: IndexResources,
        metadata_store: Option<IndexMetadataStore>,
    ) -> Self {
        Self {
            registry,
            resources,
            metadata_store,
            indices: RwLock::new(FxHashMap::default()),
        }
    }

    /// Reopens every index recorded in the metadata store.
    ///
    /// Persisted metadata carries the effective layout, so every index
    /// comes back as a sharded index with its recorded shard count.
    pub fn reload(&self) -> Result<usize> {
        let Some(store) = &self.metadata_store else {
            return Ok(0);
        };
        let mut indices = self.indices.write();
        let mut loaded = 0;
        for metadata in store.load_all()? {
            let name = metadata.name.clone();
            let type_id = metadata.type_id;
            let index = self.registry.create(SHARDED, metadata, &self.resources)?;
            tracing::debug!(index = %name, keys = index.key_count(), "index reopened");
            indices.insert(name, CatalogEntry { type_id, index });
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Creates an index of type `tag` and records its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::AlreadyExists`] if the name is taken,
    /// [`IndexError::IndexTypeMismatch`] for an unknown tag, or any error
    /// from validating the metadata or persisting it.
    pub fn create_index(
        &self,
        tag: &str,
        metadata: IndexMetadata,
    ) -> Result<Arc<dyn AttributeIndex>> {
        let mut indices = self.indices.write();
        if indices.contains_key(&metadata.name) {
            return Err(IndexError::AlreadyExists(metadata.name).into());
        }

        let name = metadata.name.clone();
        let type_id = metadata.type_id;
        let index = self.registry.create(tag, metadata, &self.resources)?;
        if let Some(store) = &self.metadata_store {
            if let Err(err) = store.save(&*index.metadata()?) {
                index.drop_index()?;
                return Err(err);
            }
        }

        tracing::info!(index = %name, %type_id, index_type = tag, "index created");
        indices.insert(
            name,
            CatalogEntry {
                type_id,
                index: Arc::clone(&index),
            },
        );
        Ok(index)
    }

    /// Looks up an index by name.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] for unknown names.
    pub fn get(&self, name: &str) -> Result<Arc<dyn AttributeIndex>> {
        self.indices
            .read()
            .get(name)
            .map(|entry| Arc::clone(&entry.index))
            .ok_or_else(|| IndexError::NotFound(name.to_string()).into())
    }

    /// Returns true if an index with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.indices.read().contains_key(name)
    }

    /// Index names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indices.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Indices over objects of `type_id`, sorted by name.
    #[must_use]
    pub fn indices_for(&self, type_id: TypeId) -> Vec<Arc<dyn AttributeIndex>> {
        let mut found: Vec<(String, Arc<dyn AttributeIndex>)> = self
            .indices
            .read()
            .iter()
            .filter(|(_, entry)| entry.type_id == type_id)
            .map(|(name, entry)| (name.clone(), Arc::clone(&entry.index)))
            .collect();
        found.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        found.into_iter().map(|(_, index)| index).collect()
    }

    /// Counter snapshots of every index, sorted by name.
    pub fn stats(&self) -> Result<Vec<IndexStats>> {
        let indices: Vec<Arc<dyn AttributeIndex>> = self
            .indices
            .read()
            .values()
            .map(|entry| Arc::clone(&entry.index))
            .collect();
        let mut stats = indices
            .iter()
            .map(|index| index.stats())
            .collect::<Result<Vec<_>>>()?;
        stats.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Ok(stats)
    }

    /// Drops an index: its shards, its cached shards, and its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] for unknown names.
    pub fn drop_index(&self, name: &str) -> Result<()> {
        let entry = self
            .indices
            .write()
            .remove(name)
            .ok_or_else(|| IndexError::NotFound(name.to_string()))?;
        let metadata = entry.index.metadata()?;
        entry.index.drop_index()?;
        if let Some(store) = &self.metadata_store {
            store.remove(&metadata.name, &metadata.edition)?;
        }
        Ok(())
    }

    /// Drops every index over objects of `type_id`. Returns how many were
    /// dropped.
    pub fn drop_type(&self, type_id: TypeId) -> Result<usize> {
        let names: Vec<String> = self
            .indices
            .read()
            .iter()
            .filter(|(_, entry)| entry.type_id == type_id)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            self.drop_index(name)?;
        }
        tracing::info!(%type_id, dropped = names.len(), "dropped indices of type");
        Ok(names.len())
    }

    /// Indexes a new object in every index of its type.
    ///
    /// Stops at the first failing index; indices visited earlier keep the
    /// object.
    pub fn insert(&self, object: &DbObject) -> Result<()> {
        for index in self.indices_for(object.type_id) {
            index.insert(object)?;
        }
        Ok(())
    }

    /// Re-indexes a changed object in every index of its type.
    pub fn update(&self, object: &DbObject) -> Result<()> {
        for index in self.indices_for(object.type_id) {
            index.update(object)?;
        }
        Ok(())
    }

    /// Removes an object from every index of its type.
    pub fn remove(&self, object: &DbObject) -> Result<()> {
        for index in self.indices_for(object.type_id) {
            index.remove(object)?;
        }
        Ok(())
    }

    /// Rebuilds one index from `objects`.
    pub fn rebuild(&self, name: &str, objects: &[DbObject]) -> Result<()> {
        self.get(name)?.rebuild(objects)
    }

    /// Rebuilds every index of a type in parallel.
    pub fn rebuild_type(&self, type_id: TypeId, objects: &[DbObject]) -> Result<()> {
        let indices = self.indices_for(type_id);
        tracing::info!(%type_id, indices = indices.len(), "rebuilding indices of type");
        indices.par_iter().try_for_each(|index| index.rebuild(objects))
    }

    /// Moves an index to a new shard count and records the new layout.
    ///
    /// Must not run concurrently with other operations on the same index.
    pub fn reshard(&self, name: &str, shard_count: u32, objects: &[DbObject]) -> Result<()> {
        let index = self.get(name)?;
        index.reshard(shard_count, objects)?;
        if let Some(store) = &self.metadata_store {
            store.save(&*index.metadata()?)?;
        }
        Ok(())
    }

    /// Number of indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.read().len()
    }

    /// Returns true if there are no indices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tessera_common::types::{AttributeId, ObjectId, ObjectLocation};
    use tessera_common::utils::error::Error;
    use tessera_core::cache::CacheConfig;
    use tessera_core::index::ShardCache;
    use tessera_core::{
        AttributeCatalog, AttributeDescriptor, CompositeKey, CompositeKeyDefinition, IndexConfig,
        MemoryShardStore,
    };

    const EMAIL: AttributeId = AttributeId::new(1);
    const AGE: AttributeId = AttributeId::new(2);
    const USERS: TypeId = TypeId::new(1);
    const ORDERS: TypeId = TypeId::new(2);

    fn resources() -> IndexResources {
        let catalog = AttributeCatalog::new();
        catalog.define(AttributeDescriptor::single(EMAIL, "email", ""));
        catalog.define(AttributeDescriptor::single(AGE, "age", 0i64));
        IndexResources {
            cache: Arc::new(ShardCache::new(CacheConfig::default())),
            store: Arc::new(MemoryShardStore::new()),
            resolver: Arc::new(catalog),
        }
    }

    fn metadata(name: &str, type_id: TypeId, attribute: AttributeId) -> IndexMetadata {
        IndexMetadata::new(
            name,
            type_id,
            ObjectLocation::new(format!("/Types/{type_id}/")),
            CompositeKeyDefinition::new([attribute]),
        )
        .with_config(IndexConfig::default().with_shard_count(4))
    }

    fn user(id: u64, email: &str, age: i64) -> DbObject {
        DbObject::new(ObjectId::new(id), USERS)
            .with_attribute(EMAIL, email)
            .with_attribute(AGE, age)
    }

    fn catalog() -> IndexCatalog {
        IndexCatalog::new(IndexTypeRegistry::new(), resources(), None)
    }

    #[test]
    fn test_create_get_list() {
        let catalog = catalog();
        catalog.create_index(SHARDED, metadata("by_email", USERS, EMAIL)).unwrap();
        catalog.create_index("ordered", metadata("by_age", USERS, AGE)).unwrap();

        assert_eq!(catalog.list(), vec!["by_age", "by_email"]);
        assert_eq!(catalog.get("by_age").unwrap().metadata().unwrap().shard_count, 1);
        assert!(matches!(
            catalog.get("missing"),
            Err(Error::Index(IndexError::NotFound(_)))
        ));
    }

    #[test]
    fn test_duplicate_name() {
        let catalog = catalog();
        catalog.create_index(SHARDED, metadata("by_email", USERS, EMAIL)).unwrap();
        let err = catalog
            .create_index(SHARDED, metadata("by_email", USERS, AGE))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Index(IndexError::AlreadyExists(_))));
    }

    #[test]
    fn test_unknown_type_tag() {
        let catalog = catalog();
        let err = catalog
            .create_index("spatial", metadata("by_email", USERS, EMAIL))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Index(IndexError::IndexTypeMismatch { .. })));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_dispatch_by_type() {
        let catalog = catalog();
        catalog.create_index(SHARDED, metadata("by_email", USERS, EMAIL)).unwrap();
        catalog.create_index(SHARDED, metadata("by_age", USERS, AGE)).unwrap();
        catalog.create_index(SHARDED, metadata("order_age", ORDERS, AGE)).unwrap();

        let mut alice = user(1, "alice@x", 30);
        catalog.insert(&alice).unwrap();
        catalog.insert(&user(2, "bob@x", 30)).unwrap();

        assert_eq!(catalog.get("by_email").unwrap().key_count(), 2);
        assert_eq!(catalog.get("by_age").unwrap().value_count(), 2);
        assert_eq!(catalog.get("order_age").unwrap().value_count(), 0);

        alice.set(AGE, 31i64);
        catalog.update(&alice).unwrap();
        let by_age = catalog.get("by_age").unwrap();
        assert_eq!(by_age.key_count(), 2);
        assert!(by_age.contains_key(&CompositeKey::single(31i64)).unwrap());

        catalog.remove(&alice).unwrap();
        assert_eq!(catalog.get("by_email").unwrap().key_count(), 1);
        assert_eq!(by_age.key_count(), 1);
    }

    #[test]
    fn test_drop_type() {
        let catalog = catalog();
        catalog.create_index(SHARDED, metadata("by_email", USERS, EMAIL)).unwrap();
        catalog.create_index(SHARDED, metadata("by_age", USERS, AGE)).unwrap();
        catalog.create_index(SHARDED, metadata("order_age", ORDERS, AGE)).unwrap();
        let by_email = catalog.get("by_email").unwrap();

        assert_eq!(catalog.drop_type(USERS).unwrap(), 2);
        assert_eq!(catalog.list(), vec!["order_age"]);
        assert!(matches!(
            by_email.insert(&user(1, "a@x", 1)),
            Err(Error::Index(IndexError::Dropped(_)))
        ));
    }

    #[test]
    fn test_rebuild_type() {
        let catalog = catalog();
        catalog.create_index(SHARDED, metadata("by_email", USERS, EMAIL)).unwrap();
        catalog.create_index(SHARDED, metadata("by_age", USERS, AGE)).unwrap();
        catalog.insert(&user(99, "stale@x", 99)).unwrap();

        let users: Vec<DbObject> = (0..20)
            .map(|i| user(i, &format!("u{i}@x"), (i % 5) as i64))
            .collect();
        catalog.rebuild_type(USERS, &users).unwrap();

        let by_email = catalog.get("by_email").unwrap();
        assert_eq!((by_email.key_count(), by_email.value_count()), (20, 20));
        assert!(!by_email.contains_key(&CompositeKey::single("stale@x")).unwrap());
        let by_age = catalog.get("by_age").unwrap();
        assert_eq!((by_age.key_count(), by_age.value_count()), (5, 20));
    }

    #[test]
    fn test_metadata_survives_reload() {
        let dir = tempdir().unwrap();
        let shards = Arc::new(MemoryShardStore::new());
        let shared = || IndexResources {
            store: shards.clone() as Arc<dyn tessera_core::ShardStore>,
            ..resources()
        };

        {
            let catalog = IndexCatalog::new(
                IndexTypeRegistry::new(),
                shared(),
                Some(IndexMetadataStore::open(dir.path()).unwrap()),
            );
            catalog.create_index(SHARDED, metadata("by_email", USERS, EMAIL)).unwrap();
            catalog.create_index(SHARDED, metadata("by_age", USERS, AGE)).unwrap();
            catalog.insert(&user(1, "a@x", 20)).unwrap();
            catalog.reshard("by_age", 2, &[user(1, "a@x", 20)]).unwrap();
            catalog.drop_index("by_email").unwrap();
        }

        let catalog = IndexCatalog::new(
            IndexTypeRegistry::new(),
            shared(),
            Some(IndexMetadataStore::open(dir.path()).unwrap()),
        );
        assert_eq!(catalog.reload().unwrap(), 1);
        let by_age = catalog.get("by_age").unwrap();
        assert_eq!(by_age.metadata().unwrap().shard_count, 2);
        assert_eq!(by_age.value_count(), 1);
    }
}
