//! Index types by name.
//!
//! Index types are registered up front as plain factory functions and
//! selected by tag when an index is created.

use super::metadata::IndexMetadata;
use super::sharded::{IndexResources, ShardedAttributeIndex};
use super::traits::AttributeIndex;
use std::sync::Arc;
use tessera_common::utils::error::{IndexError, Result};
use tessera_common::utils::hash::FxHashMap;

/// Builds an initialized index from its metadata.
pub type IndexFactory = fn(IndexMetadata, &IndexResources) -> Result<Arc<dyn AttributeIndex>>;

/// Hash-sharded index with a configurable shard count.
pub const SHARDED: &str = "sharded";

/// Single-shard index; range scans come back in global key order.
pub const ORDERED: &str = "ordered";

/// Map from type tag to factory.
#[derive(Clone)]
pub struct IndexTypeRegistry {
    factories: FxHashMap<&'static str, IndexFactory>,
}

impl IndexTypeRegistry {
    /// A registry with no types.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// A registry with the built-in `"sharded"` and `"ordered"` types.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(SHARDED, create_sharded);
        registry.register(ORDERED, create_ordered);
        registry
    }

    /// Registers (or replaces) a type.
    pub fn register(&mut self, tag: &'static str, factory: IndexFactory) {
        self.factories.insert(tag, factory);
    }

    /// Returns true if `tag` is registered.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags, sorted.
    #[must_use]
    pub fn available(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.factories.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Creates an index of type `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::IndexTypeMismatch`] for unknown tags, or any
    /// error the factory raises.
    pub fn create(
        &self,
        tag: &str,
        metadata: IndexMetadata,
        resources: &IndexResources,
    ) -> Result<Arc<dyn AttributeIndex>> {
        let factory = self.factories.get(tag).ok_or_else(|| IndexError::IndexTypeMismatch {
            requested: tag.to_string(),
            available: self.available().join(", "),
        })?;
        tracing::debug!(index = %metadata.name, index_type = tag, "creating index");
        factory(metadata, resources)
    }
}

impl Default for IndexTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn create_sharded(metadata: IndexMetadata, resources: &IndexResources) -> Result<Arc<dyn AttributeIndex>> {
    let index = ShardedAttributeIndex::new(metadata.name.clone(), resources.clone());
    index.initialize(metadata)?;
    Ok(Arc::new(index))
}

fn create_ordered(mut metadata: IndexMetadata, resources: &IndexResources) -> Result<Arc<dyn AttributeIndex>> {
    metadata.shard_count = 1;
    create_sharded(metadata, resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::index::{CompositeKey, CompositeKeyDefinition, IndexConfig, MemoryShardStore, ShardCache};
    use crate::schema::{AttributeCatalog, AttributeDescriptor, DbObject};
    use tessera_common::types::{AttributeId, ObjectId, ObjectLocation, TypeId};
    use tessera_common::utils::error::Error;

    const AGE: AttributeId = AttributeId::new(1);

    fn resources() -> IndexResources {
        let catalog = AttributeCatalog::new();
        catalog.define(AttributeDescriptor::single(AGE, "age", 0i64));
        IndexResources {
            cache: Arc::new(ShardCache::new(CacheConfig::default())),
            store: Arc::new(MemoryShardStore::new()),
            resolver: Arc::new(catalog),
        }
    }

    fn metadata(name: &str) -> IndexMetadata {
        IndexMetadata::new(
            name,
            TypeId::new(1),
            ObjectLocation::new("/People/"),
            CompositeKeyDefinition::new([AGE]),
        )
        .with_config(IndexConfig::default().with_shard_count(8))
    }

    #[test]
    fn test_builtins() {
        let registry = IndexTypeRegistry::new();
        assert_eq!(registry.available(), vec!["ordered", "sharded"]);

        let sharded = registry.create(SHARDED, metadata("by_age"), &resources()).unwrap();
        assert_eq!(sharded.metadata().unwrap().shard_count, 8);
    }

    #[test]
    fn test_ordered_range_is_globally_sorted() {
        let registry = IndexTypeRegistry::new();
        let index = registry.create(ORDERED, metadata("by_age"), &resources()).unwrap();
        assert_eq!(index.metadata().unwrap().shard_count, 1);

        for (id, age) in [(1u64, 40i64), (2, 7), (3, 19), (4, 33)] {
            let person = DbObject::new(ObjectId::new(id), TypeId::new(1)).with_attribute(AGE, age);
            index.insert(&person).unwrap();
        }

        let ages: Vec<i64> = index
            .range(&CompositeKey::single(0i64), &CompositeKey::single(100i64), true, true)
            .unwrap()
            .map(|pair| pair.map(|(key, _)| key.values()[0].as_int64().unwrap_or_default()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(ages, vec![7, 19, 33, 40]);
    }

    #[test]
    fn test_unknown_tag() {
        let registry = IndexTypeRegistry::new();
        let err = registry
            .create("fulltext", metadata("by_age"), &resources())
            .err()
            .unwrap();
        match err {
            Error::Index(IndexError::IndexTypeMismatch { requested, available }) => {
                assert_eq!(requested, "fulltext");
                assert_eq!(available, "ordered, sharded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_registration() {
        fn tiny(mut metadata: IndexMetadata, resources: &IndexResources) -> Result<Arc<dyn AttributeIndex>> {
            metadata.shard_count = 2;
            create_sharded(metadata, resources)
        }

        let mut registry = IndexTypeRegistry::empty();
        registry.register("tiny", tiny);
        assert!(registry.contains("tiny"));
        assert!(!registry.contains(SHARDED));

        let index = registry.create("tiny", metadata("by_age"), &resources()).unwrap();
        assert_eq!(index.stats().unwrap().shard_count, 2);
    }
}
