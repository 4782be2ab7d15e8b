//! TesseraDB main database struct.

use std::path::Path;
use std::sync::Arc;

use tessera_adapters::{FileShardStore, IndexMetadataStore};
use tessera_common::types::{AttributeId, ObjectId, ObjectLocation, TypeId};
use tessera_common::utils::error::Result;
use tessera_core::index::registry::SHARDED;
use tessera_core::index::{IndexResources, ShardCache};
use tessera_core::{
    AttributeCatalog, AttributeDescriptor, AttributeIndex, AttributeResolver,
    CompositeKeyDefinition, DbObject, IndexConfig, IndexMetadata, IndexTypeRegistry,
    MemoryShardStore, ShardStore,
};

use crate::catalog::IndexCatalog;
use crate::config::Config;
use crate::objects::DomainObjectCache;

/// Subdirectory of a persistent database holding shard files.
const SHARDS_DIR: &str = "shards";

/// Subdirectory of a persistent database holding index metadata.
const CATALOG_DIR: &str = "catalog";

/// The main Tessera database.
///
/// Owns the shard cache shared by every index, the shard store behind it,
/// the attribute catalog used to derive index keys, the index catalog, and
/// the domain-object cache.
pub struct TesseraDB {
    /// Database configuration.
    config: Config,
    /// Materialized index shards.
    shard_cache: Arc<ShardCache>,
    /// Where shards are persisted.
    shard_store: Arc<dyn ShardStore>,
    /// Attribute descriptors.
    attributes: Arc<AttributeCatalog>,
    /// Every index, by name.
    indices: IndexCatalog,
    /// Recently used domain objects.
    objects: DomainObjectCache,
}

impl TesseraDB {
    /// Creates a new in-memory database.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_engine::TesseraDB;
    ///
    /// let db = TesseraDB::new_in_memory();
    /// assert!(db.indices().is_empty());
    /// ```
    #[must_use]
    pub fn new_in_memory() -> Self {
        Self::assemble(
            Config::in_memory(),
            IndexTypeRegistry::new(),
            Arc::new(MemoryShardStore::new()),
            None,
        )
    }

    /// Opens or creates a database at the given path.
    ///
    /// Indices recorded by an earlier session are reopened with their
    /// counters recomputed from the persisted shards.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tessera_engine::TesseraDB;
    ///
    /// let db = TesseraDB::open("./my_database").expect("Failed to open database");
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(Config::persistent(path.as_ref()))
    }

    /// Creates a database with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database directories cannot be created or an
    /// existing index cannot be reopened.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_engine::{Config, TesseraDB};
    ///
    /// let config = Config::in_memory().with_shard_cache_capacity(8 * 1024 * 1024);
    /// let db = TesseraDB::with_config(config).unwrap();
    /// ```
    pub fn with_config(config: Config) -> Result<Self> {
        Self::with_registry(config, IndexTypeRegistry::new())
    }

    /// Creates a database whose index catalog resolves type tags through
    /// `registry`.
    ///
    /// # Errors
    ///
    /// See [`with_config`](Self::with_config).
    pub fn with_registry(config: Config, registry: IndexTypeRegistry) -> Result<Self> {
        let Some(path) = config.path.clone() else {
            return Ok(Self::assemble(
                config,
                registry,
                Arc::new(MemoryShardStore::new()),
                None,
            ));
        };

        std::fs::create_dir_all(&path)?;
        let shard_store =
            FileShardStore::open(path.join(SHARDS_DIR))?.with_sync_writes(config.sync_writes);
        let metadata_store = IndexMetadataStore::open(path.join(CATALOG_DIR))?;

        let db = Self::assemble(config, registry, Arc::new(shard_store), Some(metadata_store));
        let reopened = db.indices.reload()?;
        tracing::info!(path = %path.display(), indices = reopened, "database opened");
        Ok(db)
    }

    fn assemble(
        config: Config,
        registry: IndexTypeRegistry,
        shard_store: Arc<dyn ShardStore>,
        metadata_store: Option<IndexMetadataStore>,
    ) -> Self {
        let shard_cache = Arc::new(
            ShardCache::with_capacity(config.shard_cache_capacity).with_discard_callback(
                Arc::new(|location: &ObjectLocation| {
                    tracing::trace!(%location, "index shard released");
                }),
            ),
        );
        let attributes = Arc::new(AttributeCatalog::new());
        let resolver: Arc<dyn AttributeResolver> = attributes.clone();
        let resources = IndexResources {
            cache: Arc::clone(&shard_cache),
            store: Arc::clone(&shard_store),
            resolver,
        };
        let objects = DomainObjectCache::new(&config.base_location, config.object_cache_capacity);

        Self {
            indices: IndexCatalog::new(registry, resources, metadata_store),
            config,
            shard_cache,
            shard_store,
            attributes,
            objects,
        }
    }

    /// Registers (or replaces) an attribute descriptor.
    pub fn define_attribute(&self, descriptor: AttributeDescriptor) {
        self.attributes.define(descriptor);
    }

    /// Creates an index over `definition` for objects of `type_id`.
    ///
    /// The index lives below the type's location with the default edition.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken, the tag is unknown, or the layout is
    /// invalid.
    pub fn create_index(
        &self,
        tag: &str,
        name: &str,
        type_id: TypeId,
        definition: CompositeKeyDefinition,
        config: IndexConfig,
    ) -> Result<Arc<dyn AttributeIndex>> {
        let location = self.config.type_location(type_id);
        let metadata = IndexMetadata::new(name, type_id, location, definition).with_config(config);
        self.indices.create_index(tag, metadata)
    }

    /// Creates the unique system index over object identifiers of a type.
    ///
    /// # Errors
    ///
    /// See [`create_index`](Self::create_index).
    pub fn create_uuid_index(
        &self,
        name: &str,
        type_id: TypeId,
    ) -> Result<Arc<dyn AttributeIndex>> {
        self.create_index(
            SHARDED,
            name,
            type_id,
            CompositeKeyDefinition::uuid(),
            IndexConfig::unique().with_shard_count(self.config.default_shard_count),
        )
    }

    /// Indexes a new object and caches it.
    ///
    /// # Errors
    ///
    /// Returns the first index failure, such as a uniqueness violation. The
    /// object is not cached in that case.
    pub fn insert(&self, object: DbObject) -> Result<()> {
        self.indices.insert(&object)?;
        self.objects.put(object);
        Ok(())
    }

    /// Re-indexes a changed object and caches the new version.
    ///
    /// # Errors
    ///
    /// Returns the first index failure. The cached version is dropped.
    pub fn update(&self, object: DbObject) -> Result<()> {
        if let Err(err) = self.indices.update(&object) {
            self.objects.invalidate(object.type_id, object.id);
            return Err(err);
        }
        self.objects.put(object);
        Ok(())
    }

    /// Removes an object from every index of its type and from the cache.
    pub fn remove(&self, object: &DbObject) -> Result<()> {
        self.objects.invalidate(object.type_id, object.id);
        self.indices.remove(object)
    }

    /// Returns a cached object, or loads and caches it.
    pub fn get_object<F>(&self, type_id: TypeId, id: ObjectId, loader: F) -> Result<Arc<DbObject>>
    where
        F: FnOnce() -> Result<DbObject>,
    {
        self.objects.get_or_load(type_id, id, loader)
    }

    /// Drops a type: every index over it, its cached shards, and its
    /// cached objects. Returns how many indices were dropped.
    pub fn drop_type(&self, type_id: TypeId) -> Result<usize> {
        let dropped = self.indices.drop_type(type_id)?;
        self.shard_cache.remove(&self.config.type_location(type_id), true);
        self.objects.invalidate_type(type_id);
        Ok(dropped)
    }

    /// Returns true if `attribute` is known.
    #[must_use]
    pub fn has_attribute(&self, attribute: AttributeId) -> bool {
        self.attributes.resolve_attribute(attribute).is_ok()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the index catalog.
    #[must_use]
    pub fn indices(&self) -> &IndexCatalog {
        &self.indices
    }

    /// Returns the domain-object cache.
    #[must_use]
    pub fn objects(&self) -> &DomainObjectCache {
        &self.objects
    }

    /// Returns the shard cache shared by all indices.
    #[must_use]
    pub fn shard_cache(&self) -> &Arc<ShardCache> {
        &self.shard_cache
    }

    /// Returns the shard store.
    #[must_use]
    pub fn shard_store(&self) -> &Arc<dyn ShardStore> {
        &self.shard_store
    }

    /// Returns the attribute catalog.
    #[must_use]
    pub fn attributes(&self) -> &Arc<AttributeCatalog> {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tessera_common::types::Value;
    use tessera_common::utils::error::{Error, IndexError};
    use tessera_core::CompositeKey;
    use tessera_core::index::registry::ORDERED;

    const EMAIL: AttributeId = AttributeId::new(1);
    const TAGS: AttributeId = AttributeId::new(2);
    const USERS: TypeId = TypeId::new(1);

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    fn define_schema(db: &TesseraDB) {
        db.define_attribute(AttributeDescriptor::single(EMAIL, "email", ""));
        db.define_attribute(AttributeDescriptor::multi(TAGS, "tags", ""));
    }

    fn user(id: u64, email: &str) -> DbObject {
        DbObject::new(ObjectId::new(id), USERS).with_attribute(EMAIL, email)
    }

    fn email_index(db: &TesseraDB) -> Arc<dyn AttributeIndex> {
        db.create_index(
            SHARDED,
            "user_email",
            USERS,
            CompositeKeyDefinition::new([EMAIL]),
            IndexConfig::unique().with_shard_count(4),
        )
        .unwrap()
    }

    #[test]
    fn test_create_in_memory_database() {
        let db = TesseraDB::new_in_memory();
        assert!(db.indices().is_empty());
        assert!(db.objects().is_empty());
        assert!(!db.config().is_persistent());
    }

    #[test]
    fn test_unique_email_index() {
        let db = TesseraDB::new_in_memory();
        define_schema(&db);
        let index = email_index(&db);

        db.insert(user(1, "a@x")).unwrap();
        db.insert(user(2, "b@x")).unwrap();
        assert_eq!((index.key_count(), index.value_count()), (2, 2));

        let err = db.insert(user(3, "a@x")).unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!((index.key_count(), index.value_count()), (2, 2));
        assert!(db.objects().get(USERS, ObjectId::new(3)).is_none());

        let values = index.get_values(&CompositeKey::single("a@x")).unwrap();
        assert_eq!(values.into_iter().collect::<Vec<_>>(), vec![ObjectId::new(1)]);

        db.remove(&user(1, "a@x")).unwrap();
        assert_eq!((index.key_count(), index.value_count()), (1, 1));
        assert!(db.objects().get(USERS, ObjectId::new(1)).is_none());
    }

    #[test]
    fn test_update_moves_key() {
        let db = TesseraDB::new_in_memory();
        define_schema(&db);
        let index = email_index(&db);

        db.insert(user(1, "old@x")).unwrap();
        db.update(user(1, "new@x")).unwrap();

        assert!(!index.contains_key(&CompositeKey::single("old@x")).unwrap());
        assert!(index.contains_key(&CompositeKey::single("new@x")).unwrap());
        let cached = db.objects().get(USERS, ObjectId::new(1)).unwrap();
        assert_eq!(cached.get(EMAIL), Some(&Value::from("new@x")));
    }

    #[test]
    fn test_uuid_index() {
        let db = TesseraDB::new_in_memory();
        define_schema(&db);
        let index = db.create_uuid_index("user_id", USERS).unwrap();
        assert!(index.metadata().unwrap().is_uuid_index);

        db.insert(user(42, "a@x")).unwrap();
        assert!(index.contains(&user(42, "whatever")).unwrap());
        assert!(index.contains_key(&CompositeKey::single(Value::UInt64(42))).unwrap());
        assert!(db.insert(user(42, "b@x")).unwrap_err().is_unique_violation());
    }

    #[test]
    fn test_multi_valued_tags() {
        let db = TesseraDB::new_in_memory();
        define_schema(&db);
        let index = db
            .create_index(
                ORDERED,
                "user_tags",
                USERS,
                CompositeKeyDefinition::new([TAGS]),
                db.config().index_config(),
            )
            .unwrap();

        let tagged = user(1, "a@x").with_attribute(
            TAGS,
            Value::List(vec![Value::from("admin"), Value::from("ops")]),
        );
        db.insert(tagged).unwrap();
        db.insert(user(2, "b@x").with_attribute(TAGS, Value::List(vec![Value::from("ops")])))
            .unwrap();

        assert_eq!((index.key_count(), index.value_count()), (2, 3));
        let tags: Vec<CompositeKey> = index
            .get_all_keys()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(tags, vec![CompositeKey::single("admin"), CompositeKey::single("ops")]);
    }

    #[test]
    fn test_drop_type_clears_caches() {
        let db = TesseraDB::new_in_memory();
        define_schema(&db);
        email_index(&db);
        for id in 0..10 {
            db.insert(user(id, &format!("u{id}@x"))).unwrap();
        }
        assert!(!db.shard_cache().is_empty());

        assert_eq!(db.drop_type(USERS).unwrap(), 1);
        assert!(db.shard_cache().is_empty());
        assert!(db.objects().is_empty());
        assert!(matches!(
            db.indices().get("user_email"),
            Err(Error::Index(IndexError::NotFound(_)))
        ));
    }

    #[test]
    fn test_persistent_database_reopen() {
        init_tracing();
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test_db");

        {
            let db = TesseraDB::open(&db_path).unwrap();
            define_schema(&db);
            email_index(&db);
            for id in 0..50 {
                db.insert(user(id, &format!("u{id}@x"))).unwrap();
            }
            db.remove(&user(7, "u7@x")).unwrap();
        }

        let db = TesseraDB::open(&db_path).unwrap();
        define_schema(&db);
        let index = db.indices().get("user_email").unwrap();
        assert_eq!((index.key_count(), index.value_count()), (49, 49));
        assert!(index.contains_key(&CompositeKey::single("u8@x")).unwrap());
        assert!(!index.contains_key(&CompositeKey::single("u7@x")).unwrap());
        assert!(db.insert(user(100, "u9@x")).unwrap_err().is_unique_violation());
    }

    #[test]
    fn test_small_cache_keeps_every_key() {
        let dir = tempdir().unwrap();
        let config = Config::persistent(dir.path()).with_shard_cache_capacity(4 * 1024);
        let db = TesseraDB::with_config(config).unwrap();
        define_schema(&db);
        let index = db
            .create_index(
                SHARDED,
                "user_email",
                USERS,
                CompositeKeyDefinition::new([EMAIL]),
                IndexConfig::default().with_shard_count(8),
            )
            .unwrap();

        for id in 0..200 {
            db.insert(user(id, &format!("user{id}@example.com"))).unwrap();
        }
        assert!(db.shard_cache().stats().evictions > 0);
        assert_eq!(index.get_all_keys().unwrap().count(), 200);
        for id in (0..200).step_by(37) {
            let key = CompositeKey::single(format!("user{id}@example.com"));
            assert!(index.contains_key(&key).unwrap());
        }
    }

    #[test]
    fn test_reshard_survives_reopen() {
        init_tracing();
        let dir = tempdir().unwrap();
        let users: Vec<DbObject> = (0..30).map(|id| user(id, &format!("u{id}@x"))).collect();

        {
            let db = TesseraDB::open(dir.path()).unwrap();
            define_schema(&db);
            email_index(&db);
            for object in &users {
                db.insert(object.clone()).unwrap();
            }
            db.indices().reshard("user_email", 2, &users).unwrap();
        }

        let db = TesseraDB::open(dir.path()).unwrap();
        let index = db.indices().get("user_email").unwrap();
        assert_eq!(index.metadata().unwrap().shard_count, 2);
        assert_eq!((index.key_count(), index.value_count()), (30, 30));
        assert!(dir.path().join("shards/Types/1/Indices/user_email#default1.shard").is_file());
        assert!(!dir.path().join("shards/Types/1/Indices/user_email#default3.shard").exists());
    }

    #[test]
    fn test_has_attribute() {
        let db = TesseraDB::new_in_memory();
        assert!(db.has_attribute(AttributeId::UUID));
        assert!(!db.has_attribute(EMAIL));
        define_schema(&db);
        assert!(db.has_attribute(EMAIL));
    }
}
