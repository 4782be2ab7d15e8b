//! Database configuration.

use std::path::{Path, PathBuf};
use tessera_common::types::{ObjectLocation, TypeId};
use tessera_core::IndexConfig;
use tessera_core::cache::DEFAULT_CACHE_CAPACITY;
use tessera_core::index::metadata::DEFAULT_SHARD_COUNT;

/// Default byte budget of the domain-object cache.
pub const DEFAULT_OBJECT_CACHE_CAPACITY: usize = 16 * 1024 * 1024;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding shards and index metadata. `None` keeps everything
    /// in memory.
    pub path: Option<PathBuf>,

    /// Byte budget of the shard cache.
    pub shard_cache_capacity: usize,

    /// Byte budget of the domain-object cache.
    pub object_cache_capacity: usize,

    /// Shard count for indices created without an explicit one.
    pub default_shard_count: u32,

    /// Location every type and object location is derived from.
    pub base_location: ObjectLocation,

    /// Fsync shard files before they replace the previous version.
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            shard_cache_capacity: DEFAULT_CACHE_CAPACITY,
            object_cache_capacity: DEFAULT_OBJECT_CACHE_CAPACITY,
            default_shard_count: DEFAULT_SHARD_COUNT,
            base_location: ObjectLocation::root(),
            sync_writes: false,
        }
    }
}

impl Config {
    /// Configuration for a volatile database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Configuration for a database stored under `path`.
    #[must_use]
    pub fn persistent(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Sets the shard cache budget in bytes.
    #[must_use]
    pub fn with_shard_cache_capacity(mut self, bytes: usize) -> Self {
        self.shard_cache_capacity = bytes;
        self
    }

    /// Sets the domain-object cache budget in bytes.
    #[must_use]
    pub fn with_object_cache_capacity(mut self, bytes: usize) -> Self {
        self.object_cache_capacity = bytes;
        self
    }

    /// Sets the default shard count.
    #[must_use]
    pub fn with_default_shard_count(mut self, shard_count: u32) -> Self {
        self.default_shard_count = shard_count;
        self
    }

    /// Sets the base location.
    #[must_use]
    pub fn with_base_location(mut self, location: ObjectLocation) -> Self {
        self.base_location = location;
        self
    }

    /// Enables fsync on every shard write.
    #[must_use]
    pub fn with_sync_writes(mut self) -> Self {
        self.sync_writes = true;
        self
    }

    /// Returns true if the database persists to disk.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    /// Index settings used when the caller does not choose any.
    #[must_use]
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::default().with_shard_count(self.default_shard_count)
    }

    /// Location of a type; its index shards live below it.
    #[must_use]
    pub fn type_location(&self, type_id: TypeId) -> ObjectLocation {
        self.base_location.join(&format!("Types/{type_id}/"))
    }
}
