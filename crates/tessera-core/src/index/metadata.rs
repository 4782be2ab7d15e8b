//! Persisted index identity and layout.

use super::key::CompositeKeyDefinition;
use super::store::shard_location;
use serde::{Deserialize, Serialize};
use tessera_common::types::{ObjectLocation, ShardId, TypeId};
use tessera_common::utils::error::{IndexError, Result};

/// Shard count used when none is configured.
pub const DEFAULT_SHARD_COUNT: u32 = 16;

/// Edition used when none is configured.
pub const DEFAULT_EDITION: &str = "default";

/// Per-index settings chosen at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Number of shards. Fixed for the life of the index.
    pub shard_count: u32,
    /// Reject a second object under an existing key.
    pub unique: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            unique: false,
        }
    }
}

impl IndexConfig {
    /// A unique index with the default shard count.
    #[must_use]
    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }

    /// Sets the shard count.
    pub fn with_shard_count(mut self, shard_count: u32) -> Self {
        self.shard_count = shard_count;
        self
    }
}

/// Everything needed to reopen an index.
///
/// Field order is the serialized order and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Base location of the owning type; shards live below it.
    pub location: ObjectLocation,
    /// Edition tag, part of every shard location.
    pub edition: String,
    /// Index name, unique within the database.
    pub name: String,
    /// True for the system index over object identifiers.
    pub is_uuid_index: bool,
    /// The type whose objects are indexed.
    pub type_id: TypeId,
    /// Number of shards.
    pub shard_count: u32,
    /// Whether keys are unique.
    pub unique: bool,
    /// Attributes the key is built from.
    pub definition: CompositeKeyDefinition,
}

impl IndexMetadata {
    /// Creates metadata with the default edition and configuration.
    pub fn new(
        name: impl Into<String>,
        type_id: TypeId,
        location: ObjectLocation,
        definition: CompositeKeyDefinition,
    ) -> Self {
        let config = IndexConfig::default();
        Self {
            location,
            edition: DEFAULT_EDITION.to_string(),
            name: name.into(),
            is_uuid_index: definition.is_uuid(),
            type_id,
            shard_count: config.shard_count,
            unique: config.unique,
            definition,
        }
    }

    /// Applies shard count and uniqueness.
    pub fn with_config(mut self, config: IndexConfig) -> Self {
        self.shard_count = config.shard_count;
        self.unique = config.unique;
        self
    }

    /// Sets the edition.
    pub fn with_edition(mut self, edition: impl Into<String>) -> Self {
        self.edition = edition.into();
        self
    }

    /// Location of shard `shard_id`.
    #[must_use]
    pub fn shard_location(&self, shard_id: ShardId) -> ObjectLocation {
        shard_location(&self.location, &self.name, &self.edition, shard_id)
    }

    /// Locations of every shard, in shard-id order.
    pub fn shard_locations(&self) -> impl Iterator<Item = (ShardId, ObjectLocation)> + '_ {
        (0..self.shard_count).map(|shard_id| (shard_id, self.shard_location(shard_id)))
    }

    /// Checks that the metadata describes a usable index.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Result<()> { Err(IndexError::InvalidConfig(reason).into()) };
        if self.name.is_empty() || self.name.contains(['/', '#']) {
            return invalid(format!("bad index name '{}'", self.name));
        }
        // The shard id is appended directly, so a trailing digit would make
        // `v1` shard 0 and `v` shard 10 share a location.
        if self.edition.is_empty()
            || self.edition.contains(['/', '\\'])
            || self.edition.contains("..")
            || self.edition.ends_with(|c: char| c.is_ascii_digit())
        {
            return invalid(format!(
                "bad edition '{}' for index '{}'",
                self.edition, self.name
            ));
        }
        if self.shard_count == 0 {
            return invalid(format!("index '{}' needs at least one shard", self.name));
        }
        if self.definition.is_empty() {
            return invalid(format!("index '{}' has an empty key definition", self.name));
        }
        if self.is_uuid_index != self.definition.is_uuid() {
            return invalid(format!(
                "index '{}' uuid flag does not match its key definition",
                self.name
            ));
        }
        Ok(())
    }

    /// Current settings as a config.
    #[must_use]
    pub fn config(&self) -> IndexConfig {
        IndexConfig {
            shard_count: self.shard_count,
            unique: self.unique,
        }
    }
}

/// Point-in-time index counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    /// Index name.
    pub name: String,
    /// Distinct keys with at least one value.
    pub key_count: u64,
    /// Key/id pairs.
    pub value_count: u64,
    /// Number of shards.
    pub shard_count: u32,
    /// Whether keys are unique.
    pub unique: bool,
}
