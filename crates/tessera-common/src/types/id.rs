//! Identifier newtypes.
//!
//! All identifiers are thin wrappers over `u64` so they are `Copy`, cheap to
//! hash, and serialize to a fixed-width integer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based shard number inside one sharded index, in `[0, shard_count)`.
pub type ShardId = u32;

/// Unique identifier of a persisted domain object (a vertex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Sentinel for "no object".
    pub const INVALID: Self = Self(u64::MAX);

    /// Creates an object id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns false for the [`INVALID`](Self::INVALID) sentinel.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a domain object type (the "vertex type").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(u64);

impl TypeId {
    /// Creates a type id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an attribute definition.
///
/// [`AttributeId::UUID`] is reserved for the object identifier itself and is
/// what UUID indices are defined over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(u64);

impl AttributeId {
    /// The pseudo-attribute holding an object's own identifier.
    pub const UUID: Self = Self(0);

    /// Creates an attribute id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for the reserved identifier attribute.
    #[must_use]
    pub const fn is_uuid(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attr#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_validity() {
        assert!(ObjectId::new(7).is_valid());
        assert!(!ObjectId::INVALID.is_valid());
        assert_eq!(ObjectId::new(7).as_u64(), 7);
    }

    #[test]
    fn test_uuid_attribute_is_reserved() {
        assert!(AttributeId::UUID.is_uuid());
        assert!(!AttributeId::new(3).is_uuid());
    }
}
