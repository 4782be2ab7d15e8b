//! Domain objects (vertices) as seen by the index layer.

use crate::cache::CacheObject;
use serde::{Deserialize, Serialize};
use tessera_common::types::{AttributeId, ObjectId, TypeId, Value};
use tessera_common::utils::hash::FxHashMap;

/// A persisted domain object: identity, type, and attribute values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbObject {
    /// Object identifier.
    pub id: ObjectId,
    /// Owning type.
    pub type_id: TypeId,
    /// Attribute values by attribute id. Missing attributes are absent.
    pub attributes: FxHashMap<AttributeId, Value>,
}

impl DbObject {
    /// Creates an object with no attributes.
    #[must_use]
    pub fn new(id: ObjectId, type_id: TypeId) -> Self {
        Self {
            id,
            type_id,
            attributes: FxHashMap::default(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeId, value: impl Into<Value>) -> Self {
        self.attributes.insert(attribute, value.into());
        self
    }

    /// Sets an attribute value, returning the previous one.
    pub fn set(&mut self, attribute: AttributeId, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(attribute, value.into())
    }

    /// Gets an attribute value.
    #[must_use]
    pub fn get(&self, attribute: AttributeId) -> Option<&Value> {
        self.attributes.get(&attribute)
    }

    /// Removes an attribute value.
    pub fn unset(&mut self, attribute: AttributeId) -> Option<Value> {
        self.attributes.remove(&attribute)
    }

    /// Approximate footprint in bytes.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .attributes
                .values()
                .map(|v| std::mem::size_of::<AttributeId>() + v.estimated_size())
                .sum::<usize>()
    }
}

impl CacheObject for DbObject {
    fn estimated_size(&self) -> usize {
        DbObject::estimated_size(self)
    }
}
