//! Attribute descriptors and their resolution.

use super::DbObject;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::sync::Arc;
use tessera_common::types::{AttributeId, Value};
use tessera_common::utils::error::{IndexError, Result};
use tessera_common::utils::hash::FxHashMap;

/// How many values an attribute holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one value.
    Single,
    /// A list or set of values.
    Multi,
}

/// What the index layer needs to know about an attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    /// Attribute id.
    pub id: AttributeId,
    /// Human-readable name.
    pub name: String,
    /// Single- or multi-valued.
    pub cardinality: Cardinality,
    /// True for attributes that point at other objects.
    pub is_reference: bool,
    /// Value substituted when an object lacks the attribute.
    pub default_value: Value,
}

impl AttributeDescriptor {
    /// A single-valued scalar attribute.
    pub fn single(id: AttributeId, name: impl Into<String>, default_value: impl Into<Value>) -> Self {
        Self {
            id,
            name: name.into(),
            cardinality: Cardinality::Single,
            is_reference: false,
            default_value: default_value.into(),
        }
    }

    /// A multi-valued scalar attribute; `default_value` is the element default.
    pub fn multi(id: AttributeId, name: impl Into<String>, default_value: impl Into<Value>) -> Self {
        Self {
            cardinality: Cardinality::Multi,
            ..Self::single(id, name, default_value)
        }
    }

    /// A reference (foreign-key) attribute.
    pub fn reference(id: AttributeId, name: impl Into<String>) -> Self {
        Self {
            is_reference: true,
            ..Self::single(id, name, Value::Null)
        }
    }

    /// The built-in descriptor for the object-identifier pseudo-attribute.
    #[must_use]
    pub fn uuid() -> Self {
        Self::single(AttributeId::UUID, "UUID", Value::UInt64(0))
    }

    /// Returns true for multi-valued attributes.
    #[must_use]
    pub fn is_multivalued(&self) -> bool {
        self.cardinality == Cardinality::Multi
    }

    /// Reads this attribute from `object`.
    ///
    /// Returns `None` when the object does not carry the attribute.
    #[must_use]
    pub fn extract<'a>(&self, object: &'a DbObject) -> Option<Cow<'a, Value>> {
        if self.id.is_uuid() {
            return Some(Cow::Owned(Value::UInt64(object.id.as_u64())));
        }
        object.get(self.id).map(Cow::Borrowed)
    }
}

/// Resolves attribute ids to descriptors.
pub trait AttributeResolver: Send + Sync {
    /// Looks up the descriptor for `attribute`.
    fn resolve_attribute(&self, attribute: AttributeId) -> Result<Arc<AttributeDescriptor>>;
}

/// In-memory attribute registry.
///
/// The identifier pseudo-attribute is always resolvable.
pub struct AttributeCatalog {
    attributes: RwLock<FxHashMap<AttributeId, Arc<AttributeDescriptor>>>,
}

impl AttributeCatalog {
    /// Creates a catalog that only knows the identifier attribute.
    #[must_use]
    pub fn new() -> Self {
        let mut attributes = FxHashMap::default();
        attributes.insert(AttributeId::UUID, Arc::new(AttributeDescriptor::uuid()));
        Self {
            attributes: RwLock::new(attributes),
        }
    }

    /// Registers or replaces an attribute.
    pub fn define(&self, descriptor: AttributeDescriptor) {
        self.attributes
            .write()
            .insert(descriptor.id, Arc::new(descriptor));
    }

    /// Returns the number of known attributes, including the identifier.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.read().len()
    }

    /// Always false: the identifier attribute is built in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for AttributeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeResolver for AttributeCatalog {
    fn resolve_attribute(&self, attribute: AttributeId) -> Result<Arc<AttributeDescriptor>> {
        self.attributes
            .read()
            .get(&attribute)
            .cloned()
            .ok_or_else(|| IndexError::UnknownAttribute(attribute.to_string()).into())
    }
}
