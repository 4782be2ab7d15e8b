//! Composite keys and how they are derived from objects.
//!
//! A [`CompositeKeyDefinition`] lists the attributes a key is made of. For a
//! given object, [`build_keys`] produces one [`CompositeKey`] per combination
//! of values: single-valued attributes contribute one component, and
//! multi-valued attributes multiply the number of keys (cross-product).
//!
//! ```text
//! definition: [tags, email]
//! object:     tags = ["a", "b"], email = "x@y"
//! keys:       ("a", "x@y"), ("b", "x@y")
//! ```

use crate::schema::{AttributeResolver, DbObject};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hasher;
use tessera_common::types::{AttributeId, Value};
use tessera_common::utils::error::{Error, IndexError, Result};
use tessera_common::utils::hash::FxHasher;

/// The ordered attribute list an index's keys are built from.
///
/// Two definitions are equal iff their attribute sequences are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKeyDefinition {
    attributes: SmallVec<[AttributeId; 4]>,
}

impl CompositeKeyDefinition {
    /// Creates a definition from attribute ids, in key-component order.
    pub fn new(attributes: impl IntoIterator<Item = AttributeId>) -> Self {
        Self {
            attributes: attributes.into_iter().collect(),
        }
    }

    /// The definition of an identifier index.
    #[must_use]
    pub fn uuid() -> Self {
        Self::new([AttributeId::UUID])
    }

    /// Attribute ids in component order.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeId] {
        &self.attributes
    }

    /// Number of key components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if the definition has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Returns true if this is the single-component identifier definition.
    #[must_use]
    pub fn is_uuid(&self) -> bool {
        self.attributes.len() == 1 && self.attributes[0].is_uuid()
    }

    /// Fails with [`IndexError::KeyArity`] if `key` does not fit this definition.
    pub fn check_arity(&self, key: &CompositeKey) -> Result<()> {
        if key.len() == self.len() {
            Ok(())
        } else {
            Err(IndexError::KeyArity {
                expected: self.len(),
                found: key.len(),
            }
            .into())
        }
    }
}

/// An ordered tuple of scalar values, one per attribute of a definition.
///
/// Keys order lexicographically by component, which is the order range
/// queries return within a shard. A key does not record its definition;
/// the owning index checks it with
/// [`CompositeKeyDefinition::check_arity`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    values: SmallVec<[Value; 2]>,
}

impl CompositeKey {
    /// Creates a key from its components.
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Creates a one-component key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self::new([value.into()])
    }

    /// Key components.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true for the zero-component key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Process-independent hash used for shard routing.
    #[must_use]
    pub fn stable_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write_u64(self.values.len() as u64);
        for value in &self.values {
            value.stable_hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Approximate footprint in bytes.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.values.iter().map(Value::estimated_size).sum::<usize>()
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

/// Derives every composite key `object` contributes under `definition`.
///
/// Missing attributes (and empty multi-valued ones) take the attribute's
/// default value. Reference attributes are rejected with
/// [`Error::NotImplemented`]: keys built from them would not be meaningful.
///
/// # Errors
///
/// Returns an error if an attribute cannot be resolved or is (or contains)
/// a reference.
pub fn build_keys(
    object: &DbObject,
    definition: &CompositeKeyDefinition,
    resolver: &dyn AttributeResolver,
) -> Result<BTreeSet<CompositeKey>> {
    let mut partial: Vec<SmallVec<[Value; 2]>> = vec![SmallVec::new()];

    for &attribute in definition.attributes() {
        let descriptor = resolver.resolve_attribute(attribute)?;
        if descriptor.is_reference {
            return Err(reference_unsupported(&descriptor.name));
        }

        let extracted = descriptor.extract(object);
        let components: Vec<Value> = match extracted.as_deref() {
            None => vec![descriptor.default_value.clone()],
            Some(Value::Reference(_)) => return Err(reference_unsupported(&descriptor.name)),
            Some(Value::List(items)) if items.is_empty() => vec![descriptor.default_value.clone()],
            Some(Value::List(items)) => {
                if items.iter().any(|item| !item.is_scalar()) {
                    return Err(Error::NotImplemented(format!(
                        "attribute '{}' holds non-scalar list elements",
                        descriptor.name
                    )));
                }
                items.clone()
            }
            Some(scalar) => vec![scalar.clone()],
        };

        partial = partial
            .into_iter()
            .flat_map(|prefix| {
                components.iter().map(move |component| {
                    let mut key = prefix.clone();
                    key.push(component.clone());
                    key
                })
            })
            .collect();
    }

    Ok(partial
        .into_iter()
        .map(|values| CompositeKey { values })
        .collect())
}

fn reference_unsupported(attribute: &str) -> Error {
    Error::NotImplemented(format!("indexing reference attribute '{attribute}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeCatalog, AttributeDescriptor};
    use tessera_common::types::{ObjectId, TypeId};

    const EMAIL: AttributeId = AttributeId::new(1);
    const TAGS: AttributeId = AttributeId::new(2);
    const COLORS: AttributeId = AttributeId::new(3);
    const OWNER: AttributeId = AttributeId::new(4);

    fn catalog() -> AttributeCatalog {
        let catalog = AttributeCatalog::new();
        catalog.define(AttributeDescriptor::single(EMAIL, "email", ""));
        catalog.define(AttributeDescriptor::multi(TAGS, "tags", "untagged"));
        catalog.define(AttributeDescriptor::multi(COLORS, "colors", "none"));
        catalog.define(AttributeDescriptor::reference(OWNER, "owner"));
        catalog
    }

    fn object(id: u64) -> DbObject {
        DbObject::new(ObjectId::new(id), TypeId::new(1))
    }

    #[test]
    fn test_single_attribute_key() {
        let obj = object(1).with_attribute(EMAIL, "a@x");
        let keys = build_keys(&obj, &CompositeKeyDefinition::new([EMAIL]), &catalog()).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&CompositeKey::single("a@x")));
    }

    #[test]
    fn test_missing_attribute_uses_default() {
        let keys = build_keys(&object(1), &CompositeKeyDefinition::new([EMAIL]), &catalog()).unwrap();
        assert!(keys.contains(&CompositeKey::single("")));
    }

    #[test]
    fn test_cross_product() {
        let obj = object(1)
            .with_attribute(TAGS, vec!["a", "b"])
            .with_attribute(EMAIL, "x@y")
            .with_attribute(COLORS, vec!["red", "green", "blue"]);
        let definition = CompositeKeyDefinition::new([TAGS, EMAIL, COLORS]);

        let keys = build_keys(&obj, &definition, &catalog()).unwrap();

        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&CompositeKey::new([
            Value::from("b"),
            Value::from("x@y"),
            Value::from("red"),
        ])));
        assert!(keys.iter().all(|k| k.len() == 3));
    }

    #[test]
    fn test_duplicate_list_elements_collapse() {
        let obj = object(1).with_attribute(TAGS, vec!["a", "a", "b"]);
        let keys = build_keys(&obj, &CompositeKeyDefinition::new([TAGS]), &catalog()).unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_empty_list_uses_default() {
        let obj = object(1).with_attribute(TAGS, Value::List(Vec::new()));
        let keys = build_keys(&obj, &CompositeKeyDefinition::new([TAGS]), &catalog()).unwrap();
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec![CompositeKey::single("untagged")]
        );
    }

    #[test]
    fn test_reference_attribute_not_implemented() {
        let obj = object(1).with_attribute(OWNER, ObjectId::new(7));
        let err = build_keys(&obj, &CompositeKeyDefinition::new([OWNER]), &catalog()).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));

        // A reference value smuggled into a scalar attribute is rejected too.
        let obj = object(1).with_attribute(EMAIL, ObjectId::new(7));
        let err = build_keys(&obj, &CompositeKeyDefinition::new([EMAIL]), &catalog()).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }

    #[test]
    fn test_uuid_key_is_object_id() {
        let keys = build_keys(&object(42), &CompositeKeyDefinition::uuid(), &catalog()).unwrap();
        assert!(keys.contains(&CompositeKey::single(42u64)));
    }

    #[test]
    fn test_stable_hash_is_content_based() {
        let a = CompositeKey::new([Value::from("a@x"), Value::from(1i64)]);
        let b = CompositeKey::new([Value::from("a@x"), Value::from(1i64)]);
        let c = CompositeKey::new([Value::from(1i64), Value::from("a@x")]);
        assert_eq!(a.stable_hash(), b.stable_hash());
        assert_ne!(a.stable_hash(), c.stable_hash());
    }

    #[test]
    fn test_arity_check() {
        let definition = CompositeKeyDefinition::new([EMAIL, TAGS]);
        assert!(definition.check_arity(&CompositeKey::new([Value::Null, Value::Null])).is_ok());
        let err = definition.check_arity(&CompositeKey::single("a")).unwrap_err();
        assert!(matches!(
            err,
            Error::Index(IndexError::KeyArity { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_display() {
        let key = CompositeKey::new([Value::from("a@x"), Value::from(3i64)]);
        assert_eq!(key.to_string(), "(\"a@x\", 3)");
    }
}
