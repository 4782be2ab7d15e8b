//! Attribute values.

use super::id::ObjectId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A dynamically typed attribute value.
///
/// Values are totally ordered (floats use IEEE total ordering) so they can be
/// used directly as components of ordered index keys. Values of different
/// kinds order by kind first, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    String(Arc<str>),
    /// Multi-valued attribute (list or set of values).
    List(Vec<Value>),
    /// Reference to another object (a foreign key / edge target).
    Reference(ObjectId),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int64(_) => 2,
            Self::UInt64(_) => 3,
            Self::Float64(_) => 4,
            Self::String(_) => 5,
            Self::List(_) => 6,
            Self::Reference(_) => 7,
        }
    }

    /// Returns a short name for the value's kind.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOL",
            Self::Int64(_) => "INT64",
            Self::UInt64(_) => "UINT64",
            Self::Float64(_) => "FLOAT64",
            Self::String(_) => "STRING",
            Self::List(_) => "LIST",
            Self::Reference(_) => "REFERENCE",
        }
    }

    /// Returns true for single, non-reference values.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Reference(_))
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the signed integer payload, if any.
    #[must_use]
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the list payload, if any.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    /// Approximate heap + inline footprint in bytes, used for cache accounting.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        let inline = std::mem::size_of::<Self>();
        match self {
            Self::String(s) => inline + s.len(),
            Self::List(values) => inline + values.iter().map(Value::estimated_size).sum::<usize>(),
            _ => inline,
        }
    }

    /// Feeds a platform-independent encoding of the value into `state`.
    ///
    /// Unlike [`Hash`], the bytes written here never depend on pointer width,
    /// so the result can be used to route keys to persisted shards.
    pub fn stable_hash<H: Hasher>(&self, state: &mut H) {
        state.write(&[self.rank()]);
        match self {
            Self::Null => {}
            Self::Bool(v) => state.write(&[u8::from(*v)]),
            Self::Int64(v) => state.write(&v.to_le_bytes()),
            Self::UInt64(v) => state.write(&v.to_le_bytes()),
            Self::Float64(v) => state.write(&v.to_bits().to_le_bytes()),
            Self::String(s) => {
                state.write(&(s.len() as u64).to_le_bytes());
                state.write(s.as_bytes());
            }
            Self::List(values) => {
                state.write(&(values.len() as u64).to_le_bytes());
                for value in values {
                    value.stable_hash(state);
                }
            }
            Self::Reference(id) => state.write(&id.as_u64().to_le_bytes()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::UInt64(a), Self::UInt64(b)) => a.cmp(b),
            (Self::Float64(a), Self::Float64(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => a.cmp(b),
            (Self::Reference(a), Self::Reference(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::UInt64(v) => v.hash(state),
            Self::Float64(v) => v.to_bits().hash(state),
            Self::String(s) => s.hash(state),
            Self::List(values) => values.hash(state),
            Self::Reference(id) => id.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::Reference(id) => write!(f, "->{id}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int64(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(Arc::from(v))
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Reference(id)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash::FxHasher;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_ordering_within_kind() {
        assert!(Value::from(1i64) < Value::from(2i64));
        assert!(Value::from("a@x") < Value::from("b@x"));
        assert!(Value::from(-0.5f64) < Value::from(0.25f64));
    }

    #[test]
    fn test_ordering_across_kinds_is_by_rank() {
        assert!(Value::Null < Value::from(false));
        assert!(Value::from(i64::MAX) < Value::from(0u64));
        assert!(Value::from(99.0f64) < Value::from(""));
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_ne!(Value::from(0.0f64), Value::from(-0.0f64));
    }

    #[test]
    fn test_usable_in_ordered_set() {
        let set: BTreeSet<Value> = ["b", "a", "c", "a"].into_iter().map(Value::from).collect();
        let ordered: Vec<_> = set.iter().filter_map(Value::as_str).collect();
        assert_eq!(ordered, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_scalar_classification() {
        assert!(Value::from(3i64).is_scalar());
        assert!(!Value::from(vec![1i64, 2]).is_scalar());
        assert!(!Value::from(ObjectId::new(1)).is_scalar());
    }

    fn stable(value: &Value) -> u64 {
        let mut hasher = FxHasher::default();
        value.stable_hash(&mut hasher);
        hasher.finish()
    }

    // Small domains so equal pairs come up often.
    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            (-3i64..3).prop_map(Value::from),
            (0u64..3).prop_map(Value::from),
            prop::sample::select(vec![0.0f64, -0.0, 1.5, f64::NAN]).prop_map(Value::from),
            "[ab]{0,2}".prop_map(Value::from),
            (0u64..3).prop_map(|id| Value::from(ObjectId::new(id))),
        ]
    }

    fn value() -> impl Strategy<Value = Value> {
        prop_oneof![
            4 => scalar(),
            1 => prop::collection::vec(scalar(), 0..3).prop_map(Value::List),
        ]
    }

    proptest! {
        #[test]
        fn test_equal_values_hash_equally(a in value(), b in value()) {
            if a == b {
                prop_assert_eq!(stable(&a), stable(&b));
            }
            prop_assert_eq!(stable(&a), stable(&a.clone()));
        }

        #[test]
        fn test_order_is_total(a in value(), b in value(), c in value()) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            prop_assert_eq!(a == b, a.cmp(&b) == Ordering::Equal);
            if a <= b && b <= c {
                prop_assert!(a <= c);
            }
        }
    }
}
