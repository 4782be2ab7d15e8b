//! Addresses of persisted objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Path separator used by every location.
pub const SEPARATOR: char = '/';

/// Where a persisted object lives, as a `/`-separated path.
///
/// Locations are cheap to clone (the path is shared) and form a tree: the
/// root `/` is the ancestor of every other location. Index shards live at
/// `<type location>Indices/<index>#<edition><shard>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectLocation(Arc<str>);

impl ObjectLocation {
    /// Creates a location from a path string.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    /// The distinguished root location.
    #[must_use]
    pub fn root() -> Self {
        Self(Arc::from("/"))
    }

    /// Returns true if this is the root location.
    #[must_use]
    pub fn is_root(&self) -> bool {
        &*self.0 == "/"
    }

    /// Returns the path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends a path segment, inserting a separator when needed.
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.trim_start_matches(SEPARATOR);
        if self.0.ends_with(SEPARATOR) {
            Self::new(format!("{}{}", self.0, segment))
        } else {
            Self::new(format!("{}{}{}", self.0, SEPARATOR, segment))
        }
    }

    /// Appends raw text with no separator handling.
    #[must_use]
    pub fn concat(&self, suffix: &str) -> Self {
        Self::new(format!("{}{}", self.0, suffix))
    }

    /// Returns true if `self` lies strictly below `ancestor` in the path tree.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &ObjectLocation) -> bool {
        let this = self.as_str();
        let prefix = ancestor.as_str();
        if this.len() <= prefix.len() || !this.starts_with(prefix) {
            return false;
        }
        prefix.ends_with(SEPARATOR) || this[prefix.len()..].starts_with(SEPARATOR)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectLocation {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ObjectLocation {
    fn from(path: String) -> Self {
        Self(Arc::from(path))
    }
}
