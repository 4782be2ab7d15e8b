//! Cache payload contract and per-entry bookkeeping.

use parking_lot::RwLock;
use std::sync::Arc;

/// Implemented by anything the cache can hold.
pub trait CacheObject: Send + Sync {
    /// Approximate footprint in bytes, used for fill-level accounting.
    fn estimated_size(&self) -> usize;

    /// Releases external resources when the cache is cleared.
    fn dispose(&self) {}
}

impl<T: CacheObject> CacheObject for RwLock<T> {
    fn estimated_size(&self) -> usize {
        self.read().estimated_size()
    }

    fn dispose(&self) {
        self.read().dispose();
    }
}

/// Eviction priority requested when storing an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePriority {
    /// Normal LRU participation.
    #[default]
    Normal,
    /// Never evicted; the location joins the pin set.
    Pinned,
}

/// Outcome of a store: the object, and whether the cache kept it.
#[derive(Debug)]
pub enum Cached<T> {
    /// The cache retains the object.
    Resident(Arc<T>),
    /// The cache had no room; the object is only valid for the caller.
    Transient(Arc<T>),
}

impl<T> Cached<T> {
    /// Returns true if the cache kept the object.
    #[must_use]
    pub fn is_resident(&self) -> bool {
        matches!(self, Self::Resident(_))
    }

    /// Borrows the object.
    #[must_use]
    pub fn object(&self) -> &Arc<T> {
        match self {
            Self::Resident(object) | Self::Transient(object) => object,
        }
    }

    /// Unwraps the object regardless of residency.
    #[must_use]
    pub fn into_object(self) -> Arc<T> {
        match self {
            Self::Resident(object) | Self::Transient(object) => object,
        }
    }
}

/// A resident entry.
#[derive(Debug)]
pub(crate) struct CacheEntry<T> {
    pub(crate) object: Arc<T>,
    /// Size recorded at insert or last refresh.
    pub(crate) size: usize,
    /// Position in the LRU order; larger is more recent.
    pub(crate) tick: u64,
}
