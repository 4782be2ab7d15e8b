//! Size-bounded object cache.
//!
//! Holds deserialized persisted objects (index shards, domain objects) up to
//! a byte budget. Entries are evicted least-recently-used first, except for
//! pinned locations and the root location, which are never evicted.
//!
//! ```text
//!   get_or_load ──hit──▶ touch (move to MRU) ──▶ Arc<T>
//!        │
//!       miss ──▶ loader() [no lock held] ──▶ evict_for_space ──▶ insert
//!                                                  │
//!                                                  ▼
//!                                    on_discard(location) per eviction
//! ```
//!
//! Every operation runs under one mutex per cache instance. Loaders run
//! with that mutex released, so a loader may call back into the cache.
//! Discard callbacks are also invoked after the mutex is released.
//!
//! A full cache is not an error. When no room can be made the object is
//! returned as [`Cached::Transient`] and simply not retained.

mod entry;
mod object_cache;

pub use entry::{CacheObject, CachePriority, Cached};
pub use object_cache::{
    CacheConfig, CacheStats, DEFAULT_CACHE_CAPACITY, DiscardCallback, ObjectCache,
};
