//! One persisted partition of an index's key space.

use super::key::CompositeKey;
use crate::cache::CacheObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;
use tessera_common::types::{ObjectId, ShardId};
use tessera_common::utils::hash::FxHashSet;
use thiserror::Error;

/// Per-key bookkeeping overhead (tree slot plus set header).
const KEY_OVERHEAD: usize = 64;

/// Per-id cost inside a value set, including hash table slack.
const ID_SIZE: usize = 2 * std::mem::size_of::<ObjectId>();

/// How [`IndexShard::set`] treats an existing value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStrategy {
    /// Add the ids to the key's set, creating it if absent.
    Merge,
    /// Replace the key's set. An empty id list removes the key.
    Overwrite,
    /// Like `Merge`, but fail if the key already has any value.
    UniqueInsert,
}

/// A `UniqueInsert` found the key already taken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("key {key} already maps to a value")]
pub struct ShardConflict {
    /// The conflicting key.
    pub key: CompositeKey,
}

/// What a [`IndexShard::set`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOutcome {
    /// The key did not exist before.
    pub key_added: bool,
    /// The key existed before and no longer does.
    pub key_removed: bool,
    /// Ids newly associated with the key.
    pub values_added: usize,
    /// Ids no longer associated with the key.
    pub values_removed: usize,
}

impl SetOutcome {
    /// Returns true if the shard changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.values_added > 0 || self.values_removed > 0
    }
}

/// What a removal changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// Keys whose value set became empty and were dropped.
    pub keys_removed: usize,
    /// Key/id pairs removed.
    pub values_removed: usize,
}

impl RemoveOutcome {
    /// Returns true if anything was removed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.values_removed > 0
    }
}

#[derive(Deserialize)]
struct ShardData {
    shard_id: ShardId,
    entries: BTreeMap<CompositeKey, FxHashSet<ObjectId>>,
}

/// An ordered map from composite key to the set of objects carrying it.
///
/// A key is present only while its set is non-empty. The shard knows
/// nothing about the aggregate counts of the index it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ShardData")]
pub struct IndexShard {
    shard_id: ShardId,
    entries: BTreeMap<CompositeKey, FxHashSet<ObjectId>>,
    #[serde(skip_serializing)]
    value_count: usize,
    #[serde(skip_serializing)]
    heap_size: usize,
}

impl From<ShardData> for IndexShard {
    fn from(data: ShardData) -> Self {
        let mut shard = Self::new(data.shard_id);
        for (key, ids) in data.entries {
            if ids.is_empty() {
                continue;
            }
            shard.value_count += ids.len();
            shard.heap_size += key_cost(&key) + ids.len() * ID_SIZE;
            shard.entries.insert(key, ids);
        }
        shard
    }
}

fn key_cost(key: &CompositeKey) -> usize {
    KEY_OVERHEAD + key.estimated_size()
}

impl IndexShard {
    /// Creates an empty shard.
    #[must_use]
    pub fn new(shard_id: ShardId) -> Self {
        Self {
            shard_id,
            entries: BTreeMap::new(),
            value_count: 0,
            heap_size: 0,
        }
    }

    /// This shard's id within its index.
    #[must_use]
    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    /// Returns the ids stored under `key`.
    #[must_use]
    pub fn get(&self, key: &CompositeKey) -> Option<&FxHashSet<ObjectId>> {
        self.entries.get(key)
    }

    /// Returns true if `key` has at least one id.
    #[must_use]
    pub fn contains_key(&self, key: &CompositeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns true if `id` is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &CompositeKey, id: ObjectId) -> bool {
        self.entries.get(key).is_some_and(|ids| ids.contains(&id))
    }

    /// Associates `ids` with `key` according to `strategy`.
    ///
    /// Never leaves an empty set behind.
    ///
    /// # Errors
    ///
    /// Returns [`ShardConflict`] for a `UniqueInsert` on a key that already
    /// has a value. The shard is unchanged in that case.
    pub fn set(
        &mut self,
        key: CompositeKey,
        ids: impl IntoIterator<Item = ObjectId>,
        strategy: SetStrategy,
    ) -> Result<SetOutcome, ShardConflict> {
        let mut outcome = SetOutcome::default();
        match strategy {
            SetStrategy::UniqueInsert if self.entries.contains_key(&key) => {
                return Err(ShardConflict { key });
            }
            SetStrategy::Overwrite => {
                if let Some(old) = self.remove_key(&key) {
                    outcome.key_removed = true;
                    outcome.values_removed = old.len();
                }
            }
            SetStrategy::Merge | SetStrategy::UniqueInsert => {}
        }

        let mut ids = ids.into_iter().peekable();
        if ids.peek().is_none() {
            return Ok(outcome);
        }

        let cost = key_cost(&key);
        let set = self.entries.entry(key).or_insert_with(|| {
            outcome.key_added = true;
            FxHashSet::default()
        });
        if outcome.key_added {
            self.heap_size += cost;
        }
        for id in ids {
            if set.insert(id) {
                outcome.values_added += 1;
            }
        }
        self.value_count += outcome.values_added;
        self.heap_size += outcome.values_added * ID_SIZE;

        // Overwrite that re-created the key it just removed.
        if outcome.key_added && outcome.key_removed {
            outcome.key_added = false;
            outcome.key_removed = false;
        }
        Ok(outcome)
    }

    /// Removes a key and its whole set.
    pub fn remove_key(&mut self, key: &CompositeKey) -> Option<FxHashSet<ObjectId>> {
        let ids = self.entries.remove(key)?;
        self.value_count -= ids.len();
        self.heap_size -= key_cost(key) + ids.len() * ID_SIZE;
        Some(ids)
    }

    /// Removes one id from a key's set, dropping the key once it is empty.
    pub fn remove_value(&mut self, key: &CompositeKey, id: ObjectId) -> RemoveOutcome {
        let Some(ids) = self.entries.get_mut(key) else {
            return RemoveOutcome::default();
        };
        if !ids.remove(&id) {
            return RemoveOutcome::default();
        }
        let now_empty = ids.is_empty();
        self.value_count -= 1;
        self.heap_size -= ID_SIZE;
        if now_empty {
            self.entries.remove(key);
            self.heap_size -= key_cost(key);
        }
        RemoveOutcome {
            keys_removed: usize::from(now_empty),
            values_removed: 1,
        }
    }

    /// Removes `id` from every key in the shard. O(shard size).
    pub fn remove_id(&mut self, id: ObjectId) -> RemoveOutcome {
        let mut outcome = RemoveOutcome::default();
        let mut freed = 0;
        self.entries.retain(|key, ids| {
            if ids.remove(&id) {
                outcome.values_removed += 1;
                freed += ID_SIZE;
                if ids.is_empty() {
                    outcome.keys_removed += 1;
                    freed += key_cost(key);
                    return false;
                }
            }
            true
        });
        self.value_count -= outcome.values_removed;
        self.heap_size -= freed;
        outcome
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &CompositeKey> + '_ {
        self.entries.keys()
    }

    /// Every stored id, key by key. An id appears once per key it is under.
    pub fn values(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries.values().flat_map(|ids| ids.iter().copied())
    }

    /// Key/set pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &FxHashSet<ObjectId>)> + '_ {
        self.entries.iter()
    }

    /// Key/set pairs between `from` and `to`, in ascending key order.
    ///
    /// Inverted or degenerate bounds yield nothing.
    pub fn range<'a>(
        &'a self,
        from: &'a CompositeKey,
        to: &'a CompositeKey,
        include_from: bool,
        include_to: bool,
    ) -> impl Iterator<Item = (&'a CompositeKey, &'a FxHashSet<ObjectId>)> + 'a {
        let empty = match from.cmp(to) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => !(include_from && include_to),
            std::cmp::Ordering::Less => false,
        };
        let lower = if include_from {
            Bound::Included(from)
        } else {
            Bound::Excluded(from)
        };
        let upper = if include_to {
            Bound::Included(to)
        } else {
            Bound::Excluded(to)
        };
        (!empty)
            .then(|| self.entries.range::<CompositeKey, _>((lower, upper)))
            .into_iter()
            .flatten()
    }

    /// Number of keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of key/id pairs.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Returns true if the shard holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all keys.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.value_count = 0;
        self.heap_size = 0;
    }
}

impl CacheObject for IndexShard {
    fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.heap_size
    }
}
