//! Generic size-bounded cache used by every specialised cache in this crate.
//!
//! Entries are accounted in bytes: the fixed footprint of key and value plus whatever heap memory
//! they report through [`CacheItem::additional_size`]. When an insertion pushes the total over the
//! ceiling, the oldest insertions are evicted first. Optionally, entries expire after a fixed age
//! and are dropped the next time they are looked up.
//!
//! A `Cache` is not synchronised; the cache manager keeps each one inside a lock group.

use crate::error::{CacheError, CacheResult};
use mapi_config::CacheLimit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::marker::PhantomData;
use std::mem::size_of;
use std::time::{Duration, Instant};

/// Heap memory owned by a key or value, on top of its `size_of`.
pub trait CacheItem {
    fn additional_size(&self) -> usize {
        0
    }
}

impl CacheItem for u8 {}
impl CacheItem for u32 {}
impl CacheItem for i32 {}

impl CacheItem for String {
    fn additional_size(&self) -> usize {
        self.len()
    }
}

impl<T: CacheItem> CacheItem for Vec<T> {
    fn additional_size(&self) -> usize {
        self.len() * size_of::<T>()
            + self
                .iter()
                .map(CacheItem::additional_size)
                .sum::<usize>()
    }
}

/// Bytes charged against the ceiling for one entry.
pub fn entry_size<K: CacheItem, V: CacheItem>(key: &K, value: &V) -> usize {
    size_of::<K>() + size_of::<V>() + key.additional_size() + value.additional_size()
}

/// Backing map of a [`Cache`]. Implemented for `HashMap` and `BTreeMap`.
pub trait CacheMap<K, V>: Default {
    fn get(&self, key: &K) -> Option<&V>;
    fn get_mut(&mut self, key: &K) -> Option<&mut V>;
    fn insert(&mut self, key: K, value: V) -> Option<V>;
    fn remove(&mut self, key: &K) -> Option<V>;
    fn len(&self) -> usize;
    fn clear(&mut self);
}

impl<K: Eq + Hash, V> CacheMap<K, V> for HashMap<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        HashMap::get(self, key)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        HashMap::get_mut(self, key)
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        HashMap::insert(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        HashMap::remove(self, key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn clear(&mut self) {
        HashMap::clear(self)
    }
}

impl<K: Ord, V> CacheMap<K, V> for BTreeMap<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        BTreeMap::get_mut(self, key)
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        BTreeMap::insert(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        BTreeMap::remove(self, key)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn clear(&mut self) {
        BTreeMap::clear(self)
    }
}

/// A stored value with its bookkeeping.
#[derive(Debug)]
pub struct Slot<V> {
    value: V,
    size: usize,
    seq: u64,
    inserted: Instant,
}

/// Snapshot of one cache's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub name: String,
    pub items: usize,
    pub size: usize,
    pub max_size: usize,
    pub requests: u64,
    pub hits: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64
        }
    }
}

pub struct Cache<K, V, M = HashMap<K, Slot<V>>> {
    name: &'static str,
    map: M,
    /// Insertion sequence number to key, oldest first.
    order: BTreeMap<u64, K>,
    next_seq: u64,
    size: usize,
    max_size: usize,
    lifetime: Duration,
    requests: u64,
    hits: u64,
    _value: PhantomData<fn() -> V>,
}

/// Hash-keyed cache.
pub type HashCache<K, V> = Cache<K, V, HashMap<K, Slot<V>>>;
/// Cache over an ordered map; supports [`Cache::range`].
pub type OrderedCache<K, V> = Cache<K, V, BTreeMap<K, Slot<V>>>;

impl<K, V, M> Cache<K, V, M>
where
    K: Clone + CacheItem,
    V: CacheItem,
    M: CacheMap<K, Slot<V>>,
{
    /// `lifetime_secs == 0` disables expiry.
    pub fn new(name: &'static str, max_size: usize, lifetime_secs: u64) -> Self {
        Self {
            name,
            map: M::default(),
            order: BTreeMap::new(),
            next_seq: 0,
            size: 0,
            max_size,
            lifetime: Duration::from_secs(lifetime_secs),
            requests: 0,
            hits: 0,
            _value: PhantomData,
        }
    }

    pub fn with_limit(name: &'static str, limit: &CacheLimit) -> Self {
        Self::new(name, limit.max_size, limit.lifetime_secs)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }

    /// Bytes currently accounted.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Applies to entries already present as well.
    pub fn set_lifetime(&mut self, lifetime: Duration) {
        self.lifetime = lifetime;
    }

    /// Shrinking the ceiling evicts immediately.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to_fit(None);
    }

    pub fn apply_limit(&mut self, limit: &CacheLimit) {
        self.apply_limit_evicting(limit);
    }

    /// Like [`Cache::apply_limit`], returning the entries evicted by a smaller ceiling.
    pub fn apply_limit_evicting(&mut self, limit: &CacheLimit) -> Vec<(K, V)> {
        self.set_lifetime(limit.lifetime());
        self.max_size = limit.max_size;
        self.evict_to_fit(None)
    }

    /// Insert or replace `key`. A replacement counts as a fresh insertion for eviction order.
    pub fn add(&mut self, key: K, value: V) -> CacheResult<()> {
        self.add_evicting(key, value).map(drop)
    }

    /// Like [`Cache::add`], returning the entries evicted to make room.
    ///
    /// The entry just inserted is never evicted, so a single entry larger than the ceiling stays.
    pub fn add_evicting(&mut self, key: K, value: V) -> CacheResult<Vec<(K, V)>> {
        self.remove(&key);

        let size = entry_size(&key, &value);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.map.insert(
            key,
            Slot {
                value,
                size,
                seq,
                inserted: Instant::now(),
            },
        );
        self.size += size;

        Ok(self.evict_to_fit(Some(seq)))
    }

    /// Counted lookup. An entry older than the lifetime is dropped and reported as a miss.
    pub fn get(&mut self, key: &K) -> CacheResult<&V> {
        self.requests += 1;
        if self.expire(key) {
            return Err(CacheError::NotFound);
        }
        match self.map.get(key) {
            Some(slot) => {
                self.hits += 1;
                Ok(&slot.value)
            }
            None => Err(CacheError::NotFound),
        }
    }

    /// Uncounted lookup that ignores expiry.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|slot| &slot.value)
    }

    /// Mutate an entry in place and re-account its size. Not counted as a request.
    pub fn update<R>(&mut self, key: &K, f: impl FnOnce(&mut V) -> R) -> CacheResult<R> {
        if self.expire(key) {
            return Err(CacheError::NotFound);
        }
        let slot = self.map.get_mut(key).ok_or(CacheError::NotFound)?;
        let result = f(&mut slot.value);
        let new_size = entry_size(key, &slot.value);
        let old_size = std::mem::replace(&mut slot.size, new_size);
        let seq = slot.seq;
        self.size = self.size.saturating_sub(old_size) + new_size;
        if new_size > old_size {
            self.evict_to_fit(Some(seq));
        }
        Ok(result)
    }

    /// Mutate the entry for `key`, starting from `V::default()` when it is absent.
    pub fn upsert<R>(&mut self, key: K, f: impl FnOnce(&mut V) -> R) -> CacheResult<R>
    where
        V: Default,
    {
        self.expire(&key);
        if self.map.get(&key).is_some() {
            return self.update(&key, f);
        }
        let mut value = V::default();
        let result = f(&mut value);
        self.add(key, value)?;
        Ok(result)
    }

    /// Removing an absent key is not an error.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.map.remove(key)?;
        self.order.remove(&slot.seq);
        self.size = self.size.saturating_sub(slot.size);
        Some(slot.value)
    }

    /// Drop every entry. Request and hit counters are kept.
    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
        self.size = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.to_string(),
            items: self.map.len(),
            size: self.size,
            max_size: self.max_size,
            requests: self.requests,
            hits: self.hits,
        }
    }

    fn expire(&mut self, key: &K) -> bool {
        if self.lifetime.is_zero() {
            return false;
        }
        let expired = self
            .map
            .get(key)
            .is_some_and(|slot| slot.inserted.elapsed() > self.lifetime);
        if expired {
            self.remove(key);
            tracing::trace!(target: "mapi.cache", cache = self.name, "entry expired");
        }
        expired
    }

    fn evict_to_fit(&mut self, keep: Option<u64>) -> Vec<(K, V)> {
        let mut evicted = Vec::new();
        while self.size > self.max_size {
            let Some(seq) = self.order.keys().copied().find(|seq| Some(*seq) != keep) else {
                break;
            };
            let Some(key) = self.order.remove(&seq) else {
                break;
            };
            if let Some(slot) = self.map.remove(&key) {
                self.size = self.size.saturating_sub(slot.size);
                evicted.push((key, slot.value));
            }
        }
        if !evicted.is_empty() {
            tracing::debug!(
                target: "mapi.cache",
                cache = self.name,
                evicted = evicted.len(),
                size = self.size,
                max_size = self.max_size,
                "evicted oldest entries"
            );
        }
        evicted
    }
}

impl<K, V> OrderedCache<K, V>
where
    K: Ord + Clone + CacheItem,
    V: Clone + CacheItem,
{
    /// Copies of every entry with `low <= key <= high`. Not counted as a request.
    pub fn range(&self, low: &K, high: &K) -> Vec<(K, V)> {
        if low > high {
            return Vec::new();
        }
        self.map
            .range(low..=high)
            .filter(|(_, slot)| self.lifetime.is_zero() || slot.inserted.elapsed() <= self.lifetime)
            .map(|(key, slot)| (key.clone(), slot.value.clone()))
            .collect()
    }

    /// Every key whose entry satisfies `pred`, in key order. Expired entries are included.
    pub fn keys_matching(&self, mut pred: impl FnMut(&K, &V) -> bool) -> Vec<K> {
        self.map
            .iter()
            .filter(|(key, slot)| pred(key, &slot.value))
            .map(|(key, _)| key.clone())
            .collect()
    }
}
