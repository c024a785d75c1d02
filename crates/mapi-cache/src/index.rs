//! Bidirectional map between tagged binary identifiers (entry ids, source keys) and objects.

use crate::engine::{Cache, CacheItem, OrderedCache};
use crate::error::{try_copy, CacheError, CacheResult};
use crate::manager::CacheManager;
use mapi_config::CacheLimit;
use mapi_core::{normalize_entry_id, ObjectId, PropTag};
use std::cmp::Ordering;

/// Forward key: a tagged binary value.
///
/// Ordered by length first, then tag, then content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexValueKey {
    pub tag: PropTag,
    pub value: Vec<u8>,
}

impl IndexValueKey {
    pub fn new(tag: PropTag, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }
}

impl Ord for IndexValueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .len()
            .cmp(&other.value.len())
            .then(self.tag.cmp(&other.tag))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for IndexValueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl CacheItem for IndexValueKey {
    fn additional_size(&self) -> usize {
        self.value.len()
    }
}

/// Reverse key: an object and the property the identifier is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexObjectKey {
    pub id: ObjectId,
    pub tag: PropTag,
}

impl IndexObjectKey {
    pub fn new(id: ObjectId, tag: PropTag) -> Self {
        Self { id, tag }
    }
}

impl CacheItem for IndexObjectKey {}

pub(crate) struct IndexCache {
    /// Value to object.
    pub(crate) forward: OrderedCache<IndexValueKey, IndexObjectKey>,
    /// Object to value.
    pub(crate) reverse: OrderedCache<IndexObjectKey, IndexValueKey>,
    /// Set when only one direction was purged; the other may hold entries without a partner.
    half_purged: bool,
}

impl IndexCache {
    pub(crate) fn new(limit: &CacheLimit) -> Self {
        Self {
            forward: Cache::with_limit("index_prop", limit),
            reverse: Cache::with_limit("index_object", limit),
            half_purged: false,
        }
    }

    pub(crate) fn apply_limit(&mut self, limit: &CacheLimit) {
        self.reconcile();
        for (_, object) in self.forward.apply_limit_evicting(limit) {
            self.reverse.remove(&object);
        }
        for (_, value) in self.reverse.apply_limit_evicting(limit) {
            self.forward.remove(&value);
        }
    }

    pub(crate) fn clear_forward(&mut self) {
        self.forward.clear();
        self.half_purged = !self.reverse.is_empty();
    }

    pub(crate) fn clear_reverse(&mut self) {
        self.reverse.clear();
        self.half_purged = !self.forward.is_empty();
    }

    /// Drop every entry whose counterpart is missing or points elsewhere.
    ///
    /// Only needed after a one-sided purge; otherwise both directions always agree.
    fn reconcile(&mut self) {
        if !std::mem::take(&mut self.half_purged) {
            return;
        }
        let reverse = &self.reverse;
        let orphans = self
            .forward
            .keys_matching(|value, object| reverse.peek(object) != Some(value));
        for value in &orphans {
            self.forward.remove(value);
        }
        let forward = &self.forward;
        let orphans = self
            .reverse
            .keys_matching(|object, value| forward.peek(value) != Some(object));
        for object in &orphans {
            self.reverse.remove(object);
        }
        tracing::debug!(
            target: "mapi.cache",
            entries = self.forward.len(),
            "index directions reconciled after partial purge"
        );
    }

    /// Map `object` to `value` and back, dropping any earlier mapping of either side.
    pub(crate) fn insert(
        &mut self,
        object: IndexObjectKey,
        value: IndexValueKey,
    ) -> CacheResult<()> {
        self.reconcile();
        if let Some(old_value) = self.reverse.remove(&object) {
            self.forward.remove(&old_value);
        }
        if let Some(old_object) = self.forward.remove(&value) {
            self.reverse.remove(&old_object);
        }

        for (_, evicted) in self.reverse.add_evicting(object, value.clone())? {
            self.forward.remove(&evicted);
        }
        for (_, evicted) in self.forward.add_evicting(value, object)? {
            self.reverse.remove(&evicted);
        }
        Ok(())
    }

    pub(crate) fn remove_object(&mut self, object: &IndexObjectKey) {
        self.reconcile();
        if let Some(value) = self.reverse.remove(object) {
            self.forward.remove(&value);
        }
    }

    pub(crate) fn remove_value(&mut self, value: &IndexValueKey) {
        self.reconcile();
        if let Some(object) = self.forward.remove(value) {
            self.reverse.remove(&object);
        }
    }

    /// Counted forward lookup.
    pub(crate) fn object_of(&mut self, value: &IndexValueKey) -> CacheResult<IndexObjectKey> {
        self.reconcile();
        self.forward.get(value).copied()
    }

    /// Counted reverse lookup.
    pub(crate) fn value_of(&mut self, object: &IndexObjectKey) -> CacheResult<Vec<u8>> {
        self.reconcile();
        self.reverse.get(object).map(|value| value.value.clone())
    }

    /// Every tag of `id`.
    pub(crate) fn remove_all_of(&mut self, id: ObjectId) {
        self.reconcile();
        let low = IndexObjectKey::new(id, PropTag(0));
        let high = IndexObjectKey::new(id, PropTag(u32::MAX));
        for (object, value) in self.reverse.range(&low, &high) {
            self.reverse.remove(&object);
            self.forward.remove(&value);
        }
    }
}

/// Cache-owned copy of an identifier; entry ids lose their transient flag bytes.
fn index_value(tag: PropTag, bytes: &[u8]) -> CacheResult<IndexValueKey> {
    let mut value = try_copy(bytes)?;
    if tag == PropTag::ENTRYID {
        normalize_entry_id(&mut value);
    }
    Ok(IndexValueKey { tag, value })
}

impl CacheManager {
    /// Cache `object <-> value`. Any previous mapping of either side is removed first.
    pub fn add_index(&self, object: IndexObjectKey, value: &IndexValueKey) -> CacheResult<()> {
        if object.id == 0 || value.value.is_empty() {
            return Err(CacheError::invalid("index mapping needs an object id and a value"));
        }
        let value = index_value(value.tag, &value.value)?;
        self.index.with(|index| index.insert(object, value))
    }

    /// Object carrying `bytes` in property `tag`, read through.
    pub fn lookup_object_from_value(&self, tag: PropTag, bytes: &[u8]) -> CacheResult<ObjectId> {
        if bytes.is_empty() {
            return Err(CacheError::invalid("empty index value"));
        }
        let value = index_value(tag, bytes)?;
        if let Ok(object) = self.index.with(|index| index.object_of(&value)) {
            return Ok(object.id);
        }

        let row = self
            .query("index_object", |db| db.indexed_object(tag, &value.value))?
            .ok_or(CacheError::NotFound)?;
        let object = IndexObjectKey::new(row.id, row.tag);
        self.index.with(|index| index.insert(object, value))?;
        Ok(object.id)
    }

    /// Identifier stored in property `tag` of `id`, read through.
    pub fn lookup_value_from_object(&self, tag: PropTag, id: ObjectId) -> CacheResult<Vec<u8>> {
        if id == 0 {
            return Err(CacheError::invalid("object id 0"));
        }
        let object = IndexObjectKey::new(id, tag);
        if let Ok(value) = self.index.with(|index| index.value_of(&object)) {
            return Ok(value);
        }

        let bytes = self
            .query("index_value", |db| db.indexed_value(id, tag))?
            .ok_or(CacheError::NotFound)?;
        let value = index_value(tag, &bytes)?;
        let result = value.value.clone();
        self.index.with(|index| index.insert(object, value))?;
        Ok(result)
    }

    /// Drop every identifier cached for `id`, whatever its tag.
    pub fn remove_index_by_object(&self, id: ObjectId) {
        self.index.with(|index| index.remove_all_of(id));
    }

    pub fn remove_index_by_value(&self, tag: PropTag, bytes: &[u8]) -> CacheResult<()> {
        let value = index_value(tag, bytes)?;
        self.index.with(|index| index.remove_value(&value));
        Ok(())
    }

    pub fn remove_index_by_object_and_tag(&self, tag: PropTag, id: ObjectId) {
        let object = IndexObjectKey::new(id, tag);
        self.index.with(|index| index.remove_object(&object));
    }

    pub fn set_object_entry_id(&self, id: ObjectId, entry_id: &[u8]) -> CacheResult<()> {
        self.add_index(
            IndexObjectKey::new(id, PropTag::ENTRYID),
            &IndexValueKey::new(PropTag::ENTRYID, entry_id),
        )
    }

    pub fn get_object_from_entry_id(&self, entry_id: &[u8]) -> CacheResult<ObjectId> {
        self.lookup_object_from_value(PropTag::ENTRYID, entry_id)
    }

    pub fn get_entry_id_from_object(&self, id: ObjectId) -> CacheResult<Vec<u8>> {
        self.lookup_value_from_object(PropTag::ENTRYID, id)
    }

    /// Replace the set of properties that are never indexed.
    pub fn set_excluded_index_properties(&self, tags: impl IntoIterator<Item = PropTag>) {
        let mut excluded = self.excluded_props.lock();
        excluded.clear();
        excluded.extend(tags);
        tracing::debug!(
            target: "mapi.cache",
            count = excluded.len(),
            "excluded index properties replaced"
        );
    }

    /// Sorted.
    pub fn excluded_index_properties(&self) -> Vec<PropTag> {
        let mut tags: Vec<PropTag> = self.excluded_props.lock().iter().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn is_excluded_index_property(&self, tag: PropTag) -> bool {
        self.excluded_props.lock().contains(&tag)
    }
}
