use crate::engine::CacheItem;
use crate::error::{try_copy, CacheError, CacheResult};
use crate::manager::CacheManager;
use mapi_core::{
    is_computed_property, normalize_prop_tag, ObjectId, PropTag, PropValue, PropertyValue,
};
use std::collections::HashMap;
use std::mem::size_of;

/// Cached properties of one object.
///
/// `complete` means every stored property of the object is present, so a missing tag is known
/// not to exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellEntry {
    props: HashMap<PropTag, PropValue>,
    payload: usize,
    complete: bool,
}

fn slot_size(value: &PropValue) -> usize {
    size_of::<PropTag>() + size_of::<PropValue>() + value.payload_len()
}

impl CellEntry {
    /// `tag` must already be normalized.
    pub fn get(&self, tag: PropTag) -> Option<&PropValue> {
        self.props.get(&tag)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn insert(&mut self, tag: PropTag, value: PropValue) {
        self.payload += slot_size(&value);
        if let Some(previous) = self.props.insert(tag, value) {
            self.payload = self.payload.saturating_sub(slot_size(&previous));
        }
    }

    fn update_integer(&mut self, tag: PropTag, f: impl FnOnce(i64) -> i64) -> bool {
        match self.props.get_mut(&tag) {
            Some(PropValue::Short(value)) => *value = f(i64::from(*value)) as i16,
            Some(PropValue::Long(value)) => *value = f(i64::from(*value)) as i32,
            Some(PropValue::LongLong(value)) => *value = f(*value),
            _ => return false,
        }
        true
    }
}

impl CacheItem for CellEntry {
    fn additional_size(&self) -> usize {
        self.payload
    }
}

/// Copy a caller value into cache-owned storage, reserving heap memory fallibly.
fn copy_value(value: &PropValue) -> CacheResult<PropValue> {
    Ok(match value {
        PropValue::Binary(bytes) => PropValue::Binary(try_copy(bytes)?),
        PropValue::String(text) => {
            let mut copy = String::new();
            copy.try_reserve_exact(text.len())
                .map_err(|_| CacheError::OutOfMemory)?;
            copy.push_str(text);
            PropValue::String(copy)
        }
        PropValue::MvBinary(values) => {
            let mut copy = Vec::new();
            copy.try_reserve_exact(values.len())
                .map_err(|_| CacheError::OutOfMemory)?;
            for bytes in values {
                copy.push(try_copy(bytes)?);
            }
            PropValue::MvBinary(copy)
        }
        other => other.clone(),
    })
}

impl CacheManager {
    /// Cached value of `tag` on `id`, re-tagged to the variant asked for.
    ///
    /// A complete cell answers a missing tag with a "not found" property value. `NotFound` means
    /// the caller has to ask the database.
    pub fn get_property(
        &self,
        id: ObjectId,
        tag: PropTag,
        truncate: bool,
    ) -> CacheResult<PropertyValue> {
        let normalized = normalize_prop_tag(tag);
        self.cells.with(|cells| {
            let cell = cells.get(&id)?;
            if let Some(value) = cell.get(normalized) {
                let prop = PropertyValue::new(tag, value.clone());
                return Ok(if truncate { prop.truncated() } else { prop });
            }
            if cell.complete && !is_computed_property(normalized) {
                return Ok(PropertyValue::not_found(tag));
            }
            Err(CacheError::NotFound)
        })
    }

    /// Store one property, creating the cell if needed. Computed properties are ignored.
    pub fn set_property(&self, id: ObjectId, tag: PropTag, value: &PropValue) -> CacheResult<()> {
        let normalized = normalize_prop_tag(tag);
        if is_computed_property(normalized) {
            return Ok(());
        }
        let value = copy_value(value)?;
        self.cells
            .with(|cells| cells.upsert(id, |cell| cell.insert(normalized, value)))
    }

    /// Latch the cell of `id` as complete, creating an empty one if needed.
    pub fn mark_complete(&self, id: ObjectId) -> CacheResult<()> {
        self.cells
            .with(|cells| cells.upsert(id, |cell| cell.complete = true))
    }

    pub fn is_complete(&self, id: ObjectId) -> bool {
        self.cells
            .with(|cells| cells.get(&id).map(CellEntry::is_complete).unwrap_or(false))
    }

    /// Add `delta` (wrapping) to a cached integer property. `false` if nothing was changed.
    pub fn update_numeric(&self, id: ObjectId, tag: PropTag, delta: i64) -> bool {
        self.update_integer(id, tag, |value| value.wrapping_add(delta))
    }

    /// Replace the bits selected by `mask` in a cached integer property with those of `value`.
    pub fn update_numeric_masked(&self, id: ObjectId, tag: PropTag, mask: u64, value: u64) -> bool {
        let (mask, value) = (mask as i64, value as i64);
        self.update_integer(id, tag, |current| (current & !mask) | (value & mask))
    }

    fn update_integer(&self, id: ObjectId, tag: PropTag, f: impl FnOnce(i64) -> i64) -> bool {
        let normalized = normalize_prop_tag(tag);
        if !normalized.is_integer() {
            return false;
        }
        self.cells.with(|cells| {
            cells
                .update(&id, |cell| cell.update_integer(normalized, f))
                .unwrap_or(false)
        })
    }

    pub fn remove_cell(&self, id: ObjectId) {
        self.cells.with(|cells| cells.remove(&id));
    }
}
