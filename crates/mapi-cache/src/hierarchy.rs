use crate::database::{HierarchyRow, StoreRow};
use crate::engine::CacheItem;
use crate::error::{CacheError, CacheResult, DatabaseError};
use crate::manager::CacheManager;
use mapi_core::hierarchy_flags::MESSAGE_FLAG_MASK;
use mapi_core::object_type::MAPI_FOLDER;
use mapi_core::{Guid, ObjectId, StoreType, NO_PARENT};
use std::collections::HashMap;

/// Recursion bound for store resolution through corrupt or cyclic hierarchies.
pub const DEFAULT_STORE_DEPTH: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyEntry {
    pub parent: ObjectId,
    pub owner: u32,
    pub flags: u32,
    pub object_type: u32,
}

impl CacheItem for HierarchyEntry {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreEntry {
    pub store_id: ObjectId,
    pub store_type: StoreType,
    pub guid: Guid,
}

impl CacheItem for StoreEntry {}

fn hierarchy_entry(row: &HierarchyRow) -> Result<HierarchyEntry, DatabaseError> {
    let (Some(owner), Some(flags), Some(object_type)) = (row.owner, row.flags, row.object_type)
    else {
        return Err(DatabaseError::new(format!(
            "hierarchy row {} has a NULL owner, flags or type column",
            row.id
        )));
    };
    Ok(HierarchyEntry {
        parent: row.parent.unwrap_or(NO_PARENT),
        owner,
        flags,
        object_type,
    })
}

fn store_entry(store_id: ObjectId, row: &StoreRow) -> Result<StoreEntry, DatabaseError> {
    let guid = row
        .guid
        .as_deref()
        .and_then(Guid::from_slice)
        .ok_or_else(|| {
            DatabaseError::new(format!("store {store_id} has a missing or malformed GUID"))
        })?;
    let store_type = row
        .store_type
        .and_then(StoreType::from_raw)
        .ok_or_else(|| DatabaseError::new(format!("store {store_id} has an unknown store type")))?;
    Ok(StoreEntry {
        store_id,
        store_type,
        guid,
    })
}

impl CacheManager {
    /// Parent, owner, flags and type of `id`, read through from the hierarchy table.
    pub fn get_object(&self, id: ObjectId) -> CacheResult<HierarchyEntry> {
        if id == 0 {
            return Err(CacheError::invalid("object id 0"));
        }
        if let Ok(entry) = self.objects.with(|cache| cache.get(&id).copied()) {
            return Ok(entry);
        }

        let rows = self.query("hierarchy", |db| db.hierarchy_rows(&[id]))?;
        let Some(row) = rows.iter().find(|row| row.id == id) else {
            tracing::debug!(target: "mapi.cache", id, "object not in hierarchy table");
            return Err(CacheError::NotFound);
        };
        let entry = hierarchy_entry(row)?;
        self.objects.with(|cache| cache.add(id, entry))?;
        Ok(entry)
    }

    /// `NotFound` for store roots.
    pub fn get_parent(&self, id: ObjectId) -> CacheResult<ObjectId> {
        match self.get_object(id)?.parent {
            NO_PARENT => Err(CacheError::NotFound),
            parent => Ok(parent),
        }
    }

    pub fn get_owner(&self, id: ObjectId) -> CacheResult<u32> {
        Ok(self.get_object(id)?.owner)
    }

    /// `(flags, object_type)`.
    pub fn get_object_flags(&self, id: ObjectId) -> CacheResult<(u32, u32)> {
        let entry = self.get_object(id)?;
        Ok((entry.flags, entry.object_type))
    }

    pub fn set_object(
        &self,
        id: ObjectId,
        parent: ObjectId,
        owner: u32,
        flags: u32,
        object_type: u32,
    ) -> CacheResult<()> {
        if id == 0 || parent == 0 || owner == 0 {
            return Err(CacheError::invalid("object, parent and owner ids must be non-zero"));
        }
        debug_assert!(
            object_type == MAPI_FOLDER || flags & !MESSAGE_FLAG_MASK == 0,
            "unexpected hierarchy flags {flags:#x} on object {id}"
        );
        let entry = HierarchyEntry {
            parent,
            owner,
            flags,
            object_type,
        };
        self.objects.with(|cache| cache.add(id, entry))
    }

    pub fn remove_object(&self, id: ObjectId) {
        self.objects.with(|cache| cache.remove(&id));
    }

    /// Batch lookup. Cached ids are answered directly; the rest go to the database in one query.
    ///
    /// Ids that exist nowhere (and malformed rows) are left out of the result.
    pub fn get_objects(&self, ids: &[ObjectId]) -> CacheResult<HashMap<ObjectId, HierarchyEntry>> {
        let mut found = HashMap::with_capacity(ids.len());
        let mut misses = Vec::new();
        self.objects.with(|cache| {
            for &id in ids {
                if id == 0 || found.contains_key(&id) {
                    continue;
                }
                match cache.get(&id) {
                    Ok(entry) => {
                        found.insert(id, *entry);
                    }
                    Err(_) => misses.push(id),
                }
            }
        });
        misses.sort_unstable();
        misses.dedup();

        if !misses.is_empty() {
            let rows = self.query("hierarchy_batch", |db| db.hierarchy_rows(&misses))?;
            let mut fetched = Vec::with_capacity(rows.len());
            for row in &rows {
                if misses.binary_search(&row.id).is_err() {
                    continue;
                }
                match hierarchy_entry(row) {
                    Ok(entry) => fetched.push((row.id, entry)),
                    Err(err) => {
                        tracing::warn!(
                            target: "mapi.cache",
                            id = row.id,
                            error = %err,
                            "skipping malformed hierarchy row"
                        );
                    }
                }
            }
            self.objects.with(|cache| {
                fetched
                    .iter()
                    .try_for_each(|&(id, entry)| cache.add(id, entry))
            })?;
            found.extend(fetched);
        }

        let mut requested: Vec<ObjectId> = ids.iter().copied().filter(|id| *id != 0).collect();
        requested.sort_unstable();
        requested.dedup();
        if found.len() < requested.len() {
            tracing::debug!(
                target: "mapi.cache",
                requested = requested.len(),
                found = found.len(),
                "some objects were not found"
            );
        }
        Ok(found)
    }

    /// Store root, GUID and type of the store `id` belongs to.
    ///
    /// Walks up the hierarchy at most `max_depth` levels, caching the answer for every object on
    /// the way.
    pub fn get_store_and_type(&self, id: ObjectId, max_depth: u32) -> CacheResult<StoreEntry> {
        if id == 0 {
            return Err(CacheError::invalid("object id 0"));
        }
        if let Ok(entry) = self.stores.with(|cache| cache.get(&id).copied()) {
            return Ok(entry);
        }
        if max_depth == 0 {
            tracing::warn!(
                target: "mapi.cache",
                id,
                "store lookup exceeded the hierarchy depth limit"
            );
            return Err(CacheError::NotFound);
        }

        let object = self.get_object(id)?;
        let entry = if object.parent == NO_PARENT {
            let Some(row) = self.query("store", |db| db.store_row(id))? else {
                tracing::debug!(target: "mapi.cache", id, "root object without a store row");
                return Err(CacheError::NotFound);
            };
            store_entry(id, &row)?
        } else {
            self.get_store_and_type(object.parent, max_depth - 1)?
        };

        self.stores.with(|cache| cache.add(id, entry))?;
        Ok(entry)
    }

    /// `(store_id, guid)`.
    pub fn get_store(&self, id: ObjectId) -> CacheResult<(ObjectId, Guid)> {
        let entry = self.get_store_and_type(id, DEFAULT_STORE_DEPTH)?;
        Ok((entry.store_id, entry.guid))
    }

    pub fn set_store(
        &self,
        id: ObjectId,
        store_id: ObjectId,
        guid: Guid,
        store_type: StoreType,
    ) -> CacheResult<()> {
        if id == 0 || store_id == 0 {
            return Err(CacheError::invalid("object and store ids must be non-zero"));
        }
        let entry = StoreEntry {
            store_id,
            store_type,
            guid,
        };
        self.stores.with(|cache| cache.add(id, entry))
    }

    pub fn remove_store(&self, id: ObjectId) {
        self.stores.with(|cache| cache.remove(&id));
    }
}
