use crate::database::AclRow;
use crate::engine::CacheItem;
use crate::error::{try_copy, CacheError, CacheResult, DatabaseError};
use crate::manager::CacheManager;
use mapi_core::{AclEntry, ObjectId};

impl CacheItem for AclEntry {}

fn acl_entry(id: ObjectId, row: &AclRow) -> Result<AclEntry, DatabaseError> {
    match (row.principal, row.right_type, row.mask) {
        (Some(principal), Some(right_type), Some(mask)) => Ok(AclEntry {
            principal,
            right_type,
            mask,
        }),
        _ => Err(DatabaseError::new(format!(
            "acl row for object {id} has a NULL column"
        ))),
    }
}

impl CacheManager {
    /// Every ACL entry on `id`, read through. An object without ACL rows caches an empty list.
    pub fn get_acls(&self, id: ObjectId) -> CacheResult<Vec<AclEntry>> {
        if id == 0 {
            return Err(CacheError::invalid("object id 0"));
        }
        if let Ok(acls) = self.general.with(|general| general.acls.get(&id).cloned()) {
            return Ok(acls);
        }

        let rows = self.query("acl", |db| db.acl_rows(id))?;
        let acls = rows
            .iter()
            .map(|row| acl_entry(id, row))
            .collect::<Result<Vec<_>, _>>()?;
        self.general
            .with(|general| general.acls.add(id, acls.clone()))?;
        Ok(acls)
    }

    /// Replace the whole ACL of `id`.
    pub fn set_acls(&self, id: ObjectId, acls: &[AclEntry]) -> CacheResult<()> {
        if id == 0 {
            return Err(CacheError::invalid("object id 0"));
        }
        let acls = try_copy(acls)?;
        self.general.with(|general| general.acls.add(id, acls))
    }

    pub fn invalidate_acls(&self, id: ObjectId) {
        self.general.with(|general| general.acls.remove(&id));
    }
}
