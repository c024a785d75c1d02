use crate::database::UserRow;
use crate::engine::{Cache, CacheItem, HashCache};
use crate::error::{CacheError, CacheResult, DatabaseError};
use crate::manager::CacheManager;
use mapi_config::CacheLimit;
use mapi_core::{
    ExternalId, ObjectClass, QuotaEntry, ServerDetails, UserDetails, UserIdentity, UserObject,
};
use std::collections::HashMap;
use std::mem::size_of;

impl CacheItem for ExternalId {
    fn additional_size(&self) -> usize {
        self.id.len()
    }
}

impl CacheItem for UserObject {
    fn additional_size(&self) -> usize {
        self.external_id.len() + self.signature.len()
    }
}

impl CacheItem for UserIdentity {
    fn additional_size(&self) -> usize {
        self.signature.len()
    }
}

impl CacheItem for UserDetails {
    fn additional_size(&self) -> usize {
        let props: usize = self
            .props
            .iter()
            .map(|(name, value)| 2 * size_of::<String>() + name.len() + value.len())
            .sum();
        let mv_props: usize = self
            .mv_props
            .iter()
            .map(|(name, values)| {
                size_of::<String>()
                    + name.len()
                    + values.additional_size()
                    + size_of::<Vec<String>>()
            })
            .sum();
        props + mv_props
    }
}

impl CacheItem for ServerDetails {
    fn additional_size(&self) -> usize {
        self.host_address.len()
            + self.file_path.len()
            + self.http_path.len()
            + self.ssl_path.len()
            + self.proxy_path.len()
    }
}

impl CacheItem for QuotaEntry {}

/// Forward (internal id to identity) and reverse (external id to internal id) user caches.
///
/// Both directions are only ever changed together.
pub(crate) struct UserIdentityIndex {
    pub(crate) forward: HashCache<u32, UserObject>,
    pub(crate) reverse: HashCache<ExternalId, UserIdentity>,
}

impl UserIdentityIndex {
    pub(crate) fn new(limit: &CacheLimit) -> Self {
        Self {
            forward: Cache::with_limit("user_object", limit),
            reverse: Cache::with_limit("user_extern", limit),
        }
    }

    pub(crate) fn apply_limit(&mut self, limit: &CacheLimit) {
        self.forward.apply_limit(limit);
        self.reverse.apply_limit(limit);
    }

    pub(crate) fn insert(&mut self, id: u32, object: &UserObject) -> CacheResult<()> {
        if object.class.is_type() {
            return Err(CacheError::invalid("user identity with a wildcard object class"));
        }
        let external = object.external();
        if let Some(previous) = self.forward.remove(&id) {
            let previous = previous.external();
            if previous != external {
                self.reverse.remove(&previous);
            }
        }
        let identity = UserIdentity {
            id,
            company: object.company,
            signature: object.signature.clone(),
        };
        self.forward.add(id, object.clone())?;
        self.reverse.add(external, identity)
    }

    pub(crate) fn remove(&mut self, id: u32) {
        match self.forward.remove(&id) {
            Some(object) => {
                self.reverse.remove(&object.external());
            }
            None => {
                tracing::debug!(
                    target: "mapi.cache",
                    id,
                    "user not cached; reverse entry left to expire"
                );
            }
        }
    }
}

fn user_object(row: UserRow) -> Result<UserObject, DatabaseError> {
    let (Some(external_id), Some(class)) = (row.external_id, row.class) else {
        return Err(DatabaseError::new(format!(
            "user row {} has a NULL external id or object class",
            row.id
        )));
    };
    Ok(UserObject {
        class: ObjectClass(class),
        company: row.company.unwrap_or(0),
        external_id,
        signature: row.signature.unwrap_or_default(),
    })
}

impl CacheManager {
    fn cache_user(&self, id: u32, object: &UserObject) {
        if let Err(err) = self.general.with(|general| general.users.insert(id, object)) {
            tracing::warn!(target: "mapi.cache", id, error = %err, "user identity not cached");
        }
    }

    /// Identity of internal user/company id `id`, read through from the users table.
    pub fn get_user_object(&self, id: u32) -> CacheResult<UserObject> {
        if id == 0 {
            return Err(CacheError::invalid("user id 0"));
        }
        if let Ok(object) = self
            .general
            .with(|general| general.users.forward.get(&id).cloned())
        {
            return Ok(object);
        }

        let row = self
            .query("user", |db| db.user_row(id))?
            .ok_or(CacheError::NotFound)?;
        let object = user_object(row)?;
        self.cache_user(id, &object);
        Ok(object)
    }

    /// Internal id of an external identity.
    ///
    /// A wildcard class skips the cache; the row found is cached under its concrete class.
    pub fn get_user_by_external_id(&self, external: &ExternalId) -> CacheResult<UserIdentity> {
        if !external.class.is_type() {
            if let Ok(identity) = self
                .general
                .with(|general| general.users.reverse.get(external).cloned())
            {
                return Ok(identity);
            }
        }

        let rows = self.query("user_extern", |db| {
            db.user_rows_by_external(std::slice::from_ref(external))
        })?;
        for row in rows {
            let id = row.id;
            let object = user_object(row)?;
            if object.external_id != external.id || !external.class.matches(object.class) {
                continue;
            }
            self.cache_user(id, &object);
            return Ok(UserIdentity {
                id,
                company: object.company,
                signature: object.signature,
            });
        }
        Err(CacheError::NotFound)
    }

    /// Resolve many external ids with at most one database query.
    ///
    /// Unresolvable ids are missing from the result.
    pub fn get_users_by_external_ids(
        &self,
        externals: &[ExternalId],
    ) -> CacheResult<HashMap<ExternalId, UserIdentity>> {
        let mut found = HashMap::with_capacity(externals.len());
        let mut misses = Vec::new();
        self.general.with(|general| {
            for external in externals {
                if found.contains_key(external) {
                    continue;
                }
                if !external.class.is_type() {
                    if let Ok(identity) = general.users.reverse.get(external) {
                        found.insert(external.clone(), identity.clone());
                        continue;
                    }
                }
                misses.push(external.clone());
            }
        });
        misses.sort_unstable();
        misses.dedup();

        if misses.is_empty() {
            return Ok(found);
        }

        let rows = self.query("user_extern_batch", |db| db.user_rows_by_external(&misses))?;
        for row in rows {
            let id = row.id;
            let object = match user_object(row) {
                Ok(object) => object,
                Err(err) => {
                    tracing::warn!(
                        target: "mapi.cache",
                        id,
                        error = %err,
                        "skipping malformed user row"
                    );
                    continue;
                }
            };
            let Some(requested) = misses
                .iter()
                .find(|miss| miss.id == object.external_id && miss.class.matches(object.class))
            else {
                continue;
            };
            self.cache_user(id, &object);
            found.insert(
                requested.clone(),
                UserIdentity {
                    id,
                    company: object.company,
                    signature: object.signature,
                },
            );
        }

        if found.len() < externals.len() {
            tracing::debug!(
                target: "mapi.cache",
                requested = externals.len(),
                found = found.len(),
                "some external ids were not resolved"
            );
        }
        Ok(found)
    }

    /// Cache both directions of a user identity. Wildcard classes are refused.
    pub fn add_user_object(&self, id: u32, object: &UserObject) -> CacheResult<()> {
        if id == 0 {
            return Err(CacheError::invalid("user id 0"));
        }
        self.general.with(|general| general.users.insert(id, object))
    }

    /// Forget user `id`: identity (both directions), details and both quota entries.
    pub fn update_user(&self, id: u32) {
        self.general.with(|general| {
            general.users.remove(id);
            general.user_details.remove(&id);
            general.quotas.remove(&id);
            general.default_quotas.remove(&id);
        });
    }

    /// Lookup only; `NotFound` asks the caller to resolve and [`CacheManager::set_user_details`].
    pub fn get_user_details(&self, id: u32) -> CacheResult<UserDetails> {
        if id == 0 {
            return Err(CacheError::invalid("user id 0"));
        }
        self.general
            .with(|general| general.user_details.get(&id).cloned())
    }

    pub fn set_user_details(&self, id: u32, details: &UserDetails) -> CacheResult<()> {
        if id == 0 {
            return Err(CacheError::invalid("user id 0"));
        }
        self.general
            .with(|general| general.user_details.add(id, details.clone()))
    }

    /// Connection details of server `name` (case-insensitive).
    pub fn get_server_details(&self, name: &str) -> CacheResult<ServerDetails> {
        let key = name.to_lowercase();
        self.general
            .with(|general| general.servers.get(&key).cloned())
    }

    pub fn set_server_details(&self, name: &str, details: &ServerDetails) -> CacheResult<()> {
        if name.is_empty() {
            return Err(CacheError::invalid("empty server name"));
        }
        let key = name.to_lowercase();
        self.general
            .with(|general| general.servers.add(key, details.clone()))
    }
}
