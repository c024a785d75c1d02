use crate::cell::CellEntry;
use crate::database::{Database, DatabaseFactory, QueryRows};
use crate::engine::{Cache, CacheStats, HashCache};
use crate::error::{CacheResult, DatabaseError};
use crate::group::CacheGroup;
use crate::hierarchy::{HierarchyEntry, StoreEntry};
use crate::index::IndexCache;
use crate::user::UserIdentityIndex;
use mapi_config::CacheSizes;
use mapi_core::{AclEntry, ObjectId, PropTag, QuotaEntry, ServerDetails, UserDetails};
use mapi_metrics::{MetricsRegistry, MetricsSnapshot, QueryOutcome};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use std::time::Instant;

/// Caches selected by [`CacheManager::purge`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurgeFlags(pub u32);

impl PurgeFlags {
    pub const QUOTA: PurgeFlags = PurgeFlags(0x0001);
    pub const QUOTA_DEFAULT: PurgeFlags = PurgeFlags(0x0002);
    pub const OBJECTS: PurgeFlags = PurgeFlags(0x0004);
    pub const STORES: PurgeFlags = PurgeFlags(0x0008);
    pub const ACLS: PurgeFlags = PurgeFlags(0x0010);
    pub const CELL: PurgeFlags = PurgeFlags(0x0020);
    pub const INDEX_OBJECT: PurgeFlags = PurgeFlags(0x0040);
    pub const INDEX_PROPERTY: PurgeFlags = PurgeFlags(0x0080);
    pub const INDEXED_PROPERTIES: PurgeFlags = PurgeFlags(0x0100);
    pub const USER_OBJECT: PurgeFlags = PurgeFlags(0x0200);
    pub const EXTERN_ID: PurgeFlags = PurgeFlags(0x0400);
    pub const USER_DETAILS: PurgeFlags = PurgeFlags(0x0800);
    pub const SERVER: PurgeFlags = PurgeFlags(0x1000);
    pub const ALL: PurgeFlags = PurgeFlags(0x1FFF);

    pub const fn contains(self, other: PurgeFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PurgeFlags {
    type Output = PurgeFlags;

    fn bitor(self, rhs: PurgeFlags) -> PurgeFlags {
        PurgeFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for PurgeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PurgeFlags({:#06x})", self.0)
    }
}

/// Kind of change notification delivered by the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEvent {
    Modified,
    Deleted,
    Moved,
}

/// Counters of every cache plus the database fallback metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub caches: Vec<CacheStats>,
    pub queries: MetricsSnapshot,
}

pub(crate) struct GeneralCaches {
    pub(crate) users: UserIdentityIndex,
    pub(crate) user_details: HashCache<u32, UserDetails>,
    pub(crate) acls: HashCache<ObjectId, Vec<AclEntry>>,
    pub(crate) quotas: HashCache<u32, QuotaEntry>,
    pub(crate) default_quotas: HashCache<u32, QuotaEntry>,
    pub(crate) servers: HashCache<String, ServerDetails>,
}

impl GeneralCaches {
    pub(crate) fn quota_cache(&mut self, is_default: bool) -> &mut HashCache<u32, QuotaEntry> {
        if is_default {
            &mut self.default_quotas
        } else {
            &mut self.quotas
        }
    }
}

/// Process-wide metadata cache in front of the store database.
///
/// Caches are split into lock domains: hierarchy, stores, cells, the indexed-property maps, and
/// everything else (users, ACLs, quotas, servers). A thread holds at most one domain lock at a
/// time and never while a database query runs.
pub struct CacheManager {
    db: Arc<dyn DatabaseFactory>,
    metrics: Arc<MetricsRegistry>,
    pub(crate) objects: CacheGroup<HashCache<ObjectId, HierarchyEntry>>,
    pub(crate) stores: CacheGroup<HashCache<ObjectId, StoreEntry>>,
    pub(crate) cells: CacheGroup<HashCache<ObjectId, CellEntry>>,
    pub(crate) index: CacheGroup<IndexCache>,
    pub(crate) general: CacheGroup<GeneralCaches>,
    pub(crate) excluded_props: Mutex<HashSet<PropTag>>,
}

impl CacheManager {
    pub fn new(sizes: &CacheSizes, db: Arc<dyn DatabaseFactory>) -> Self {
        Self::with_metrics(sizes, db, Arc::new(MetricsRegistry::new()))
    }

    pub fn with_metrics(
        sizes: &CacheSizes,
        db: Arc<dyn DatabaseFactory>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let general = GeneralCaches {
            users: UserIdentityIndex::new(&sizes.user),
            user_details: Cache::with_limit("user_details", &sizes.user_details),
            acls: Cache::with_limit("acl", &sizes.acl),
            quotas: Cache::with_limit("quota", &sizes.quota),
            default_quotas: Cache::with_limit("quota_default", &sizes.quota),
            servers: Cache::with_limit("server", &sizes.server),
        };

        tracing::info!(
            target: "mapi.cache",
            cell = sizes.cell.max_size,
            object = sizes.object.max_size,
            index = sizes.index.max_size,
            store = sizes.store.max_size,
            acl = sizes.acl.max_size,
            user = sizes.user.max_size,
            "cache manager initialised"
        );

        Self {
            db,
            metrics,
            objects: CacheGroup::new("objects", Cache::with_limit("hierarchy", &sizes.object)),
            stores: CacheGroup::new("stores", Cache::with_limit("store", &sizes.store)),
            cells: CacheGroup::new("cells", Cache::with_limit("cell", &sizes.cell)),
            index: CacheGroup::new("index", IndexCache::new(&sizes.index)),
            general: CacheGroup::new("general", general),
            excluded_props: Mutex::new(HashSet::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Run one fallback query against a fresh connection and record it.
    pub(crate) fn query<T: QueryRows>(
        &self,
        operation: &'static str,
        run: impl FnOnce(&dyn Database) -> Result<T, DatabaseError>,
    ) -> CacheResult<T> {
        let started = Instant::now();
        let result = self.db.connection().and_then(|db| run(db.as_ref()));
        let outcome = match &result {
            Ok(rows) if rows.is_empty_result() => QueryOutcome::Empty,
            Ok(_) => QueryOutcome::Found,
            Err(_) => QueryOutcome::Failed,
        };
        self.metrics
            .record_query(operation, started.elapsed(), outcome);

        if let Err(err) = &result {
            tracing::warn!(
                target: "mapi.cache",
                operation,
                error = %err,
                "database fallback failed"
            );
        }
        Ok(result?)
    }

    /// Drop the entries selected by `flags`. Counters are kept.
    pub fn purge(&self, flags: PurgeFlags) {
        tracing::info!(target: "mapi.cache", flags = flags.0, "purging caches");

        if flags.contains(PurgeFlags::OBJECTS) {
            self.objects.with(|cache| cache.clear());
        }
        if flags.contains(PurgeFlags::STORES) {
            self.stores.with(|cache| cache.clear());
        }
        if flags.contains(PurgeFlags::CELL) {
            self.cells.with(|cache| cache.clear());
        }
        if flags.contains(PurgeFlags::INDEX_OBJECT) {
            self.index.with(IndexCache::clear_forward);
        }
        if flags.contains(PurgeFlags::INDEX_PROPERTY) {
            self.index.with(IndexCache::clear_reverse);
        }
        if flags.contains(PurgeFlags::INDEXED_PROPERTIES) {
            self.excluded_props.lock().clear();
        }

        self.general.with(|general| {
            if flags.contains(PurgeFlags::QUOTA) {
                general.quotas.clear();
            }
            if flags.contains(PurgeFlags::QUOTA_DEFAULT) {
                general.default_quotas.clear();
            }
            if flags.contains(PurgeFlags::ACLS) {
                general.acls.clear();
            }
            if flags.contains(PurgeFlags::USER_OBJECT) {
                general.users.forward.clear();
            }
            if flags.contains(PurgeFlags::EXTERN_ID) {
                general.users.reverse.clear();
            }
            if flags.contains(PurgeFlags::USER_DETAILS) {
                general.user_details.clear();
            }
            if flags.contains(PurgeFlags::SERVER) {
                general.servers.clear();
            }
        });
    }

    /// Invalidate whatever a change notification for `id` makes stale.
    pub fn update(&self, event: ChangeEvent, id: ObjectId) {
        tracing::trace!(target: "mapi.cache", ?event, id, "change notification");
        match event {
            ChangeEvent::Modified => {
                self.invalidate_acls(id);
                self.remove_cell(id);
                self.remove_object(id);
            }
            ChangeEvent::Deleted => {
                self.remove_object(id);
                self.remove_store(id);
                self.invalidate_acls(id);
                self.remove_cell(id);
            }
            ChangeEvent::Moved => {
                self.remove_store(id);
                self.remove_object(id);
                self.remove_cell(id);
            }
        }
    }

    /// Counters of every cache, in a fixed order.
    pub fn stats(&self) -> Vec<CacheStats> {
        let mut stats = Vec::with_capacity(13);
        stats.push(self.objects.with(|cache| cache.stats()));
        stats.push(self.stores.with(|cache| cache.stats()));
        self.general.with(|general| {
            stats.push(general.acls.stats());
            stats.push(general.quotas.stats());
            stats.push(general.default_quotas.stats());
            stats.push(general.users.forward.stats());
            stats.push(general.users.reverse.stats());
            stats.push(general.user_details.stats());
            stats.push(general.servers.stats());
        });
        stats.push(self.cells.with(|cache| cache.stats()));
        self.index.with(|index| {
            stats.push(index.forward.stats());
            stats.push(index.reverse.stats());
        });

        let excluded = self.excluded_props.lock().len();
        stats.push(CacheStats {
            name: "index_excluded".to_string(),
            items: excluded,
            size: excluded * std::mem::size_of::<PropTag>(),
            max_size: 0,
            requests: 0,
            hits: 0,
        });
        stats
    }

    pub fn report(&self) -> CacheReport {
        CacheReport {
            caches: self.stats(),
            queries: self.metrics.snapshot(),
        }
    }

    /// Resize every cache, e.g. after a configuration reload.
    pub fn apply_sizes(&self, sizes: &CacheSizes) {
        self.objects.with(|cache| cache.apply_limit(&sizes.object));
        self.stores.with(|cache| cache.apply_limit(&sizes.store));
        self.cells.with(|cache| cache.apply_limit(&sizes.cell));
        self.index.with(|index| index.apply_limit(&sizes.index));
        self.general.with(|general| {
            general.users.apply_limit(&sizes.user);
            general.user_details.apply_limit(&sizes.user_details);
            general.acls.apply_limit(&sizes.acl);
            general.quotas.apply_limit(&sizes.quota);
            general.default_quotas.apply_limit(&sizes.quota);
            general.servers.apply_limit(&sizes.server);
        });
        tracing::info!(target: "mapi.cache", "cache sizes reapplied");
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager").finish_non_exhaustive()
    }
}
