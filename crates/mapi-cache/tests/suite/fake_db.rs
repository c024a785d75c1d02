use mapi_cache::{
    AclRow, Database, DatabaseError, DatabaseFactory, HierarchyRow, IndexedObjectRow, StoreRow,
    UserRow,
};
use mapi_core::{ExternalId, ObjectClass, ObjectId, PropTag};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Tables {
    hierarchy: HashMap<ObjectId, HierarchyRow>,
    stores: HashMap<ObjectId, StoreRow>,
    acls: HashMap<ObjectId, Vec<AclRow>>,
    users: HashMap<u32, UserRow>,
    index: Vec<(ObjectId, PropTag, Vec<u8>)>,
}

#[derive(Default)]
struct Inner {
    tables: Mutex<Tables>,
    queries: Mutex<BTreeMap<&'static str, u64>>,
    failing: AtomicBool,
}

/// In-memory stand-in for the store database that counts queries per table.
#[derive(Clone, Default)]
pub(crate) struct FakeDatabase {
    inner: Arc<Inner>,
}

impl FakeDatabase {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn factory(&self) -> Arc<dyn DatabaseFactory> {
        Arc::new(self.clone())
    }

    pub(crate) fn add_object(
        &self,
        id: ObjectId,
        parent: Option<ObjectId>,
        owner: u32,
        flags: u32,
        object_type: u32,
    ) {
        self.add_hierarchy_row(HierarchyRow {
            id,
            parent,
            owner: Some(owner),
            flags: Some(flags),
            object_type: Some(object_type),
        });
    }

    pub(crate) fn add_hierarchy_row(&self, row: HierarchyRow) {
        self.inner.tables.lock().hierarchy.insert(row.id, row);
    }

    pub(crate) fn add_store(&self, id: ObjectId, guid: &[u8], store_type: u32) {
        self.inner.tables.lock().stores.insert(
            id,
            StoreRow {
                guid: Some(guid.to_vec()),
                store_type: Some(store_type),
            },
        );
    }

    pub(crate) fn add_acl(&self, id: ObjectId, principal: u32, right_type: u32, mask: u32) {
        self.inner
            .tables
            .lock()
            .acls
            .entry(id)
            .or_default()
            .push(AclRow {
                principal: Some(principal),
                right_type: Some(right_type),
                mask: Some(mask),
            });
    }

    pub(crate) fn add_user(&self, id: u32, class: ObjectClass, external_id: &[u8], company: u32) {
        self.inner.tables.lock().users.insert(
            id,
            UserRow {
                id,
                external_id: Some(external_id.to_vec()),
                class: Some(class.0),
                company: Some(company),
                signature: Some(format!("sig-{id}")),
            },
        );
    }

    pub(crate) fn add_indexed(&self, id: ObjectId, tag: PropTag, value: &[u8]) {
        self.inner
            .tables
            .lock()
            .index
            .push((id, tag, value.to_vec()));
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn queries(&self, table: &str) -> u64 {
        self.inner
            .queries
            .lock()
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_queries(&self) -> u64 {
        self.inner.queries.lock().values().sum()
    }

    fn begin(&self, table: &'static str) -> Result<(), DatabaseError> {
        *self.inner.queries.lock().entry(table).or_insert(0) += 1;
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(DatabaseError::new(format!("{table}: connection lost")));
        }
        Ok(())
    }
}

impl Database for FakeDatabase {
    fn hierarchy_rows(&self, ids: &[ObjectId]) -> Result<Vec<HierarchyRow>, DatabaseError> {
        self.begin("hierarchy")?;
        let tables = self.inner.tables.lock();
        Ok(ids
            .iter()
            .filter_map(|id| tables.hierarchy.get(id).cloned())
            .collect())
    }

    fn store_row(&self, store_id: ObjectId) -> Result<Option<StoreRow>, DatabaseError> {
        self.begin("stores")?;
        Ok(self.inner.tables.lock().stores.get(&store_id).cloned())
    }

    fn acl_rows(&self, id: ObjectId) -> Result<Vec<AclRow>, DatabaseError> {
        self.begin("acl")?;
        Ok(self
            .inner
            .tables
            .lock()
            .acls
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    fn user_row(&self, id: u32) -> Result<Option<UserRow>, DatabaseError> {
        self.begin("users")?;
        Ok(self.inner.tables.lock().users.get(&id).cloned())
    }

    fn user_rows_by_external(&self, ids: &[ExternalId]) -> Result<Vec<UserRow>, DatabaseError> {
        self.begin("users")?;
        let tables = self.inner.tables.lock();
        let mut rows: Vec<UserRow> = tables
            .users
            .values()
            .filter(|row| {
                ids.iter().any(|wanted| {
                    row.external_id.as_deref() == Some(wanted.id.as_slice())
                        && row
                            .class
                            .is_some_and(|class| wanted.class.matches(ObjectClass(class)))
                })
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    fn indexed_object(
        &self,
        tag: PropTag,
        value: &[u8],
    ) -> Result<Option<IndexedObjectRow>, DatabaseError> {
        self.begin("indexedproperties")?;
        Ok(self
            .inner
            .tables
            .lock()
            .index
            .iter()
            .find(|(_, row_tag, row_value)| *row_tag == tag && row_value == value)
            .map(|&(id, tag, _)| IndexedObjectRow { id, tag }))
    }

    fn indexed_value(&self, id: ObjectId, tag: PropTag) -> Result<Option<Vec<u8>>, DatabaseError> {
        self.begin("indexedproperties")?;
        Ok(self
            .inner
            .tables
            .lock()
            .index
            .iter()
            .find(|(row_id, row_tag, _)| *row_id == id && *row_tag == tag)
            .map(|(_, _, value)| value.clone()))
    }
}

impl DatabaseFactory for FakeDatabase {
    fn connection(&self) -> Result<Arc<dyn Database>, DatabaseError> {
        Ok(Arc::new(self.clone()))
    }
}
