//! Read-through collaborator.
//!
//! The cache never holds a lock while one of these methods runs. Columns that may be NULL in the
//! underlying tables are `Option`s; the cache validates them before anything is cached.

use crate::error::DatabaseError;
use mapi_core::{ExternalId, ObjectId, PropTag};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyRow {
    pub id: ObjectId,
    pub parent: Option<ObjectId>,
    pub owner: Option<u32>,
    pub flags: Option<u32>,
    pub object_type: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRow {
    pub guid: Option<Vec<u8>>,
    pub store_type: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclRow {
    pub principal: Option<u32>,
    pub right_type: Option<u32>,
    pub mask: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: u32,
    pub external_id: Option<Vec<u8>>,
    pub class: Option<u32>,
    pub company: Option<u32>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedObjectRow {
    pub id: ObjectId,
    pub tag: PropTag,
}

pub trait Database {
    /// Hierarchy rows for every id in `ids` that exists. Order is unspecified.
    fn hierarchy_rows(&self, ids: &[ObjectId]) -> Result<Vec<HierarchyRow>, DatabaseError>;

    /// The `stores` row whose hierarchy root is `store_id`.
    fn store_row(&self, store_id: ObjectId) -> Result<Option<StoreRow>, DatabaseError>;

    fn acl_rows(&self, id: ObjectId) -> Result<Vec<AclRow>, DatabaseError>;

    fn user_row(&self, id: u32) -> Result<Option<UserRow>, DatabaseError>;

    /// Rows matching any of `ids`. A wildcard class matches every concrete class of its type.
    fn user_rows_by_external(&self, ids: &[ExternalId]) -> Result<Vec<UserRow>, DatabaseError>;

    /// The object carrying `value` for indexed property `tag`.
    fn indexed_object(
        &self,
        tag: PropTag,
        value: &[u8],
    ) -> Result<Option<IndexedObjectRow>, DatabaseError>;

    fn indexed_value(&self, id: ObjectId, tag: PropTag) -> Result<Option<Vec<u8>>, DatabaseError>;
}

/// Hands out a connection for the calling thread.
pub trait DatabaseFactory: Send + Sync {
    fn connection(&self) -> Result<Arc<dyn Database>, DatabaseError>;
}

/// Whether a query came back empty, for the fallback metrics.
pub(crate) trait QueryRows {
    fn is_empty_result(&self) -> bool;
}

impl<T> QueryRows for Vec<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T> QueryRows for Option<T> {
    fn is_empty_result(&self) -> bool {
        self.is_none()
    }
}
