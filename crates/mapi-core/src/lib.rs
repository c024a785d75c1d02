//! Core shared types for the MAPI store cache.
//!
//! This crate is intentionally small; it only depends on `serde`.

mod principal;
mod props;

pub use principal::{
    AclEntry, ExternalId, ObjectClass, QuotaEntry, ServerDetails, UserDetails, UserIdentity,
    UserObject,
};
pub use props::{
    is_computed_property, normalize_entry_id, normalize_prop_tag, PropTag, PropValue,
    PropertyValue, MAPI_E_NOT_FOUND, TABLE_CAP_BINARY, TABLE_CAP_STRING,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal (hierarchy) id of a store, folder, message or attachment.
pub type ObjectId = u32;

/// Sentinel parent id for objects without a parent (store roots).
pub const NO_PARENT: ObjectId = 0;

/// Object types as stored in the hierarchy table.
pub mod object_type {
    pub const MAPI_STORE: u32 = 0x0000_0001;
    pub const MAPI_ADDRBOOK: u32 = 0x0000_0002;
    pub const MAPI_FOLDER: u32 = 0x0000_0003;
    pub const MAPI_ABCONT: u32 = 0x0000_0004;
    pub const MAPI_MESSAGE: u32 = 0x0000_0005;
    pub const MAPI_MAILUSER: u32 = 0x0000_0006;
    pub const MAPI_ATTACH: u32 = 0x0000_0007;
}

/// Hierarchy flags that may be set on non-folder objects.
pub mod hierarchy_flags {
    pub const MSGFLAG_ASSOCIATED: u32 = 0x0000_0040;
    pub const MSGFLAG_DELETED: u32 = 0x0000_0400;

    /// Every flag a message or attachment row is allowed to carry.
    pub const MESSAGE_FLAG_MASK: u32 = MSGFLAG_ASSOCIATED | MSGFLAG_DELETED;
}

/// 16-byte GUID as stored in the `stores` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    /// Parses a GUID column value; `None` when the value is not exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Kind of store a hierarchy tree belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    Private,
    Public,
    Archive,
}

impl StoreType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(StoreType::Private),
            1 => Some(StoreType::Public),
            2 => Some(StoreType::Archive),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            StoreType::Private => 0,
            StoreType::Public => 1,
            StoreType::Archive => 2,
        }
    }
}
