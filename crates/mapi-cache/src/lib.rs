//! Metadata caches in front of the store database.
//!
//! [`CacheManager`] is constructed once from resolved [`mapi_config::CacheSizes`] and a
//! [`DatabaseFactory`], then shared (typically in an `Arc`) by every worker thread. Most lookups
//! read through to the database on a miss; quota and user-details lookups surface
//! [`CacheError::NotFound`] and leave the fallback to the caller.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # fn demo(db: Arc<dyn mapi_cache::DatabaseFactory>) -> mapi_cache::CacheResult<()> {
//! let config = mapi_config::ServerConfig::load_from_str("[cache]\ncell_size = \"64M\"")
//!     .expect("valid config");
//! let cache = mapi_cache::CacheManager::new(&config.cache_sizes(), db);
//! let folder = cache.get_object(42)?;
//! println!("parent of 42 is {}", folder.parent);
//! # Ok(())
//! # }
//! ```

mod acl;
mod cell;
mod database;
mod engine;
mod error;
mod group;
mod hierarchy;
mod index;
mod manager;
mod quota;
mod user;

pub use cell::CellEntry;
pub use database::{
    AclRow, Database, DatabaseFactory, HierarchyRow, IndexedObjectRow, StoreRow, UserRow,
};
pub use engine::{
    entry_size, Cache, CacheItem, CacheMap, CacheStats, HashCache, OrderedCache, Slot,
};
pub use error::{CacheError, CacheResult, DatabaseError};
pub use hierarchy::{HierarchyEntry, StoreEntry, DEFAULT_STORE_DEPTH};
pub use index::{IndexObjectKey, IndexValueKey};
pub use manager::{CacheManager, CacheReport, ChangeEvent, PurgeFlags};
