mod cells;
mod concurrency;
mod fake_db;
mod purge;
mod reporting;
mod users;

use fake_db::FakeDatabase;
use mapi_cache::{CacheManager, CacheStats};
use mapi_config::CacheSizes;

pub(crate) fn manager(db: &FakeDatabase) -> CacheManager {
    CacheManager::new(&CacheSizes::uniform(1 << 20), db.factory())
}

pub(crate) fn stats_for(manager: &CacheManager, name: &str) -> CacheStats {
    manager
        .stats()
        .into_iter()
        .find(|stats| stats.name == name)
        .unwrap_or_else(|| panic!("no cache named `{name}`"))
}
