//! Quota lookups. There is no read-through: a miss is surfaced and the caller stores what it
//! resolved. `is_default` selects the company default template instead of the principal's own
//! quota; the two never share entries.

use crate::error::{CacheError, CacheResult};
use crate::manager::CacheManager;
use mapi_core::QuotaEntry;

impl CacheManager {
    pub fn get_quota(&self, id: u32, is_default: bool) -> CacheResult<QuotaEntry> {
        if id == 0 {
            return Err(CacheError::invalid("principal id 0"));
        }
        self.general
            .with(|general| general.quota_cache(is_default).get(&id).copied())
    }

    pub fn set_quota(&self, id: u32, is_default: bool, quota: QuotaEntry) -> CacheResult<()> {
        if id == 0 {
            return Err(CacheError::invalid("principal id 0"));
        }
        self.general
            .with(|general| general.quota_cache(is_default).add(id, quota))
    }

    pub fn invalidate_quota(&self, id: u32, is_default: bool) {
        self.general
            .with(|general| general.quota_cache(is_default).remove(&id));
    }
}
