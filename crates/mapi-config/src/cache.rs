use mapi_memory::{format_byte_size, parse_byte_size, MB};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cell cache size is this fraction (1/N) of system memory when left unset.
pub const CELL_MEMORY_DIVISOR: u64 = 16;
/// Cell cache size used when system memory cannot be probed.
pub const FALLBACK_CELL_SIZE: u64 = 256 * MB;

const OBJECT_CELL_DIVISOR: u64 = 16;
const INDEX_CELL_DIVISOR: u64 = 8;
const STORE_CELL_DIVISOR: u64 = 16;
const ACL_CELL_DIVISOR: u64 = 16;
const USER_CELL_DIVISOR: u64 = 16;

/// A byte size which accepts both raw byte counts and human-friendly suffixes (`"256M"`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByteSize(pub u64);

impl Serialize for ByteSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bytes(u64),
            Human(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bytes(value) => Ok(ByteSize(value)),
            Repr::Human(value) => parse_byte_size(&value)
                .map(ByteSize)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// `[cache]` table. A size of zero means "derive a default".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Property cell cache. Zero: 1/16 of system memory.
    #[serde(default)]
    pub cell_size: ByteSize,
    #[serde(default)]
    pub cell_lifetime: u64,

    /// Hierarchy (parent/owner/flags/type) cache. Zero: derived from `cell_size`.
    #[serde(default)]
    pub object_size: ByteSize,

    /// Each direction of the indexed-property cache. Zero: derived from `cell_size`.
    #[serde(default)]
    pub index_size: ByteSize,

    /// Object-to-store cache. Zero: derived from `cell_size`.
    #[serde(default)]
    pub store_size: ByteSize,

    /// ACL cache. Zero: derived from `cell_size`.
    #[serde(default)]
    pub acl_size: ByteSize,

    /// Each direction of the user identity cache. Zero: derived from `cell_size`.
    #[serde(default)]
    pub user_size: ByteSize,

    #[serde(default = "CacheConfig::default_userdetails_size")]
    pub userdetails_size: ByteSize,
    #[serde(default = "CacheConfig::default_userdetails_lifetime")]
    pub userdetails_lifetime: u64,

    /// Each of the two quota caches (per principal and company default).
    #[serde(default = "CacheConfig::default_quota_size")]
    pub quota_size: ByteSize,
    #[serde(default = "CacheConfig::default_quota_lifetime")]
    pub quota_lifetime: u64,

    #[serde(default = "CacheConfig::default_server_size")]
    pub server_size: ByteSize,
    #[serde(default = "CacheConfig::default_server_lifetime")]
    pub server_lifetime: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cell_size: ByteSize(0),
            cell_lifetime: 0,
            object_size: ByteSize(0),
            index_size: ByteSize(0),
            store_size: ByteSize(0),
            acl_size: ByteSize(0),
            user_size: ByteSize(0),
            userdetails_size: Self::default_userdetails_size(),
            userdetails_lifetime: Self::default_userdetails_lifetime(),
            quota_size: Self::default_quota_size(),
            quota_lifetime: Self::default_quota_lifetime(),
            server_size: Self::default_server_size(),
            server_lifetime: Self::default_server_lifetime(),
        }
    }
}

impl CacheConfig {
    fn default_userdetails_size() -> ByteSize {
        ByteSize(25 * MB)
    }

    fn default_userdetails_lifetime() -> u64 {
        300
    }

    fn default_quota_size() -> ByteSize {
        ByteSize(MB)
    }

    fn default_quota_lifetime() -> u64 {
        60
    }

    fn default_server_size() -> ByteSize {
        ByteSize(MB)
    }

    fn default_server_lifetime() -> u64 {
        300
    }

    /// Fill in every unset size.
    ///
    /// `system_memory` is the memory visible to the process (see
    /// [`mapi_memory::effective_memory_bytes`]). Each derived value is logged.
    pub fn resolve(&self, system_memory: Option<u64>) -> CacheSizes {
        let cell = if self.cell_size.0 != 0 {
            self.cell_size.0
        } else {
            match system_memory {
                Some(total) => {
                    let bytes = total / CELL_MEMORY_DIVISOR;
                    tracing::info!(
                        target: "mapi.config",
                        bytes,
                        human = %format_byte_size(bytes),
                        total,
                        "cache_cell_size not set; using {bytes} bytes (1/{CELL_MEMORY_DIVISOR} of {total} bytes system memory)"
                    );
                    bytes
                }
                None => {
                    tracing::warn!(
                        target: "mapi.config",
                        bytes = FALLBACK_CELL_SIZE,
                        "cache_cell_size not set and system memory is unknown; using {FALLBACK_CELL_SIZE} bytes"
                    );
                    FALLBACK_CELL_SIZE
                }
            }
        };

        let derived = |name: &str, configured: ByteSize, divisor: u64| {
            if configured.0 != 0 {
                return configured.0;
            }
            let bytes = cell / divisor;
            tracing::info!(
                target: "mapi.config",
                cache = name,
                bytes,
                human = %format_byte_size(bytes),
                "cache_{name}_size not set; using {bytes} bytes derived from cache_cell_size"
            );
            bytes
        };

        CacheSizes {
            cell: CacheLimit::new(cell, self.cell_lifetime),
            object: CacheLimit::new(derived("object", self.object_size, OBJECT_CELL_DIVISOR), 0),
            index: CacheLimit::new(derived("index", self.index_size, INDEX_CELL_DIVISOR), 0),
            store: CacheLimit::new(derived("store", self.store_size, STORE_CELL_DIVISOR), 0),
            acl: CacheLimit::new(derived("acl", self.acl_size, ACL_CELL_DIVISOR), 0),
            user: CacheLimit::new(derived("user", self.user_size, USER_CELL_DIVISOR), 0),
            user_details: CacheLimit::new(self.userdetails_size.0, self.userdetails_lifetime),
            quota: CacheLimit::new(self.quota_size.0, self.quota_lifetime),
            server: CacheLimit::new(self.server_size.0, self.server_lifetime),
        }
    }
}

/// Size ceiling and entry lifetime for one cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLimit {
    pub max_size: usize,
    /// Seconds; zero means entries never expire by age.
    pub lifetime_secs: u64,
}

impl CacheLimit {
    pub fn new(max_size: u64, lifetime_secs: u64) -> Self {
        Self {
            max_size: usize::try_from(max_size).unwrap_or(usize::MAX),
            lifetime_secs,
        }
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

/// Fully resolved sizes, ready to construct the cache manager from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSizes {
    pub cell: CacheLimit,
    pub object: CacheLimit,
    pub index: CacheLimit,
    pub store: CacheLimit,
    pub acl: CacheLimit,
    pub user: CacheLimit,
    pub user_details: CacheLimit,
    pub quota: CacheLimit,
    pub server: CacheLimit,
}

impl CacheSizes {
    /// Every cache gets the same ceiling and no expiry. Mostly useful in tests.
    pub fn uniform(max_size: usize) -> Self {
        let limit = CacheLimit {
            max_size,
            lifetime_secs: 0,
        };
        Self {
            cell: limit,
            object: limit,
            index: limit,
            store: limit,
            acl: limit,
            user: limit,
            user_details: limit,
            quota: limit,
            server: limit,
        }
    }
}
