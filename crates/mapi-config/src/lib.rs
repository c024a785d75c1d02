//! Configuration for the MAPI store cache layer.
//!
//! The server reads one TOML file; the cache layer only consumes the `[cache]` and `[logging]`
//! tables. Every key is optional:
//!
//! ```toml
//! [cache]
//! cell_size = "256M"      # 0 or absent: 1/16 of system memory
//! object_size = 0         # 0: derived from cell_size
//! quota_lifetime = 60     # seconds, 0 = never expires
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

mod cache;
mod logging;

pub use cache::{
    ByteSize, CacheConfig, CacheLimit, CacheSizes, CELL_MEMORY_DIVISOR, FALLBACK_CELL_SIZE,
};
pub use logging::{init_tracing, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Top-level configuration as far as the cache layer is concerned.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Per-cache size and lifetime settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Global logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The `Display` impl embeds a snippet of the input; keep only the message.
        ConfigError::Toml(err.message().to_string())
    }
}

impl ServerConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::load_from_str(&text)?;
        tracing::debug!(target: "mapi.config", path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load a config from a TOML string.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Resolve cache sizes against the memory visible to this process.
    pub fn cache_sizes(&self) -> CacheSizes {
        self.cache.resolve(mapi_memory::effective_memory_bytes())
    }
}
