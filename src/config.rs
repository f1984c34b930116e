//! Component J — Application Configuration.
//!
//! Loaded from a single TOML file whose path is the server's sole required
//! CLI argument (§4.10). Field defaults are supplied here rather than in
//! the file so a minimal config only needs `server` and `config_store`.

use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigStoreConfig {
    /// SQLite file path, or `:memory:`.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_schema_capacity")]
    pub schema_capacity: u64,
    #[serde(default = "default_schema_ttl_secs")]
    pub schema_ttl_secs: u64,
    #[serde(default = "default_connection_capacity")]
    pub connection_capacity: u64,
    #[serde(default = "default_connection_idle_secs")]
    pub connection_idle_secs: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_schema_capacity() -> u64 {
    1000
}

fn default_schema_ttl_secs() -> u64 {
    600
}

fn default_connection_capacity() -> u64 {
    50
}

fn default_connection_idle_secs() -> u64 {
    900
}

fn default_pool_size() -> u32 {
    6
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schema_capacity: default_schema_capacity(),
            schema_ttl_secs: default_schema_ttl_secs(),
            connection_capacity: default_connection_capacity(),
            connection_idle_secs: default_connection_idle_secs(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub config_store: ConfigStoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> AppResult<Self> {
        let config = Config::builder()
            .add_source(File::from(Path::new(path)))
            .build()
            .map_err(|e| AppError::invalid(format!("failed to load config '{path}': {e}")))?;
        config
            .try_deserialize()
            .map_err(|e| AppError::invalid(format!("failed to parse config '{path}': {e}")))
    }

    /// Rejects an unusable config before the server binds a socket
    /// (Testable Property 8).
    pub fn validate(&self) -> AppResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(AppError::invalid("server.host must not be blank"));
        }
        if self.server.port == 0 {
            return Err(AppError::invalid("server.port must be non-zero"));
        }
        if self.cache.schema_capacity == 0 {
            return Err(AppError::invalid("cache.schema_capacity must be non-zero"));
        }
        if self.cache.connection_capacity == 0 {
            return Err(AppError::invalid("cache.connection_capacity must be non-zero"));
        }
        if self.cache.pool_size == 0 {
            return Err(AppError::invalid("cache.pool_size must be non-zero"));
        }
        Ok(())
    }
}
