//! Catalog configuration.
//!
//! Loaded from TOML. One `[central]` store plus an ordered `[[shards]]` array;
//! each shard entry also carries its price bracket.
//!
//! ```toml
//! [central]
//! url = "postgres://catalog@db-central:5432/inventory_central"
//!
//! [[shards]]
//! id = "low_price"
//! host = "db-low"
//! database = "inventory_low"
//! min_price = "0"
//! max_price = "50"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use shardcat_catalog::{PriceBracket, ShardRouter};
use shardcat_core::{Price, ShardId};

use crate::error::CatalogError;

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "SHARDCAT_CONFIG";

const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for CatalogError {
    fn from(err: ConfigError) -> Self {
        CatalogError::Configuration(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub central: StoreConfig,
    pub shards: Vec<ShardConfig>,
}

/// Connection settings for one store.
///
/// Either `url` is set, or a Postgres URL is assembled from the parts.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShardConfig {
    pub id: ShardId,
    pub min_price: Price,
    /// Absent means unbounded above.
    #[serde(default)]
    pub max_price: Option<Price>,
    #[serde(flatten)]
    pub store: StoreConfig,
}

impl StoreConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            host: default_host(),
            port: default_port(),
            database: None,
            user: default_user(),
            password: None,
            max_connections: default_max_connections(),
        }
    }

    /// A private SQLite database that lives as long as its pool.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            ..Self::from_url(IN_MEMORY_URL)
        }
    }

    pub fn connection_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        let database = self.database.as_deref().ok_or_else(|| {
            ConfigError::Invalid("store needs either `url` or `database`".to_string())
        })?;
        let auth = match &self.password {
            Some(password) => format!("{}:{}", self.user, password),
            None => self.user.clone(),
        };
        Ok(format!(
            "postgres://{auth}@{}:{}/{database}",
            self.host, self.port
        ))
    }
}

impl CatalogConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: CatalogConfig = toml::from_str(contents)?;
        if config.shards.is_empty() {
            return Err(ConfigError::Invalid("at least one shard is required".to_string()));
        }
        Ok(config)
    }

    /// Load from `SHARDCAT_CONFIG`, or fall back to in-memory stores.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(path),
            Err(_) => {
                tracing::warn!(
                    env = CONFIG_ENV,
                    "config path not set; using in-memory SQLite stores (data is not persisted)"
                );
                Ok(Self::in_memory())
            }
        }
    }

    /// Standard three-bracket layout backed by in-memory SQLite stores.
    pub fn in_memory() -> Self {
        let shards = ShardRouter::standard()
            .brackets()
            .iter()
            .map(|b| ShardConfig {
                id: b.shard.clone(),
                min_price: b.low,
                max_price: b.high,
                store: StoreConfig::in_memory(),
            })
            .collect();

        Self {
            central: StoreConfig::in_memory(),
            shards,
        }
    }

    /// Build and validate the bracket table.
    pub fn router(&self) -> Result<ShardRouter, CatalogError> {
        let brackets = self
            .shards
            .iter()
            .map(|s| PriceBracket::new(s.id.clone(), s.min_price, s.max_price))
            .collect();
        Ok(ShardRouter::new(brackets)?)
    }

    pub fn shard(&self, id: &ShardId) -> Option<&ShardConfig> {
        self.shards.iter().find(|s| &s.id == id)
    }
}
