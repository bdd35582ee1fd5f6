//! Configuration management for the credit manager.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::credit::DEFAULT_KEY_PREFIX;
use crate::error::{CreditError, Result};

/// Prefix for environment variable overrides, e.g. `CREDITS__STORE__BACKEND`.
pub const ENV_PREFIX: &str = "CREDITS";

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditsConfig {
    /// Credit manager configuration
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Balance store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Credit manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Prefix for balance keys in the store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

/// Which store holds the balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Balances held in this process only
    #[default]
    Memory,
    /// Balances shared through Redis (requires the `redis` feature)
    Redis,
}

/// Balance store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl CreditsConfig {
    /// Load configuration from an optional file, with environment overrides.
    ///
    /// Environment variables use the `CREDITS__` prefix and `__` between
    /// nested keys.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(CreditError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file {} not found", path.display()),
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| CreditError::Config(e.to_string()))
    }

    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| CreditError::Config(format!("Failed to parse configuration: {}", e)))
    }
}
