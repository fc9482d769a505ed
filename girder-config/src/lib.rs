//! Layered configuration for girder.
//!
//! Sources are merged into one nested tree in load order, later sources
//! overriding earlier ones key by key. Keys are dotted paths:
//!
//! ```
//! use girder_config::ConfigManager;
//!
//! let config = ConfigManager::new();
//! config.set("http.cookie.secret", "s3cr3t").unwrap();
//! config.set("http.port", 8080).unwrap();
//!
//! assert_eq!(config.get_string("http.cookie.secret").unwrap(), "s3cr3t");
//! assert_eq!(config.get_int("http.port").unwrap(), 8080);
//! ```

pub mod config_service;
pub mod env;
pub mod error;
pub mod loader;
mod path;

pub use config_service::{ConfigService, ConfigServiceBuilder};
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use girder_core::{ConfigSource, Provider};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Main configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    root: Arc<RwLock<Value>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            root: Arc::new(RwLock::new(Value::Object(Map::new()))),
            env_prefix: None,
        }
    }

    /// Only environment variables starting with `prefix` are loaded
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    /// Merge a whole tree over the current configuration
    pub fn merge_value(&self, value: Value) {
        path::merge(&mut self.root.write(), value);
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loaded = EnvLoader::new(self.env_prefix.clone()).load()?;
        self.merge_value(loaded);
        Ok(())
    }

    /// Load a `.env` file into the process environment, then the environment
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                // A missing default .env is fine
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::new(format).load_file(path)?;
        debug!(file = %path.display(), format = ?format, "Loaded configuration file");
        self.merge_value(data);
        Ok(())
    }

    /// Load a file, picking the format from its name
    pub fn load_file_auto(&self, path: impl AsRef<Path>) -> Result<()> {
        let loader = ConfigLoader::auto(&path)?;
        self.load_file(path, loader.format())
    }

    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        path::insert(&mut self.root.write(), key, json_value)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.value_at(key).ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    pub fn get_float(&self, key: &str) -> Result<f64> {
        self.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        path::get(&self.root.read(), key).is_some()
    }

    /// Top-level keys
    pub fn keys(&self) -> Vec<String> {
        match &*self.root.read() {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Merge another manager's tree over this one
    pub fn merge(&self, other: &ConfigManager) {
        let other = other.root.read().clone();
        self.merge_value(other);
    }

    /// A copy of the whole tree
    pub fn snapshot(&self) -> Value {
        self.root.read().clone()
    }

    fn value_at(&self, key: &str) -> Option<Value> {
        path::get(&self.root.read(), key).cloned()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ConfigManager {}

impl ConfigSource for ConfigManager {
    fn value(&self, path: &str) -> Option<Value> {
        self.value_at(path)
    }
}
