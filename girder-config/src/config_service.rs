// ConfigService - application-facing configuration

use crate::{ConfigManager, FileFormat, Result};
use girder_core::{ConfigSource, HttpConfig, Provider};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;

/// Read-mostly configuration handed to the server and to providers
#[derive(Clone, Default)]
pub struct ConfigService {
    manager: ConfigManager,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manager(manager: ConfigManager) -> Self {
        Self { manager }
    }

    pub fn builder() -> ConfigServiceBuilder {
        ConfigServiceBuilder::new()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.manager.get(key)
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.manager.get_or(key, default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.manager.get_string(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.manager.get_int(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.manager.get_bool(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.manager.has(key)
    }

    /// The `http` section with defaults for everything not configured
    pub fn http_config(&self) -> girder_core::Result<HttpConfig> {
        HttpConfig::from_source(self)
    }

    /// Directories listed under `validation.schema_dirs`
    pub fn schema_dirs(&self) -> Vec<PathBuf> {
        self.get_or("validation.schema_dirs", Vec::new())
    }

    pub fn manager(&self) -> &ConfigManager {
        &self.manager
    }
}

impl Provider for ConfigService {}

impl ConfigSource for ConfigService {
    fn value(&self, path: &str) -> Option<Value> {
        self.manager.value(path)
    }
}

/// Builder for ConfigService.
///
/// Sources load in a fixed order: `.env`, config files in the order added,
/// then the environment, so environment variables win.
#[derive(Default)]
pub struct ConfigServiceBuilder {
    manager: ConfigManager,
    load_env: bool,
    load_dotenv: bool,
    dotenv_path: Option<String>,
    config_files: Vec<(PathBuf, Option<FileFormat>)>,
    defaults: Vec<Value>,
}

impl ConfigServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only environment variables starting with `prefix` are read
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.manager = ConfigManager::with_prefix(prefix);
        self
    }

    /// Values every other source overrides
    pub fn defaults(mut self, defaults: Value) -> Self {
        self.defaults.push(defaults);
        self
    }

    pub fn load_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn load_dotenv(mut self, path: Option<String>) -> Self {
        self.load_dotenv = true;
        self.dotenv_path = path;
        self
    }

    /// Add a file whose format is taken from its name
    pub fn add_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_files.push((path.into(), None));
        self
    }

    pub fn add_file_with_format(mut self, path: impl Into<PathBuf>, format: FileFormat) -> Self {
        self.config_files.push((path.into(), Some(format)));
        self
    }

    pub fn build(self) -> Result<ConfigService> {
        for defaults in self.defaults {
            self.manager.merge_value(defaults);
        }

        if self.load_dotenv {
            // Only an explicitly named file must exist
            let loaded = self.manager.load_dotenv(self.dotenv_path.as_deref());
            if self.dotenv_path.is_some() {
                loaded?;
            }
        }

        for (path, format) in self.config_files {
            match format {
                Some(format) => self.manager.load_file(&path, format)?,
                None => self.manager.load_file_auto(&path)?,
            }
        }

        if self.load_env {
            self.manager.load_env()?;
        }

        Ok(ConfigService::from_manager(self.manager))
    }
}
