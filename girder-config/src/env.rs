// Environment variable loading

use crate::{ConfigError, Result, path};
use serde_json::{Map, Value};
use std::env;

/// Reads process environment variables into the configuration tree.
///
/// With prefix `APP`, `APP_HTTP__PORT=8080` becomes `http.port = 8080`.
/// Variables without the prefix are ignored when one is set.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Strip the prefix from `key`, or `None` when it does not apply
    fn unprefixed<'a>(&self, key: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str()).map(|rest| rest.trim_start_matches('_')),
            None => Some(key),
        }
    }

    /// Every matching variable as a nested object
    pub fn load(&self) -> Result<Value> {
        self.load_from(env::vars())
    }

    pub(crate) fn load_from(&self, vars: impl IntoIterator<Item = (String, String)>) -> Result<Value> {
        let mut root = Value::Object(Map::new());
        for (key, value) in vars {
            let Some(key) = self.unprefixed(&key) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            path::insert(&mut root, &path::from_env_key(key), path::scalar(&value))?;
        }
        Ok(root)
    }

    /// Read one variable, `key` upper-cased and prefixed
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_prefix_filters_and_nests() {
        let loader = EnvLoader::new(Some("GIRDER".to_string()));
        let loaded = loader
            .load_from(vars(&[
                ("GIRDER_HTTP__PORT", "8080"),
                ("GIRDER_HTTP__COOKIE__SECRET", "abc"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert_eq!(loaded, json!({"http": {"port": 8080, "cookie": {"secret": "abc"}}}));
    }

    #[test]
    fn test_no_prefix_takes_everything() {
        let loader = EnvLoader::default();
        let loaded = loader.load_from(vars(&[("DEBUG", "true"), ("NAME", "girder")])).unwrap();
        assert_eq!(loaded, json!({"debug": true, "name": "girder"}));
    }

    #[test]
    fn test_env_loader_with_default() {
        let loader = EnvLoader::new(None);
        assert_eq!(loader.load_var_or("NONEXISTENT_VAR_12345", "default"), "default");
    }

    #[test]
    fn test_env_loader_missing_var() {
        let loader = EnvLoader::new(Some("GIRDER_TEST".to_string()));
        assert!(matches!(loader.load_var("MISSING_VAR_67890"), Err(ConfigError::EnvError(_))));
    }
}
