// HTTP server options read from the `http` configuration section

use crate::content_negotiation::AcceptFormats;
use crate::cookie::CookieSigner;
use crate::static_assets::StaticMount;
use crate::{ConfigSource, Error};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Last-resort page used when no view template can be rendered
pub const DEFAULT_FATAL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Server error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 10%;">
<h1>Something went wrong</h1>
<p>The server could not complete your request.</p>
<p>Please contact support and quote ticket <strong>{ticket}</strong>.</p>
</body>
</html>"#;

/// Whether error details are exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Development,
    #[default]
    Production,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Shared secret used to sign cookie values
    pub secret: Option<String>,
    /// Lifetime of cookies set without an explicit one; session cookies when absent
    pub max_age_secs: Option<u64>,
    pub secure: bool,
}

impl CookieConfig {
    pub fn signer(&self) -> Option<CookieSigner> {
        self.secret.as_deref().map(CookieSigner::new)
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Upper bound for a single uploaded file, in bytes
    pub max_size: u64,
    /// Upload directory; the OS temp dir when unset
    pub base_path: Option<PathBuf>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_size: 1024 * 1024,
            base_path: None,
        }
    }
}

impl FilesConfig {
    pub fn upload_dir(&self) -> PathBuf {
        self.base_path.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Options for the HTTP server shell and response layer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    /// Largest request body accepted, in bytes
    pub body_limit: usize,
    pub accept_headers: AcceptFormats,
    pub cookie: CookieConfig,
    pub files: FilesConfig,
    #[serde(rename = "static")]
    pub static_mounts: Vec<StaticMount>,
    pub views: Vec<PathBuf>,
    pub fatal_template: String,
    pub mode: RuntimeMode,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 1337,
            body_limit: 5 * 1024 * 1024,
            accept_headers: AcceptFormats::default(),
            cookie: CookieConfig::default(),
            files: FilesConfig::default(),
            static_mounts: vec![StaticMount::new("/static", "./public")],
            views: Vec::new(),
            fatal_template: DEFAULT_FATAL_TEMPLATE.to_string(),
            mode: RuntimeMode::default(),
        }
    }
}

impl HttpConfig {
    /// Deserialize the `http` section, filling gaps with defaults
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, Error> {
        match source.value("http") {
            Some(section) => serde_json::from_value(section)
                .map_err(|e| Error::UnexpectedServerError(format!("invalid http config: {}", e))),
            None => Ok(Self::default()),
        }
    }

    pub fn is_development(&self) -> bool {
        self.mode == RuntimeMode::Development
    }

    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cookie_secret(mut self, secret: impl Into<String>) -> Self {
        self.cookie.secret = Some(secret.into());
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn with_accept_headers(mut self, formats: AcceptFormats) -> Self {
        self.accept_headers = formats;
        self
    }
}
