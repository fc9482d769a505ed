//! Configuration for the Handlebars view renderer

use girder_core::HttpConfig;
use std::path::PathBuf;

/// Configuration for the Handlebars view renderer
#[derive(Debug, Clone)]
pub struct HandlebarsConfig {
    /// View directories; a view in a later directory replaces one of the
    /// same name in an earlier directory
    pub view_dirs: Vec<PathBuf>,

    /// Template file extension (default: ".hbs")
    pub template_extension: String,

    /// Reload views from disk before every render
    pub dev_mode: bool,

    /// Error on missing variables
    pub strict_mode: bool,

    /// Register the built-in `responses/*` views before the directories
    pub embed_responses: bool,
}

impl HandlebarsConfig {
    pub fn new() -> Self {
        Self {
            view_dirs: Vec::new(),
            template_extension: ".hbs".to_string(),
            dev_mode: false,
            strict_mode: false,
            embed_responses: true,
        }
    }

    /// View directories and reload behaviour taken from the `http` section
    pub fn from_http_config(config: &HttpConfig) -> Self {
        Self::new()
            .with_view_dirs(config.views.iter().cloned())
            .with_dev_mode(config.is_development())
    }

    pub fn with_view_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.view_dirs.push(dir.into());
        self
    }

    pub fn with_view_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.view_dirs.extend(dirs);
        self
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.template_extension = ext.into();
        self
    }

    pub fn with_dev_mode(mut self, enable: bool) -> Self {
        self.dev_mode = enable;
        self
    }

    pub fn with_strict_mode(mut self, enable: bool) -> Self {
        self.strict_mode = enable;
        self
    }

    pub fn with_embedded_responses(mut self, enable: bool) -> Self {
        self.embed_responses = enable;
        self
    }

    pub(crate) fn extension(&self) -> &str {
        self.template_extension.trim_start_matches('.')
    }
}

impl Default for HandlebarsConfig {
    fn default() -> Self {
        Self::new()
    }
}
