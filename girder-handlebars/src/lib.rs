//! Handlebars views for girder.
//!
//! [`HandlebarsService`] implements the core `ViewRenderer` capability used
//! by negotiated HTML responses. Views are looked up across the configured
//! view directories, later directories overriding earlier ones, on top of
//! the embedded `responses/*` views:
//!
//! ```
//! use girder_core::ViewRenderer;
//! use girder_handlebars::{HandlebarsConfig, HandlebarsService};
//! use serde_json::json;
//!
//! let service = HandlebarsService::new(HandlebarsConfig::new()).unwrap();
//! let html = service.render("responses/ok", &json!({"hello": "world"})).unwrap();
//! assert!(html.contains("200 - All ok"));
//! ```
//!
//! Built-in helpers: `eq`, `ne`, `upper`, `lower`, `len`, `json`, `default`.

pub mod config;
pub mod engine;
pub mod error;
pub mod helpers;

pub use config::HandlebarsConfig;
pub use engine::HandlebarsEngine;
pub use error::{HandlebarsError, Result};

use girder_core::{HttpConfig, HttpResponse, Provider, ViewRenderer};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Handlebars view service for girder
#[derive(Clone)]
pub struct HandlebarsService {
    engine: HandlebarsEngine,
}

impl HandlebarsService {
    pub fn new(config: HandlebarsConfig) -> Result<Self> {
        Ok(Self {
            engine: HandlebarsEngine::new(config)?,
        })
    }

    /// Service over the view directories of the `http` section
    pub fn from_http_config(config: &HttpConfig) -> Result<Self> {
        Self::new(HandlebarsConfig::from_http_config(config))
    }

    /// Render off the async runtime's worker threads
    pub async fn render_async<T: Serialize>(&self, view: &str, data: &T) -> Result<String> {
        let engine = self.engine.clone();
        let view = view.to_string();
        let data = serde_json::to_value(data)?;

        tokio::task::spawn_blocking(move || engine.render(&view, &data))
            .await
            .map_err(|e| HandlebarsError::RenderError(e.to_string()))?
    }

    /// Render a view into a 200 HTML response
    pub async fn render_response<T: Serialize>(&self, view: &str, data: &T) -> Result<HttpResponse> {
        let html = self.render_async(view, data).await?;
        let mut response = HttpResponse::ok();
        response.write_html(html);
        Ok(response)
    }

    pub fn register_view(&self, name: &str, template: &str) -> Result<()> {
        self.engine.register_view(name, template)
    }

    pub fn register_partial(&self, name: &str, template: &str) -> Result<()> {
        self.engine.register_partial(name, template)
    }

    pub fn views(&self) -> Vec<String> {
        self.engine.views()
    }

    pub fn engine(&self) -> &HandlebarsEngine {
        &self.engine
    }

    /// Shared handle for `ResponseEnvironment::with_renderer`
    pub fn into_renderer(self) -> Arc<dyn ViewRenderer> {
        Arc::new(self)
    }
}

impl ViewRenderer for HandlebarsService {
    fn render(&self, template: &str, model: &Value) -> girder_core::Result<String> {
        Ok(self.engine.render(template, model)?)
    }

    fn has_view(&self, template: &str) -> bool {
        self.engine.has_view(template)
    }
}

impl Provider for HandlebarsService {}
