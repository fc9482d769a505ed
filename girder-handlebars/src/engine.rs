//! Handlebars engine loading views from several directories

use crate::{Result, config::HandlebarsConfig, error::HandlebarsError, helpers};
use handlebars::Handlebars;
use parking_lot::RwLock;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Views compiled into the crate, registered under `responses/<name>`
const EMBEDDED_RESPONSES: &[(&str, &str)] = &[
    ("responses/ok", include_str!("../responses/ok.hbs")),
    ("responses/created", include_str!("../responses/created.hbs")),
    ("responses/badRequest", include_str!("../responses/badRequest.hbs")),
    ("responses/unauthorized", include_str!("../responses/unauthorized.hbs")),
    ("responses/forbidden", include_str!("../responses/forbidden.hbs")),
    ("responses/notFound", include_str!("../responses/notFound.hbs")),
    ("responses/conflict", include_str!("../responses/conflict.hbs")),
    ("responses/serverError", include_str!("../responses/serverError.hbs")),
];

#[derive(Clone)]
pub struct HandlebarsEngine {
    handlebars: Arc<RwLock<Handlebars<'static>>>,
    config: HandlebarsConfig,
}

impl HandlebarsEngine {
    pub fn new(config: HandlebarsConfig) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(config.strict_mode);
        helpers::register_builtin_helpers(&mut handlebars);

        let engine = Self {
            handlebars: Arc::new(RwLock::new(handlebars)),
            config,
        };
        engine.load_views()?;
        Ok(engine)
    }

    /// Register embedded views, then every directory in order.
    ///
    /// Registering a name again replaces the earlier view, which gives
    /// later directories precedence.
    fn load_views(&self) -> Result<()> {
        let mut handlebars = self.handlebars.write();

        if self.config.embed_responses {
            for (name, source) in EMBEDDED_RESPONSES {
                handlebars.register_template_string(name, *source)?;
            }
        }

        for dir in &self.config.view_dirs {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "View directory does not exist");
                continue;
            }
            self.load_dir(&mut handlebars, dir, dir)?;
        }

        Ok(())
    }

    fn load_dir(&self, handlebars: &mut Handlebars<'static>, root: &Path, dir: &Path) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                self.load_dir(handlebars, root, &path)?;
                continue;
            }

            if path.extension().and_then(|e| e.to_str()) != Some(self.config.extension()) {
                continue;
            }

            let name = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .with_extension("")
                .to_string_lossy()
                .replace('\\', "/");

            let source = fs::read_to_string(&path)?;
            handlebars.register_template_string(&name, source)?;
            trace!(view = %name, path = %path.display(), "Registered view");
        }
        Ok(())
    }

    pub fn render<T: Serialize>(&self, view: &str, data: &T) -> Result<String> {
        if self.config.dev_mode {
            self.reload()?;
        }

        let handlebars = self.handlebars.read();
        if !handlebars.has_template(view) {
            return Err(HandlebarsError::ViewNotFound(view.to_string()));
        }
        Ok(handlebars.render(view, data)?)
    }

    /// Render a template string that is not registered as a view
    pub fn render_template<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        Ok(self.handlebars.read().render_template(template, data)?)
    }

    pub fn register_view(&self, name: &str, template: &str) -> Result<()> {
        Ok(self.handlebars.write().register_template_string(name, template)?)
    }

    pub fn register_partial(&self, name: &str, template: &str) -> Result<()> {
        Ok(self.handlebars.write().register_partial(name, template)?)
    }

    pub fn register_helper<F>(&self, name: &str, helper: F)
    where
        F: handlebars::HelperDef + Send + Sync + 'static,
    {
        self.handlebars.write().register_helper(name, Box::new(helper));
    }

    pub fn has_view(&self, name: &str) -> bool {
        self.handlebars.read().has_template(name)
    }

    pub fn views(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlebars.read().get_templates().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every view and load them again from disk
    pub fn reload(&self) -> Result<()> {
        self.handlebars.write().clear_templates();
        self.load_views()
    }

    pub fn config(&self) -> &HandlebarsConfig {
        &self.config
    }
}
