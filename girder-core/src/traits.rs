// Core capability traits shared by the girder crates

use crate::{Container, Error};
use serde_json::Value;

/// Trait for types that can be provided by the DI container
pub trait Provider: Send + Sync + 'static {}

/// Components built by the container on demand, once per resolution.
///
/// Middlewares, policies and per-request services implement this; the
/// binding's construction options are handed through unchanged.
pub trait Injectable: Sized + Send + Sync + 'static {
    fn inject(container: &Container, options: &Value) -> Result<Self, Error>;
}

/// Read access to layered application configuration.
///
/// Keys are dotted paths into nested configuration objects.
pub trait ConfigSource: Send + Sync {
    fn value(&self, path: &str) -> Option<Value>;

    fn string(&self, path: &str) -> Option<String> {
        self.value(path)
            .and_then(|v| v.as_str().map(str::to_string))
    }
}

/// Renders a named view template with a JSON model
pub trait ViewRenderer: Send + Sync {
    fn render(&self, template: &str, model: &Value) -> Result<String, Error>;

    fn has_view(&self, template: &str) -> bool;
}

impl ConfigSource for Value {
    fn value(&self, path: &str) -> Option<Value> {
        path.split('.')
            .try_fold(self, |node, key| node.get(key))
            .cloned()
    }
}
