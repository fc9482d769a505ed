//! Middleware hooks around handler execution.
//!
//! Middlewares are bound to a controller or a single route through a
//! [`MiddlewareBinding`] and resolved from the container once per request.
//!
//! ```
//! use async_trait::async_trait;
//! use girder_core::*;
//!
//! struct RequestLogger;
//!
//! #[async_trait]
//! impl Middleware for RequestLogger {
//!     async fn on_before_action(&self, req: &HttpRequest, _res: &ResponseHandle) -> Result<()> {
//!         logging::info!(path = %req.path, "Incoming request");
//!         Ok(())
//!     }
//! }
//! ```

use crate::metadata::{Binding, ControllerDescriptor, RouteDescriptor};
use crate::response::ResponseHandle;
use crate::{Container, Error, HttpRequest, Injectable};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Before/after hook pair around a route handler
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Evaluated per request; disabled middlewares are skipped entirely
    fn is_enabled(&self, _route: &RouteDescriptor, _controller: &ControllerDescriptor) -> bool {
        true
    }

    async fn on_before_action(&self, _request: &HttpRequest, _response: &ResponseHandle) -> Result<(), Error> {
        Ok(())
    }

    async fn on_after_action(&self, _request: &HttpRequest, _response: &ResponseHandle) -> Result<(), Error> {
        Ok(())
    }
}

pub type MiddlewareBinding = Binding<dyn Middleware>;

impl Binding<dyn Middleware> {
    /// Bind `M`, built from the container with `options` on every request
    pub fn of<M: Middleware + Injectable>(options: Value) -> Self {
        Binding::from_factory::<M>(
            options,
            Arc::new(|container: &Container, options: &Value| -> Result<Arc<dyn Middleware>, Error> {
                let middleware: Arc<dyn Middleware> = Arc::new(container.construct::<M>(options)?);
                Ok(middleware)
            }),
        )
    }

    /// Bind a shared instance reused across requests
    pub fn instance<M: Middleware + 'static>(middleware: Arc<M>) -> Self {
        Binding::from_factory::<M>(
            Value::Null,
            Arc::new(move |_: &Container, _: &Value| -> Result<Arc<dyn Middleware>, Error> {
                let middleware: Arc<dyn Middleware> = middleware.clone();
                Ok(middleware)
            }),
        )
    }
}
