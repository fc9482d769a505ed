//! Controller declaration.
//!
//! A controller registers its routes, bindings and handlers through a
//! [`ControllerBuilder`] once at startup:
//!
//! ```
//! use girder_core::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct GreetingController;
//!
//! impl GreetingController {
//!     async fn hello(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse> {
//!         let name: String = args.value(0)?;
//!         Ok(OkResponse::new(json!({ "hello": name })))
//!     }
//! }
//!
//! impl Controller for GreetingController {
//!     fn configure(builder: ControllerBuilder<Self>) -> ControllerBuilder<Self> {
//!         builder
//!             .base_path("greetings")
//!             .route(RouteDescriptor::get("hello").param(Param::query::<String>("name")), Self::hello)
//!     }
//! }
//!
//! let runtime = ControllerRuntime::new(Arc::new(GreetingController));
//! assert_eq!(runtime.descriptor.base_path, "greetings");
//! ```

use crate::args::RouteArgs;
use crate::metadata::{ControllerDescriptor, RouteDescriptor};
use crate::middleware::MiddlewareBinding;
use crate::policy::PolicyBinding;
use crate::response::Response;
use crate::Error;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by an erased handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Box<dyn Response>, Error>> + Send>>;

/// A handler bound to its controller instance
pub type ErasedHandler = Arc<dyn Fn(RouteArgs) -> HandlerFuture + Send + Sync>;

type UnboundHandler<C> = Arc<dyn Fn(Arc<C>, RouteArgs) -> HandlerFuture + Send + Sync>;

/// A type whose methods serve routes
pub trait Controller: Send + Sync + Sized + 'static {
    fn configure(builder: ControllerBuilder<Self>) -> ControllerBuilder<Self>;
}

/// Collects a controller's metadata and handlers
pub struct ControllerBuilder<C> {
    descriptor: ControllerDescriptor,
    handlers: HashMap<String, UnboundHandler<C>>,
}

impl<C: Controller> ControllerBuilder<C> {
    pub fn new() -> Self {
        Self {
            descriptor: ControllerDescriptor::for_type::<C>(),
            handlers: HashMap::new(),
        }
    }

    /// Override the base path derived from the type name
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.descriptor.base_path = path.into();
        self
    }

    /// Controller-wide middleware, run before route-level ones
    pub fn middleware(mut self, binding: MiddlewareBinding) -> Self {
        self.descriptor.middlewares.push(binding);
        self
    }

    pub fn policy(mut self, binding: PolicyBinding) -> Self {
        self.descriptor.policies.push(binding);
        self
    }

    /// Declare `route` served by `handler`
    pub fn route<F, Fut, R>(mut self, route: RouteDescriptor, handler: F) -> Self
    where
        F: Fn(Arc<C>, RouteArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: Response + 'static,
    {
        let name = route.handler_name.clone();
        self.descriptor.add_route(route);

        let unbound: UnboundHandler<C> = Arc::new(move |controller: Arc<C>, args: RouteArgs| -> HandlerFuture {
            let fut = handler(controller, args);
            Box::pin(async move {
                let response: Box<dyn Response> = Box::new(fut.await?);
                Ok(response)
            })
        });
        self.handlers.insert(name, unbound);
        self
    }

    pub fn descriptor(&self) -> &ControllerDescriptor {
        &self.descriptor
    }

    /// Bind every handler to `instance`
    pub fn build(self, instance: Arc<C>) -> ControllerRuntime {
        let handlers = self
            .handlers
            .into_iter()
            .map(|(name, handler)| {
                let instance = instance.clone();
                let bound: ErasedHandler = Arc::new(move |args: RouteArgs| handler(instance.clone(), args));
                (name, bound)
            })
            .collect();

        ControllerRuntime {
            descriptor: Arc::new(self.descriptor),
            handlers,
        }
    }
}

impl<C: Controller> Default for ControllerBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured controller instance ready for routing
#[derive(Clone)]
pub struct ControllerRuntime {
    pub descriptor: Arc<ControllerDescriptor>,
    handlers: HashMap<String, ErasedHandler>,
}

impl ControllerRuntime {
    pub fn new<C: Controller>(instance: Arc<C>) -> Self {
        C::configure(ControllerBuilder::new()).build(instance)
    }

    pub fn handler(&self, handler_name: &str) -> Option<ErasedHandler> {
        self.handlers.get(handler_name).cloned()
    }
}

impl std::fmt::Debug for ControllerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRuntime")
            .field("descriptor", &self.descriptor)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
