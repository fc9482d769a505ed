// Controller registration and route table construction

use crate::controller::{Controller, ControllerRuntime};
use crate::dispatcher::{DispatchServices, RouteDispatcher};
use crate::extractors::ExtractorRegistry;
use crate::logging::{debug, info, warn};
use crate::metadata::{ControllerDescriptor, SourceKind};
use crate::middleware::MiddlewareBinding;
use crate::response::ResponseEnvironment;
use crate::routing::{HandlerFn, Route, RouteFuture, Router};
use crate::validation::DataValidator;
use crate::{ConfigSource, Container, Error, HttpRequest};
use std::sync::Arc;

/// The set of controllers served by an application.
///
/// Registration happens once at startup; [`Controllers::resolve`] freezes the
/// metadata into a [`Router`] whose handlers are per-route dispatchers.
#[derive(Default)]
pub struct Controllers {
    runtimes: Vec<ControllerRuntime>,
    container: Option<Container>,
    validator: Option<Arc<dyn DataValidator>>,
    extractors: Option<ExtractorRegistry>,
    global_middlewares: Vec<MiddlewareBinding>,
}

impl Controllers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: Controller>(self, controller: C) -> Self {
        self.register_arc(Arc::new(controller))
    }

    pub fn register_arc<C: Controller>(self, controller: Arc<C>) -> Self {
        self.register_runtime(ControllerRuntime::new(controller))
    }

    /// Register a controller whose builder was adjusted after `configure`
    pub fn register_runtime(mut self, runtime: ControllerRuntime) -> Self {
        self.runtimes.push(runtime);
        self
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn DataValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Replace the default extractors entirely
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = Some(extractors);
        self
    }

    /// Middleware run around every route, ahead of controller bindings
    pub fn with_global_middleware(mut self, binding: MiddlewareBinding) -> Self {
        self.global_middlewares.push(binding);
        self
    }

    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ControllerDescriptor> {
        self.runtimes.iter().map(|runtime| runtime.descriptor.as_ref())
    }

    /// Build the route table.
    ///
    /// Every route gets a dispatcher sharing one extractor registry, the
    /// validator and the response environment.
    pub fn resolve(
        self,
        environment: ResponseEnvironment,
        settings: Option<Arc<dyn ConfigSource>>,
    ) -> Result<Router, Error> {
        let container = self.container.unwrap_or_default();
        let extractors = match self.extractors {
            Some(extractors) => extractors,
            None => ExtractorRegistry::with_defaults(container.clone(), environment.config.clone(), settings),
        };

        let services = Arc::new(DispatchServices {
            container,
            extractors: Arc::new(extractors),
            validator: self.validator,
            environment,
        });

        let mut router = Router::new();
        for runtime in self.runtimes {
            let controller = if self.global_middlewares.is_empty() {
                runtime.descriptor.clone()
            } else {
                let mut descriptor = ControllerDescriptor::clone(&runtime.descriptor);
                descriptor
                    .middlewares
                    .splice(0..0, self.global_middlewares.iter().cloned());
                Arc::new(descriptor)
            };
            debug!(controller = %controller.name, base_path = %controller.base_path, "Resolving controller");

            for route in &controller.routes {
                let handler = runtime.handler(&route.handler_name).ok_or_else(|| {
                    Error::UnexpectedServerError(format!(
                        "route {}:{} has no handler",
                        controller.name, route.handler_name
                    ))
                })?;

                // A missing extractor only fails the route when it is hit
                for source in SourceKind::ALL {
                    if route.count_of(source) > 0 && services.extractors.get(source).is_none() {
                        warn!(
                            route = %route.handler_name,
                            source = ?source,
                            "No argument extractor registered for parameter source"
                        );
                    }
                }

                let path = controller.full_path(route);
                let method = route.method();
                info!("Registering route {}:{}", method, path);

                let dispatcher = Arc::new(RouteDispatcher::new(
                    controller.clone(),
                    route.clone(),
                    handler,
                    services.clone(),
                ));
                let handler: HandlerFn = Arc::new(move |request: HttpRequest| -> RouteFuture {
                    let dispatcher = dispatcher.clone();
                    Box::pin(async move { Ok(dispatcher.dispatch(request).await) })
                });

                router.add_route(Route {
                    method: method.to_string(),
                    path,
                    handler,
                });
            }
        }

        Ok(router)
    }
}

impl std::fmt::Debug for Controllers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controllers")
            .field("controllers", &self.runtimes)
            .field("validator", &self.validator.is_some())
            .field("global_middlewares", &self.global_middlewares.len())
            .finish()
    }
}
