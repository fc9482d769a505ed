//! Per-route request dispatch.
//!
//! A [`RouteDispatcher`] drives one request through the pipeline:
//!
//! ```text
//! Idle -> ResolvingArgs -> RunningPolicies -> RunningBeforeMiddleware
//!      -> InvokingHandler -> RunningAfterMiddleware -> Responding -> Succeeded
//! ```
//!
//! The first error at any stage skips every remaining stage and goes
//! straight to `Responding`, where the error boundary substitutes the
//! canonical response for its kind. After-hooks do not run when the handler
//! fails.

use crate::args::{ArgValue, CallContext, RouteArgs};
use crate::controller::ErasedHandler;
use crate::extractors::ExtractorRegistry;
use crate::logging::{debug, trace};
use crate::metadata::{ControllerDescriptor, ParameterDescriptor, RouteDescriptor};
use crate::middleware::Middleware;
use crate::response::{Response, ResponseEnvironment, ResponseHandle, send};
use crate::responses::error_response;
use crate::validation::{DataValidator, coerce, effective_schema};
use crate::{Container, Error, HttpRequest, HttpResponse};
use serde_json::Value;
use std::sync::Arc;

/// Stages of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    ResolvingArgs,
    RunningPolicies,
    RunningBeforeMiddleware,
    InvokingHandler,
    RunningAfterMiddleware,
    Responding,
    Succeeded,
    Failed,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Idle => "idle",
            DispatchState::ResolvingArgs => "resolving_args",
            DispatchState::RunningPolicies => "running_policies",
            DispatchState::RunningBeforeMiddleware => "running_before_middleware",
            DispatchState::InvokingHandler => "invoking_handler",
            DispatchState::RunningAfterMiddleware => "running_after_middleware",
            DispatchState::Responding => "responding",
            DispatchState::Succeeded => "succeeded",
            DispatchState::Failed => "failed",
        }
    }
}

/// Shared collaborators of every dispatcher
#[derive(Clone)]
pub struct DispatchServices {
    pub container: Container,
    pub extractors: Arc<ExtractorRegistry>,
    pub validator: Option<Arc<dyn DataValidator>>,
    pub environment: ResponseEnvironment,
}

/// Dispatches requests for a single route
pub struct RouteDispatcher {
    controller: Arc<ControllerDescriptor>,
    route: RouteDescriptor,
    handler: ErasedHandler,
    services: Arc<DispatchServices>,
}

impl RouteDispatcher {
    pub fn new(
        controller: Arc<ControllerDescriptor>,
        route: RouteDescriptor,
        handler: ErasedHandler,
        services: Arc<DispatchServices>,
    ) -> Self {
        Self {
            controller,
            route,
            handler,
            services,
        }
    }

    pub fn route(&self) -> &RouteDescriptor {
        &self.route
    }

    fn transition(&self, state: DispatchState) {
        trace!(
            controller = %self.controller.name,
            handler = %self.route.handler_name,
            state = state.as_str(),
            "Dispatch state changed"
        );
    }

    /// Run the whole pipeline and produce the transport response
    pub async fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        let request = Arc::new(request);
        let response = ResponseHandle::new();
        let env = &self.services.environment;

        self.transition(DispatchState::Idle);
        let outcome = self.run(&request, &response).await;

        self.transition(DispatchState::Responding);
        let (result, terminal): (Box<dyn Response>, _) = match outcome {
            Ok(result) => (result, DispatchState::Succeeded),
            Err(err) => (error_response(err, env), DispatchState::Failed),
        };

        let written = send(result, &request, response.take(), env).await;
        self.transition(terminal);
        written
    }

    async fn run(&self, request: &Arc<HttpRequest>, response: &ResponseHandle) -> Result<Box<dyn Response>, Error> {
        self.transition(DispatchState::ResolvingArgs);
        let (args, _ctx) = self.resolve_arguments(request, response).await?;

        self.transition(DispatchState::RunningPolicies);
        self.run_policies(request).await?;

        let middlewares = self.enabled_middlewares()?;

        self.transition(DispatchState::RunningBeforeMiddleware);
        for middleware in &middlewares {
            middleware.on_before_action(request, response).await?;
        }

        self.transition(DispatchState::InvokingHandler);
        let result = (self.handler)(args).await?;

        self.transition(DispatchState::RunningAfterMiddleware);
        for middleware in &middlewares {
            middleware.on_after_action(request, response).await?;
        }

        Ok(result)
    }

    async fn run_policies(&self, request: &HttpRequest) -> Result<(), Error> {
        for binding in self.controller.policies_for(&self.route) {
            let policy = binding.resolve(&self.services.container)?;
            if !policy.is_enabled(&self.route, &self.controller) {
                continue;
            }

            if !policy.execute(request, &self.route, &self.controller).await? {
                debug!(
                    policy = binding.type_name,
                    route = %self.route.handler_name,
                    "Policy denied request"
                );
                return Err(Error::PolicyDenied(format!(
                    "{} denied access to {}:{}",
                    binding.type_name, self.controller.name, self.route.handler_name
                )));
            }
        }
        Ok(())
    }

    /// Middlewares are built fresh for every request
    fn enabled_middlewares(&self) -> Result<Vec<Arc<dyn Middleware>>, Error> {
        let mut enabled = Vec::new();
        for binding in self.controller.middlewares_for(&self.route) {
            let middleware = binding.resolve(&self.services.container)?;
            if middleware.is_enabled(&self.route, &self.controller) {
                enabled.push(middleware);
            } else {
                trace!(middleware = binding.type_name, "Middleware disabled for route");
            }
        }
        Ok(enabled)
    }

    /// Extract, coerce, hydrate and validate every declared parameter
    pub async fn resolve_arguments(
        &self,
        request: &Arc<HttpRequest>,
        response: &ResponseHandle,
    ) -> Result<(RouteArgs, CallContext), Error> {
        if let Some(missing) = self.route.missing_parameter_index() {
            return Err(Error::UnexpectedServerError(format!(
                "parameter {} of {}:{} has no descriptor",
                missing, self.controller.name, self.route.handler_name
            )));
        }

        let mut ctx = CallContext::new();
        let mut values = Vec::with_capacity(self.route.parameters.len());

        for param in self.route.parameters.values() {
            let extractor = self.services.extractors.get(param.source).ok_or_else(|| {
                Error::UnexpectedServerError(format!("no argument extractor registered for {:?}", param.source))
            })?;

            let raw = extractor
                .extract(&mut ctx, param, request, response, &self.route)
                .await?;
            values.push(self.normalize(param, raw).await?);
        }

        Ok((RouteArgs::new(values), ctx))
    }

    async fn normalize(&self, param: &ParameterDescriptor, raw: ArgValue) -> Result<ArgValue, Error> {
        if param.source.bypasses_normalization() {
            return Ok(raw);
        }

        let input = match raw {
            ArgValue::Json(value) => value,
            other => return Ok(other),
        };

        let (value, subject) = match param.runtime_type.hydrator() {
            Some(hydrator) => match hydrator.hydrate(input.clone(), param).await? {
                ArgValue::Json(hydrated) => (ArgValue::Json(hydrated.clone()), hydrated),
                other => (other, input),
            },
            None => {
                let coerced = coerce(&param.runtime_type, input);
                (ArgValue::Json(coerced.clone()), coerced)
            }
        };

        self.validate(param, &subject)?;
        Ok(value)
    }

    fn validate(&self, param: &ParameterDescriptor, subject: &Value) -> Result<(), Error> {
        let Some(schema) = effective_schema(param.schema.as_ref(), &param.runtime_type) else {
            return Ok(());
        };
        let (schema, schema_optional) = schema.split_required();

        let validator = self
            .services
            .validator
            .as_ref()
            .ok_or_else(|| Error::UnexpectedServerError("validation service is not available".to_string()))?;

        let result = validator.validate(&schema, subject)?;
        if result.valid {
            return Ok(());
        }

        let parameter = if param.name.is_empty() {
            format!("#{}", param.index)
        } else {
            param.name.clone()
        };

        if param.required && !schema_optional {
            return Err(Error::ValidationFailed {
                parameter,
                errors: result.errors,
            });
        }

        debug!(parameter = %parameter, "Ignoring validation failure of optional parameter");
        Ok(())
    }
}
