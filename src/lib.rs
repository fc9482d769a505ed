// girder - a controller-based HTTP framework for Rust
//
// Controllers declare routes and typed parameters once; requests are
// dispatched through argument extraction, schema validation, policies and
// middleware, and answered with negotiated JSON or HTML responses.

// Re-export core functionality
pub use girder_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use girder_config;

#[cfg(feature = "validation")]
pub use girder_validation;

#[cfg(feature = "handlebars")]
pub use girder_handlebars;

#[cfg(feature = "testing")]
pub use girder_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ArgType,
        BadRequestResponse,
        Container,
        Controller,
        ControllerBuilder,
        Controllers,
        CreatedResponse,
        Error,
        HttpConfig,
        HttpRequest,
        HttpResponse,
        HttpServer,
        Injectable,
        MiddlewareBinding,
        NotFoundResponse,
        OkResponse,
        Param,
        PolicyBinding,
        Provider,
        Response,
        RouteArgs,
        RouteDescriptor,
        SchemaRef,
    };

    #[cfg(feature = "config")]
    pub use girder_config::{ConfigManager, ConfigService};

    #[cfg(feature = "validation")]
    pub use girder_validation::JsonSchemaValidator;

    #[cfg(feature = "handlebars")]
    pub use girder_handlebars::{HandlebarsConfig, HandlebarsService};
}
