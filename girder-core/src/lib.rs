// Core library for the girder controller framework
// Route metadata, argument extraction, policy and middleware chains,
// the per-route dispatcher and the negotiated response layer

pub mod args;
pub mod config;
pub mod container;
pub mod content_negotiation;
pub mod controller;
pub mod controllers;
pub mod cookie;
pub mod dispatcher;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod form;
pub mod http;
pub mod logging;
pub mod metadata;
pub mod middleware;
pub mod policy;
pub mod response;
pub mod responses;
pub mod routing;
pub mod server;
pub mod static_assets;
pub mod status;
pub mod traits;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use args::*;
pub use config::*;
pub use container::*;
pub use content_negotiation::{Accept, AcceptFormats, MediaType};
pub use controller::*;
pub use controllers::*;
pub use cookie::*;
pub use dispatcher::*;
pub use dto::*;
pub use error::*;
pub use extractors::*;
pub use form::*;
pub use http::*;
pub use metadata::*;
pub use middleware::*;
pub use policy::*;
pub use response::*;
pub use responses::*;
pub use routing::{Route, Router}; // HandlerFn and RouteFuture stay under routing::
pub use server::*;
pub use static_assets::*;
pub use status::*;
pub use traits::*;
pub use types::*;
pub use validation::*;
