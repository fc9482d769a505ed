// Error taxonomy for the girder framework

use crate::HttpStatus;
use crate::validation::ValidationIssue;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Policy denied: {0}")]
    PolicyDenied(String),

    #[error("Resource duplicated: {0}")]
    ResourceDuplicated(String),

    // 400 family
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed for parameter `{parameter}`")]
    ValidationFailed {
        parameter: String,
        errors: Vec<ValidationIssue>,
    },

    #[error("Schema validation failed: {0}")]
    SchemaValidationFailed(String),

    #[error("Unacceptable response format: {0}")]
    UnacceptableResponseFormat(String),

    // 404 family
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    // 500 family
    #[error("Unexpected server error: {0}")]
    UnexpectedServerError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.http_status().code()
    }

    /// Get the canonical HttpStatus for this error kind
    pub fn http_status(&self) -> HttpStatus {
        match self {
            Error::AuthenticationFailed(_) => HttpStatus::Unauthorized,
            Error::Forbidden(_) | Error::PolicyDenied(_) => HttpStatus::Forbidden,
            Error::ResourceDuplicated(_) => HttpStatus::Conflict,

            Error::InvalidArgument(_)
            | Error::BadRequest(_)
            | Error::ValidationFailed { .. }
            | Error::SchemaValidationFailed(_)
            | Error::UnacceptableResponseFormat(_) => HttpStatus::BadRequest,

            Error::ResourceNotFound(_) | Error::RouteNotFound(_) => HttpStatus::NotFound,

            // Default to 500 for everything else
            _ => HttpStatus::InternalServerError,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }

    /// Stable name of the error kind, used in error bodies and logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::AuthenticationFailed(_) => "AuthenticationFailed",
            Error::Forbidden(_) => "Forbidden",
            Error::PolicyDenied(_) => "PolicyDenied",
            Error::ResourceDuplicated(_) => "ResourceDuplicated",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::BadRequest(_) => "BadRequest",
            Error::ValidationFailed { .. } => "ValidationFailed",
            Error::SchemaValidationFailed(_) => "SchemaValidationFailed",
            Error::UnacceptableResponseFormat(_) => "UnacceptableResponseFormat",
            Error::ResourceNotFound(_) => "ResourceNotFound",
            Error::RouteNotFound(_) => "RouteNotFound",
            Error::UnexpectedServerError(_) => "UnexpectedServerError",
            Error::Io(_) => "IOFailure",
            Error::NotImplemented(_) => "NotImplemented",
            Error::NotSupported(_) => "NotSupported",
            Error::Serialization(_) => "Serialization",
            Error::ProviderNotFound(_) => "ProviderNotFound",
        }
    }

    /// Structured details attached to the error, if any
    pub fn parameters(&self) -> Option<Value> {
        match self {
            Error::ValidationFailed { parameter, errors } => Some(json!({
                "parameter": parameter,
                "errors": errors,
            })),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result alias used throughout girder-core
pub type Result<T> = std::result::Result<T, Error>;
