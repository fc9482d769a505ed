//! Error types for the Handlebars view renderer

use thiserror::Error;

/// Result type for Handlebars operations
pub type Result<T> = std::result::Result<T, HandlebarsError>;

#[derive(Error, Debug)]
pub enum HandlebarsError {
    #[error("View not found: {0}")]
    ViewNotFound(String),

    #[error("View rendering error: {0}")]
    RenderError(String),

    #[error("View parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<handlebars::RenderError> for HandlebarsError {
    fn from(err: handlebars::RenderError) -> Self {
        HandlebarsError::RenderError(err.to_string())
    }
}

impl From<handlebars::TemplateError> for HandlebarsError {
    fn from(err: handlebars::TemplateError) -> Self {
        HandlebarsError::ParseError(err.to_string())
    }
}

impl From<HandlebarsError> for girder_core::Error {
    fn from(err: HandlebarsError) -> Self {
        match err {
            HandlebarsError::Io(io) => girder_core::Error::Io(io),
            HandlebarsError::Serialization(e) => girder_core::Error::Serialization(e.to_string()),
            HandlebarsError::ViewNotFound(name) => {
                girder_core::Error::NotSupported(format!("view `{}` is not registered", name))
            }
            other => girder_core::Error::UnexpectedServerError(other.to_string()),
        }
    }
}
