// Schema registry errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema `{id}` is invalid: {message}")]
    InvalidSchema { id: String, message: String },

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("Schema `{0}` is already registered")]
    Duplicate(String),

    #[error("Failed to parse schema file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SchemaError> for girder_core::Error {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownSchema(_) | SchemaError::InvalidSchema { .. } => {
                girder_core::Error::SchemaValidationFailed(err.to_string())
            }
            SchemaError::Io(io) => girder_core::Error::Io(io),
            other => girder_core::Error::UnexpectedServerError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
