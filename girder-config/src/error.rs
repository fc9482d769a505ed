// Error types for configuration management

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error for `{key}`: {message}")]
    DeserializationError { key: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvError(#[from] std::env::VarError),
}

impl From<ConfigError> for girder_core::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::KeyNotFound(key) => girder_core::Error::ResourceNotFound(format!("configuration key {}", key)),
            ConfigError::IoError(io) => girder_core::Error::Io(io),
            other => girder_core::Error::UnexpectedServerError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
