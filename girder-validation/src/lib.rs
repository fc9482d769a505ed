//! JSON Schema validation for girder handler arguments.
//!
//! [`JsonSchemaValidator`] implements the core `DataValidator` capability.
//! Schemas are either inline or registered by id, usually loaded from the
//! directories configured under `validation.schema_dirs`:
//!
//! ```
//! use girder_core::{DataValidator, SchemaRef};
//! use girder_validation::JsonSchemaValidator;
//! use serde_json::json;
//!
//! let validator = JsonSchemaValidator::new();
//! validator
//!     .add_schema("order", json!({"type": "object", "required": ["id"]}))
//!     .unwrap();
//!
//! let result = validator.validate(&SchemaRef::id("order"), &json!({"id": 1})).unwrap();
//! assert!(result.valid);
//!
//! let result = validator.validate(&SchemaRef::id("order"), &json!({})).unwrap();
//! assert_eq!(result.errors[0].keyword, "required");
//! ```
//!
//! Compiled validators are cached process-wide, so each schema compiles
//! once no matter how many requests use it.

mod cache;
pub mod error;
pub mod validator;

pub use error::{Result, SchemaError};
pub use validator::{JsonSchemaValidator, compiled_count};
