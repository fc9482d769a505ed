//! Validation glue between extracted arguments and the schema validator.
//!
//! The validator itself is a capability ([`DataValidator`]) supplied by
//! `girder-validation`. This module decides which schema applies to a
//! parameter and coerces primitive string input before validation.

use crate::Error;
use crate::types::RuntimeType;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Default upper bound applied to string parameters without a schema
pub const DEFAULT_STRING_MAX_LENGTH: u64 = 512;

/// One structured validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub keyword: String,
    pub instance_path: String,
    pub schema_path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        keyword: impl Into<String>,
        instance_path: impl Into<String>,
        schema_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            instance_path: instance_path.into(),
            schema_path: schema_path.into(),
            message: message.into(),
        }
    }
}

/// A schema given inline or by registered id
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaRef {
    Inline(Arc<Value>),
    Id(String),
}

impl SchemaRef {
    pub fn inline(schema: Value) -> Self {
        SchemaRef::Inline(Arc::new(schema))
    }

    pub fn id(id: impl Into<String>) -> Self {
        SchemaRef::Id(id.into())
    }

    /// Inline schemas may carry `"required": false`, which marks the
    /// parameter optional. Returns the cleaned schema and whether it was
    /// explicitly optional.
    pub(crate) fn split_required(self) -> (Self, bool) {
        match self {
            SchemaRef::Inline(schema) => match schema.get("required") {
                Some(Value::Bool(required)) => {
                    let optional = !required;
                    let mut cleaned = (*schema).clone();
                    if let Some(map) = cleaned.as_object_mut() {
                        map.remove("required");
                    }
                    (SchemaRef::Inline(Arc::new(cleaned)), optional)
                }
                _ => (SchemaRef::Inline(schema), false),
            },
            id => (id, false),
        }
    }
}

impl From<Value> for SchemaRef {
    fn from(schema: Value) -> Self {
        SchemaRef::inline(schema)
    }
}

impl From<&str> for SchemaRef {
    fn from(id: &str) -> Self {
        SchemaRef::id(id)
    }
}

/// Outcome of validating one value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<ValidationIssue>) -> Self {
        Self { valid: false, errors }
    }
}

/// Schema validation capability consumed by the dispatcher
pub trait DataValidator: Send + Sync {
    /// Validate `data` against `schema`.
    ///
    /// An unresolvable schema reference is an error, a failing value is not.
    fn validate(&self, schema: &SchemaRef, data: &Value) -> Result<ValidationResult, Error>;
}

/// Schema generated for a primitive parameter without an explicit one
pub fn primitive_schema(runtime_type: &RuntimeType) -> Option<Value> {
    match runtime_type {
        RuntimeType::Number => Some(json!({"type": "number"})),
        RuntimeType::String => Some(json!({"type": "string", "maxLength": DEFAULT_STRING_MAX_LENGTH})),
        RuntimeType::Boolean => Some(json!({"type": "boolean"})),
        RuntimeType::Any | RuntimeType::Object(_) => None,
    }
}

/// Pick the schema that applies to a parameter.
///
/// The explicit parameter schema wins, then the schema attached to the
/// declared type, then a generated primitive schema.
pub fn effective_schema(explicit: Option<&SchemaRef>, runtime_type: &RuntimeType) -> Option<SchemaRef> {
    if let Some(schema) = explicit {
        return Some(schema.clone());
    }
    if let RuntimeType::Object(info) = runtime_type {
        if let Some(schema) = &info.schema {
            return Some(schema.clone());
        }
    }
    primitive_schema(runtime_type).map(SchemaRef::inline)
}

/// Coerce string input for primitive declared types.
///
/// Numeric strings become numbers and anything unparsable becomes `null` so
/// that validation fails downstream. Only the exact literal `"true"` becomes
/// boolean `true`; every other string is `false`.
pub fn coerce(runtime_type: &RuntimeType, raw: Value) -> Value {
    match (runtime_type, raw) {
        (RuntimeType::Number, Value::String(s)) => parse_number(&s),
        (RuntimeType::Boolean, Value::String(s)) => Value::Bool(s == "true"),
        (_, raw) => raw,
    }
}

fn parse_number(s: &str) -> Value {
    let s = s.trim();
    if let Ok(n) = s.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = s.parse::<u64>() {
        return Value::from(n);
    }
    match s.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::from(n),
        _ => Value::Null,
    }
}
