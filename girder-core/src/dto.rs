// Query DTOs shared by listing endpoints

use crate::args::ArgValue;
use crate::metadata::ParameterDescriptor;
use crate::types::{ArgHydrator, ArgType, RuntimeType, TypeInfo};
use crate::validation::coerce;
use crate::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Paging window: take `limit` rows after skipping `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitDto {
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

impl LimitDto {
    pub fn schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Limit DTO",
            "type": "object",
            "properties": {
                "limit": { "type": "number", "minimum": 1 },
                "offset": { "type": "number", "minimum": 0 }
            },
            "required": ["limit"]
        })
    }
}

impl ArgType for LimitDto {
    fn runtime_type() -> RuntimeType {
        RuntimeType::Object(
            TypeInfo::of::<LimitDto>()
                .with_schema(Self::schema())
                .with_hydrator(NumericFields(&["limit", "offset"])),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Sort column and direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDto {
    pub column: String,
    pub order: SortOrder,
}

impl OrderDto {
    pub fn schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Order DTO",
            "type": "object",
            "properties": {
                "column": { "type": "string", "minLength": 1 },
                "order": { "type": "string", "enum": ["asc", "desc"] }
            },
            "required": ["column", "order"]
        })
    }
}

impl ArgType for OrderDto {
    fn runtime_type() -> RuntimeType {
        RuntimeType::Object(TypeInfo::of::<OrderDto>().with_schema(Self::schema()))
    }
}

/// Turns numeric strings in the listed fields into numbers, so query
/// strings validate like JSON bodies
struct NumericFields(&'static [&'static str]);

#[async_trait]
impl ArgHydrator for NumericFields {
    async fn hydrate(&self, mut input: Value, _param: &ParameterDescriptor) -> Result<ArgValue, Error> {
        if let Value::Object(map) = &mut input {
            for field in self.0 {
                if let Some(value) = map.remove(*field) {
                    map.insert(field.to_string(), coerce(&RuntimeType::Number, value));
                }
            }
        }
        Ok(ArgValue::Json(input))
    }
}
