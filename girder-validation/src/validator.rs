// JSON Schema backed DataValidator

use crate::cache;
use crate::error::{Result, SchemaError};
use girder_core::{DataValidator, Provider, SchemaRef, ValidationIssue, ValidationResult};
use jsonschema::{Draft, JSONSchema};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Base URI under which registered schemas can be referenced by `$ref`
const SCHEMA_BASE_URI: &str = "json-schema:///";

/// Validates handler arguments against JSON Schemas (draft 7).
///
/// Named schemas are registered once, usually at startup from the
/// configured schema directories, and referenced with [`SchemaRef::Id`].
pub struct JsonSchemaValidator {
    registry: u64,
    documents: RwLock<HashMap<String, Arc<Value>>>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self {
            registry: cache::next_registry_id(),
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Register every `*.json` schema found directly in `dirs`.
    ///
    /// Missing directories are skipped and so are files that do not hold a
    /// valid schema, with a warning.
    pub fn from_dirs<P: AsRef<Path>>(dirs: impl IntoIterator<Item = P>) -> Result<Self> {
        let validator = Self::new();
        for dir in dirs {
            let dir = dir.as_ref();
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "Schema directory does not exist");
                continue;
            }

            let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
                .collect();
            files.sort();

            for file in files {
                match validator.add_schema_file(&file) {
                    Ok(id) => trace!(schema = %id, "Added schema"),
                    Err(err) => warn!(file = %file.display(), error = %err, "Skipping schema file"),
                }
            }
        }
        Ok(validator)
    }

    /// Register the schema in `path` under its `$id` or file stem
    pub fn add_schema_file(&self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path)?;
        let schema: Value = serde_json::from_str(&content).map_err(|e| SchemaError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let id = match schema.get("$id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
                .ok_or_else(|| SchemaError::Parse {
                    path: path.display().to_string(),
                    message: "file name is not valid UTF-8".to_string(),
                })?,
        };

        self.add_schema(&id, schema)?;
        Ok(id)
    }

    /// Register `schema` under `id` after checking that it compiles
    pub fn add_schema(&self, id: &str, schema: Value) -> Result<()> {
        if self.has_schema(id) {
            return Err(SchemaError::Duplicate(id.to_string()));
        }

        self.options().compile(&schema).map_err(|e| SchemaError::InvalidSchema {
            id: id.to_string(),
            message: e.to_string(),
        })?;

        self.documents.write().insert(id.to_string(), Arc::new(schema));
        debug!(schema = id, "Registered schema");
        Ok(())
    }

    pub fn has_schema(&self, id: &str) -> bool {
        self.documents.read().contains_key(id)
    }

    pub fn schema_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.documents.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Compile options knowing every registered document
    fn options(&self) -> jsonschema::CompilationOptions {
        let mut options = JSONSchema::options();
        options.with_draft(Draft::Draft7);
        for (id, document) in self.documents.read().iter() {
            let uri = if id.contains(':') {
                id.clone()
            } else {
                format!("{}{}", SCHEMA_BASE_URI, id)
            };
            options.with_document(uri, document.as_ref().clone());
        }
        options
    }

    fn compiled(&self, schema: &SchemaRef) -> Result<Arc<JSONSchema>> {
        let (key, document) = match schema {
            SchemaRef::Id(id) => {
                let document = self
                    .documents
                    .read()
                    .get(id)
                    .cloned()
                    .ok_or_else(|| SchemaError::UnknownSchema(id.clone()))?;
                (format!("id:{}", id), document)
            }
            SchemaRef::Inline(schema) => (format!("inline:{}", schema), schema.clone()),
        };

        cache::get_or_compile(cache::cache_key(self.registry, &key), || {
            self.options()
                .compile(&document)
                .map_err(|e| SchemaError::InvalidSchema {
                    id: key.clone(),
                    message: e.to_string(),
                })
        })
    }

    /// Validate `data` and collect every failure
    pub fn check(&self, schema: &SchemaRef, data: &Value) -> Result<ValidationResult> {
        let compiled = self.compiled(schema)?;

        let result = match compiled.validate(data) {
            Ok(()) => ValidationResult::valid(),
            Err(errors) => ValidationResult::invalid(
                errors
                    .map(|error| {
                        let schema_path = error.schema_path.to_string();
                        let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_string();
                        ValidationIssue::new(keyword, error.instance_path.to_string(), schema_path, error.to_string())
                    })
                    .collect(),
            ),
        };
        Ok(result)
    }
}

impl Default for JsonSchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DataValidator for JsonSchemaValidator {
    fn validate(&self, schema: &SchemaRef, data: &Value) -> girder_core::Result<ValidationResult> {
        Ok(self.check(schema, data)?)
    }
}

impl Provider for JsonSchemaValidator {}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("schemas", &self.schema_ids())
            .finish()
    }
}

/// Number of compiled validators shared by every registry in the process
pub fn compiled_count() -> usize {
    cache::len()
}
