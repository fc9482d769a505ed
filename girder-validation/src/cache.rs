// Process-wide cache of compiled validators

use jsonschema::JSONSchema;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Compiled schemas keyed by registry and serialized schema.
///
/// Entries are only ever added: a registry's documents never change once
/// registered, so a compiled validator stays correct for its lifetime.
static COMPILED: LazyLock<RwLock<HashMap<String, Arc<JSONSchema>>>> = LazyLock::new(Default::default);

static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

/// Identifies one schema registry inside the shared cache
pub(crate) fn next_registry_id() -> u64 {
    NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn cache_key(registry: u64, schema_key: &str) -> String {
    format!("{}:{}", registry, schema_key)
}

/// The cached validator for `key`, compiling it with `compile` on a miss
pub(crate) fn get_or_compile<E>(
    key: String,
    compile: impl FnOnce() -> Result<JSONSchema, E>,
) -> Result<Arc<JSONSchema>, E> {
    if let Some(compiled) = COMPILED.read().get(&key) {
        return Ok(compiled.clone());
    }

    let compiled = Arc::new(compile()?);
    let mut cache = COMPILED.write();
    // Another task may have compiled the same schema meanwhile
    let entry = cache.entry(key).or_insert_with(|| compiled.clone()).clone();
    debug!(cache_size = cache.len(), "Schema validator compiled and cached");
    Ok(entry)
}

pub(crate) fn len() -> usize {
    COMPILED.read().len()
}
