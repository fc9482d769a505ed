// Declared parameter types and the capabilities a type can carry

use crate::args::ArgValue;
use crate::metadata::ParameterDescriptor;
use crate::validation::SchemaRef;
use crate::{Container, Error};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Builds a value of a custom type from raw extracted input
#[async_trait]
pub trait ArgHydrator: Send + Sync {
    async fn hydrate(&self, input: Value, param: &ParameterDescriptor) -> Result<ArgValue, Error>;
}

/// Lookup-by-key capability for model parameters
#[async_trait]
pub trait ModelRepository: Send + Sync {
    async fn find_by_key(&self, key_name: &str, key: &Value) -> Result<Option<ArgValue>, Error>;
}

/// Resolves a service from the container with the parameter's options
pub type ServiceResolver =
    Arc<dyn Fn(&Container, &Value) -> Result<Arc<dyn Any + Send + Sync>, Error> + Send + Sync>;

/// Metadata attached to a non-primitive declared type
#[derive(Clone)]
pub struct TypeInfo {
    pub name: String,
    pub schema: Option<SchemaRef>,
    pub hydrator: Option<Arc<dyn ArgHydrator>>,
    pub repository: Option<Arc<dyn ModelRepository>>,
    pub service: Option<ServiceResolver>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            hydrator: None,
            repository: None,
            service: None,
        }
    }

    /// Named after the last path segment of `T`
    pub fn of<T: ?Sized>() -> Self {
        Self::new(short_type_name::<T>())
    }

    pub fn with_schema(mut self, schema: impl Into<SchemaRef>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_hydrator(mut self, hydrator: impl ArgHydrator + 'static) -> Self {
        self.hydrator = Some(Arc::new(hydrator));
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn ModelRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_service(mut self, resolver: ServiceResolver) -> Self {
        self.service = Some(resolver);
        self
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("hydrator", &self.hydrator.is_some())
            .field("repository", &self.repository.is_some())
            .field("service", &self.service.is_some())
            .finish()
    }
}

/// What the framework knows about a parameter's declared type
#[derive(Debug, Clone, Default)]
pub enum RuntimeType {
    #[default]
    Any,
    Number,
    String,
    Boolean,
    Object(TypeInfo),
}

impl RuntimeType {
    pub fn name(&self) -> &str {
        match self {
            RuntimeType::Any => "Any",
            RuntimeType::Number => "Number",
            RuntimeType::String => "String",
            RuntimeType::Boolean => "Boolean",
            RuntimeType::Object(info) => &info.name,
        }
    }

    pub fn info(&self) -> Option<&TypeInfo> {
        match self {
            RuntimeType::Object(info) => Some(info),
            _ => None,
        }
    }

    pub fn hydrator(&self) -> Option<&Arc<dyn ArgHydrator>> {
        self.info().and_then(|info| info.hydrator.as_ref())
    }
}

/// Rust types usable as handler parameters
pub trait ArgType {
    fn runtime_type() -> RuntimeType;
}

macro_rules! impl_arg_type {
    ($kind:ident => $($ty:ty),+) => {
        $(impl ArgType for $ty {
            fn runtime_type() -> RuntimeType {
                RuntimeType::$kind
            }
        })+
    };
}

impl_arg_type!(Number => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
impl_arg_type!(String => String);
impl_arg_type!(Boolean => bool);
impl_arg_type!(Any => Value);

impl<T: ArgType> ArgType for Option<T> {
    fn runtime_type() -> RuntimeType {
        T::runtime_type()
    }
}

impl<T> ArgType for Vec<T> {
    fn runtime_type() -> RuntimeType {
        RuntimeType::Any
    }
}

impl<K, V, S> ArgType for HashMap<K, V, S> {
    fn runtime_type() -> RuntimeType {
        RuntimeType::Any
    }
}

impl<K, V> ArgType for BTreeMap<K, V> {
    fn runtime_type() -> RuntimeType {
        RuntimeType::Any
    }
}

impl ArgType for DateTime<Utc> {
    fn runtime_type() -> RuntimeType {
        RuntimeType::Object(TypeInfo::new("DateTime").with_hydrator(DateHydrator))
    }
}

/// Hydrates `DateTime<Utc>` parameters.
///
/// Numbers are unix seconds; strings are RFC 3339 or `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateHydrator;

impl DateHydrator {
    pub fn parse(input: &Value) -> Option<DateTime<Utc>> {
        match input {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Some(dt.with_timezone(&Utc));
                }
                if let Ok(secs) = s.parse::<i64>() {
                    return Utc.timestamp_opt(secs, 0).single();
                }
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl ArgHydrator for DateHydrator {
    async fn hydrate(&self, input: Value, param: &ParameterDescriptor) -> Result<ArgValue, Error> {
        if input.is_null() && !param.required {
            return Ok(ArgValue::Json(Value::Null));
        }
        match Self::parse(&input) {
            Some(date) => Ok(ArgValue::Object(Box::new(date))),
            None => Err(Error::InvalidArgument(format!(
                "parameter `{}` is not a valid date: {}",
                param.name, input
            ))),
        }
    }
}

pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
