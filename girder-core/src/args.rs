// Resolved handler arguments and per-request extraction state

use crate::form::{FormData, MultipartParser};
use crate::logging::trace;
use crate::response::ResponseHandle;
use crate::{Error, HttpRequest};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A resolved argument value
pub enum ArgValue {
    /// Plain data from the request, already coerced and validated
    Json(Value),
    /// A value built by a hydrator or a model repository
    Object(Box<dyn Any + Send + Sync>),
    /// A service resolved from the container
    Service(Arc<dyn Any + Send + Sync>),
    Request(Arc<HttpRequest>),
    Response(ResponseHandle),
}

impl ArgValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ArgValue::Json(value) => Some(value),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ArgValue::Json(_) => "json",
            ArgValue::Object(_) => "object",
            ArgValue::Service(_) => "service",
            ArgValue::Request(_) => "request",
            ArgValue::Response(_) => "response",
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Json(value) => f.debug_tuple("Json").field(value).finish(),
            other => write!(f, "{}(..)", other.kind()),
        }
    }
}

/// Arguments handed to a route handler, indexed by declaration order
#[derive(Debug, Default)]
pub struct RouteArgs {
    values: Vec<Option<ArgValue>>,
}

impl RouteArgs {
    pub fn new(values: Vec<ArgValue>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn raw(&self, index: usize) -> Result<&ArgValue, Error> {
        self.values
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::UnexpectedServerError(format!("no argument at index {}", index)))
    }

    /// Deserialize a data argument into `T`
    pub fn value<T: DeserializeOwned>(&self, index: usize) -> Result<T, Error> {
        match self.raw(index)? {
            ArgValue::Json(value) => serde_json::from_value(value.clone()).map_err(|e| {
                Error::InvalidArgument(format!("argument {} has unexpected shape: {}", index, e))
            }),
            other => Err(Error::UnexpectedServerError(format!(
                "argument {} is a {}, not data",
                index,
                other.kind()
            ))),
        }
    }

    /// Move a hydrated or model value out of the argument list
    pub fn take<T: Any>(&mut self, index: usize) -> Result<T, Error> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| Error::UnexpectedServerError(format!("no argument at index {}", index)))?;

        match slot.take() {
            Some(ArgValue::Object(object)) => match object.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(object) => {
                    *slot = Some(ArgValue::Object(object));
                    Err(Error::UnexpectedServerError(format!(
                        "argument {} is not a {}",
                        index,
                        std::any::type_name::<T>()
                    )))
                }
            },
            Some(other) => {
                let kind = other.kind();
                *slot = Some(other);
                Err(Error::UnexpectedServerError(format!(
                    "argument {} is a {}, not an object",
                    index, kind
                )))
            }
            None => Err(Error::UnexpectedServerError(format!("argument {} already taken", index))),
        }
    }

    pub fn service<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, Error> {
        match self.raw(index)? {
            ArgValue::Service(service) => service.clone().downcast::<T>().map_err(|_| {
                Error::UnexpectedServerError(format!(
                    "argument {} is not a {}",
                    index,
                    std::any::type_name::<T>()
                ))
            }),
            other => Err(Error::UnexpectedServerError(format!(
                "argument {} is a {}, not a service",
                index,
                other.kind()
            ))),
        }
    }

    pub fn request(&self, index: usize) -> Result<Arc<HttpRequest>, Error> {
        match self.raw(index)? {
            ArgValue::Request(request) => Ok(request.clone()),
            other => Err(Error::UnexpectedServerError(format!(
                "argument {} is a {}, not the request",
                index,
                other.kind()
            ))),
        }
    }

    pub fn response(&self, index: usize) -> Result<ResponseHandle, Error> {
        match self.raw(index)? {
            ArgValue::Response(response) => Ok(response.clone()),
            other => Err(Error::UnexpectedServerError(format!(
                "argument {} is a {}, not the response",
                index,
                other.kind()
            ))),
        }
    }
}

/// Scratch state shared by all extractors of one request
#[derive(Debug, Default)]
pub struct CallContext {
    body: Option<Value>,
    form: Option<Arc<FormData>>,
    form_parses: usize,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed request body, parsed on first use
    pub fn body(&mut self, request: &HttpRequest) -> Result<&Value, Error> {
        if self.body.is_none() {
            self.body = Some(request.body_value()?);
        }
        Ok(self.body.get_or_insert(Value::Null))
    }

    /// The multipart payload, parsed on first use with `parser`
    pub async fn form(&mut self, request: &HttpRequest, parser: &MultipartParser<'_>) -> Result<Arc<FormData>, Error> {
        if let Some(form) = &self.form {
            trace!("Reusing parsed multipart form");
            return Ok(form.clone());
        }

        self.form_parses += 1;
        let form = Arc::new(parser.parse(request).await?);
        self.form = Some(form.clone());
        Ok(form)
    }

    /// Number of multipart parses performed for this request
    pub fn form_parses(&self) -> usize {
        self.form_parses
    }
}
