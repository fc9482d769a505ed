//! Argument extractors.
//!
//! One extractor per [`SourceKind`] pulls the raw value of a parameter out
//! of the request. Coercion, hydration and validation happen afterwards in
//! the dispatcher. Extractors are looked up by source kind in an
//! [`ExtractorRegistry`] built once when controllers are resolved.

use crate::args::{ArgValue, CallContext};
use crate::config::HttpConfig;
use crate::cookie::CookieSigner;
use crate::form::{FormData, FormOptions, MultipartParser, UploadDir};
use crate::logging::{debug, trace};
use crate::metadata::{ParameterDescriptor, RouteDescriptor, SourceKind};
use crate::response::ResponseHandle;
use crate::{ConfigSource, Container, Error, HttpRequest};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Pulls one parameter's raw value from the request
#[async_trait]
pub trait ArgumentExtractor: Send + Sync {
    fn source(&self) -> SourceKind;

    async fn extract(
        &self,
        ctx: &mut CallContext,
        param: &ParameterDescriptor,
        request: &Arc<HttpRequest>,
        response: &ResponseHandle,
        route: &RouteDescriptor,
    ) -> Result<ArgValue, Error>;
}

fn map_value(map: &HashMap<String, String>, name: &str) -> Value {
    if name.is_empty() {
        let all: Map<String, Value> = map
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        return Value::Object(all);
    }

    map.get(name)
        .map(|v| Value::String(v.clone()))
        .unwrap_or(Value::Null)
}

/// Query string parameters
#[derive(Debug, Default)]
pub struct QueryExtractor;

#[async_trait]
impl ArgumentExtractor for QueryExtractor {
    fn source(&self) -> SourceKind {
        SourceKind::Query
    }

    async fn extract(
        &self,
        _ctx: &mut CallContext,
        param: &ParameterDescriptor,
        request: &Arc<HttpRequest>,
        _response: &ResponseHandle,
        _route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        Ok(ArgValue::Json(map_value(&request.query_params, &param.name)))
    }
}

/// `:name` path segments
#[derive(Debug, Default)]
pub struct PathParamExtractor;

#[async_trait]
impl ArgumentExtractor for PathParamExtractor {
    fn source(&self) -> SourceKind {
        SourceKind::PathParam
    }

    async fn extract(
        &self,
        _ctx: &mut CallContext,
        param: &ParameterDescriptor,
        request: &Arc<HttpRequest>,
        _response: &ResponseHandle,
        _route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        Ok(ArgValue::Json(map_value(&request.path_params, &param.name)))
    }
}

/// Request headers; names match case-insensitively
#[derive(Debug, Default)]
pub struct HeaderExtractor;

#[async_trait]
impl ArgumentExtractor for HeaderExtractor {
    fn source(&self) -> SourceKind {
        SourceKind::Header
    }

    async fn extract(
        &self,
        _ctx: &mut CallContext,
        param: &ParameterDescriptor,
        request: &Arc<HttpRequest>,
        _response: &ResponseHandle,
        _route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        let value = if param.name.is_empty() {
            map_value(&request.header_map(), "")
        } else {
            request
                .header(&param.name)
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null)
        };
        Ok(ArgValue::Json(value))
    }
}

/// Signed cookies.
///
/// Values that are unsigned, tampered with, or unreadable because no secret
/// is configured resolve to `null`.
#[derive(Debug, Default)]
pub struct CookieExtractor {
    signer: Option<CookieSigner>,
}

impl CookieExtractor {
    pub fn new(signer: Option<CookieSigner>) -> Self {
        Self { signer }
    }

    fn verify(&self, raw: &str) -> Option<String> {
        self.signer.as_ref()?.unsign(raw)
    }
}

#[async_trait]
impl ArgumentExtractor for CookieExtractor {
    fn source(&self) -> SourceKind {
        SourceKind::Cookie
    }

    async fn extract(
        &self,
        _ctx: &mut CallContext,
        param: &ParameterDescriptor,
        request: &Arc<HttpRequest>,
        _response: &ResponseHandle,
        _route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        let cookies = request.cookies();

        if param.name.is_empty() {
            let verified: Map<String, Value> = cookies
                .iter()
                .filter_map(|(name, raw)| self.verify(raw).map(|v| (name.clone(), Value::String(v))))
                .collect();
            return Ok(ArgValue::Json(Value::Object(verified)));
        }

        let value = match cookies.get(&param.name) {
            Some(raw) if !raw.is_empty() => match self.verify(raw) {
                Some(value) => Value::String(value),
                None => {
                    debug!(cookie = %param.name, "Cookie signature rejected");
                    Value::Null
                }
            },
            _ => Value::Null,
        };
        Ok(ArgValue::Json(value))
    }
}

/// The parsed request body.
///
/// A named parameter binds `body[name]`. An unnamed one binds the whole
/// body, but only when it is the route's single body parameter.
#[derive(Debug, Default)]
pub struct BodyExtractor;

#[async_trait]
impl ArgumentExtractor for BodyExtractor {
    fn source(&self) -> SourceKind {
        SourceKind::Body
    }

    async fn extract(
        &self,
        ctx: &mut CallContext,
        param: &ParameterDescriptor,
        request: &Arc<HttpRequest>,
        _response: &ResponseHandle,
        route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        let body = ctx.body(request)?;

        let value = if !param.name.is_empty() {
            body.get(&param.name).cloned().unwrap_or(Value::Null)
        } else if route.count_of(SourceKind::Body) == 1 {
            body.clone()
        } else {
            Value::Null
        };
        Ok(ArgValue::Json(value))
    }
}

/// Multipart forms and uploaded files.
///
/// The body is parsed at most once per request; later form parameters reuse
/// the payload cached in the [`CallContext`].
pub struct MultipartExtractor {
    kind: SourceKind,
    config: Arc<HttpConfig>,
    settings: Option<Arc<dyn ConfigSource>>,
}

impl MultipartExtractor {
    pub fn new(kind: SourceKind, config: Arc<HttpConfig>, settings: Option<Arc<dyn ConfigSource>>) -> Self {
        Self {
            kind,
            config,
            settings,
        }
    }

    fn upload_dir(&self, options: &FormOptions) -> PathBuf {
        match &options.upload_dir {
            Some(UploadDir::Static(path)) => path.clone(),
            Some(UploadDir::Computed(compute)) => match &self.settings {
                Some(settings) => compute(settings.as_ref()),
                None => compute(&Value::Null),
            },
            None => self.config.files.upload_dir(),
        }
    }

    fn select(&self, form: &FormData, param: &ParameterDescriptor, multiples: bool) -> Result<Value, Error> {
        match self.kind {
            SourceKind::File if param.name.is_empty() => Ok(serde_json::to_value(&form.files)?),
            SourceKind::File => {
                let files = form.files(&param.name);
                if multiples {
                    return Ok(serde_json::to_value(files)?);
                }
                match files.first() {
                    Some(file) => Ok(serde_json::to_value(file)?),
                    None => Ok(Value::Null),
                }
            }
            SourceKind::FormField if !param.name.is_empty() => {
                Ok(form.field(&param.name).cloned().unwrap_or(Value::Null))
            }
            _ => Ok(Value::Object(form.fields.clone())),
        }
    }
}

#[async_trait]
impl ArgumentExtractor for MultipartExtractor {
    fn source(&self) -> SourceKind {
        self.kind
    }

    async fn extract(
        &self,
        ctx: &mut CallContext,
        param: &ParameterDescriptor,
        request: &Arc<HttpRequest>,
        _response: &ResponseHandle,
        route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        if !request.is_multipart() {
            trace!(parameter = %param.name, "Not a multipart request");
            return Ok(ArgValue::Json(Value::Null));
        }

        // One parse per request, so every parameter sees the route's options
        let options = route.form_options().map(|o| o.as_ref().clone()).unwrap_or_default();
        let parser = MultipartParser::new(&options, self.upload_dir(&options), self.config.files.max_size);
        let form = ctx.form(request, &parser).await?;

        let multiples = param.form.as_ref().map_or(options.multiples, |own| own.multiples);
        Ok(ArgValue::Json(self.select(&form, param, multiples)?))
    }
}

/// Records loaded through the repository attached to the declared type.
///
/// The key is read from path params, then the query, then the body.
#[derive(Debug, Default)]
pub struct ModelExtractor;

impl ModelExtractor {
    fn key_value(ctx: &mut CallContext, request: &HttpRequest, key: &str) -> Result<Option<Value>, Error> {
        if let Some(value) = request.param(key).or_else(|| request.query(key)) {
            return Ok(Some(Value::String(value.clone())));
        }

        let body = ctx.body(request)?;
        Ok(body.get(key).filter(|v| !v.is_null()).cloned())
    }
}

#[async_trait]
impl ArgumentExtractor for ModelExtractor {
    fn source(&self) -> SourceKind {
        SourceKind::Model
    }

    async fn extract(
        &self,
        ctx: &mut CallContext,
        param: &ParameterDescriptor,
        request: &Arc<HttpRequest>,
        _response: &ResponseHandle,
        _route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        let type_name = param.runtime_type.name().to_string();
        let repository = param
            .runtime_type
            .info()
            .and_then(|info| info.repository.clone())
            .ok_or_else(|| {
                Error::NotSupported(format!("{} does not support lookup by key, make sure it is a model type", type_name))
            })?;

        let key_name = param.model_key();
        let key = Self::key_value(ctx, request, key_name)?
            .ok_or_else(|| Error::ResourceNotFound(format!("no `{}` key given for {}", key_name, type_name)))?;

        trace!(model = %type_name, key = %key, "Loading model");
        repository
            .find_by_key(key_name, &key)
            .await?
            .ok_or_else(|| Error::ResourceNotFound(format!("{} with {} = {} not found", type_name, key_name, key)))
    }
}

/// Services resolved from the container
pub struct DiServiceExtractor {
    container: Container,
}

impl DiServiceExtractor {
    pub fn new(container: Container) -> Self {
        Self { container }
    }
}

#[async_trait]
impl ArgumentExtractor for DiServiceExtractor {
    fn source(&self) -> SourceKind {
        SourceKind::DiService
    }

    async fn extract(
        &self,
        _ctx: &mut CallContext,
        param: &ParameterDescriptor,
        _request: &Arc<HttpRequest>,
        _response: &ResponseHandle,
        _route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        let resolver = param
            .runtime_type
            .info()
            .and_then(|info| info.service.clone())
            .ok_or_else(|| {
                Error::UnexpectedServerError(format!(
                    "parameter {} of type {} cannot be injected",
                    param.index,
                    param.runtime_type.name()
                ))
            })?;

        Ok(ArgValue::Service(resolver(&self.container, &param.options)?))
    }
}

/// The transport request itself
#[derive(Debug, Default)]
pub struct RawRequestExtractor;

#[async_trait]
impl ArgumentExtractor for RawRequestExtractor {
    fn source(&self) -> SourceKind {
        SourceKind::RawRequest
    }

    async fn extract(
        &self,
        _ctx: &mut CallContext,
        _param: &ParameterDescriptor,
        request: &Arc<HttpRequest>,
        _response: &ResponseHandle,
        _route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        Ok(ArgValue::Request(request.clone()))
    }
}

/// The shared transport response
#[derive(Debug, Default)]
pub struct RawResponseExtractor;

#[async_trait]
impl ArgumentExtractor for RawResponseExtractor {
    fn source(&self) -> SourceKind {
        SourceKind::RawResponse
    }

    async fn extract(
        &self,
        _ctx: &mut CallContext,
        _param: &ParameterDescriptor,
        _request: &Arc<HttpRequest>,
        response: &ResponseHandle,
        _route: &RouteDescriptor,
    ) -> Result<ArgValue, Error> {
        Ok(ArgValue::Response(response.clone()))
    }
}

/// Extractors keyed by the source kind they serve
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<SourceKind, Arc<dyn ArgumentExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in extractor
    pub fn with_defaults(
        container: Container,
        config: Arc<HttpConfig>,
        settings: Option<Arc<dyn ConfigSource>>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(QueryExtractor);
        registry.register(BodyExtractor);
        registry.register(PathParamExtractor);
        registry.register(HeaderExtractor);
        registry.register(CookieExtractor::new(config.cookie.signer()));
        for kind in [SourceKind::FormField, SourceKind::File, SourceKind::Form] {
            registry.register(MultipartExtractor::new(kind, config.clone(), settings.clone()));
        }
        registry.register(ModelExtractor);
        registry.register(DiServiceExtractor::new(container));
        registry.register(RawRequestExtractor);
        registry.register(RawResponseExtractor);
        registry
    }

    /// Register `extractor`, replacing any previous one for its source
    pub fn register(&mut self, extractor: impl ArgumentExtractor + 'static) {
        let source = extractor.source();
        trace!(source = ?source, "Registering argument extractor");
        self.extractors.insert(source, Arc::new(extractor));
    }

    pub fn remove(&mut self, source: SourceKind) -> Option<Arc<dyn ArgumentExtractor>> {
        self.extractors.remove(&source)
    }

    pub fn get(&self, source: SourceKind) -> Option<&Arc<dyn ArgumentExtractor>> {
        self.extractors.get(&source)
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.extractors.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Param;
    use crate::types::{ModelRepository, RuntimeType, TypeInfo};
    use serde_json::json;

    async fn run(
        extractor: &dyn ArgumentExtractor,
        param: ParameterDescriptor,
        route: &RouteDescriptor,
        request: HttpRequest,
    ) -> Result<ArgValue, Error> {
        let mut ctx = CallContext::new();
        extractor
            .extract(&mut ctx, &param, &Arc::new(request), &ResponseHandle::new(), route)
            .await
    }

    fn json_of(value: ArgValue) -> Value {
        match value {
            ArgValue::Json(v) => v,
            other => panic!("expected json, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_cover_every_source() {
        let registry = ExtractorRegistry::with_defaults(Container::new(), Arc::new(HttpConfig::default()), None);
        for kind in SourceKind::ALL {
            assert!(registry.get(kind).is_some(), "{:?} has no extractor", kind);
        }
    }

    #[tokio::test]
    async fn test_query_by_name_and_catch_all() {
        let route = RouteDescriptor::get("list");
        let req = HttpRequest::from_target("GET", "/list?limit=10&sort=name");

        let value = run(&QueryExtractor, Param::query::<u32>("limit"), &route, req.clone()).await.unwrap();
        assert_eq!(json_of(value), json!("10"));

        let value = run(&QueryExtractor, Param::query_all(), &route, req.clone()).await.unwrap();
        assert_eq!(json_of(value), json!({"limit": "10", "sort": "name"}));

        let value = run(&QueryExtractor, Param::query::<u32>("missing"), &route, req).await.unwrap();
        assert_eq!(json_of(value), Value::Null);
    }

    #[tokio::test]
    async fn test_header_lookup() {
        let route = RouteDescriptor::get("h");
        let req = HttpRequest::new("GET".into(), "/".into()).with_header("X-Api-Key", "k1");

        let value = run(&HeaderExtractor, Param::header::<String>("x-api-key"), &route, req.clone()).await.unwrap();
        assert_eq!(json_of(value), json!("k1"));

        let value = run(&HeaderExtractor, Param::headers(), &route, req).await.unwrap();
        assert_eq!(json_of(value)["x-api-key"], "k1");
    }

    #[tokio::test]
    async fn test_cookie_verification() {
        let signer = CookieSigner::new("secret");
        let signed = signer.sign("user-1").unwrap();
        let extractor = CookieExtractor::new(Some(signer));
        let route = RouteDescriptor::get("c");
        let header = format!("session={}; forged=user-2.AAAA; plain=abc", urlencoding::encode(&signed));
        let req = HttpRequest::new("GET".into(), "/".into()).with_header("Cookie", header);

        let value = run(&extractor, Param::cookie("session"), &route, req.clone()).await.unwrap();
        assert_eq!(json_of(value), json!("user-1"));

        let value = run(&extractor, Param::cookie("forged"), &route, req.clone()).await.unwrap();
        assert_eq!(json_of(value), Value::Null);

        let value = run(&extractor, Param::cookies(), &route, req.clone()).await.unwrap();
        assert_eq!(json_of(value), json!({"session": "user-1"}));

        let unsigned = CookieExtractor::new(None);
        let value = run(&unsigned, Param::cookie("session"), &route, req).await.unwrap();
        assert_eq!(json_of(value), Value::Null);
    }

    #[tokio::test]
    async fn test_body_binding_rules() {
        let req = HttpRequest::new("POST".into(), "/".into())
            .with_header("Content-Type", "application/json")
            .with_body(br#"{"data":{"id":1},"name":"x"}"#.to_vec());

        let single = RouteDescriptor::post("one").param(Param::body_all());
        let value = run(&BodyExtractor, Param::body_all(), &single, req.clone()).await.unwrap();
        assert_eq!(json_of(value)["data"]["id"], 1);

        let named = RouteDescriptor::post("two")
            .param(Param::body::<String>("name"))
            .param(Param::body_all());
        let value = run(&BodyExtractor, Param::body::<String>("name"), &named, req.clone()).await.unwrap();
        assert_eq!(json_of(value), json!("x"));
        let value = run(&BodyExtractor, Param::body_all(), &named, req).await.unwrap();
        assert_eq!(json_of(value), Value::Null);
    }

    struct Users;

    #[async_trait]
    impl ModelRepository for Users {
        async fn find_by_key(&self, key_name: &str, key: &Value) -> Result<Option<ArgValue>, Error> {
            match key.as_str() {
                Some("1") => Ok(Some(ArgValue::Json(json!({ key_name: 1, "name": "Ada" })))),
                _ => Ok(None),
            }
        }
    }

    fn user_param() -> ParameterDescriptor {
        let info = TypeInfo::new("User").with_repository(Arc::new(Users));
        ParameterDescriptor::new(SourceKind::Model, "", RuntimeType::Object(info))
    }

    #[tokio::test]
    async fn test_model_lookup() {
        let route = RouteDescriptor::get("find");

        let mut req = HttpRequest::new("GET".into(), "/users/1".into());
        req.path_params.insert("Id".into(), "1".into());
        let value = run(&ModelExtractor, user_param(), &route, req).await.unwrap();
        assert_eq!(json_of(value)["name"], "Ada");

        let req = HttpRequest::from_target("GET", "/users?Id=2");
        let err = run(&ModelExtractor, user_param(), &route, req).await.unwrap_err();
        assert_eq!(err.status_code(), 404);

        let req = HttpRequest::new("GET".into(), "/users".into());
        let err = run(&ModelExtractor, user_param(), &route, req).await.unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(_)));

        let req = HttpRequest::from_target("GET", "/users?Id=1");
        let err = run(&ModelExtractor, Param::model::<Value>(), &route, req).await.unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    struct Clock(u64);
    impl crate::Provider for Clock {}

    #[tokio::test]
    async fn test_di_service() {
        let container = Container::new();
        container.register(Clock(99));
        let extractor = DiServiceExtractor::new(container);
        let route = RouteDescriptor::get("now");

        let value = run(&extractor, Param::inject::<Clock>(), &route, HttpRequest::default()).await.unwrap();
        match value {
            ArgValue::Service(service) => assert_eq!(service.downcast::<Clock>().unwrap().0, 99),
            other => panic!("expected service, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multipart_without_multipart_body_is_null() {
        let extractor = MultipartExtractor::new(SourceKind::FormField, Arc::new(HttpConfig::default()), None);
        let route = RouteDescriptor::post("upload");
        let value = run(&extractor, Param::form_field::<String>("title"), &route, HttpRequest::default())
            .await
            .unwrap();
        assert_eq!(json_of(value), Value::Null);
    }
}
