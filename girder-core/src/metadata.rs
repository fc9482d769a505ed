//! Route registry metadata.
//!
//! Controllers describe their routes with [`RouteDescriptor`] and
//! [`ParameterDescriptor`] values at registration time. Nothing here is
//! touched again once the router has been built.
//!
//! ```
//! use girder_core::{Param, RouteDescriptor};
//! use serde_json::json;
//!
//! let route = RouteDescriptor::get("find")
//!     .path(":id")
//!     .param(Param::inc_pkey("id"))
//!     .param(Param::query::<String>("fields").optional())
//!     .param(Param::body_all().schema(json!({"type": "object"})));
//!
//! assert_eq!(route.parameters.len(), 3);
//! assert_eq!(route.parameters[&2].index, 2);
//! ```

use crate::form::FormOptions;
use crate::middleware::MiddlewareBinding;
use crate::policy::PolicyBinding;
use crate::types::{ArgType, RuntimeType, ServiceResolver, TypeInfo, short_type_name};
use crate::validation::SchemaRef;
use crate::{Container, Error, Injectable, Provider};
use serde_json::{Value, json};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Where a parameter's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Query,
    Body,
    PathParam,
    Header,
    Cookie,
    FormField,
    File,
    Form,
    Model,
    DiService,
    RawRequest,
    RawResponse,
}

impl SourceKind {
    pub const ALL: [SourceKind; 12] = [
        SourceKind::Query,
        SourceKind::Body,
        SourceKind::PathParam,
        SourceKind::Header,
        SourceKind::Cookie,
        SourceKind::FormField,
        SourceKind::File,
        SourceKind::Form,
        SourceKind::Model,
        SourceKind::DiService,
        SourceKind::RawRequest,
        SourceKind::RawResponse,
    ];

    /// Values from these sources skip coercion and validation
    pub fn bypasses_normalization(&self) -> bool {
        matches!(
            self,
            SourceKind::RawRequest | SourceKind::RawResponse | SourceKind::DiService
        )
    }

    /// Sources backed by the multipart body
    pub fn is_multipart(&self) -> bool {
        matches!(self, SourceKind::FormField | SourceKind::File | SourceKind::Form)
    }
}

/// HTTP route kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteType {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    /// Served as GET, flagged as a file download for discovery tooling
    File,
}

impl RouteType {
    pub fn method(&self) -> &'static str {
        match self {
            RouteType::Get | RouteType::File => "GET",
            RouteType::Post => "POST",
            RouteType::Put => "PUT",
            RouteType::Patch => "PATCH",
            RouteType::Delete => "DELETE",
            RouteType::Head => "HEAD",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// Reference to an injectable component plus its construction options
pub struct Binding<T: ?Sized> {
    pub type_name: &'static str,
    pub options: Value,
    factory: Arc<dyn Fn(&Container, &Value) -> Result<Arc<T>, Error> + Send + Sync>,
}

impl<T: ?Sized> Binding<T> {
    pub(crate) fn from_factory<C: ?Sized>(
        options: Value,
        factory: Arc<dyn Fn(&Container, &Value) -> Result<Arc<T>, Error> + Send + Sync>,
    ) -> Self {
        Self {
            type_name: short_type_name::<C>(),
            options,
            factory,
        }
    }

    /// Build a live instance for the current request
    pub fn resolve(&self, container: &Container) -> Result<Arc<T>, Error> {
        (self.factory)(container, &self.options)
    }
}

impl<T: ?Sized> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name,
            options: self.options.clone(),
            factory: self.factory.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("type_name", &self.type_name)
            .field("options", &self.options)
            .finish()
    }
}

/// One declared handler parameter
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub index: usize,
    pub source: SourceKind,
    /// Empty binds the whole source object
    pub name: String,
    pub runtime_type: RuntimeType,
    pub schema: Option<SchemaRef>,
    /// Validation failures are raised only for required parameters
    pub required: bool,
    pub options: Value,
    pub form: Option<Arc<FormOptions>>,
}

/// Shorthand used when declaring routes
pub type Param = ParameterDescriptor;

impl ParameterDescriptor {
    pub fn new(source: SourceKind, name: impl Into<String>, runtime_type: RuntimeType) -> Self {
        Self {
            index: 0,
            source,
            name: name.into(),
            runtime_type,
            schema: None,
            required: true,
            options: Value::Null,
            form: None,
        }
    }

    pub fn query<T: ArgType>(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Query, name, T::runtime_type())
    }

    /// The whole query map
    pub fn query_all() -> Self {
        Self::new(SourceKind::Query, "", RuntimeType::Any)
    }

    /// The whole query map, typed
    pub fn query_as<T: ArgType>() -> Self {
        Self::new(SourceKind::Query, "", T::runtime_type())
    }

    pub fn body<T: ArgType>(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Body, name, T::runtime_type())
    }

    /// The whole parsed body when it is the route's only body parameter
    pub fn body_all() -> Self {
        Self::new(SourceKind::Body, "", RuntimeType::Any)
    }

    /// The whole parsed body, typed
    pub fn body_as<T: ArgType>() -> Self {
        Self::new(SourceKind::Body, "", T::runtime_type())
    }

    pub fn path<T: ArgType>(name: impl Into<String>) -> Self {
        Self::new(SourceKind::PathParam, name, T::runtime_type())
    }

    pub fn path_all() -> Self {
        Self::new(SourceKind::PathParam, "", RuntimeType::Any)
    }

    pub fn header<T: ArgType>(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Header, name, T::runtime_type())
    }

    pub fn headers() -> Self {
        Self::new(SourceKind::Header, "", RuntimeType::Any)
    }

    /// A signed cookie; unsigned or tampered values read as `null`
    pub fn cookie(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Cookie, name, RuntimeType::Any)
    }

    pub fn cookies() -> Self {
        Self::new(SourceKind::Cookie, "", RuntimeType::Any)
    }

    pub fn form_field<T: ArgType>(name: impl Into<String>) -> Self {
        Self::new(SourceKind::FormField, name, T::runtime_type())
    }

    /// All text fields of a multipart form
    pub fn form() -> Self {
        Self::new(SourceKind::Form, "", RuntimeType::Any)
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(SourceKind::File, name, RuntimeType::Any)
    }

    /// A record looked up through the repository attached to `T`
    pub fn model<T: ArgType>() -> Self {
        Self::new(SourceKind::Model, "", T::runtime_type())
    }

    /// A singleton provider registered in the container
    pub fn inject<T: Provider>() -> Self {
        let resolver: ServiceResolver = Arc::new(|container: &Container, _: &Value| -> Result<Arc<dyn Any + Send + Sync>, Error> {
            let service: Arc<dyn Any + Send + Sync> = container.resolve::<T>()?;
            Ok(service)
        });
        Self::new(
            SourceKind::DiService,
            "",
            RuntimeType::Object(TypeInfo::of::<T>().with_service(resolver)),
        )
    }

    /// A fresh instance built by the container with `options`
    pub fn inject_new<T: Injectable>(options: Value) -> Self {
        let resolver: ServiceResolver = Arc::new(|container: &Container, options: &Value| -> Result<Arc<dyn Any + Send + Sync>, Error> {
            let service: Arc<dyn Any + Send + Sync> = Arc::new(container.construct::<T>(options)?);
            Ok(service)
        });
        Self::new(
            SourceKind::DiService,
            "",
            RuntimeType::Object(TypeInfo::of::<T>().with_service(resolver)),
        )
        .options(options)
    }

    pub fn request() -> Self {
        Self::new(SourceKind::RawRequest, "", RuntimeType::Any)
    }

    pub fn response() -> Self {
        Self::new(SourceKind::RawResponse, "", RuntimeType::Any)
    }

    /// Auto-increment primary key taken from the path
    pub fn inc_pkey(name: impl Into<String>) -> Self {
        Self::path::<u64>(name).schema(json!({"type": "number", "minimum": 0}))
    }

    /// 32-character uuid primary key taken from the path
    pub fn uuid_pkey(name: impl Into<String>) -> Self {
        Self::path::<String>(name).schema(json!({
            "type": "string",
            "minLength": 32,
            "maxLength": 32
        }))
    }

    /// Attach an explicit schema; `"required": false` inside it marks the
    /// parameter optional
    pub fn schema(mut self, schema: impl Into<SchemaRef>) -> Self {
        let (schema, optional) = schema.into().split_required();
        self.schema = Some(schema);
        if optional {
            self.required = false;
        }
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    /// Key used by model lookups, `Id` by default
    pub fn key_name(mut self, key: impl Into<String>) -> Self {
        if !self.options.is_object() {
            self.options = json!({});
        }
        if let Some(map) = self.options.as_object_mut() {
            map.insert("key_name".to_string(), Value::String(key.into()));
        }
        self
    }

    pub fn form_options(mut self, options: FormOptions) -> Self {
        self.form = Some(Arc::new(options));
        self
    }

    pub fn model_key(&self) -> &str {
        self.options
            .get("key_name")
            .and_then(Value::as_str)
            .unwrap_or("Id")
    }
}

/// One handler method and everything declared on it
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub route_type: RouteType,
    /// `"/"` is the controller root, empty means the handler name
    pub path: String,
    pub handler_name: String,
    pub parameters: BTreeMap<usize, ParameterDescriptor>,
    pub middlewares: Vec<MiddlewareBinding>,
    pub policies: Vec<PolicyBinding>,
    pub options: Value,
}

impl RouteDescriptor {
    pub fn new(route_type: RouteType, handler_name: impl Into<String>) -> Self {
        Self {
            route_type,
            path: String::new(),
            handler_name: handler_name.into(),
            parameters: BTreeMap::new(),
            middlewares: Vec::new(),
            policies: Vec::new(),
            options: Value::Null,
        }
    }

    pub fn get(handler_name: impl Into<String>) -> Self {
        Self::new(RouteType::Get, handler_name)
    }

    pub fn post(handler_name: impl Into<String>) -> Self {
        Self::new(RouteType::Post, handler_name)
    }

    pub fn put(handler_name: impl Into<String>) -> Self {
        Self::new(RouteType::Put, handler_name)
    }

    pub fn patch(handler_name: impl Into<String>) -> Self {
        Self::new(RouteType::Patch, handler_name)
    }

    pub fn delete(handler_name: impl Into<String>) -> Self {
        Self::new(RouteType::Delete, handler_name)
    }

    pub fn head(handler_name: impl Into<String>) -> Self {
        Self::new(RouteType::Head, handler_name)
    }

    pub fn file(handler_name: impl Into<String>) -> Self {
        Self::new(RouteType::File, handler_name)
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Serve at the controller's base path
    pub fn root(self) -> Self {
        self.path("/")
    }

    /// Append a parameter after the last declared index
    pub fn param(self, param: ParameterDescriptor) -> Self {
        let index = self
            .parameters
            .keys()
            .next_back()
            .map(|last| last + 1)
            .unwrap_or(0);
        self.param_at(index, param)
    }

    /// Declare the parameter at an explicit index, replacing any previous one
    pub fn param_at(mut self, index: usize, mut param: ParameterDescriptor) -> Self {
        param.index = index;
        self.parameters.insert(index, param);
        self
    }

    pub fn middleware(mut self, binding: MiddlewareBinding) -> Self {
        self.middlewares.push(binding);
        self
    }

    pub fn policy(mut self, binding: PolicyBinding) -> Self {
        self.policies.push(binding);
        self
    }

    pub fn options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn method(&self) -> &'static str {
        self.route_type.method()
    }

    /// Number of parameters bound from `source`
    pub fn count_of(&self, source: SourceKind) -> usize {
        self.parameters.values().filter(|p| p.source == source).count()
    }

    /// Options for the route's single multipart parse.
    ///
    /// File parameters own the upload options, so the first file parameter
    /// that declares any wins. Otherwise the first form parameter with
    /// options is used.
    pub fn form_options(&self) -> Option<&Arc<FormOptions>> {
        self.declared_form_options(SourceKind::File)
            .or_else(|| self.declared_form_options(SourceKind::FormField))
            .or_else(|| self.declared_form_options(SourceKind::Form))
    }

    fn declared_form_options(&self, source: SourceKind) -> Option<&Arc<FormOptions>> {
        self.parameters
            .values()
            .filter(|p| p.source == source)
            .find_map(|p| p.form.as_ref())
    }

    /// First index in `0..N` that has no descriptor, if any
    pub fn missing_parameter_index(&self) -> Option<usize> {
        self.parameters
            .keys()
            .enumerate()
            .find(|(expected, actual)| expected != *actual)
            .map(|(expected, _)| expected)
    }
}

/// Everything declared on one controller
#[derive(Debug, Clone)]
pub struct ControllerDescriptor {
    pub name: String,
    pub base_path: String,
    pub middlewares: Vec<MiddlewareBinding>,
    pub policies: Vec<PolicyBinding>,
    pub routes: Vec<RouteDescriptor>,
}

impl ControllerDescriptor {
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            middlewares: Vec::new(),
            policies: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Descriptor for `C` with its base path derived from the type name:
    /// `UsersController` becomes `users`
    pub fn for_type<C: ?Sized>() -> Self {
        let name = short_type_name::<C>();
        let base = name.strip_suffix("Controller").unwrap_or(name);
        let base = if base.is_empty() { name } else { base };
        Self::new(name, base.to_lowercase())
    }

    /// Add a route, replacing a previous one with the same handler name
    pub fn add_route(&mut self, route: RouteDescriptor) {
        match self.routes.iter_mut().find(|r| r.handler_name == route.handler_name) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    pub fn route(&self, handler_name: &str) -> Option<&RouteDescriptor> {
        self.routes.iter().find(|r| r.handler_name == handler_name)
    }

    /// Final URL path of `route`
    pub fn full_path(&self, route: &RouteDescriptor) -> String {
        let base = self.base_path.trim_matches('/');
        let base = if base.is_empty() {
            String::new()
        } else {
            format!("/{}", base)
        };

        match route.path.as_str() {
            "/" if base.is_empty() => "/".to_string(),
            "/" => base,
            "" => format!("{}/{}", base, route.handler_name),
            path => format!("{}/{}", base, path.trim_start_matches('/')),
        }
    }

    /// Controller-level bindings followed by the route's own
    pub fn middlewares_for<'a>(&'a self, route: &'a RouteDescriptor) -> impl Iterator<Item = &'a MiddlewareBinding> {
        self.middlewares.iter().chain(route.middlewares.iter())
    }

    pub fn policies_for<'a>(&'a self, route: &'a RouteDescriptor) -> impl Iterator<Item = &'a PolicyBinding> {
        self.policies.iter().chain(route.policies.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UsersController;

    #[test]
    fn test_base_path_from_type_name() {
        let descriptor = ControllerDescriptor::for_type::<UsersController>();
        assert_eq!(descriptor.name, "UsersController");
        assert_eq!(descriptor.base_path, "users");
    }

    #[test]
    fn test_full_path_rules() {
        let descriptor = ControllerDescriptor::new("Sample", "sample-controller/v1");

        let empty = RouteDescriptor::get("testGet");
        assert_eq!(descriptor.full_path(&empty), "/sample-controller/v1/testGet");

        let root = RouteDescriptor::get("index").root();
        assert_eq!(descriptor.full_path(&root), "/sample-controller/v1");

        let explicit = RouteDescriptor::get("find").path(":id");
        assert_eq!(descriptor.full_path(&explicit), "/sample-controller/v1/:id");

        let bare = ControllerDescriptor::new("Home", "");
        assert_eq!(bare.full_path(&RouteDescriptor::get("index").root()), "/");
    }

    #[test]
    fn test_parameter_indices_follow_declaration_order() {
        let route = RouteDescriptor::post("save")
            .param(Param::path::<u64>("id"))
            .param(Param::body_all())
            .param(Param::request());

        let indices: Vec<usize> = route.parameters.values().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(route.missing_parameter_index(), None);
        assert_eq!(route.count_of(SourceKind::Body), 1);
    }

    #[test]
    fn test_gap_in_parameters_is_detected() {
        let route = RouteDescriptor::get("gap")
            .param_at(0, Param::query::<u32>("a"))
            .param_at(2, Param::query::<u32>("c"));
        assert_eq!(route.missing_parameter_index(), Some(1));
    }

    #[test]
    fn test_file_parameter_owns_form_options() {
        let route = RouteDescriptor::post("upload")
            .param(Param::form_field::<String>("title").form_options(FormOptions::default().max_file_size(1)))
            .param(Param::file("doc").form_options(FormOptions::default().keep_extensions(true)));

        let options = route.form_options().unwrap();
        assert!(options.keep_extensions);
        assert_eq!(options.max_file_size, None);

        let fields_only = RouteDescriptor::post("fields").param(Param::form_field::<String>("title"));
        assert!(fields_only.form_options().is_none());
    }

    #[test]
    fn test_duplicate_handler_replaces_route() {
        let mut descriptor = ControllerDescriptor::new("Sample", "sample");
        descriptor.add_route(RouteDescriptor::get("a"));
        descriptor.add_route(RouteDescriptor::post("a"));
        assert_eq!(descriptor.routes.len(), 1);
        assert_eq!(descriptor.routes[0].route_type, RouteType::Post);
    }

    #[test]
    fn test_parameter_modifiers() {
        let param = Param::query::<u32>("limit").schema(json!({"type": "number", "required": false}));
        assert!(!param.required);
        assert_eq!(param.schema, Some(SchemaRef::inline(json!({"type": "number"}))));

        let model = Param::model::<Value>();
        assert_eq!(model.model_key(), "Id");
        assert_eq!(model.key_name("uuid").model_key(), "uuid");

        assert!(SourceKind::DiService.bypasses_normalization());
        assert!(!SourceKind::Query.bypasses_normalization());
        assert_eq!(RouteType::File.method(), "GET");
    }
}
