use async_trait::async_trait;
use girder_core::*;
use girder_validation::JsonSchemaValidator;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn validator() -> Arc<JsonSchemaValidator> {
    Arc::new(JsonSchemaValidator::new())
}

/// Prices given as decimal strings, hydrated to whole cents
struct Cents;

struct CentsHydrator;

#[async_trait]
impl ArgHydrator for CentsHydrator {
    async fn hydrate(&self, input: Value, param: &ParameterDescriptor) -> Result<ArgValue> {
        let amount = input
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| Error::InvalidArgument(format!("`{}` is not an amount", param.name)))?;
        Ok(ArgValue::Json(json!((amount * 100.0).round() as i64)))
    }
}

impl ArgType for Cents {
    fn runtime_type() -> RuntimeType {
        RuntimeType::Object(
            TypeInfo::new("Cents")
                .with_schema(json!({"type": "integer", "minimum": 0}))
                .with_hydrator(CentsHydrator),
        )
    }
}

struct DenyAll;

#[async_trait]
impl Policy for DenyAll {
    async fn execute(&self, _req: &HttpRequest, _route: &RouteDescriptor, _ctrl: &ControllerDescriptor) -> Result<bool> {
        Ok(false)
    }
}

/// Enabled only for routes whose handler name starts with `admin`
struct AdminOnly;

#[async_trait]
impl Policy for AdminOnly {
    fn is_enabled(&self, route: &RouteDescriptor, _controller: &ControllerDescriptor) -> bool {
        route.handler_name.starts_with("admin")
    }

    async fn execute(&self, _req: &HttpRequest, _route: &RouteDescriptor, _ctrl: &ControllerDescriptor) -> Result<bool> {
        Ok(false)
    }
}

struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Middleware for Recorder {
    async fn on_before_action(&self, _req: &HttpRequest, _res: &ResponseHandle) -> Result<()> {
        self.events.lock().push("before".into());
        Ok(())
    }

    async fn on_after_action(&self, _req: &HttpRequest, res: &ResponseHandle) -> Result<()> {
        self.events.lock().push("after".into());
        res.set_header("x-recorded", "yes");
        Ok(())
    }
}

struct OrdersController {
    secret_reached: AtomicBool,
    searched: AtomicBool,
}

impl OrdersController {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            secret_reached: AtomicBool::new(false),
            searched: AtomicBool::new(false),
        })
    }

    async fn search(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse> {
        self.searched.store(true, Ordering::SeqCst);
        let limit: Option<u32> = args.value(0)?;
        let code: String = args.value(1)?;
        Ok(OkResponse::new(json!({ "limit": limit, "code": code })))
    }

    async fn price(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse> {
        let cents: i64 = args.value(0)?;
        Ok(OkResponse::new(json!({ "cents": cents })))
    }

    async fn attach(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse> {
        let title: String = args.value(0)?;
        let doc: Value = args.value(1)?;
        Ok(OkResponse::new(json!({ "title": title, "doc": doc })))
    }

    async fn find(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse> {
        let id: u64 = args.value(0)?;
        Ok(OkResponse::new(json!({ "id": id })))
    }

    async fn flag(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse> {
        let active: bool = args.value(0)?;
        Ok(OkResponse::new(json!({ "active": active })))
    }

    async fn secret(self: Arc<Self>, _args: RouteArgs) -> Result<OkResponse> {
        self.secret_reached.store(true, Ordering::SeqCst);
        Ok(OkResponse::empty())
    }

    async fn upload(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse> {
        let title: String = args.value(0)?;
        let tag: String = args.value(1)?;
        Ok(OkResponse::new(json!({ "title": title, "tag": tag })))
    }

    async fn admin_stats(self: Arc<Self>, _args: RouteArgs) -> Result<OkResponse> {
        Ok(OkResponse::empty())
    }

    async fn stats(self: Arc<Self>, _args: RouteArgs) -> Result<OkResponse> {
        Ok(OkResponse::new(json!("stats")))
    }
}

impl Controller for OrdersController {
    fn configure(builder: ControllerBuilder<Self>) -> ControllerBuilder<Self> {
        builder
            .policy(PolicyBinding::instance(Arc::new(AdminOnly)))
            .route(RouteDescriptor::get("flag").param(Param::query::<bool>("active")), Self::flag)
            .route(
                RouteDescriptor::get("secret").policy(PolicyBinding::instance(Arc::new(DenyAll))),
                Self::secret,
            )
            .route(
                RouteDescriptor::post("upload")
                    .param(Param::form_field::<String>("title"))
                    .param(Param::form_field::<String>("tag")),
                Self::upload,
            )
            .route(
                RouteDescriptor::get("search")
                    .param(Param::query::<u32>("limit").optional())
                    .param(Param::query::<String>("code").schema(json!({"type": "string", "maxLength": 3, "required": false}))),
                Self::search,
            )
            .route(RouteDescriptor::get("price").param(Param::query::<Cents>("amount")), Self::price)
            .route(
                RouteDescriptor::post("attach")
                    .param(Param::form_field::<String>("title"))
                    .param(Param::file("doc")),
                Self::attach,
            )
            .route(RouteDescriptor::get("admin_stats"), Self::admin_stats)
            .route(RouteDescriptor::get("stats"), Self::stats)
            // Registered last so the literal routes above win
            .route(RouteDescriptor::get("find").path(":id").param(Param::path::<u64>("id")), Self::find)
    }
}

fn server_for(controller: Arc<OrdersController>) -> HttpServer {
    let controllers = Controllers::new()
        .register_arc(controller)
        .with_validator(validator());
    HttpServer::new(HttpConfig::default(), controllers).unwrap()
}

fn get(path: &str) -> HttpRequest {
    HttpRequest::from_target("GET", path).with_header("Accept", "application/json")
}

fn json_body(response: &HttpResponse) -> Value {
    serde_json::from_slice(&response.body).unwrap()
}

#[tokio::test]
async fn test_numeric_path_param_is_coerced() {
    let server = server_for(OrdersController::new());

    let response = server.handle(get("/orders/42")).await;
    assert_eq!(response.status, 200);
    assert_eq!(json_body(&response), json!({"id": 42}));

    let response = server.handle(get("/orders/abc")).await;
    assert_eq!(response.status, 400);
    let body = json_body(&response);
    assert_eq!(body["error"]["kind"], "ValidationFailed");
    assert_eq!(body["error"]["parameters"]["parameter"], "id");
}

#[tokio::test]
async fn test_boolean_query_coercion() {
    let server = server_for(OrdersController::new());

    let response = server.handle(get("/orders/flag?active=true")).await;
    assert_eq!(json_body(&response), json!({"active": true}));

    let response = server.handle(get("/orders/flag?active=TRUE")).await;
    assert_eq!(json_body(&response), json!({"active": false}));

    let response = server.handle(get("/orders/flag?active=yes")).await;
    assert_eq!(json_body(&response), json!({"active": false}));
}

#[tokio::test]
async fn test_policy_denial_skips_handler() {
    let controller = OrdersController::new();
    let server = server_for(controller.clone());

    let response = server.handle(get("/orders/secret")).await;
    assert_eq!(response.status, 403);
    assert_eq!(json_body(&response)["error"]["kind"], "PolicyDenied");
    assert!(!controller.secret_reached.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_policy_is_enabled_per_route() {
    let server = server_for(OrdersController::new());

    assert_eq!(server.handle(get("/orders/admin_stats")).await.status, 403);
    assert_eq!(server.handle(get("/orders/stats")).await.status, 200);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = server_for(OrdersController::new());
    let response = server.handle(get("/orders/find/too/deep")).await;
    assert_eq!(response.status, 404);
}

struct TracedController {
    events: Arc<Mutex<Vec<String>>>,
}

impl TracedController {
    async fn run(self: Arc<Self>, _args: RouteArgs) -> Result<OkResponse> {
        self.events.lock().push("handler".into());
        Ok(OkResponse::empty())
    }

    async fn fail(self: Arc<Self>, _args: RouteArgs) -> Result<OkResponse> {
        self.events.lock().push("handler".into());
        Err(Error::ResourceDuplicated("already there".into()))
    }

    async fn guarded(self: Arc<Self>, _args: RouteArgs) -> Result<OkResponse> {
        self.events.lock().push("handler".into());
        Ok(OkResponse::empty())
    }
}

impl Controller for TracedController {
    fn configure(builder: ControllerBuilder<Self>) -> ControllerBuilder<Self> {
        builder
            .route(RouteDescriptor::get("run"), Self::run)
            .route(RouteDescriptor::get("fail"), Self::fail)
            .route(
                RouteDescriptor::get("guarded").policy(PolicyBinding::instance(Arc::new(RequireToken))),
                Self::guarded,
            )
    }
}

/// Fails with an error instead of denying when the token header is absent
struct RequireToken;

#[async_trait]
impl Policy for RequireToken {
    async fn execute(&self, req: &HttpRequest, _route: &RouteDescriptor, _ctrl: &ControllerDescriptor) -> Result<bool> {
        match req.header("x-token") {
            Some(_) => Ok(true),
            None => Err(Error::AuthenticationFailed("missing token".into())),
        }
    }
}

/// Application-wide middleware
struct Stamp {
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Middleware for Stamp {
    async fn on_before_action(&self, _req: &HttpRequest, _res: &ResponseHandle) -> Result<()> {
        self.events.lock().push("global-before".into());
        Ok(())
    }

    async fn on_after_action(&self, _req: &HttpRequest, _res: &ResponseHandle) -> Result<()> {
        self.events.lock().push("global-after".into());
        Ok(())
    }
}

fn traced_controllers(events: Arc<Mutex<Vec<String>>>) -> Controllers {
    let recorder = Arc::new(Recorder { events: events.clone() });
    let controller = Arc::new(TracedController { events });

    let builder = TracedController::configure(ControllerBuilder::new()).middleware(MiddlewareBinding::instance(recorder));
    assert_eq!(builder.descriptor().middlewares.len(), 1);

    Controllers::new()
        .register_runtime(builder.build(controller))
        .with_validator(validator())
}

fn traced_server(events: Arc<Mutex<Vec<String>>>) -> HttpServer {
    HttpServer::new(HttpConfig::default(), traced_controllers(events)).unwrap()
}

#[tokio::test]
async fn test_middleware_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let server = traced_server(events.clone());

    let response = server.handle(get("/traced/run")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("x-recorded"), Some("yes"));
    assert_eq!(*events.lock(), vec!["before", "handler", "after"]);
}

#[tokio::test]
async fn test_after_hooks_skipped_on_handler_error() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let server = traced_server(events.clone());

    let response = server.handle(get("/traced/fail")).await;
    assert_eq!(response.status, 409);
    assert_eq!(*events.lock(), vec!["before", "handler"]);
}

#[tokio::test]
async fn test_missing_extractor_fails_closed() {
    let controllers = Controllers::new()
        .register_arc(OrdersController::new())
        .with_validator(validator())
        .with_extractors(ExtractorRegistry::new());
    let server = HttpServer::new(HttpConfig::default(), controllers).unwrap();

    let response = server.handle(get("/orders/flag?active=true")).await;
    assert_eq!(response.status, 500);
    assert_eq!(json_body(&response)["error"]["kind"], "UnexpectedServerError");

    // Routes without parameters never touch the registry
    assert_eq!(server.handle(get("/orders/stats")).await.status, 200);
}

#[tokio::test]
async fn test_missing_validator_is_server_error() {
    let controllers = Controllers::new().register_arc(OrdersController::new());
    let server = HttpServer::new(HttpConfig::default(), controllers).unwrap();

    assert_eq!(server.handle(get("/orders/42")).await.status, 500);
}

fn multipart_request() -> HttpRequest {
    let body = "--XBOUNDARY\r\n\
                Content-Disposition: form-data; name=\"title\"\r\n\r\n\
                Quarterly\r\n\
                --XBOUNDARY\r\n\
                Content-Disposition: form-data; name=\"tag\"\r\n\r\n\
                finance\r\n\
                --XBOUNDARY--\r\n";
    HttpRequest::new("POST".into(), "/orders/upload".into())
        .with_header("Content-Type", "multipart/form-data; boundary=XBOUNDARY")
        .with_header("Accept", "application/json")
        .with_body(body.as_bytes().to_vec())
}

fn default_services() -> Arc<DispatchServices> {
    let container = Container::new();
    Arc::new(DispatchServices {
        container: container.clone(),
        extractors: Arc::new(ExtractorRegistry::with_defaults(
            container,
            Arc::new(HttpConfig::default()),
            None,
        )),
        validator: Some(validator()),
        environment: ResponseEnvironment::default(),
    })
}

#[tokio::test]
async fn test_multipart_parsed_once_per_request() {
    let runtime = ControllerRuntime::new(OrdersController::new());
    let route = runtime.descriptor.route("upload").cloned().unwrap();
    let handler = runtime.handler("upload").unwrap();

    let dispatcher = RouteDispatcher::new(runtime.descriptor.clone(), route, handler, default_services());

    let request = Arc::new(multipart_request());
    let (args, ctx) = dispatcher
        .resolve_arguments(&request, &ResponseHandle::new())
        .await
        .unwrap();

    assert_eq!(ctx.form_parses(), 1);
    assert_eq!(args.value::<String>(0).unwrap(), "Quarterly");
    assert_eq!(args.value::<String>(1).unwrap(), "finance");

    let response = dispatcher.dispatch(multipart_request()).await;
    assert_eq!(response.status, 200);
    assert_eq!(json_body(&response), json!({"title": "Quarterly", "tag": "finance"}));
}

#[tokio::test]
async fn test_parameter_gap_fails_closed() {
    let runtime = ControllerRuntime::new(OrdersController::new());
    let route = RouteDescriptor::get("find").param_at(1, Param::path::<u64>("id"));
    let handler = runtime.handler("find").unwrap();

    let services = Arc::new(DispatchServices {
        container: Container::new(),
        extractors: Arc::new(ExtractorRegistry::new()),
        validator: None,
        environment: ResponseEnvironment::default(),
    });
    let dispatcher = RouteDispatcher::new(runtime.descriptor.clone(), route, handler, services);

    let err = dispatcher
        .resolve_arguments(&Arc::new(get("/orders/1")), &ResponseHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedServerError(_)));
}

#[tokio::test]
async fn test_optional_parameters_keep_invalid_values() {
    let controller = OrdersController::new();
    let server = server_for(controller.clone());

    let response = server.handle(get("/orders/search?limit=abc&code=toolong")).await;
    assert_eq!(response.status, 200);
    assert_eq!(json_body(&response), json!({"limit": null, "code": "toolong"}));
    assert!(controller.searched.load(Ordering::SeqCst));

    let response = server.handle(get("/orders/search?limit=5&code=abc")).await;
    assert_eq!(json_body(&response), json!({"limit": 5, "code": "abc"}));
}

#[tokio::test]
async fn test_hydrated_value_is_validated() {
    let server = server_for(OrdersController::new());

    // The raw string would not pass an integer schema
    let response = server.handle(get("/orders/price?amount=12.34")).await;
    assert_eq!(response.status, 200);
    assert_eq!(json_body(&response), json!({"cents": 1234}));

    let response = server.handle(get("/orders/price?amount=-1.50")).await;
    assert_eq!(response.status, 400);
    let body = json_body(&response);
    assert_eq!(body["error"]["parameters"]["parameter"], "amount");
    assert_eq!(body["error"]["parameters"]["errors"][0]["keyword"], "minimum");

    let response = server.handle(get("/orders/price?amount=lots")).await;
    assert_eq!(json_body(&response)["error"]["kind"], "InvalidArgument");
}

#[tokio::test]
async fn test_policy_error_aborts_before_middleware() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let server = traced_server(events.clone());

    let response = server.handle(get("/traced/guarded")).await;
    assert_eq!(response.status, 401);
    assert_eq!(json_body(&response)["error"]["kind"], "AuthenticationFailed");
    assert!(events.lock().is_empty());

    let response = server.handle(get("/traced/guarded").with_header("x-token", "t")).await;
    assert_eq!(response.status, 200);
    assert_eq!(*events.lock(), vec!["before", "handler", "after"]);
}

#[tokio::test]
async fn test_global_middleware_wraps_controller_middleware() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let server = HttpServer::builder(HttpConfig::default())
        .controllers(traced_controllers(events.clone()))
        .middleware(MiddlewareBinding::instance(Arc::new(Stamp { events: events.clone() })))
        .build()
        .unwrap();

    let response = server.handle(get("/traced/run")).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        *events.lock(),
        vec!["global-before", "before", "handler", "global-after", "after"]
    );

    // Unrouted requests never reach a middleware chain
    events.lock().clear();
    assert_eq!(server.handle(get("/nowhere")).await.status, 404);
    assert!(events.lock().is_empty());
}

fn attach_request() -> HttpRequest {
    let body = "--XBOUNDARY\r\n\
                Content-Disposition: form-data; name=\"title\"\r\n\r\n\
                Quarterly\r\n\
                --XBOUNDARY\r\n\
                Content-Disposition: form-data; name=\"doc\"; filename=\"report.txt\"\r\n\
                Content-Type: text/plain\r\n\r\n\
                abc\r\n\
                --XBOUNDARY--\r\n";
    HttpRequest::new("POST".into(), "/orders/attach".into())
        .with_header("Content-Type", "multipart/form-data; boundary=XBOUNDARY")
        .with_header("Accept", "application/json")
        .with_body(body.as_bytes().to_vec())
}

#[tokio::test]
async fn test_file_options_apply_when_field_declared_first() {
    let dir = tempfile::TempDir::new().unwrap();
    let runtime = ControllerRuntime::new(OrdersController::new());
    let handler = runtime.handler("attach").unwrap();
    let route = RouteDescriptor::post("attach")
        .param(Param::form_field::<String>("title"))
        .param(
            Param::file("doc").form_options(
                FormOptions::default()
                    .hash(HashAlgorithm::Sha256)
                    .upload_dir(UploadDir::Static(dir.path().to_path_buf())),
            ),
        );
    let dispatcher = RouteDispatcher::new(runtime.descriptor.clone(), route, handler, default_services());

    let response = dispatcher.dispatch(attach_request()).await;
    assert_eq!(response.status, 200);
    let body = json_body(&response);
    assert_eq!(body["title"], "Quarterly");
    assert_eq!(
        body["doc"]["hash"],
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    let stored = body["doc"]["path"].as_str().unwrap();
    assert!(std::path::Path::new(stored).starts_with(dir.path()));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
