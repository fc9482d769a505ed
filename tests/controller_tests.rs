//! End-to-end tests for controllers served in-process.

use chrono::{DateTime, Utc};
use girder::prelude::*;
use girder::{CookieResponse, SchemaRef, UploadedFile};
use girder_handlebars::HandlebarsService;
use girder_testing::*;
use girder_validation::JsonSchemaValidator;
use serde_json::{Value, json};
use std::sync::Arc;

// =============================================================================
// Controllers
// =============================================================================

struct SampleController;

impl SampleController {
    async fn test_get(self: Arc<Self>, _args: RouteArgs) -> Result<OkResponse, Error> {
        Ok(OkResponse::new(json!({"hello": "world"})))
    }

    async fn empty(self: Arc<Self>, _args: RouteArgs) -> Result<OkResponse, Error> {
        Ok(OkResponse::empty())
    }

    async fn test_validation(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse, Error> {
        let body: Value = args.value(0)?;
        Ok(OkResponse::new(json!({"received": body})))
    }
}

impl Controller for SampleController {
    fn configure(builder: ControllerBuilder<Self>) -> ControllerBuilder<Self> {
        builder
            .base_path("sample-controller/v1")
            .route(RouteDescriptor::get("testGet"), Self::test_get)
            .route(RouteDescriptor::post("testPost"), Self::empty)
            .route(RouteDescriptor::head("testHead"), Self::empty)
            .route(RouteDescriptor::patch("testPatch"), Self::empty)
            .route(RouteDescriptor::delete("testDel"), Self::empty)
            .route(RouteDescriptor::file("testFile"), Self::empty)
            .route(RouteDescriptor::put("testPut"), Self::empty)
            .route(
                RouteDescriptor::post("testValidation2").param(Param::body_all().schema(SchemaRef::id("testValidation2"))),
                Self::test_validation,
            )
    }
}

struct ParamsController;

impl ParamsController {
    async fn query(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse, Error> {
        let a: String = args.value(0)?;
        let b: bool = args.value(1)?;
        let c: i64 = args.value(2)?;
        Ok(OkResponse::new(json!({"a": a, "b": b, "c": c})))
    }

    async fn multiple_param(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse, Error> {
        let id: i64 = args.value(0)?;
        let id2: String = args.value(1)?;
        Ok(OkResponse::new(json!({"id": id, "id2": id2})))
    }

    async fn mixed_args(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse, Error> {
        let name: String = args.value(0)?;
        let id: i64 = args.value(1)?;
        let header: String = args.value(2)?;
        let query_string: String = args.value(3)?;
        Ok(OkResponse::new(json!({
            "name": name,
            "id": id,
            "header": header,
            "queryString": query_string,
        })))
    }

    async fn custom_schema(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse, Error> {
        let model: Value = args.value(0)?;
        Ok(OkResponse::new(json!({"model": model})))
    }

    async fn date(self: Arc<Self>, mut args: RouteArgs) -> Result<OkResponse, Error> {
        let date: DateTime<Utc> = args.take(0)?;
        Ok(OkResponse::new(json!({"date": date.to_rfc3339()})))
    }

    async fn pkey(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse, Error> {
        let id: u64 = args.value(0)?;
        Ok(OkResponse::new(json!({"id": id})))
    }

    async fn cookie(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse, Error> {
        let name: Option<String> = args.value(0)?;
        Ok(OkResponse::new(json!({"name": name})))
    }

    async fn remember(self: Arc<Self>, args: RouteArgs) -> Result<CookieResponse, Error> {
        let name: String = args.value(0)?;
        Ok(CookieResponse::new("name", Some(name)))
    }

    async fn form_with_file(self: Arc<Self>, args: RouteArgs) -> Result<OkResponse, Error> {
        let title: String = args.value(0)?;
        let file: UploadedFile = args.value(1)?;
        let content = tokio::fs::read_to_string(&file.path).await?;
        Ok(OkResponse::new(json!({
            "title": title,
            "name": file.name,
            "size": file.size,
            "content": content,
        })))
    }
}

impl Controller for ParamsController {
    fn configure(builder: ControllerBuilder<Self>) -> ControllerBuilder<Self> {
        builder
            .base_path("params/v1")
            .route(
                RouteDescriptor::get("query")
                    .param(Param::query::<String>("a"))
                    .param(Param::query::<bool>("b"))
                    .param(Param::query::<i64>("c")),
                Self::query,
            )
            .route(
                RouteDescriptor::get("multipleParam")
                    .path("multiple/:id/:id2")
                    .param(Param::path::<i64>("id"))
                    .param(Param::path::<String>("id2")),
                Self::multiple_param,
            )
            .route(
                RouteDescriptor::post("mixedArgs")
                    .path("mixed/:id")
                    .param(Param::body::<String>("name"))
                    .param(Param::path::<i64>("id"))
                    .param(Param::header::<String>("x-header"))
                    .param(Param::query::<String>("queryString")),
                Self::mixed_args,
            )
            .route(
                RouteDescriptor::post("objectWithCustomSchema").param(Param::body_all().schema(json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "number"},
                        "name": {"type": "string"},
                        "args": {"type": "array", "items": {"type": "number"}}
                    },
                    "required": ["id", "name", "args"]
                }))),
                Self::custom_schema,
            )
            .route(RouteDescriptor::get("date").param(Param::query::<DateTime<Utc>>("date")), Self::date)
            .route(RouteDescriptor::get("pkey").path("pkey/:id").param(Param::inc_pkey("id")), Self::pkey)
            .route(RouteDescriptor::get("cookie").param(Param::cookie("name")), Self::cookie)
            .route(RouteDescriptor::post("remember").param(Param::body::<String>("name")), Self::remember)
            .route(
                RouteDescriptor::post("formWithFile")
                    .param(Param::form_field::<String>("title"))
                    .param(Param::file("index")),
                Self::form_with_file,
            )
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn validator() -> Arc<JsonSchemaValidator> {
    let validator = JsonSchemaValidator::new();
    validator
        .add_schema(
            "testValidation2",
            json!({
                "type": "object",
                "properties": {
                    "data": {
                        "type": "object",
                        "properties": {"id": {"type": "number"}},
                        "required": ["id"]
                    }
                },
                "required": ["data"]
            }),
        )
        .unwrap();
    Arc::new(validator)
}

fn config() -> HttpConfig {
    HttpConfig::default().with_cookie_secret("s3cr3t")
}

fn app_with(config: HttpConfig) -> TestApp {
    let views = HandlebarsService::from_http_config(&config).unwrap();
    TestApp::builder()
        .config(config)
        .controller(SampleController)
        .controller(ParamsController)
        .validator(validator())
        .renderer(views.into_renderer())
        .build()
        .unwrap()
}

fn app() -> TestApp {
    app_with(config())
}

// =============================================================================
// Sample controller
// =============================================================================

#[tokio::test]
async fn test_get_returns_json_by_default() {
    let response = app().client().get("/sample-controller/v1/testGet").await;

    assert_status(&response, 200);
    assert_json_content_type(&response);
    assert_json(&response, &json!({"hello": "world"}));
}

#[tokio::test]
async fn test_get_renders_html_when_accepted() {
    let client = app().client();
    let response = client
        .request(TestRequestBuilder::get("/sample-controller/v1/testGet").accept("text/html"))
        .await;

    assert_status(&response, 200);
    assert_html_content_type(&response);
    assert_body_contains(&response, "200 - All ok");
}

#[tokio::test]
async fn test_every_route_type_is_served() {
    let client = app().client();

    for (method, path) in [
        ("POST", "testPost"),
        ("HEAD", "testHead"),
        ("PATCH", "testPatch"),
        ("DELETE", "testDel"),
        ("GET", "testFile"),
        ("PUT", "testPut"),
    ] {
        let target = format!("/sample-controller/v1/{}", path);
        let response = client.request(TestRequestBuilder::new(method, &target)).await;
        assert_status(&response, 200);
    }
}

#[tokio::test]
async fn test_unmapped_path_is_not_found() {
    let client = app().client();

    let response = client.get("/sample-controller/v1/nope").await;
    assert_status(&response, 404);
    assert_error_kind(&response, "RouteNotFound");

    let response = client
        .request(TestRequestBuilder::get("/sample-controller/v1/nope").accept("text/html"))
        .await;
    assert_status(&response, 404);
    assert_body_contains(&response, "404 - Not found");
}

#[tokio::test]
async fn test_schema_by_id_validates_body() {
    let client = app().client();

    let response = client
        .post_json("/sample-controller/v1/testValidation2", &json!({"data": {"id": 1}}))
        .await
        .unwrap();
    assert_status(&response, 200);
    assert_json(&response, &json!({"received": {"data": {"id": 1}}}));

    let response = client
        .post_json("/sample-controller/v1/testValidation2", &json!({"data": {"id": "ddd"}}))
        .await
        .unwrap();
    assert_status(&response, 400);
    assert_error_kind(&response, "ValidationFailed");
    let body: Value = response.body_json().unwrap();
    assert_eq!(body["error"]["parameters"]["errors"][0]["instance_path"], "/data/id");
    assert_eq!(body["error"]["parameters"]["errors"][0]["keyword"], "type");

    let response = client
        .post_json("/sample-controller/v1/testValidation2", &json!("ddd"))
        .await
        .unwrap();
    assert_status(&response, 400);
}

// =============================================================================
// Parameters
// =============================================================================

#[tokio::test]
async fn test_query_params_are_coerced() {
    let client = app().client();

    let response = client.get("/params/v1/query?a=hello&b=true&c=1").await;
    assert_status(&response, 200);
    assert_json(&response, &json!({"a": "hello", "b": true, "c": 1}));

    let response = client.get("/params/v1/query?a=hello&b=true&c=abc").await;
    assert_status(&response, 400);
    assert_error_kind(&response, "ValidationFailed");
}

#[tokio::test]
async fn test_multiple_path_params() {
    let response = app().client().get("/params/v1/multiple/1/abc").await;

    assert_status(&response, 200);
    assert_json(&response, &json!({"id": 1, "id2": "abc"}));
}

#[tokio::test]
async fn test_mixed_sources() {
    let request = TestRequestBuilder::post("/params/v1/mixed/5")
        .query("queryString", "q")
        .header("x-header", "h")
        .json(&json!({"name": "girder"}))
        .unwrap();
    let response = app().client().request(request).await;

    assert_status(&response, 200);
    assert_json(&response, &json!({"name": "girder", "id": 5, "header": "h", "queryString": "q"}));
}

#[tokio::test]
async fn test_inline_object_schema() {
    let client = app().client();

    let response = client
        .post_json("/params/v1/objectWithCustomSchema", &json!({"id": 1, "name": "a", "args": [1, 2]}))
        .await
        .unwrap();
    assert_status(&response, 200);

    let response = client
        .post_json("/params/v1/objectWithCustomSchema", &json!({"id": 1, "name": "a"}))
        .await
        .unwrap();
    assert_status(&response, 400);
    let body: Value = response.body_json().unwrap();
    assert_eq!(body["error"]["parameters"]["parameter"], "#0");
}

#[tokio::test]
async fn test_date_hydration() {
    let client = app().client();

    let response = client.get("/params/v1/date?date=2024-01-02").await;
    assert_status(&response, 200);
    assert_json(&response, &json!({"date": "2024-01-02T00:00:00+00:00"}));

    let response = client.get("/params/v1/date?date=yesterday").await;
    assert_status(&response, 400);
    assert_error_kind(&response, "InvalidArgument");
}

#[tokio::test]
async fn test_incremental_primary_key() {
    let client = app().client();

    assert_status(&client.get("/params/v1/pkey/12").await, 200);
    assert_status(&client.get("/params/v1/pkey/-3").await, 400);
}

#[tokio::test]
async fn test_signed_cookies() {
    let client = app().client();

    let signed = TestRequestBuilder::get("/params/v1/cookie")
        .signed_cookie("name", "girder", "s3cr3t")
        .unwrap();
    assert_json(&client.request(signed).await, &json!({"name": "girder"}));

    let tampered = TestRequestBuilder::get("/params/v1/cookie").cookie("name", "girder.forged");
    assert_json(&client.request(tampered).await, &json!({"name": null}));

    let response = client
        .post_json("/params/v1/remember", &json!({"name": "girder"}))
        .await
        .unwrap();
    assert_status(&response, 200);
    assert_eq!(response.set_cookies().len(), 1);
    assert!(response.set_cookies()[0].starts_with("name=girder."));
}

#[tokio::test]
async fn test_multipart_form_with_file() {
    let uploads = tempfile::TempDir::new().unwrap();
    let mut config = config();
    config.files.base_path = Some(uploads.path().to_path_buf());
    let client = app_with(config).client();

    let form = MultipartForm::new()
        .text("title", "report")
        .file("index", "index.txt", "text/plain", b"hello upload");
    let response = client
        .request(TestRequestBuilder::post("/params/v1/formWithFile").multipart(form))
        .await;

    assert_status(&response, 200);
    assert_json(
        &response,
        &json!({"title": "report", "name": "index.txt", "size": 12, "content": "hello upload"}),
    );
}
