// In-process test client

use girder_core::{CookieSigner, Error, HttpRequest, HttpResponse, HttpServer};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Sends requests straight into an [`HttpServer`] without a socket
#[derive(Clone)]
pub struct TestClient {
    server: Arc<HttpServer>,
}

impl TestClient {
    pub fn new(server: HttpServer) -> Self {
        Self::from_arc(Arc::new(server))
    }

    pub fn from_arc(server: Arc<HttpServer>) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &HttpServer {
        &self.server
    }

    pub async fn get(&self, target: &str) -> TestResponse {
        self.send(TestRequestBuilder::get(target).build()).await
    }

    pub async fn delete(&self, target: &str) -> TestResponse {
        self.send(TestRequestBuilder::new("DELETE", target).build()).await
    }

    /// POST a JSON body
    pub async fn post_json<T: Serialize>(&self, target: &str, data: &T) -> Result<TestResponse, Error> {
        Ok(self.send(TestRequestBuilder::post(target).json(data)?.build()).await)
    }

    pub async fn put_json<T: Serialize>(&self, target: &str, data: &T) -> Result<TestResponse, Error> {
        Ok(self.send(TestRequestBuilder::new("PUT", target).json(data)?.build()).await)
    }

    pub async fn request(&self, builder: TestRequestBuilder) -> TestResponse {
        self.send(builder.build()).await
    }

    pub async fn send(&self, request: HttpRequest) -> TestResponse {
        TestResponse::new(self.server.handle(request).await)
    }
}

/// Builder for test requests
#[derive(Debug, Clone)]
pub struct TestRequestBuilder {
    method: String,
    target: String,
    headers: HashMap<String, String>,
    cookies: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Vec<u8>,
}

impl TestRequestBuilder {
    /// `target` may already carry a query string
    pub fn new(method: &str, target: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            target: target.to_string(),
            headers: HashMap::new(),
            cookies: Vec::new(),
            query: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new("GET", target)
    }

    pub fn post(target: &str) -> Self {
        Self::new("POST", target)
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn accept(self, media: &str) -> Self {
        self.header("Accept", media)
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    /// Cookie signed the way the server signs outgoing cookies
    pub fn signed_cookie(self, name: &str, value: &str, secret: &str) -> Result<Self, Error> {
        let signed = CookieSigner::new(secret).sign(value)?;
        Ok(self.cookie(name, &signed))
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn json<T: Serialize>(mut self, data: &T) -> Result<Self, Error> {
        self.body = serde_json::to_vec(data)?;
        Ok(self.header("Content-Type", "application/json"))
    }

    /// URL-encoded form body
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, Error> {
        self.body = serde_urlencoded::to_string(fields)
            .map_err(|e| Error::Serialization(e.to_string()))?
            .into_bytes();
        Ok(self.header("Content-Type", "application/x-www-form-urlencoded"))
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        let content_type = form.content_type();
        self.body = form.into_body();
        self.header("Content-Type", &content_type)
    }

    pub fn build(self) -> HttpRequest {
        let mut target = self.target;
        if !self.query.is_empty() {
            let separator = if target.contains('?') { '&' } else { '?' };
            let encoded = serde_urlencoded::to_string(&self.query).unwrap_or_default();
            target = format!("{}{}{}", target, separator, encoded);
        }

        let mut request = HttpRequest::from_target(self.method, &target);
        request.headers = self.headers;
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            request.headers.insert("Cookie".to_string(), cookie);
        }
        request.body = self.body;
        request
    }
}

/// `multipart/form-data` body builder
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: format!("girder-test-{}", uuid::Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.part_header(&format!("Content-Disposition: form-data; name=\"{}\"", name));
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, content: &[u8]) -> Self {
        self.part_header(&format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}",
            name, file_name, content_type
        ));
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn part_header(&mut self, headers: &str) {
        self.body
            .extend_from_slice(format!("--{}\r\n{}\r\n\r\n", self.boundary, headers).as_bytes());
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn into_body(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from a test request
#[derive(Debug, Clone)]
pub struct TestResponse {
    inner: HttpResponse,
}

impl TestResponse {
    pub fn new(inner: HttpResponse) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.inner.header(key)
    }

    /// `Set-Cookie` lines in the order they were added
    pub fn set_cookies(&self) -> &[String] {
        &self.inner.cookies
    }

    pub fn body_string(&self) -> String {
        self.inner.body_string()
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.inner.body)?)
    }

    /// `error.kind` of a JSON error body
    pub fn error_kind(&self) -> Option<String> {
        let body: Value = self.body_json().ok()?;
        body.pointer("/error/kind")?.as_str().map(str::to_string)
    }

    pub fn into_inner(self) -> HttpResponse {
        self.inner
    }
}

impl From<HttpResponse> for TestResponse {
    fn from(inner: HttpResponse) -> Self {
        Self::new(inner)
    }
}
