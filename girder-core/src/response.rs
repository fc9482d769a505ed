//! Response layer.
//!
//! Handlers return a [`Response`]. Executing it either writes the transport
//! response directly or hands back a [`ResponseFunction`] that performs the
//! final write. Negotiated responses pick HTML or JSON from the request's
//! `Accept` header and the server-wide allow-list.
//!
//! HTML rendering degrades in three steps: the requested view, then the
//! canonical `responses/serverError` view, then the embedded fatal page with
//! a generated ticket number.

use crate::HttpStatus;
use crate::config::HttpConfig;
use crate::content_negotiation::{MediaType, negotiate_media_type};
use crate::cookie::CookieSigner;
use crate::logging::{error, trace, warn};
use crate::{Error, HttpRequest, HttpResponse, ViewRenderer};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;

/// Canonical view rendered when the requested one fails
pub const SERVER_ERROR_VIEW: &str = "responses/serverError";

/// Final write performed after a response has executed
pub type ResponseFunction = Box<dyn FnOnce(&HttpRequest, &mut HttpResponse, &ResponseEnvironment) + Send>;

/// A single-use response produced by a handler or by the error boundary
#[async_trait]
pub trait Response: Send + Sync {
    async fn execute(
        self: Box<Self>,
        request: &HttpRequest,
        response: &mut HttpResponse,
        env: &ResponseEnvironment,
    ) -> Result<Option<ResponseFunction>, Error>;
}

#[async_trait]
impl Response for Box<dyn Response> {
    async fn execute(
        self: Box<Self>,
        request: &HttpRequest,
        response: &mut HttpResponse,
        env: &ResponseEnvironment,
    ) -> Result<Option<ResponseFunction>, Error> {
        <dyn Response as Response>::execute(*self, request, response, env).await
    }
}

/// Everything responses need from the server
#[derive(Clone)]
pub struct ResponseEnvironment {
    pub config: Arc<HttpConfig>,
    pub renderer: Option<Arc<dyn ViewRenderer>>,
    pub signer: Option<CookieSigner>,
}

impl ResponseEnvironment {
    pub fn new(config: HttpConfig) -> Self {
        let signer = config.cookie.signer();
        Self {
            config: Arc::new(config),
            renderer: None,
            signer,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ViewRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn is_development(&self) -> bool {
        self.config.is_development()
    }

    fn render(&self, template: &str, model: &Value) -> Result<String, Error> {
        match &self.renderer {
            Some(renderer) => renderer.render(template, model),
            None => Err(Error::NotSupported("no view renderer configured".to_string())),
        }
    }
}

impl Default for ResponseEnvironment {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

impl fmt::Debug for ResponseEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseEnvironment")
            .field("config", &self.config)
            .field("renderer", &self.renderer.is_some())
            .field("signer", &self.signer)
            .finish()
    }
}

/// Shared, mutable transport response for middlewares and raw-response
/// parameters
#[derive(Clone, Default)]
pub struct ResponseHandle(Arc<Mutex<HttpResponse>>);

impl ResponseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the response
    pub fn with<R>(&self, f: impl FnOnce(&mut HttpResponse) -> R) -> R {
        f(&mut self.0.lock())
    }

    pub fn set_header(&self, key: impl Into<String>, value: impl Into<String>) {
        self.0.lock().set_header(key, value);
    }

    pub fn status(&self) -> u16 {
        self.0.lock().status
    }

    /// Move the accumulated response out, leaving a fresh one behind
    pub fn take(&self) -> HttpResponse {
        std::mem::take(&mut *self.0.lock())
    }
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResponseHandle").field(&self.status()).finish()
    }
}

/// Negotiated write of `model` with `status`, rendering `template` for HTML
pub fn http_response(model: Value, status: HttpStatus, template: impl Into<String>) -> ResponseFunction {
    let template = template.into();
    Box::new(move |request: &HttpRequest, response: &mut HttpResponse, env: &ResponseEnvironment| {
        let available = env.config.accept_headers.media_types();
        let accept = request.accept();

        match negotiate_media_type(&accept, &available) {
            Some(media) if *media == MediaType::html() => {
                trace!(template = %template, status = status.code(), "Rendering HTML response");
                html_response(&template, &model, status)(request, response, env);
            }
            _ => json_response(model, status)(request, response, env),
        }
    })
}

/// JSON write; a `null` model leaves the body empty
pub fn json_response(model: Value, status: HttpStatus) -> ResponseFunction {
    Box::new(move |_: &HttpRequest, response: &mut HttpResponse, env: &ResponseEnvironment| {
        response.status = status.code();
        if model.is_null() {
            return;
        }
        if let Err(err) = response.write_json(&model) {
            error!(error = %err, "Cannot serialize JSON response");
            write_fatal_page(response, env);
        }
    })
}

/// HTML write with the view fallback chain
pub fn html_response(template: &str, model: &Value, status: HttpStatus) -> ResponseFunction {
    let template = template.to_string();
    let model = model.clone();
    Box::new(move |_: &HttpRequest, response: &mut HttpResponse, env: &ResponseEnvironment| match env.render(&template, &model) {
        Ok(html) => {
            response.status = status.code();
            response.write_html(html);
        }
        Err(err) => {
            warn!(template = %template, error = %err, "Cannot render view");
            let error_model = json!({
                "error": {
                    "kind": err.kind_name(),
                    "message": err.to_string(),
                }
            });

            match env.render(SERVER_ERROR_VIEW, &error_model) {
                Ok(html) => {
                    response.status = HttpStatus::InternalServerError.code();
                    response.write_html(html);
                }
                Err(err) => {
                    warn!(error = %err, "Cannot render server error view");
                    write_fatal_page(response, env);
                }
            }
        }
    })
}

/// Random 7-character ticket quoted on the fatal page
pub fn generate_ticket() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}

/// Last-resort page; never fails
pub fn write_fatal_page(response: &mut HttpResponse, env: &ResponseEnvironment) {
    let ticket = generate_ticket();
    error!(ticket = %ticket, "Rendering fatal error page");
    response.status = HttpStatus::InternalServerError.code();
    response.write_html(env.config.fatal_template.replace("{ticket}", &ticket));
}

/// Execute `response` against `target` and perform its final write.
///
/// A failing response is replaced by the error boundary's response for the
/// failure; if that fails too the fatal page is written.
pub async fn send(
    response: Box<dyn Response>,
    request: &HttpRequest,
    mut target: HttpResponse,
    env: &ResponseEnvironment,
) -> HttpResponse {
    match response.execute(request, &mut target, env).await {
        Ok(Some(write)) => {
            write(request, &mut target, env);
            target
        }
        Ok(None) => target,
        Err(err) => {
            let fallback = crate::responses::error_response(err, env);
            let mut target = HttpResponse::new(HttpStatus::InternalServerError.code());
            match fallback.execute(request, &mut target, env).await {
                Ok(Some(write)) => write(request, &mut target, env),
                Ok(None) => {}
                Err(err) => {
                    error!(error = %err, "Error response failed to execute");
                    write_fatal_page(&mut target, env);
                }
            }
            target
        }
    }
}
