//! Concrete response variants and the global error boundary.

use crate::HttpStatus;
use crate::cookie::SetCookie;
use crate::logging::{error, warn};
use crate::response::{Response, ResponseEnvironment, ResponseFunction, http_response};
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;

macro_rules! negotiated_response {
    ($(#[$meta:meta])* $name:ident, $status:expr, $template:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            model: Value,
        }

        impl $name {
            pub const TEMPLATE: &'static str = $template;

            pub fn new(model: Value) -> Self {
                Self { model }
            }

            pub fn empty() -> Self {
                Self::default()
            }

            pub fn data<T: Serialize>(model: &T) -> Result<Self, Error> {
                Ok(Self::new(serde_json::to_value(model)?))
            }

            pub fn model(&self) -> &Value {
                &self.model
            }
        }

        #[async_trait]
        impl Response for $name {
            async fn execute(
                self: Box<Self>,
                _request: &HttpRequest,
                _response: &mut HttpResponse,
                _env: &ResponseEnvironment,
            ) -> Result<Option<ResponseFunction>, Error> {
                Ok(Some(http_response(self.model, $status, $template)))
            }
        }
    };
}

negotiated_response!(
    /// 200 with the model
    OkResponse, HttpStatus::Ok, "responses/ok"
);
negotiated_response!(
    /// 201 with the created resource
    CreatedResponse, HttpStatus::Created, "responses/created"
);
negotiated_response!(BadRequestResponse, HttpStatus::BadRequest, "responses/badRequest");
negotiated_response!(UnauthorizedResponse, HttpStatus::Unauthorized, "responses/unauthorized");
negotiated_response!(ForbiddenResponse, HttpStatus::Forbidden, "responses/forbidden");
negotiated_response!(NotFoundResponse, HttpStatus::NotFound, "responses/notFound");
negotiated_response!(ConflictResponse, HttpStatus::Conflict, "responses/conflict");
negotiated_response!(ServerErrorResponse, HttpStatus::InternalServerError, "responses/serverError");

/// Redirect to another location
#[derive(Debug, Clone)]
pub struct RedirectResponse {
    location: String,
    permanent: bool,
}

impl RedirectResponse {
    /// 302 Found
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            permanent: false,
        }
    }

    /// 301 Moved Permanently
    pub fn permanent(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            permanent: true,
        }
    }
}

#[async_trait]
impl Response for RedirectResponse {
    async fn execute(
        self: Box<Self>,
        _request: &HttpRequest,
        response: &mut HttpResponse,
        _env: &ResponseEnvironment,
    ) -> Result<Option<ResponseFunction>, Error> {
        let status = if self.permanent {
            HttpStatus::MovedPermanently
        } else {
            HttpStatus::Found
        };
        response.status = status.code();
        response.set_header("Location", self.location);
        Ok(None)
    }
}

/// File download.
///
/// The file must exist when the response is built; a missing file fails
/// with `ResourceNotFound` before anything is written.
#[derive(Debug, Clone)]
pub struct FileResponse {
    path: PathBuf,
    filename: String,
    mime_type: String,
}

impl FileResponse {
    pub fn new(path: impl Into<PathBuf>, filename: impl Into<String>, mime_type: Option<&str>) -> Result<Self, Error> {
        let path = path.into();
        let filename = filename.into();

        if !path.is_file() {
            return Err(Error::ResourceNotFound(format!("File {} not exists", path.display())));
        }

        let mime_type = match mime_type {
            Some(mime) => mime.to_string(),
            None => mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };

        Ok(Self {
            path,
            filename,
            mime_type,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Response for FileResponse {
    async fn execute(
        self: Box<Self>,
        _request: &HttpRequest,
        response: &mut HttpResponse,
        _env: &ResponseEnvironment,
    ) -> Result<Option<ResponseFunction>, Error> {
        let content = tokio::fs::read(&self.path).await?;

        response.status = HttpStatus::Ok.code();
        response.set_header("Content-Type", self.mime_type);
        response.set_header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", self.filename.replace('"', "")),
        );
        response.body = content;
        Ok(None)
    }
}

/// Sets or clears a signed cookie, then answers like [`OkResponse`]
#[derive(Debug, Clone)]
pub struct CookieResponse {
    name: String,
    value: Option<String>,
    lifetime: Option<Duration>,
    data: Value,
}

impl CookieResponse {
    /// Set `name` to `value`; `None` or an empty value clears the cookie
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
            lifetime: None,
            data: Value::Null,
        }
    }

    pub fn clear(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    /// Emitted as `Max-Age` in whole seconds
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

#[async_trait]
impl Response for CookieResponse {
    async fn execute(
        self: Box<Self>,
        _request: &HttpRequest,
        response: &mut HttpResponse,
        env: &ResponseEnvironment,
    ) -> Result<Option<ResponseFunction>, Error> {
        let cookie = match self.value.as_deref() {
            None | Some("") => SetCookie::removal(&self.name),
            Some(value) => {
                let signer = env.signer.as_ref().ok_or_else(|| {
                    Error::UnexpectedServerError("http.cookie.secret is not configured".to_string())
                })?;
                let mut cookie = SetCookie::new(&self.name, signer.sign(value)?).secure(env.config.cookie.secure);
                if let Some(max_age) = self.lifetime.or_else(|| env.config.cookie.max_age()) {
                    cookie = cookie.max_age(max_age);
                }
                cookie
            }
        };

        response.add_cookie(cookie.to_header_value());
        Ok(Some(http_response(self.data, HttpStatus::Ok, OkResponse::TEMPLATE)))
    }
}

/// Map an error onto its canonical response.
///
/// The body is `{"error": {"kind", "message", "parameters"?, "stack"?}}`;
/// `stack` is only present in development mode.
pub fn error_response(err: Error, env: &ResponseEnvironment) -> Box<dyn Response> {
    let status = err.http_status();
    if err.is_server_error() {
        error!(kind = err.kind_name(), error = %err, "Request failed");
    } else {
        warn!(kind = err.kind_name(), error = %err, "Request rejected");
    }

    let mut body = json!({
        "kind": err.kind_name(),
        "message": err.to_string(),
    });
    if let Some(parameters) = err.parameters() {
        body["parameters"] = parameters;
    }
    if env.is_development() {
        body["stack"] = Value::String(format!("{:?}", err));
    }
    let model = json!({ "error": body });

    match status {
        HttpStatus::Unauthorized => Box::new(UnauthorizedResponse::new(model)),
        HttpStatus::Forbidden => Box::new(ForbiddenResponse::new(model)),
        HttpStatus::Conflict => Box::new(ConflictResponse::new(model)),
        HttpStatus::BadRequest => Box::new(BadRequestResponse::new(model)),
        HttpStatus::NotFound => Box::new(NotFoundResponse::new(model)),
        _ => Box::new(ServerErrorResponse::new(model)),
    }
}
