// HTTP server shell: static mounts, route table and the error boundary

use crate::config::HttpConfig;
use crate::controllers::Controllers;
use crate::logging::{debug, error, info, warn};
use crate::middleware::MiddlewareBinding;
use crate::response::{ResponseEnvironment, send};
use crate::responses::error_response;
use crate::routing::Router;
use crate::static_assets::StaticMount;
use crate::validation::DataValidator;
use crate::{ConfigSource, Error, HttpRequest, HttpResponse, ViewRenderer};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Serves a resolved set of controllers
pub struct HttpServer {
    router: Router,
    environment: ResponseEnvironment,
    static_mounts: Vec<StaticMount>,
}

impl HttpServer {
    /// Resolve `controllers` against `config` with no renderer and no
    /// external settings
    pub fn new(config: HttpConfig, controllers: Controllers) -> Result<Self, Error> {
        Self::builder(config).controllers(controllers).build()
    }

    pub fn builder(config: HttpConfig) -> HttpServerBuilder {
        HttpServerBuilder {
            config,
            controllers: Controllers::new(),
            settings: None,
            renderer: None,
            validator: None,
            middlewares: Vec::new(),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn environment(&self) -> &ResponseEnvironment {
        &self.environment
    }

    /// Serve one request in-process.
    ///
    /// Oversized bodies are rejected up front. Static mounts are tried
    /// next, then the route table. Errors that escape a route become their
    /// canonical negotiated response.
    pub async fn handle(&self, mut request: HttpRequest) -> HttpResponse {
        let limit = self.environment.config.body_limit;
        if request.body.len() > limit {
            return self.fail(body_limit_error(limit), &request).await;
        }

        for mount in &self.static_mounts {
            if let Some(served) = mount.serve(&request).await {
                return match served {
                    Ok(response) => response,
                    Err(err) => self.fail(err, &request).await,
                };
            }
        }

        let Some((route, params)) = self.router.lookup(&request.method, &request.path) else {
            let err = Error::RouteNotFound(format!("{} {}", request.method, request.path));
            return self.fail(err, &request).await;
        };
        let handler = route.handler.clone();
        request.path_params = params;

        // Enough of the request to negotiate an error response after the
        // handler has consumed it
        let mut shell = HttpRequest::new(request.method.clone(), request.path.clone());
        if let Some(accept) = request.header("accept") {
            shell = shell.with_header("accept", accept);
        }

        match handler(request).await {
            Ok(response) => response,
            Err(err) => self.fail(err, &shell).await,
        }
    }

    async fn fail(&self, err: Error, request: &HttpRequest) -> HttpResponse {
        let response = error_response(err, &self.environment);
        send(response, request, HttpResponse::ok(), &self.environment).await
    }

    /// Listen on the configured port on all interfaces
    pub async fn listen(self) -> Result<(), Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.environment.config.port));
        self.listen_on(addr).await
    }

    /// Start the HTTP server on `addr`
    pub async fn listen_on(self, addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %addr, "Server listening");

        let server = Arc::new(self);

        loop {
            let (stream, remote) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = server.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let server = server.clone();
                    async move { handle_request(req, server).await }
                });

                let connection: std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), hyper::Error>> + Send>> =
                    Box::pin(http1::Builder::new().serve_connection(io, service));
                if let Err(err) = connection.await {
                    debug!(remote = %remote, error = ?err, "Error serving connection");
                }
            });
        }
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("router", &self.router)
            .field("static_mounts", &self.static_mounts)
            .finish()
    }
}

/// Assembles an [`HttpServer`] from its collaborators
pub struct HttpServerBuilder {
    config: HttpConfig,
    controllers: Controllers,
    settings: Option<Arc<dyn ConfigSource>>,
    renderer: Option<Arc<dyn ViewRenderer>>,
    validator: Option<Arc<dyn DataValidator>>,
    middlewares: Vec<MiddlewareBinding>,
}

impl HttpServerBuilder {
    pub fn controllers(mut self, controllers: Controllers) -> Self {
        self.controllers = controllers;
        self
    }

    /// Application settings handed to computed upload directories
    pub fn settings(mut self, settings: Arc<dyn ConfigSource>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn ViewRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Validator used when the controllers do not bring their own
    pub fn validator(mut self, validator: Arc<dyn DataValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Application-wide middleware, run around every routed request before
    /// controller and route bindings
    pub fn middleware(mut self, binding: MiddlewareBinding) -> Self {
        self.middlewares.push(binding);
        self
    }

    pub fn build(self) -> Result<HttpServer, Error> {
        let static_mounts = self.config.static_mounts.clone();
        let mut environment = ResponseEnvironment::new(self.config);
        if let Some(renderer) = self.renderer {
            environment = environment.with_renderer(renderer);
        }

        let mut controllers = self.controllers;
        if let Some(validator) = self.validator
            && !controllers.has_validator()
        {
            controllers = controllers.with_validator(validator);
        }
        for binding in self.middlewares {
            controllers = controllers.with_global_middleware(binding);
        }

        let router = controllers.resolve(environment.clone(), self.settings)?;
        Ok(HttpServer {
            router,
            environment,
            static_mounts,
        })
    }
}

fn body_limit_error(limit: usize) -> Error {
    Error::BadRequest(format!("Request body exceeds {} bytes", limit))
}

/// Bridge a hyper request into the in-process handler
async fn handle_request(
    req: Request<IncomingBody>,
    server: Arc<HttpServer>,
) -> Result<Response<Full<bytes::Bytes>>, BoxError> {
    let method = req.method().to_string();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut request = HttpRequest::from_target(method, &target);
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.to_string(), value.to_string());
        }
    }

    let head_only = request.method == "HEAD";
    let limit = server.environment.config.body_limit;
    request.body = match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(err) if err.is::<LengthLimitError>() => {
            warn!(path = %request.path, limit, "Request body too large");
            let response = server.fail(body_limit_error(limit), &request).await;
            return Ok(into_hyper(response, head_only));
        }
        Err(err) => return Err(err),
    };

    let response = server.handle(request).await;
    Ok(into_hyper(response, head_only))
}

fn into_hyper(response: HttpResponse, head_only: bool) -> Response<Full<bytes::Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    for cookie in &response.cookies {
        builder = builder.header("set-cookie", cookie.as_str());
    }

    let body = if head_only { Vec::new() } else { response.body };
    builder.body(Full::new(bytes::Bytes::from(body))).unwrap_or_else(|err| {
        error!(error = %err, "Invalid response head");
        let mut fallback = Response::new(Full::new(bytes::Bytes::new()));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}
