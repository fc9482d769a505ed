// Routing system for HTTP requests

use crate::{Error, HttpRequest, HttpResponse};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future produced by a route handler
pub type RouteFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// A route handler function type
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> RouteFuture + Send + Sync>;

/// Route definition with handler
#[derive(Clone)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub handler: HandlerFn,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.method, self.path)
    }
}

/// Router for managing routes and dispatching requests
#[derive(Debug, Default, Clone)]
pub struct Router {
    pub routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route to the router
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Find the route for `method` and `path` along with its path parameters.
    ///
    /// Routes are tried in registration order; HEAD falls back to GET routes.
    pub fn lookup(&self, method: &str, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        let exact = self
            .routes
            .iter()
            .filter(|route| route.method.eq_ignore_ascii_case(method))
            .find_map(|route| match_path(&route.path, path).map(|params| (route, params)));

        match exact {
            Some(found) => Some(found),
            None if method.eq_ignore_ascii_case("HEAD") => self.lookup("GET", path),
            None => None,
        }
    }

    /// Dispatch `request` to the matching route
    pub async fn route(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        let Some((route, params)) = self.lookup(&request.method, &request.path) else {
            return Err(Error::RouteNotFound(format!("{} {}", request.method, request.path)));
        };

        request.path_params = params;
        (route.handler)(request).await
    }
}

/// Match a route path pattern against a request path
/// Returns Some(params) if matched, None otherwise
pub fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(param_name) = pattern_part.strip_prefix(':') {
            let value = urlencoding::decode(path_part)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| path_part.to_string());
            params.insert(param_name.to_string(), value);
        } else if pattern_part != path_part {
            // Static part doesn't match
            return None;
        }
    }

    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_route(method: &str, path: &str) -> Route {
        Route {
            method: method.to_string(),
            path: path.to_string(),
            handler: Arc::new(|req: HttpRequest| -> RouteFuture {
                Box::pin(async move {
                    let id = req.param("id").cloned().unwrap_or_default();
                    Ok(HttpResponse::ok().with_body(id.into_bytes()))
                })
            }),
        }
    }

    #[test]
    fn test_match_path_static() {
        let result = match_path("/users", "/users");
        assert_eq!(result.unwrap().len(), 0);
    }

    #[test]
    fn test_match_path_with_param() {
        let params = match_path("/users/:id", "/users/123").unwrap();
        assert_eq!(params.get("id"), Some(&"123".to_string()));
    }

    #[test]
    fn test_match_path_decodes_params() {
        let params = match_path("/files/:name", "/files/a%20b.txt").unwrap();
        assert_eq!(params.get("name"), Some(&"a b.txt".to_string()));
    }

    #[test]
    fn test_match_path_no_match() {
        assert!(match_path("/users/:id", "/posts/123").is_none());
        assert!(match_path("/users/:id", "/users").is_none());
    }

    #[test]
    fn test_match_path_root() {
        assert!(match_path("/", "/").is_some());
    }

    #[test]
    fn test_lookup_by_method() {
        let mut router = Router::new();
        router.add_route(ok_route("GET", "/users/:id"));
        router.add_route(ok_route("POST", "/users"));

        assert!(router.lookup("GET", "/users/1").is_some());
        assert!(router.lookup("HEAD", "/users/1").is_some());
        assert!(router.lookup("DELETE", "/users/1").is_none());
        assert!(router.lookup("POST", "/users").is_some());
    }

    #[tokio::test]
    async fn test_route_sets_path_params() {
        let mut router = Router::new();
        router.add_route(ok_route("GET", "/users/:id"));

        let res = router
            .route(HttpRequest::new("GET".into(), "/users/42".into()))
            .await
            .unwrap();
        assert_eq!(res.body_string(), "42");

        let err = router
            .route(HttpRequest::new("GET".into(), "/nothing".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
