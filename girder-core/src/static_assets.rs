//! Static file mounts.
//!
//! Each mount maps a URL prefix onto a directory. Requests that escape the
//! directory are refused and missing files answer 404.

use crate::logging::trace;
use crate::{Error, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A URL prefix served from a directory
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StaticMount {
    pub route: String,
    pub path: PathBuf,
}

impl StaticMount {
    pub fn new(route: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let route = route.into();
        Self {
            route: format!("/{}", route.trim_matches('/')),
            path: path.into(),
        }
    }

    /// The path below this mount, or `None` when the request is elsewhere
    fn relative<'a>(&self, request_path: &'a str) -> Option<&'a str> {
        let rest = request_path.strip_prefix(self.route.trim_end_matches('/'))?;
        if rest.is_empty() {
            return Some("");
        }
        rest.strip_prefix('/')
    }

    /// Serve `request` if it falls under this mount
    pub async fn serve(&self, request: &HttpRequest) -> Option<Result<HttpResponse, Error>> {
        if request.method != "GET" && request.method != "HEAD" {
            return None;
        }
        let relative = self.relative(&request.path)?;
        trace!(mount = %self.route, file = relative, "Serving static file");
        Some(self.serve_file(relative, request.method == "HEAD").await)
    }

    async fn serve_file(&self, relative: &str, head_only: bool) -> Result<HttpResponse, Error> {
        let path = self.resolve_path(relative)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(Error::ResourceNotFound(format!("File not found: {}", relative))),
        };

        let content = if head_only {
            Vec::new()
        } else {
            tokio::fs::read(&path).await?
        };

        let mut response = HttpResponse::ok().with_body(content);
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        response.set_header("Content-Type", mime.essence_str());
        if let Ok(modified) = metadata.modified() {
            response.set_header("Last-Modified", httpdate::fmt_http_date(modified));
        }
        Ok(response)
    }

    /// Resolve below the mount root, refusing traversal outside of it
    fn resolve_path(&self, relative: &str) -> Result<PathBuf, Error> {
        let decoded = urlencoding::decode(relative)
            .map_err(|_| Error::BadRequest("Malformed static path".to_string()))?;
        let full_path = self.path.join(decoded.trim_start_matches('/'));

        let canonical_root = self
            .path
            .canonicalize()
            .map_err(|_| Error::ResourceNotFound(format!("Static root missing: {:?}", self.path)))?;

        let canonical_path = match full_path.canonicalize() {
            Ok(p) => p,
            Err(_) => return Err(Error::ResourceNotFound(format!("File not found: {}", relative))),
        };

        if !canonical_path.starts_with(&canonical_root) {
            return Err(Error::Forbidden("Access denied: path traversal attempt".to_string()));
        }

        Ok(canonical_path)
    }

    pub fn root(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn mount_with_index() -> (TempDir, StaticMount) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>static</h1>").unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body {}").unwrap();
        let mount = StaticMount::new("static", dir.path());
        (dir, mount)
    }

    #[tokio::test]
    async fn test_serves_existing_file() {
        let (_dir, mount) = mount_with_index();
        let req = HttpRequest::new("GET".into(), "/static/index.html".into());

        let res = mount.serve(&req).await.unwrap().unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-type"), Some("text/html"));
        assert_eq!(res.body_string(), "<h1>static</h1>");

        let req = HttpRequest::new("GET".into(), "/static/css/site.css".into());
        let res = mount.serve(&req).await.unwrap().unwrap();
        assert_eq!(res.header("content-type"), Some("text/css"));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_dir, mount) = mount_with_index();
        let req = HttpRequest::new("GET".into(), "/static/nothing.html".into());

        let err = mount.serve(&req).await.unwrap().unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_other_prefixes_are_ignored() {
        let (_dir, mount) = mount_with_index();
        let req = HttpRequest::new("GET".into(), "/staticky/index.html".into());
        assert!(mount.serve(&req).await.is_none());

        let req = HttpRequest::new("POST".into(), "/static/index.html".into());
        assert!(mount.serve(&req).await.is_none());
    }

    #[tokio::test]
    async fn test_traversal_is_refused() {
        let (_dir, mount) = mount_with_index();
        let req = HttpRequest::new("GET".into(), "/static/..".into());

        let err = mount.serve(&req).await.unwrap().unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
