//! Testing utilities for girder applications.
//!
//! Requests go straight into [`girder_core::HttpServer::handle`], so tests
//! exercise routing, dispatch, negotiation and the error boundary without
//! opening a socket.
//!
//! ```
//! use girder_core::*;
//! use girder_testing::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct HealthController;
//!
//! impl HealthController {
//!     async fn status(self: Arc<Self>, _args: RouteArgs) -> Result<OkResponse> {
//!         Ok(OkResponse::new(json!({"status": "ok"})))
//!     }
//! }
//!
//! impl Controller for HealthController {
//!     fn configure(builder: ControllerBuilder<Self>) -> ControllerBuilder<Self> {
//!         builder.route(RouteDescriptor::get("status"), Self::status)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let app = TestApp::builder().controller(HealthController).build().unwrap();
//! let response = app.client().get("/health/status").await;
//!
//! assert_status(&response, 200);
//! assert_json(&response, &json!({"status": "ok"}));
//! # });
//! ```

mod assertions;
mod test_app;
mod test_client;

pub use assertions::*;
pub use test_app::{TestApp, TestAppBuilder};
pub use test_client::{MultipartForm, TestClient, TestRequestBuilder, TestResponse};
