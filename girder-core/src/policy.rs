// Policies guard routes before any middleware or handler runs

use crate::metadata::{Binding, ControllerDescriptor, RouteDescriptor};
use crate::{Container, Error, HttpRequest, Injectable};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Pre-execution guard.
///
/// Returning `Ok(false)` denies the request with `PolicyDenied`; returning an
/// error aborts it with that error.
#[async_trait]
pub trait Policy: Send + Sync {
    fn is_enabled(&self, _route: &RouteDescriptor, _controller: &ControllerDescriptor) -> bool {
        true
    }

    async fn execute(
        &self,
        request: &HttpRequest,
        route: &RouteDescriptor,
        controller: &ControllerDescriptor,
    ) -> Result<bool, Error>;
}

pub type PolicyBinding = Binding<dyn Policy>;

impl Binding<dyn Policy> {
    /// Bind `P`, built from the container with `options` on every request
    pub fn of<P: Policy + Injectable>(options: Value) -> Self {
        Binding::from_factory::<P>(
            options,
            Arc::new(|container: &Container, options: &Value| -> Result<Arc<dyn Policy>, Error> {
                let policy: Arc<dyn Policy> = Arc::new(container.construct::<P>(options)?);
                Ok(policy)
            }),
        )
    }

    pub fn instance<P: Policy + 'static>(policy: Arc<P>) -> Self {
        Binding::from_factory::<P>(
            Value::Null,
            Arc::new(move |_: &Container, _: &Value| -> Result<Arc<dyn Policy>, Error> {
                let policy: Arc<dyn Policy> = policy.clone();
                Ok(policy)
            }),
        )
    }
}
