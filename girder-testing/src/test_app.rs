// Test application builder

use crate::TestClient;
use girder_core::{
    ConfigSource, Container, Controller, Controllers, DataValidator, Error, HttpConfig, HttpServer, Provider,
    RuntimeMode, ViewRenderer,
};
use std::sync::Arc;

/// A server wired for in-process requests
pub struct TestApp {
    client: TestClient,
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::new()
    }

    pub fn client(&self) -> TestClient {
        self.client.clone()
    }

    pub fn server(&self) -> &HttpServer {
        self.client.server()
    }
}

/// Collects controllers and capabilities for a [`TestApp`].
///
/// Runs in development mode by default so error bodies carry details.
pub struct TestAppBuilder {
    config: HttpConfig,
    controllers: Controllers,
    container: Container,
    validator: Option<Arc<dyn DataValidator>>,
    renderer: Option<Arc<dyn ViewRenderer>>,
    settings: Option<Arc<dyn ConfigSource>>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpConfig::default().with_mode(RuntimeMode::Development),
            controllers: Controllers::new(),
            container: Container::new(),
            validator: None,
            renderer: None,
            settings: None,
        }
    }

    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn controller<C: Controller>(mut self, controller: C) -> Self {
        self.controllers = self.controllers.register(controller);
        self
    }

    /// Register a singleton provider in the app's container
    pub fn provider<T: Provider>(self, provider: T) -> Self {
        self.container.register(provider);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn DataValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn ViewRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn settings(mut self, settings: Arc<dyn ConfigSource>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self) -> Result<TestApp, Error> {
        let controllers = self.controllers.with_container(self.container);
        let mut builder = HttpServer::builder(self.config).controllers(controllers);
        if let Some(validator) = self.validator {
            builder = builder.validator(validator);
        }
        if let Some(renderer) = self.renderer {
            builder = builder.renderer(renderer);
        }
        if let Some(settings) = self.settings {
            builder = builder.settings(settings);
        }

        Ok(TestApp {
            client: TestClient::new(builder.build()?),
        })
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
