//! Application Bootstrap
//!
//! Collects controllers and interceptors, turns them into an axum router and
//! serves it until a shutdown signal arrives.

use super::shutdown_signal;
use crate::config::ServerConfig;
use crate::controller::{Controller, RegisteredEndpoint, RouteRegistrar};
use crate::error::Result;
use crate::exception::ExceptionFilter;
use crate::exception::http::HttpExceptionFilter;
use crate::interceptor::{
    ApiKeyInterceptor, Interceptor, RequestLogInterceptor, SharedInterceptorLayer,
};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

type Registration = Box<dyn FnOnce(&mut RouteRegistrar) -> Result<()> + Send>;

/// A built application, ready to serve.
///
/// # Example
///
/// ```rust,ignore
/// let app = Application::builder()
///     .config(config)
///     .controller(Arc::new(DbController::new(connector)))
///     .controller(Arc::new(CalculatorController))
///     .build()?;
///
/// app.serve().await?;
/// ```
pub struct Application {
    config: ServerConfig,
    router: Router,
    endpoints: Vec<RegisteredEndpoint>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Every endpoint installed, in registration order.
    pub fn endpoints(&self) -> &[RegisteredEndpoint] {
        &self.endpoints
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Binds the configured address and serves until Ctrl+C or SIGTERM.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_address()?).await?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `signal` completes, then drains in-flight requests.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await?;
        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Builder for [`Application`]
pub struct ApplicationBuilder {
    config: ServerConfig,
    registrations: Vec<Registration>,
    interceptors: Vec<Box<dyn Interceptor>>,
    filter: Arc<dyn ExceptionFilter>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registrations: Vec::new(),
            interceptors: Vec::new(),
            filter: Arc::new(HttpExceptionFilter),
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a controller under the configured prefix.
    pub fn controller<C: Controller>(mut self, controller: Arc<C>) -> Self {
        self.registrations.push(Box::new(move |registrar: &mut RouteRegistrar| {
            registrar.register(controller).map(|_| ())
        }));
        self
    }

    /// Registers a controller under its own prefix instead of the configured one.
    pub fn controller_with_prefix<C: Controller>(
        mut self,
        controller: Arc<C>,
        prefix: impl Into<String>,
    ) -> Self {
        let prefix = prefix.into();
        self.registrations.push(Box::new(move |registrar: &mut RouteRegistrar| {
            registrar
                .register_with_prefix(controller, Some(&prefix))
                .map(|_| ())
        }));
        self
    }

    /// Adds an interceptor. Interceptors run in the order they were added,
    /// after request logging and the api key check.
    pub fn interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub fn exception_filter(mut self, filter: Arc<dyn ExceptionFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Registers every controller and assembles the router.
    ///
    /// # Errors
    ///
    /// Returns the first registration failure: an unresolvable verb, a
    /// parameter bound twice, a malformed route or a route taken twice.
    pub fn build(self) -> Result<Application> {
        tracing::info!("Starting application initialization...");

        let mut registrar = RouteRegistrar::new(self.config.route_prefix())
            .with_body_limit(self.config.body_limit)
            .with_exception_filter(Arc::clone(&self.filter));
        for register in self.registrations {
            register(&mut registrar)?;
        }
        let endpoints = registrar.endpoints();

        let mut interceptors: Vec<Box<dyn Interceptor>> = vec![Box::new(RequestLogInterceptor)];
        if let Some(key) = self.config.api_key.as_deref().filter(|key| !key.is_empty()) {
            interceptors.push(Box::new(ApiKeyInterceptor::new(key)));
        }
        interceptors.extend(self.interceptors);

        let layer = SharedInterceptorLayer::new(interceptors).with_exception_filter(self.filter);
        let router = registrar.into_router().layer(layer);

        tracing::info!(
            "Application initialization complete ({} endpoints)",
            endpoints.len()
        );

        Ok(Application {
            config: self.config,
            router,
            endpoints,
        })
    }
}
