pub mod access;
pub mod layer;
pub mod logging;

use crate::error::DbscopeError;
use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;

pub use access::ApiKeyInterceptor;
pub use layer::{InterceptorMiddleware, SharedInterceptorLayer};
pub use logging::RequestLogInterceptor;

/// standard return type for Interceptors
pub type InterceptorResult = Result<Response, DbscopeError>;

pub type NextFuture = Pin<Box<dyn Future<Output = InterceptorResult> + Send>>;

/// Represents the next handler in the chain
pub struct Next {
    run: Box<dyn FnOnce(Request<Body>) -> NextFuture + Send>,
}

impl Next {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Request<Body>) -> NextFuture + Send + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// Execute the rest of the chain
    pub async fn run(self, request: Request<Body>) -> InterceptorResult {
        (self.run)(request).await
    }
}

/// Runs around every request before it reaches the routed handler.
///
/// Returning an error short-circuits the chain; the error is rendered by the
/// exception filter like any handler error.
///
/// # Example
/// ```rust,ignore
/// struct Timing;
///
/// #[async_trait]
/// impl Interceptor for Timing {
///     async fn intercept(&self, req: Request<Body>, next: Next) -> InterceptorResult {
///         let start = Instant::now();
///         let res = next.run(req).await?;
///         tracing::debug!("took {:?}", start.elapsed());
///         Ok(res)
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult;
}
