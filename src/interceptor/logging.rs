use crate::interceptor::{Interceptor, InterceptorResult, Next};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
};
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Logs each request with a generated id, status and latency.
///
/// The id is echoed back in the `x-request-id` response header.
#[derive(Clone, Default)]
pub struct RequestLogInterceptor;

#[async_trait]
impl Interceptor for RequestLogInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        let request_id = Uuid::new_v4();
        let method = request.method().clone();
        let uri = request.uri().clone();
        let start = Instant::now();

        tracing::info!(%request_id, "--> {} {}", method, uri);

        match next.run(request).await {
            Ok(mut response) => {
                tracing::info!(
                    %request_id,
                    "<-- {} {} {} {:?}",
                    method,
                    uri,
                    response.status(),
                    start.elapsed()
                );
                if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(
                    %request_id,
                    "<-- {} {} ERROR: {} {:?}",
                    method,
                    uri,
                    e,
                    start.elapsed()
                );
                Err(e)
            }
        }
    }
}
