use crate::error::DbscopeError;
use crate::interceptor::{Interceptor, InterceptorResult, Next};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderName, Request},
};

pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Rejects requests whose `x-api-key` header does not carry the configured key.
#[derive(Clone)]
pub struct ApiKeyInterceptor {
    key: String,
}

impl ApiKeyInterceptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl Interceptor for ApiKeyInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        let presented = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        if presented != Some(self.key.as_str()) {
            tracing::debug!("Rejected {} {}: bad api key", request.method(), request.uri());
            return Err(DbscopeError::AccessDenied);
        }
        next.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::SharedInterceptorLayer;
    use axum::{Router, http::StatusCode, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(SharedInterceptorLayer::new(vec![Box::new(
                ApiKeyInterceptor::new("secret"),
            )]))
    }

    #[tokio::test]
    async fn test_missing_key_is_forbidden() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_wrong_key_is_forbidden() {
        let request = Request::builder()
            .uri("/")
            .header("x-api-key", "guess")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app().oneshot(request).await.unwrap().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_matching_key_passes() {
        let request = Request::builder()
            .uri("/")
            .header("x-api-key", "secret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app().oneshot(request).await.unwrap().status(), StatusCode::OK);
    }
}
