use crate::error::{ACCESS_DENIED, DbscopeError};
use crate::exception::ExceptionFilter;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Default exception filter.
///
/// Renders every error as `{ "error": message }`. The status is `403` when the
/// message is exactly `access denied`, `404` for unmatched routes and `500`
/// for everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpExceptionFilter;

impl HttpExceptionFilter {
    pub fn status_for(error: &DbscopeError) -> StatusCode {
        let message = error.to_string();
        if message == ACCESS_DENIED {
            StatusCode::FORBIDDEN
        } else if matches!(error, DbscopeError::RouteNotFound { .. }) {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ExceptionFilter for HttpExceptionFilter {
    fn catch(&self, error: &DbscopeError) -> Response {
        let status = Self::status_for(error);
        let message = error.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, "Unhandled exception caught by exception filter");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            HttpExceptionFilter::status_for(&DbscopeError::AccessDenied),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            HttpExceptionFilter::status_for(&DbscopeError::validation("access denied")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            HttpExceptionFilter::status_for(&DbscopeError::validation("No query provided")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            HttpExceptionFilter::status_for(&DbscopeError::database("relation \"x\" does not exist")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            HttpExceptionFilter::status_for(&DbscopeError::RouteNotFound {
                method: "GET".to_string(),
                path: "/nope".to_string(),
            }),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_catch_renders_error_body() {
        let response = HttpExceptionFilter.catch(&DbscopeError::validation("No query provided"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "No query provided" }));
    }
}
