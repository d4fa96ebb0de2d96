use crate::pipe::PipeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbscopeError>;

/// Message that the exception filter maps to `403 Forbidden`.
pub const ACCESS_DENIED: &str = "access denied";

#[derive(Debug, Error)]
pub enum DbscopeError {
    #[error("Unable to determine http verb for method [{controller}.{method}]")]
    UnresolvableVerb { controller: String, method: String },

    #[error("Parameter {index} of [{controller}.{method}] is bound more than once")]
    DuplicateBinding {
        controller: String,
        method: String,
        index: usize,
    },

    #[error("Route {verb} {path} is already registered by [{existing}]")]
    DuplicateRoute {
        verb: String,
        path: String,
        existing: String,
    },

    #[error("Invalid route pattern '{pattern}': {message}")]
    InvalidRoute { pattern: String, message: String },

    #[error("Cannot {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("{0}")]
    Validation(String),

    #[error("access denied")]
    AccessDenied,

    #[error("Missing argument at position {0}")]
    MissingArgument(usize),

    #[error("Invalid argument at position {index}: {message}")]
    InvalidArgument { index: usize, message: String },

    #[error(transparent)]
    Pipe(#[from] PipeError),

    #[error("Invalid request body: {0}")]
    Body(String),

    #[error("{0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to serialize response: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DbscopeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors raised while turning controller metadata into routes.
    ///
    /// These abort application start instead of being reported per request.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnresolvableVerb { .. }
                | Self::DuplicateBinding { .. }
                | Self::DuplicateRoute { .. }
                | Self::InvalidRoute { .. }
        )
    }
}

impl From<sqlx::Error> for DbscopeError {
    fn from(err: sqlx::Error) -> Self {
        // Server-side errors keep the message PostgreSQL produced.
        match err.as_database_error() {
            Some(db_error) => DbscopeError::Database(db_error.message().to_string()),
            None => DbscopeError::Database(err.to_string()),
        }
    }
}

impl axum::response::IntoResponse for DbscopeError {
    fn into_response(self) -> axum::response::Response {
        use crate::exception::{ExceptionFilter, http::HttpExceptionFilter};
        HttpExceptionFilter.catch(&self)
    }
}
