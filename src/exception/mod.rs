use crate::error::DbscopeError;
use axum::response::Response;

pub mod http;

/// The ExceptionFilter trait
///
/// Filters translate errors raised during request processing into responses.
/// One filter is installed per application; handlers never catch their own errors.
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Catch an error and return a response
    fn catch(&self, error: &DbscopeError) -> Response;
}
