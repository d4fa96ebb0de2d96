//! Argument converters.
//!
//! A pipe turns the raw value extracted from a request into the value handed
//! to a controller method. `None` stands for a value the request did not
//! carry at all.

use serde_json::Value;

pub mod builtins;

pub type PipeResult<T> = Result<T, PipeError>;

#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// The Pipe trait for transformation and validation
pub trait Pipe: Send + Sync + 'static {
    fn transform(&self, input: Option<Value>) -> PipeResult<Option<Value>>;
}

impl<F> Pipe for F
where
    F: Fn(Option<Value>) -> PipeResult<Option<Value>> + Send + Sync + 'static,
{
    fn transform(&self, input: Option<Value>) -> PipeResult<Option<Value>> {
        self(input)
    }
}
