use crate::pipe::{Pipe, PipeError, PipeResult};
use serde_json::{Number, Value};

/// Passes the raw value through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityPipe;

impl Pipe for IdentityPipe {
    fn transform(&self, input: Option<Value>) -> PipeResult<Option<Value>> {
        Ok(input)
    }
}

/// Parses a string (or accepts a number) into a JSON number
///
/// Absent values stay absent so the handler decides whether they are required.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseNumberPipe;

impl Pipe for ParseNumberPipe {
    fn transform(&self, input: Option<Value>) -> PipeResult<Option<Value>> {
        match input {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(Some(Value::Number(n))),
            Some(Value::String(raw)) => {
                let trimmed = raw.trim();
                let parsed = if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed
                        .parse::<f64>()
                        .map_err(|_| PipeError::Validation(format!("'{raw}' is not a number")))?
                };
                Number::from_f64(parsed)
                    .map(|n| Some(Value::Number(n)))
                    .ok_or_else(|| PipeError::Validation(format!("'{raw}' is not a finite number")))
            }
            Some(other) => Err(PipeError::Validation(format!("{other} is not a number"))),
        }
    }
}

/// Replaces an absent or null value with a fixed default
#[derive(Debug, Clone)]
pub struct DefaultPipe {
    default: Value,
}

impl DefaultPipe {
    pub fn new(default: impl Into<Value>) -> Self {
        Self {
            default: default.into(),
        }
    }
}

impl Pipe for DefaultPipe {
    fn transform(&self, input: Option<Value>) -> PipeResult<Option<Value>> {
        match input {
            None | Some(Value::Null) => Ok(Some(self.default.clone())),
            value => Ok(value),
        }
    }
}
