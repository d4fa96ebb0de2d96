use crate::error::{DbscopeError, Result};
use crate::pipe::Pipe;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Where a handler argument is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    /// A route path parameter, falling back to the query string.
    Query { name: String },
    /// The named property of the parsed body, or the whole body when `name` is `None`.
    Body { name: Option<String> },
}

/// Parameter Binding Descriptor: how one handler argument is extracted and converted.
#[derive(Clone)]
pub struct ParamBinding {
    pub parameter_index: usize,
    pub source: ParamSource,
    pub converter: Arc<dyn Pipe>,
}

impl ParamBinding {
    pub fn query(parameter_index: usize, name: impl Into<String>, converter: impl Pipe) -> Self {
        Self {
            parameter_index,
            source: ParamSource::Query { name: name.into() },
            converter: Arc::new(converter),
        }
    }

    pub fn body(parameter_index: usize, name: Option<&str>, converter: impl Pipe) -> Self {
        Self {
            parameter_index,
            source: ParamSource::Body {
                name: name.map(str::to_string),
            },
            converter: Arc::new(converter),
        }
    }
}

impl fmt::Debug for ParamBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamBinding")
            .field("parameter_index", &self.parameter_index)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// The values a request offers to the binder.
#[derive(Debug, Default)]
pub struct RequestValues {
    pub path: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Value,
}

/// Positional call arguments for a handler method.
///
/// A slot is `None` when no binding produced a value for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    slots: Vec<Option<Value>>,
}

impl Arguments {
    pub fn new(slots: Vec<Option<Value>>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Deserializes the argument at `index`; absent and `null` slots yield `None`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>> {
        match self.raw(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| DbscopeError::InvalidArgument {
                    index,
                    message: e.to_string(),
                }),
        }
    }

    pub fn require<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        self.get(index)?.ok_or(DbscopeError::MissingArgument(index))
    }
}

/// Builds call arguments for one handler method from its binding descriptors.
#[derive(Debug, Clone)]
pub struct ArgumentBinder {
    bindings: Vec<ParamBinding>,
    arity: usize,
}

impl ArgumentBinder {
    /// Fails when two bindings target the same parameter index.
    pub fn new(controller: &str, method: &str, bindings: &[ParamBinding]) -> Result<Self> {
        let mut seen = Vec::with_capacity(bindings.len());
        for binding in bindings {
            if seen.contains(&binding.parameter_index) {
                return Err(DbscopeError::DuplicateBinding {
                    controller: controller.to_string(),
                    method: method.to_string(),
                    index: binding.parameter_index,
                });
            }
            seen.push(binding.parameter_index);
        }

        let arity = bindings
            .iter()
            .map(|binding| binding.parameter_index + 1)
            .max()
            .unwrap_or(0);

        Ok(Self {
            bindings: bindings.to_vec(),
            arity,
        })
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn bind(&self, request: &RequestValues) -> Result<Arguments> {
        let mut slots = vec![None; self.arity];

        for binding in &self.bindings {
            let raw = match &binding.source {
                ParamSource::Query { name } => request
                    .path
                    .get(name)
                    .or_else(|| request.query.get(name))
                    .map(|value| Value::String(value.clone())),
                ParamSource::Body { name: None } => Some(request.body.clone()),
                ParamSource::Body { name: Some(name) } => request.body.get(name).cloned(),
            };
            slots[binding.parameter_index] = binding.converter.transform(raw)?;
        }

        Ok(Arguments::new(slots))
    }
}
