//! Metadata Annotation Store
//!
//! Records the routing facts a controller declares about itself: its route
//! prefix, the verb and sub-route of each handler method, and how each handler
//! argument is extracted from a request. Controllers fill a store in
//! [`Controller::describe`](super::Controller::describe); the registrar only
//! reads it.

use super::binding::{Arguments, ParamBinding};
use super::verb::HttpVerb;
use crate::error::Result;
use crate::pipe::Pipe;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A type-erased handler method: called with the controller instance and its arguments.
pub type Handler<C> = Arc<dyn Fn(Arc<C>, Arguments) -> HandlerFuture + Send + Sync>;

/// Wraps an async controller method into a [`Handler`], serializing its output to JSON.
///
/// # Example
/// ```rust,ignore
/// let add = handler(|c: Arc<CalculatorController>, args: Arguments| async move {
///     c.add(args.require(0)?, args.require(1)?).await
/// });
/// ```
pub fn handler<C, F, Fut, T>(f: F) -> Handler<C>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Serialize,
{
    Arc::new(move |controller, args| {
        let fut = f(controller, args);
        Box::pin(async move {
            let output = fut.await?;
            Ok(serde_json::to_value(output)?)
        })
    })
}

/// Verb and sub-route declared for one handler method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRoute {
    pub verb: HttpVerb,
    pub route: Option<String>,
}

/// A handler method the controller exposes for registration.
pub struct MethodEntry<C> {
    pub name: &'static str,
    pub handler: Handler<C>,
}

impl<C> Clone for MethodEntry<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            handler: Arc::clone(&self.handler),
        }
    }
}

pub struct MetadataStore<C> {
    controller: &'static str,
    controller_route: Option<String>,
    methods: Vec<MethodEntry<C>>,
    method_routes: HashMap<&'static str, MethodRoute>,
    parameters: HashMap<&'static str, Vec<ParamBinding>>,
}

impl<C: Send + Sync + 'static> MetadataStore<C> {
    pub fn new(controller: &'static str) -> Self {
        Self {
            controller,
            controller_route: None,
            methods: Vec::new(),
            method_routes: HashMap::new(),
            parameters: HashMap::new(),
        }
    }

    pub fn controller_name(&self) -> &'static str {
        self.controller
    }

    /// Records the route prefix for the controller. Last write wins.
    pub fn set_controller_route(&mut self, route: impl Into<String>) -> &mut Self {
        self.controller_route = Some(route.into());
        self
    }

    /// Records verb and sub-route for one method. Last write wins.
    pub fn set_method_verb_and_route(
        &mut self,
        method: &'static str,
        verb: HttpVerb,
        route: Option<&str>,
    ) {
        self.method_routes.insert(
            method,
            MethodRoute {
                verb,
                route: route.map(str::to_string),
            },
        );
    }

    /// Appends a binding to the ordered list stored for `method`.
    pub fn append_parameter_binding(&mut self, method: &'static str, binding: ParamBinding) {
        self.parameters.entry(method).or_default().push(binding);
    }

    /// Declares a handler method. Redeclaring a name replaces its handler in place.
    pub fn add_method(&mut self, name: &'static str, handler: Handler<C>) {
        match self.methods.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.handler = handler,
            None => self.methods.push(MethodEntry { name, handler }),
        }
    }

    pub fn get_controller_route(&self) -> Option<&str> {
        self.controller_route.as_deref()
    }

    pub fn get_method_verb_and_route(&self, method: &str) -> Option<MethodRoute> {
        self.method_routes.get(method).cloned()
    }

    pub fn get_parameter_bindings(&self, method: &str) -> Vec<ParamBinding> {
        self.parameters.get(method).cloned().unwrap_or_default()
    }

    /// Declared methods, in declaration order.
    pub fn methods(&self) -> &[MethodEntry<C>] {
        &self.methods
    }

    /// Declares a method and returns a builder for its routing facts.
    pub fn method(&mut self, name: &'static str, handler: Handler<C>) -> MethodBuilder<'_, C> {
        self.add_method(name, handler);
        MethodBuilder { store: self, name }
    }
}

/// Fluent access to the store for a single method.
pub struct MethodBuilder<'a, C> {
    store: &'a mut MetadataStore<C>,
    name: &'static str,
}

impl<C: Send + Sync + 'static> MethodBuilder<'_, C> {
    pub fn route(self, verb: HttpVerb, route: &str) -> Self {
        let route = (!route.is_empty()).then_some(route);
        self.store.set_method_verb_and_route(self.name, verb, route);
        self
    }

    pub fn get(self, route: &str) -> Self {
        self.route(HttpVerb::Get, route)
    }

    pub fn post(self, route: &str) -> Self {
        self.route(HttpVerb::Post, route)
    }

    pub fn put(self, route: &str) -> Self {
        self.route(HttpVerb::Put, route)
    }

    pub fn patch(self, route: &str) -> Self {
        self.route(HttpVerb::Patch, route)
    }

    pub fn delete(self, route: &str) -> Self {
        self.route(HttpVerb::Delete, route)
    }

    pub fn from_query(self, index: usize, name: &str, converter: impl Pipe) -> Self {
        self.store
            .append_parameter_binding(self.name, ParamBinding::query(index, name, converter));
        self
    }

    pub fn from_body(self, index: usize, name: &str, converter: impl Pipe) -> Self {
        self.store
            .append_parameter_binding(self.name, ParamBinding::body(index, Some(name), converter));
        self
    }

    pub fn from_whole_body(self, index: usize, converter: impl Pipe) -> Self {
        self.store
            .append_parameter_binding(self.name, ParamBinding::body(index, None, converter));
        self
    }
}
