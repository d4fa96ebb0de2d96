//! Route Registrar
//!
//! Turns the metadata a controller declares into live axum routes.

use super::binding::{ArgumentBinder, Arguments, RequestValues};
use super::metadata::HandlerFuture;
use super::route::{RoutePattern, compute_route};
use super::verb::{HttpVerb, resolve_verb};
use super::Controller;
use crate::error::{DbscopeError, Result};
use crate::exception::ExceptionFilter;
use crate::exception::http::HttpExceptionFilter;
use axum::{
    Json, Router,
    extract::Request,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Default limit for request bodies, in bytes.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

type BoundHandler = Arc<dyn Fn(Arguments) -> HandlerFuture + Send + Sync>;

/// An endpoint installed by the registrar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEndpoint {
    pub verb: HttpVerb,
    pub path: String,
    pub controller: &'static str,
    pub method: &'static str,
}

struct Endpoint {
    info: RegisteredEndpoint,
    pattern: RoutePattern,
    binder: ArgumentBinder,
    invoke: BoundHandler,
}

impl Endpoint {
    async fn call(
        &self,
        path: HashMap<String, String>,
        request: Request,
        body_limit: usize,
    ) -> Result<Response> {
        let (parts, body) = request.into_parts();
        let query = parse_query(parts.uri.query());
        let bytes = axum::body::to_bytes(body, body_limit)
            .await
            .map_err(|e| DbscopeError::Body(e.to_string()))?;
        let body = parse_body(&parts.headers, &bytes)?;

        let args = self.binder.bind(&RequestValues { path, query, body })?;
        tracing::debug!(
            "Invoking {}.{} with {} argument(s)",
            self.info.controller,
            self.info.method,
            args.len()
        );

        let value = (self.invoke)(args).await?;
        Ok(Json(value).into_response())
    }
}

/// Endpoints sharing one axum mount path and verb, tried in registration order.
struct Dispatch {
    candidates: Vec<Arc<Endpoint>>,
    filter: Arc<dyn ExceptionFilter>,
    body_limit: usize,
}

impl Dispatch {
    async fn handle(&self, request: Request) -> Response {
        let path = request.uri().path().to_string();

        for endpoint in &self.candidates {
            if let Some(params) = endpoint.pattern.matches(&path) {
                tracing::debug!(
                    "{} {} ===> {}.{}",
                    endpoint.info.verb.upper(),
                    endpoint.info.path,
                    endpoint.info.controller,
                    endpoint.info.method
                );
                return match endpoint.call(params, request, self.body_limit).await {
                    Ok(response) => response,
                    Err(e) => self.filter.catch(&e),
                };
            }
        }

        let method = request.method().to_string();
        self.filter.catch(&DbscopeError::RouteNotFound { method, path })
    }
}

/// Collects endpoints from controllers and builds the router serving them.
///
/// # Example
/// ```rust,ignore
/// let mut registrar = RouteRegistrar::new(Some("api"));
/// registrar.register(Arc::new(CalculatorController))?;
/// let router = registrar.into_router();
/// ```
pub struct RouteRegistrar {
    prefix: Option<String>,
    body_limit: usize,
    filter: Arc<dyn ExceptionFilter>,
    endpoints: Vec<Arc<Endpoint>>,
}

impl RouteRegistrar {
    pub fn new(prefix: Option<&str>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            body_limit: DEFAULT_BODY_LIMIT,
            filter: Arc::new(HttpExceptionFilter),
            endpoints: Vec::new(),
        }
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    pub fn with_exception_filter(mut self, filter: Arc<dyn ExceptionFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Registers every handler method of `controller` under the default prefix.
    pub fn register<C: Controller>(&mut self, controller: Arc<C>) -> Result<&mut Self> {
        let prefix = self.prefix.clone();
        self.register_with_prefix(controller, prefix.as_deref())
    }

    /// Registers every handler method of `controller` under `prefix`.
    ///
    /// Fails without registering anything from this controller when a verb
    /// cannot be resolved, a parameter index is bound twice, a pattern is
    /// malformed, or a (verb, path) pair is already taken.
    pub fn register_with_prefix<C: Controller>(
        &mut self,
        controller: Arc<C>,
        prefix: Option<&str>,
    ) -> Result<&mut Self> {
        let meta = C::metadata();
        let controller_name = meta.controller_name();
        let controller_route = meta.get_controller_route();

        let mut staged: Vec<Arc<Endpoint>> = Vec::with_capacity(meta.methods().len());
        for method in meta.methods() {
            let declared = meta.get_method_verb_and_route(method.name);
            let verb = match &declared {
                Some(route) => route.verb,
                None => resolve_verb(controller_name, method.name)?,
            };
            let method_route = declared.as_ref().and_then(|route| route.route.as_deref());

            let path = compute_route(&[Some("/"), prefix, controller_route, method_route]);
            let pattern = RoutePattern::parse(&path)?;
            let bindings = meta.get_parameter_bindings(method.name);
            let binder = ArgumentBinder::new(controller_name, method.name, &bindings)?;

            let taken = self.endpoints.iter().chain(staged.iter()).find(|existing| {
                existing.info.verb == verb && existing.info.path == path
            });
            if let Some(existing) = taken {
                return Err(DbscopeError::DuplicateRoute {
                    verb: verb.upper(),
                    path,
                    existing: format!("{}.{}", existing.info.controller, existing.info.method),
                });
            }

            let target = Arc::clone(&controller);
            let handler = Arc::clone(&method.handler);
            let invoke: BoundHandler = Arc::new(move |args| handler(Arc::clone(&target), args));

            staged.push(Arc::new(Endpoint {
                info: RegisteredEndpoint {
                    verb,
                    path,
                    controller: controller_name,
                    method: method.name,
                },
                pattern,
                binder,
                invoke,
            }));
        }

        for endpoint in &staged {
            tracing::info!(
                "Mapped {} {} ===> {}.{}",
                endpoint.info.verb.upper(),
                endpoint.info.path,
                endpoint.info.controller,
                endpoint.info.method
            );
        }
        self.endpoints.extend(staged);
        Ok(self)
    }

    pub fn endpoints(&self) -> Vec<RegisteredEndpoint> {
        self.endpoints.iter().map(|e| e.info.clone()).collect()
    }

    /// Builds an axum router serving every registered endpoint.
    pub fn into_router(self) -> Router {
        // mount path -> verb -> candidate endpoints, all in registration order
        let mut mounts: Vec<(String, Vec<(HttpVerb, Vec<Arc<Endpoint>>)>)> = Vec::new();
        for endpoint in &self.endpoints {
            for mount in endpoint.pattern.mount_paths() {
                let idx = match mounts.iter().position(|(path, _)| *path == mount) {
                    Some(idx) => idx,
                    None => {
                        mounts.push((mount, Vec::new()));
                        mounts.len() - 1
                    }
                };
                let verbs = &mut mounts[idx].1;
                match verbs.iter_mut().find(|(verb, _)| *verb == endpoint.info.verb) {
                    Some((_, candidates)) => candidates.push(Arc::clone(endpoint)),
                    None => verbs.push((endpoint.info.verb, vec![Arc::clone(endpoint)])),
                }
            }
        }

        let mut router = Router::new();
        for (mount, verbs) in mounts {
            let mut method_router: MethodRouter = MethodRouter::new();
            for (verb, candidates) in verbs {
                let dispatch = Arc::new(Dispatch {
                    candidates,
                    filter: Arc::clone(&self.filter),
                    body_limit: self.body_limit,
                });
                method_router = method_router.on(verb.method_filter(), move |request: Request| {
                    let dispatch = Arc::clone(&dispatch);
                    async move { dispatch.handle(request).await }
                });
            }
            method_router = method_router.fallback(not_found(Arc::clone(&self.filter)));
            router = router.route(&mount, method_router);
        }

        router.fallback(not_found(self.filter))
    }
}

fn not_found(
    filter: Arc<dyn ExceptionFilter>,
) -> impl Fn(Request) -> std::future::Ready<Response> + Clone + Send + Sync + 'static {
    move |request: Request| {
        let error = DbscopeError::RouteNotFound {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
        };
        std::future::ready(filter.catch(&error))
    }
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Parses JSON and url-encoded bodies. Anything else, including an empty body,
/// reads as an empty object.
fn parse_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let fields = url::form_urlencoded::parse(bytes)
            .into_owned()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Ok(Value::Object(fields))
    } else if content_type.contains("json") {
        serde_json::from_slice(bytes).map_err(|e| DbscopeError::Body(e.to_string()))
    } else {
        Ok(Value::Object(Map::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::metadata::{MetadataStore, handler};
    use crate::pipe::builtins::{IdentityPipe, ParseNumberPipe};
    use axum::body::Body;
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt;

    struct EchoController;

    impl EchoController {
        async fn echo(&self, value: Option<String>) -> Result<Option<String>> {
            Ok(value)
        }
    }

    impl Controller for EchoController {
        fn describe(meta: &mut MetadataStore<Self>) {
            meta.set_controller_route("echo");
            meta.method(
                "get_value",
                handler(|c: Arc<Self>, args: Arguments| async move { c.echo(args.get(0)?).await }),
            )
            .from_query(0, "value", IdentityPipe);
            meta.method(
                "post_body",
                handler(|_c: Arc<Self>, args: Arguments| async move {
                    Ok(args.raw(0).cloned().unwrap_or(Value::Null))
                }),
            )
            .post("")
            .from_whole_body(0, IdentityPipe);
            meta.method(
                "lookup",
                handler(|c: Arc<Self>, args: Arguments| async move { c.echo(args.get(0)?).await }),
            )
            .get("items/:value")
            .from_query(0, "value", IdentityPipe);
            meta.method(
                "absolute",
                handler(|_c: Arc<Self>, _args: Arguments| async move { Ok("absolute") }),
            )
            .get("/health");
        }
    }

    struct MathController;

    impl Controller for MathController {
        fn describe(meta: &mut MetadataStore<Self>) {
            meta.set_controller_route("math");
            meta.method(
                "get_sum",
                handler(|_c: Arc<Self>, args: Arguments| async move {
                    Ok(args.require::<f64>(0)? + args.require::<f64>(1)?)
                }),
            )
            .get("sum")
            .from_query(0, "a", ParseNumberPipe)
            .from_query(1, "b", ParseNumberPipe);
        }
    }

    struct NamelessVerbController;

    impl Controller for NamelessVerbController {
        fn describe(meta: &mut MetadataStore<Self>) {
            meta.method(
                "compute",
                handler(|_c: Arc<Self>, _args: Arguments| async move { Ok(1) }),
            );
        }
    }

    struct DoubleBoundController;

    impl Controller for DoubleBoundController {
        fn describe(meta: &mut MetadataStore<Self>) {
            meta.method(
                "get_pair",
                handler(|_c: Arc<Self>, _args: Arguments| async move { Ok(1) }),
            )
            .from_query(0, "a", IdentityPipe)
            .from_query(0, "b", IdentityPipe);
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_paths_and_inferred_verbs() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        registrar.register(Arc::new(EchoController)).unwrap();

        let endpoints = registrar.endpoints();
        let summary: Vec<(HttpVerb, &str, &str)> = endpoints
            .iter()
            .map(|e| (e.verb, e.path.as_str(), e.method))
            .collect();
        assert_eq!(
            summary,
            vec![
                (HttpVerb::Get, "/api/echo", "get_value"),
                (HttpVerb::Post, "/api/echo", "post_body"),
                (HttpVerb::Get, "/api/echo/items/:value", "lookup"),
                (HttpVerb::Get, "/health", "absolute"),
            ]
        );
        assert!(endpoints.iter().all(|e| e.controller == "EchoController"));
    }

    #[test]
    fn test_unresolvable_verb_aborts_registration() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        let err = registrar
            .register(Arc::new(NamelessVerbController))
            .err()
            .unwrap();
        assert!(matches!(err, DbscopeError::UnresolvableVerb { .. }));
        assert!(registrar.endpoints().is_empty());
    }

    #[test]
    fn test_duplicate_binding_aborts_registration() {
        let mut registrar = RouteRegistrar::new(None);
        let err = registrar
            .register(Arc::new(DoubleBoundController))
            .err()
            .unwrap();
        assert!(matches!(err, DbscopeError::DuplicateBinding { index: 0, .. }));
    }

    #[test]
    fn test_distinct_prefixes_do_not_collide() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        registrar.register(Arc::new(MathController)).unwrap();
        registrar
            .register_with_prefix(Arc::new(MathController), Some("v2"))
            .unwrap();

        let paths: Vec<String> = registrar.endpoints().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/api/math/sum", "/v2/math/sum"]);

        // registering the same controller twice under one prefix collides
        let err = registrar
            .register(Arc::new(MathController))
            .err()
            .unwrap();
        assert!(matches!(err, DbscopeError::DuplicateRoute { .. }));
    }

    #[tokio::test]
    async fn test_query_binding_end_to_end() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        registrar.register(Arc::new(MathController)).unwrap();
        let router = registrar.into_router();

        let (status, body) = send(router, get("/api/math/sum?a=2&b=3")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(5.0));
    }

    #[tokio::test]
    async fn test_path_param_beats_query_end_to_end() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        registrar.register(Arc::new(EchoController)).unwrap();
        let router = registrar.into_router();

        let (status, body) = send(router, get("/api/echo/items/path?value=query")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("path"));
    }

    #[tokio::test]
    async fn test_whole_body_end_to_end() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        registrar.register(Arc::new(EchoController)).unwrap();
        let router = registrar.into_router();

        let request = Request::builder()
            .method("POST")
            .uri("/api/echo")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"a":1,"b":[true]}"#))
            .unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "a": 1, "b": [true] }));
    }

    #[tokio::test]
    async fn test_url_encoded_body() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        registrar.register(Arc::new(EchoController)).unwrap();
        let router = registrar.into_router();

        let request = Request::builder()
            .method("POST")
            .uri("/api/echo")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("name=pg&port=5432"))
            .unwrap();
        let (_, body) = send(router, request).await;
        assert_eq!(body, json!({ "name": "pg", "port": "5432" }));
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_500() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        registrar.register(Arc::new(EchoController)).unwrap();
        let router = registrar.into_router();

        let request = Request::builder()
            .method("POST")
            .uri("/api/echo")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_a_404() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        registrar.register(Arc::new(EchoController)).unwrap();
        let router = registrar.into_router();

        let (status, body) = send(router, get("/api/nothing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Cannot GET /api/nothing" }));
    }

    #[tokio::test]
    async fn test_missing_argument_is_a_500() {
        let mut registrar = RouteRegistrar::new(Some("api"));
        registrar.register(Arc::new(MathController)).unwrap();
        let router = registrar.into_router();

        let (status, body) = send(router, get("/api/math/sum?a=2")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Missing argument at position 1" }));
    }

    #[test]
    fn test_parse_body_defaults_to_empty_object() {
        let headers = HeaderMap::new();
        assert_eq!(parse_body(&headers, b"").unwrap(), json!({}));
        assert_eq!(parse_body(&headers, b"plain text").unwrap(), json!({}));
    }
}
