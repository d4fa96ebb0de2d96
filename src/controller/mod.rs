//! Controller-based routing.
//!
//! A controller is a plain type whose handler methods are described in a
//! [`MetadataStore`]. The [`RouteRegistrar`] reads that description and
//! installs one axum route per handler method.
//!
//! ```rust,ignore
//! pub struct CalculatorController;
//!
//! impl Controller for CalculatorController {
//!     fn describe(meta: &mut MetadataStore<Self>) {
//!         meta.set_controller_route("calculator");
//!         meta.method("add", handler(|c: Arc<Self>, args: Arguments| async move {
//!             c.add(args.require(0)?, args.require(1)?).await
//!         }))
//!         .get("add")
//!         .from_query(0, "a", ParseNumberPipe)
//!         .from_query(1, "b", ParseNumberPipe);
//!     }
//! }
//! ```

pub mod binding;
pub mod metadata;
pub mod registrar;
pub mod route;
pub mod verb;

pub use binding::{ArgumentBinder, Arguments, ParamBinding, ParamSource, RequestValues};
pub use metadata::{Handler, HandlerFuture, MetadataStore, MethodBuilder, MethodRoute, handler};
pub use registrar::{RegisteredEndpoint, RouteRegistrar};
pub use route::{RoutePattern, compute_route};
pub use verb::{HttpVerb, verb_from_method_name};

/// A type whose handler methods are exposed over HTTP.
pub trait Controller: Send + Sync + Sized + 'static {
    /// Records the controller's routing facts.
    fn describe(meta: &mut MetadataStore<Self>);

    /// Name used in logs and registration errors.
    fn name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Builds the metadata store for this controller.
    fn metadata() -> MetadataStore<Self> {
        let mut meta = MetadataStore::new(Self::name());
        Self::describe(&mut meta);
        meta
    }
}
