//! # dbscope
//!
//! A small PostgreSQL administration API built on axum.
//!
//! Controllers are plain types that describe their routes in a
//! [`MetadataStore`](controller::MetadataStore): a prefix, the verb and
//! sub-route of each handler method, and where each handler argument comes
//! from. The [`RouteRegistrar`](controller::RouteRegistrar) turns those
//! descriptions into axum routes, so a controller never touches the router.
//!
//! ## Endpoints
//!
//! - `GET  /api/db/connection` lists connection profiles
//! - `GET  /api/db/tables/:schema?.:table?` returns table and column metadata
//! - `GET  /api/db/routines/:schema?.:routine?` returns routine and parameter metadata
//! - `POST /api/db/execute` runs a SQL batch, one result per statement
//! - `GET  /api/calculator/add?a=&b=` adds two numbers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dbscope::prelude::*;
//! use dbscope::db::ProfileConnector;
//! use dbscope::modules::{CalculatorController, DbController};
//!
//! #[tokio::main]
//! async fn main() -> dbscope::Result<()> {
//!     let connector = Arc::new(ProfileConnector::new("."));
//!
//!     Application::builder()
//!         .controller(Arc::new(DbController::new(connector)))
//!         .controller(Arc::new(CalculatorController))
//!         .build()?
//!         .serve()
//!         .await
//! }
//! ```

pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod exception;
pub mod interceptor;
pub mod lifecycle;
pub mod logging;
pub mod modules;
pub mod pipe;

pub use error::{DbscopeError, Result};

pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use dbscope::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigService, ConnectionProfile, ServerConfig};
    pub use crate::controller::{
        Arguments, Controller, HttpVerb, MetadataStore, RouteRegistrar, handler,
    };
    pub use crate::db::{DbClient, DbConnector};
    pub use crate::error::{DbscopeError, Result};
    pub use crate::exception::ExceptionFilter;
    pub use crate::interceptor::{Interceptor, InterceptorResult, Next};
    pub use crate::lifecycle::{Application, ApplicationBuilder, shutdown_signal};
    pub use crate::pipe::builtins::*;
    pub use crate::pipe::{Pipe, PipeError, PipeResult};
    pub use async_trait::async_trait;
    pub use axum::{
        Json, Router,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    pub use std::sync::Arc;
}
