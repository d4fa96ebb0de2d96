//! Application lifecycle
//!
//! ```text
//! 1. Configuration loading
//!    ↓
//! 2. Controller registration      ← startup-fatal errors abort here
//!    ↓
//! 3. Server start
//!    ↓
//! [Running...]
//!    ↓
//! 4. Shutdown signal (SIGTERM/SIGINT)
//!    ↓
//! 5. In-flight requests drained, server stop
//! ```

mod application;
mod shutdown;

pub use application::{Application, ApplicationBuilder};
pub use shutdown::shutdown_signal;
