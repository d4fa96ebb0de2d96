//! dbscope - PostgreSQL administration API server.

use clap::Parser;
use dbscope::config::ServerConfig;
use dbscope::db::ProfileConnector;
use dbscope::lifecycle::Application;
use dbscope::logging::init_logging;
use dbscope::modules::{CalculatorController, DbController};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = ServerConfig::parse();
    tracing::info!(
        "Reading connection profiles from {}",
        config.config_dir.display()
    );
    let connector = Arc::new(ProfileConnector::new(config.config_dir.clone()));

    let app = Application::builder()
        .config(config)
        .controller(Arc::new(DbController::new(connector)))
        .controller(Arc::new(CalculatorController))
        .build()?;

    app.serve().await?;
    Ok(())
}
