mod migrations;
mod server;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use nexroll_api::AppState;
use nexroll_core::{
    bootstrap::{init_database, init_services, load_config},
    logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (validated on load)
    let config = Arc::new(load_config()?);

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("NeXroll engine starting...");
    info!(
        "HTTP address: {}:{}",
        config.server.host, config.server.http_port
    );

    // 3. Database + migrations
    let pool = init_database(&config).await?;
    migrations::run_migrations(&pool).await?;

    // 4. Wire services and start the decision engine
    let services = init_services(pool, Arc::clone(&config));
    Arc::clone(&services.engine).start();

    let state = AppState {
        config: Arc::clone(&config),
        repos: services.repos.clone(),
        engine: Arc::clone(&services.engine),
    };

    // 5. Serve until ctrl-c; the engine drains its current tick on stop
    let engine = Arc::clone(&services.engine);
    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        engine.stop();
    };
    server::serve(state, shutdown).await?;

    info!("NeXroll engine stopped");
    Ok(())
}
