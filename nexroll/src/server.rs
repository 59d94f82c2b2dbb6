use anyhow::{Context, Result};
use tracing::info;

use nexroll_api::AppState;

/// Serve the HTTP API until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let address = format!(
        "{}:{}",
        state.config.server.host, state.config.server.http_port
    );
    let router = nexroll_api::create_router(state);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("HTTP API listening on {address}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;
    Ok(())
}
