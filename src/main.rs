use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use guardian_server::api;
use guardian_server::config::Config;
use guardian_server::shutdown::shutdown_signal;
use guardian_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_default()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::build(config)?;
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("bind {bind_addr}"))?;
    info!(addr = %bind_addr, "guardian server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
