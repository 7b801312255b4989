//! # sakay-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the dispatch engine. Configuration comes
//! from the environment; see [`sakay_api::config`].

use anyhow::Context;

use sakay_api::config::AppConfig;
use sakay_api::{bootstrap, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    telemetry::init_tracing(config.log_format);

    let metrics = telemetry::install_prometheus().context("installing Prometheus recorder")?;
    let engine = bootstrap::build_engine(&config).map_err(|e| {
        tracing::error!("Bootstrap failed: {e}");
        e
    })?;
    let state = AppState::new(engine).with_metrics(metrics);
    let app = sakay_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        offer_window_secs = config.offer_window.as_secs(),
        "Sakay API listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
