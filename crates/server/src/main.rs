//! Hirewise server - recruitment analytics over HTTP
//!
//! Opens the engine over the configured data directory, restores the last
//! trained model bundle and serves the query API.

use anyhow::{Context, Result};
use hirewise_lib::InsightsEngine;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = SERVER_VERSION, "Starting hirewise-server");

    let config = config::ServerConfig::load()?;
    info!(
        instance = %config.instance_name,
        data_dir = %config.engine.data_dir.display(),
        "Server configured"
    );

    let engine_config = config.engine.clone();
    let engine = tokio::task::spawn_blocking(move || InsightsEngine::open(engine_config))
        .await
        .context("Engine startup task failed")??;
    let status = engine.get_ml_status();
    info!(
        is_trained = status.is_trained,
        model_version = status.version,
        uploads = engine.list_uploads().len(),
        "Engine ready"
    );

    let app_state = Arc::new(api::AppState::new(Arc::new(engine)));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        config.max_upload_bytes,
    ));

    tokio::select! {
        result = api_handle => {
            result.context("API server task failed")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
