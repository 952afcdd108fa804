mod config;
mod demo;
mod groq;
mod models;
mod normalize;
mod routes;

use anyhow::Context;
use routes::{router, AppState};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::groq::GroqClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env();
    if config.demo_mode {
        tracing::info!("🎭 Demo mode enabled: serving canned ingredients and meals");
    } else if config.api_key.is_none() {
        tracing::warn!("GROQ_API_KEY is not set; provider calls will fail until it is");
    } else {
        tracing::info!("Using API key: {}", config.masked_api_key());
    }

    let state = AppState {
        llm: Arc::new(GroqClient::new(&config)),
        config: Arc::new(config.clone()),
    };
    let app = router(state);

    let addr = SocketAddr::from(([0,0,0,0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down");
}
