//! Race Game Server - Authoritative server for a toy multiplayer racing game
//!
//! This is the main entry point for the race server. It handles:
//! - Loading the car and track catalog from a JSON data file
//! - HTTP endpoints for creating, starting and steering races
//! - One tick loop per running race

mod app;
mod catalog;
mod config;
mod game;
mod http;
mod util;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::init_server_time;

/// How often idle limiter state and expired finished races are dropped
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Race Game Server");
    info!("Server address: {}", config.server_addr);

    // Load reference data
    let catalog = Catalog::from_json_file(&config.data_file)?;

    // Create application state
    let state = AppState::new(config.clone(), catalog);

    // Periodically forget limiter state for quiet races and drop old finished races
    let limiter = state.accelerate_limiter.clone();
    let registry = state.race_registry.clone();
    let retention = config.finished_race_retention;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            interval.tick().await;
            limiter.prune();
            registry.evict_finished(retention);
        }
    });

    let race_registry = state.race_registry.clone();

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop race loops before exiting
    race_registry.finish_all().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
