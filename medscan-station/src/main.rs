//! MedScan Station - Main entry point
//!
//! Diagnostic review station: image intake, inference against an external
//! backend, feedback capture, and durable training comments with live
//! fan-out over SSE.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use medscan_common::config::StationConfig;
use medscan_station::{api, store, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for medscan-station
#[derive(Parser, Debug)]
#[command(name = "medscan-station")]
#[command(about = "Diagnostic review station for MedScan")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "MEDSCAN_PORT")]
    port: Option<u16>,

    /// Root folder for the database and stored attachments
    #[arg(short, long, env = "MEDSCAN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, env = "MEDSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Inference backend base URL
    #[arg(long, env = "MEDSCAN_BACKEND_URL")]
    backend_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medscan_station=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Config file first, then CLI/env overrides on top
    let mut config = StationConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(backend_url) = args.backend_url {
        config.inference.base_url = backend_url;
    }

    info!("Starting MedScan Station on port {}", config.port);
    info!("Data folder: {}", config.data_dir.display());
    info!("Inference backend: {}", config.inference.base_url);

    std::fs::create_dir_all(&config.data_dir).context("Failed to create data folder")?;

    // mode=rwc: create the database file on first run
    let db_url = format!("sqlite://{}?mode=rwc", config.database_path().display());
    let pool = SqlitePoolOptions::new()
        .connect(&db_url)
        .await
        .context("Failed to open database")?;
    store::ensure_schema(&pool)
        .await
        .context("Failed to initialize database schema")?;
    info!("Database ready: {}", config.database_path().display());

    let port = config.port;
    let state = AppState::new(config, pool).context("Failed to initialize station state")?;
    let app = api::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
