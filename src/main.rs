//! Application entry point and server initialization
//!
//! - Loads environment configuration
//! - Opens the store on its redb file
//! - Starts the HTTP server with graceful shutdown support

use dotenvy::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ttl_shortener::config::Config;
use ttl_shortener::route::create_app;
use ttl_shortener::storage::RedbStorage;
use ttl_shortener::store::{spawn_expiry_sweeper, AppState, UrlStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ttl_shortener=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env();

    let storage = Arc::new(RedbStorage::open_or_recover(&config.database_path)?);
    let locator = config.location_provider();
    info!(provider = locator.name(), "Location provider ready");

    let store = UrlStore::open(storage, config.store_options()).with_location_provider(locator);
    let state = AppState::new(store);

    if let Some(every) = config.sweep_interval {
        info!(interval_secs = every.as_secs(), "Expiry sweeper enabled");
        spawn_expiry_sweeper(state.store.clone(), every);
    }

    let app = create_app(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(%addr, base_url = %config.base_url, database = %config.database_path, "Server running");

    // The server keeps running until it receives SIGTERM or SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
///
/// In-flight requests finish before the process exits, so no store write is
/// cut off halfway.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server");
}
