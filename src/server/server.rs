use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState, SubmissionLimits};
use super::ws;
use crate::floop_config::FloopConfig;
use crate::store::{StoreHandle, WorkOrderStore};

/// Configuration for `floop serve`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `""` or `/segment`.
    pub route_prefix: String,
    pub storage_path: PathBuf,
    pub limits: SubmissionLimits,
    pub cors: bool,
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3142,
            route_prefix: "/_feedback".to_string(),
            storage_path: PathBuf::from("storage/feedback"),
            limits: SubmissionLimits::default(),
            cors: false,
            open_browser: false,
        }
    }
}

impl From<&FloopConfig> for ServerConfig {
    fn from(config: &FloopConfig) -> Self {
        Self {
            host: config.toml.server.host.clone(),
            port: config.toml.server.port,
            route_prefix: config.route_prefix(),
            storage_path: config.storage_path().to_path_buf(),
            limits: SubmissionLimits::from(config),
            cors: config.toml.server.cors,
            open_browser: false,
        }
    }
}

/// Build the full application router: JSON API plus the event WebSocket.
pub fn build_router(state: Arc<AppState>, prefix: &str) -> Router {
    let ws_tx = state.ws_tx.clone();

    api::api_router(prefix, &state.limits)
        .route(
            &format!("{}/ws", prefix),
            get(move |ws_upgrade| ws::ws_handler_with_sender(ws_upgrade, ws_tx)),
        )
        .with_state(state)
}

/// Start the feedback server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let store = WorkOrderStore::open(&config.storage_path).with_context(|| {
        format!("Failed to open feedback storage at {}", config.storage_path.display())
    })?;
    let (ws_tx, _rx) = broadcast::channel::<String>(256);

    let state = Arc::new(AppState {
        store: StoreHandle::new(store),
        ws_tx,
        limits: config.limits.clone(),
    });

    let mut app = build_router(state, &config.route_prefix);
    if config.cors {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    let url = format!("http://{}{}", local_addr, config.route_prefix);
    println!("Floop feedback API running at {}", url);
    tracing::info!(addr = %local_addr, prefix = %config.route_prefix, storage = %config.storage_path.display(), "server started");

    if config.open_browser
        && let Err(e) = open::that(&url)
    {
        tracing::warn!(error = %e, "failed to open browser");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
