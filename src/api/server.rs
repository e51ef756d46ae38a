//! Server setup: router, shared state and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers;
use crate::config::Config;
use crate::invoice::InvoiceEngine;

/// Shared application state
pub struct AppState {
    pub version: String,
    /// Immutable engine shared by all requests
    pub engine: Arc<InvoiceEngine>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(engine: InvoiceEngine, max_upload_bytes: usize) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            engine: Arc::new(engine),
            max_upload_bytes,
        }
    }
}

/// Builds the service routes. Upload bodies above `max_upload_bytes` are
/// rejected with 413.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/v1/upload", post(handlers::upload).layer(upload_limit))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server until Ctrl+C or SIGTERM
pub async fn run_api_server(config: Config) -> anyhow::Result<()> {
    let engine = config.engine()?;
    let state = Arc::new(AppState::new(engine, config.max_upload_bytes));
    let app = router(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Invoice sheet service starting on http://{}", addr);
    info!("   Endpoint: POST /api/v1/upload (match policy: {})", config.match_policy);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Invoice sheet service shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", error);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!("Failed to install SIGTERM handler: {}", error);
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

    info!("Shutdown signal received, stopping server...");
}
