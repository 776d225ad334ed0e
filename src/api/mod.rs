//! Babble HTTP Surface
//!
//! The thin layer between the network and the broadcast hub, built with
//! Axum.
//!
//! # Endpoints
//!
//! - `GET /` - the embedded chat page
//! - `GET /room` - WebSocket upgrade for a chat session
//! - `GET /health` - process status, active session count, uptime
//!
//! # Example
//!
//! ```rust,ignore
//! use babble::api::{serve, AppState};
//! use babble::config::Config;
//! use babble::hub::Hub;
//! use babble::trace;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let (hub, _task) = Hub::spawn(config.hub.clone(), trace::off());
//!     let server = config.server.clone();
//!     serve(AppState::new(hub, config), &server).await?;
//!     Ok(())
//! }
//! ```

pub mod ws;

use axum::{
    extract::State,
    response::Html,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{Config, ServerConfig};
use crate::hub::HubHandle;

/// Shared application state for all handlers
pub struct AppState {
    /// Handle for signalling the broadcast hub
    pub hub: HubHandle,
    /// Process configuration
    pub config: Config,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(hub: HubHandle, config: Config) -> Self {
        Self {
            hub,
            config,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Errors from the server layer
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(chat_page))
        .route("/room", get(ws::chat_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the server
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), ServerError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!("Babble listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("Babble shut down gracefully");
    Ok(())
}

/// GET /
///
/// The chat client page, compiled into the binary.
async fn chat_page() -> Html<&'static str> {
    Html(include_str!("../../assets/chat.html"))
}

/// Health status payload
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    sessions: usize,
    uptime_seconds: u64,
    version: &'static str,
}

/// GET /health
///
/// Reports whether the hub loop is still answering, and how many sessions
/// it currently holds.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, sessions) = match state.hub.session_count().await {
        Ok(count) => ("ok", count),
        Err(_) => ("hub_stopped", 0),
    };

    Json(HealthResponse {
        status,
        sessions,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Wait for shutdown signal
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
