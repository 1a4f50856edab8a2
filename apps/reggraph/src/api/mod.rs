//! # reggraph HTTP API Module
//!
//! This module implements the HTTP service using axum. One shared store
//! sits behind a single `RwLock`: batch submission and resolver passes take
//! the write lock, reads see a consistent snapshot.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Store counts and pending references by reason
//! - `POST /batch` - Apply a candidate batch
//! - `POST /resolve` - Run the reference resolver once
//! - `GET /artifact` - Current artifact (graph state plus reports)
//! - `GET /hash` - BLAKE3 hash of the current artifact
//!
//! ## CORS Configuration
//!
//! `REGGRAPH_CORS_ORIGINS` holds a comma-separated list of allowed origins,
//! or "*" for all. Unset means localhost only.

mod handlers;
mod types;

pub use handlers::{
    artifact_handler, batch_handler, hash_handler, health_handler, resolve_handler,
    status_handler,
};
pub use types::{
    BatchResponse, ErrorResponse, HashResponse, HealthResponse, ResolveResponse, StatusResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use reggraph_core::{GraphError, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the graph session.
#[derive(Clone)]
pub struct AppState {
    /// The session containing the graph.
    pub session: Arc<RwLock<Session>>,
}

impl AppState {
    /// Create new app state with a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Environment variable holding the allowed origins.
const CORS_ENV: &str = "REGGRAPH_CORS_ORIGINS";

/// Request bodies above this size are rejected (2 MiB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Origins allowed when nothing is configured.
const LOCALHOST_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
];

/// Parse a comma-separated origin list, dropping entries that are not
/// valid header values.
fn parse_origins(list: &str) -> Vec<HeaderValue> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin, error = %e, "CORS: ignoring invalid origin");
                None
            }
        })
        .collect()
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the CORS layer from `REGGRAPH_CORS_ORIGINS`.
///
/// `*` allows every origin; a list allows exactly those; unset or an
/// unusable list falls back to localhost.
fn build_cors_layer() -> CorsLayer {
    let configured = std::env::var(CORS_ENV).ok();

    if configured.as_deref() == Some("*") {
        tracing::warn!("CORS: allowing ALL origins ({}=*)", CORS_ENV);
        return CorsLayer::permissive();
    }

    let origins = configured.as_deref().map(parse_origins).unwrap_or_default();
    if origins.is_empty() {
        tracing::info!("CORS: no usable {} value, allowing localhost only", CORS_ENV);
        return cors_for(parse_origins(&LOCALHOST_ORIGINS.join(",")));
    }

    tracing::info!(count = origins.len(), "CORS: allowing configured origins");
    cors_for(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - rejects oversized batches
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    // Build base router with routes
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/batch", post(handlers::batch_handler))
        .route("/resolve", post(handlers::resolve_handler))
        .route("/artifact", get(handlers::artifact_handler))
        .route("/hash", get(handlers::hash_handler))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server; returns after Ctrl+C once in-flight requests finish.
pub async fn run_server(addr: &str, session: Session) -> Result<(), GraphError> {
    let state = AppState::new(session);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GraphError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("reggraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GraphError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// =============================================================================
// TESTS
// =============================================================================
