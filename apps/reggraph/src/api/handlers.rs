//! # API Endpoint Handlers
//!
//! Mutating handlers (`/batch`, `/resolve`) take the write lock for the
//! whole mutation and refresh the validation report before releasing it,
//! so `/artifact` always carries a report matching its graph.

use super::{
    AppState,
    types::{
        BatchResponse, ErrorResponse, HashResponse, HealthResponse, ResolveResponse,
        StatusResponse,
    },
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use reggraph_core::{Artifact, CandidateBatch, GraphError, artifact_hash};

/// HTTP status for a core error.
fn status_for(error: &GraphError) -> StatusCode {
    match error {
        GraphError::InvalidInput(_)
        | GraphError::DanglingReference { .. }
        | GraphError::MissingProperty { .. } => StatusCode::BAD_REQUEST,
        GraphError::DuplicateId(_) | GraphError::Serialization(_) | GraphError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Current store counts.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let response = StatusResponse::new(session.metrics(), session.validation().warnings.len());
    (StatusCode::OK, Json(response))
}

// =============================================================================
// BATCH HANDLER
// =============================================================================

/// Apply one candidate batch.
///
/// Malformed candidates do not fail the request; they are listed in the
/// returned report.
pub async fn batch_handler(
    State(state): State<AppState>,
    Json(batch): Json<CandidateBatch>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.submit_batch(&batch) {
        Ok(report) => {
            session.validate();
            tracing::info!(
                nodes = report.nodes_upserted,
                edges = report.edges_added,
                references = report.references_added,
                placeholders = report.placeholders.len(),
                malformed = report.malformed.len(),
                "batch applied"
            );
            (StatusCode::OK, Json(BatchResponse::success(report)))
        }
        Err(e) => (
            status_for(&e),
            Json(BatchResponse::error(format!("Batch rejected: {}", e))),
        ),
    }
}

// =============================================================================
// RESOLVE HANDLER
// =============================================================================

/// Run one resolver pass over the pending references.
pub async fn resolve_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.write().await;
    let response = ResolveResponse::from(session.resolve());
    session.validate();
    (StatusCode::OK, Json(response))
}

// =============================================================================
// ARTIFACT / HASH HANDLERS
// =============================================================================

/// The current artifact, in the same shape as the file `run` writes.
pub async fn artifact_handler(State(state): State<AppState>) -> Json<Artifact> {
    let session = state.session.read().await;
    Json(session.artifact())
}

/// BLAKE3 hash of the current artifact.
pub async fn hash_handler(
    State(state): State<AppState>,
) -> Result<Json<HashResponse>, (StatusCode, Json<ErrorResponse>)> {
    let session = state.session.read().await;
    artifact_hash(&session.artifact())
        .map(|hash| Json(HashResponse::blake3(hash)))
        .map_err(|e| {
            tracing::error!("Hash failed: {}", e);
            (
                status_for(&e),
                Json(ErrorResponse {
                    error: format!("Hash failed: {}", e),
                }),
            )
        })
}
