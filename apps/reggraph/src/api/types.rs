//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. The batch
//! request body is `reggraph_core::CandidateBatch` itself.

use reggraph_core::resolver::{ResolverOutput, ResolverSummary};
use reggraph_core::{IngestReport, SessionMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub node_count: usize,
    pub edge_count: usize,
    pub pending_ref_count: usize,
    pub fz_question_count: usize,
    pub placeholder_count: usize,
    pub malformed_count: usize,
    /// Pending references per reason (`unresolved` = never seen by the resolver).
    pub pending_by_reason: BTreeMap<String, usize>,
    pub warning_count: usize,
}

impl StatusResponse {
    pub fn new(metrics: SessionMetrics, warning_count: usize) -> Self {
        Self {
            node_count: metrics.node_count,
            edge_count: metrics.edge_count,
            pending_ref_count: metrics.pending_ref_count,
            fz_question_count: metrics.fz_question_count,
            placeholder_count: metrics.placeholder_count,
            malformed_count: metrics.malformed_count,
            pending_by_reason: metrics.pending_by_reason,
            warning_count,
        }
    }
}

// =============================================================================
// BATCH RESPONSE
// =============================================================================

/// Outcome of `POST /batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    pub report: Option<IngestReport>,
    pub error: Option<String>,
}

impl BatchResponse {
    pub fn success(report: IngestReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// RESOLVE RESPONSE
// =============================================================================

/// Outcome of `POST /resolve`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub summary: ResolverSummary,
    /// Edge ids created or merged by this pass.
    pub edge_ids: Vec<String>,
    pub unresolved_by_reason: BTreeMap<String, usize>,
}

impl From<&ResolverOutput> for ResolveResponse {
    fn from(output: &ResolverOutput) -> Self {
        Self {
            summary: output.summary,
            edge_ids: output
                .resolved_refs
                .iter()
                .map(|r| r.edge_id.to_string())
                .collect(),
            unresolved_by_reason: output
                .unresolved_by_reason()
                .into_iter()
                .map(|(reason, count)| (reason.as_str().to_string(), count))
                .collect(),
        }
    }
}

// =============================================================================
// HASH / ERROR RESPONSES
// =============================================================================

/// BLAKE3 digest of the current artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    pub algorithm: String,
    pub hash: String,
}

impl HashResponse {
    pub fn blake3(hash: String) -> Self {
        Self {
            algorithm: "blake3".to_string(),
            hash,
        }
    }
}

/// Body of every non-batch failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
