//! # reggraph-core
//!
//! The deterministic graph engine for reggraph.
//!
//! This crate builds an identity-stable labeled property graph from
//! regulatory text: every node and edge gets an id that is a pure function
//! of its natural key, so repeated runs over the same input produce the
//! same graph, byte for byte.
//!
//! ## Layout
//!
//! - `types`, `primitives`: data model and fixed vocabulary
//! - `identity`, `graph`: fingerprinting and the merge-safe store
//! - `domain`: document schema helpers (sections, groups, fields)
//! - `resolver`: free-text citations into `REFERENCES` edges
//! - `ingestor`: candidate batches into store mutations
//! - `pipeline`: the five-phase document pipeline
//! - `export`, `session`: artifacts and the long-lived handle
//!
//! ## Constraints
//!
//! - Synchronous and single-writer; callers serialize mutations
//! - No network access
//! - `BTreeMap` everywhere ordering is observable

// =============================================================================
// MODULES
// =============================================================================

pub mod domain;
pub mod export;
pub mod graph;
pub mod identity;
pub mod ingestor;
pub mod pipeline;
pub mod primitives;
pub mod resolver;
pub mod session;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Edge, EdgeId, EndpointRole, FzQuestion, GraphError, GraphState, Node, NodeId,
    PendingReference, Properties, PropertyValue, UnresolvedReason,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use domain::DocumentSchema;
pub use export::{Artifact, ArtifactMeta};
pub use graph::{Graph, GraphStore};
pub use identity::IdentityRegistry;
pub use ingestor::{CandidateBatch, IngestReport, Ingestor};
pub use resolver::{ReferenceResolver, ResolverConfig, ResolverOutput};
pub use session::{Session, SessionMetrics};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use pipeline::extraction::{Extractor, ScriptedExtractor};
pub use pipeline::{Pipeline, PipelineContext, PipelineInput};

#[cfg(feature = "crypto-hash")]
pub use export::artifact_hash;
