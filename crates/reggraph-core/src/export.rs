//! # Artifact Export Module
//!
//! The persisted JSON artifact: graph state plus run metadata.
//!
//! Serialization is deterministic. Nodes and edges come out of the store in
//! id order, property maps are `BTreeMap`s, and pretty printing uses a fixed
//! two-space indent with UTF-8 text left unescaped. Identical inputs give
//! byte-identical files.

use crate::graph::Graph;
use crate::pipeline::PipelineContext;
use crate::pipeline::extraction::ExtractionReport;
use crate::pipeline::validation::ValidationReport;
use crate::resolver::ResolverOutput;
use crate::{GraphError, GraphState};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum number of nodes accepted when loading an artifact.
pub const MAX_IMPORT_NODE_COUNT: usize = 1_000_000;

/// Maximum number of edges accepted when loading an artifact.
pub const MAX_IMPORT_EDGE_COUNT: usize = 10_000_000;

// =============================================================================
// ARTIFACT
// =============================================================================

/// Run metadata stored next to the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactMeta {
    pub input_path: String,
    pub validation_report: ValidationReport,
    pub extraction_report: ExtractionReport,
    pub resolver_report: ResolverOutput,
}

impl ArtifactMeta {
    /// Collect the reports of a finished pipeline run.
    #[must_use]
    pub fn from_context(ctx: &PipelineContext) -> Self {
        Self {
            input_path: ctx.input_path.clone(),
            validation_report: ctx.validation.clone().unwrap_or_default(),
            extraction_report: ctx.extraction.clone().unwrap_or_default(),
            resolver_report: ctx.resolver.clone().unwrap_or_default(),
        }
    }
}

/// `{nodes, edges, pending_refs, fz_questions, meta}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(flatten)]
    pub state: GraphState,
    #[serde(default)]
    pub meta: ArtifactMeta,
}

impl Artifact {
    #[must_use]
    pub fn new(state: GraphState, meta: ArtifactMeta) -> Self {
        Self { state, meta }
    }

    /// Serialize as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse an artifact, enforcing the import limits.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let artifact: Self = serde_json::from_str(json)?;
        if artifact.state.nodes.len() > MAX_IMPORT_NODE_COUNT {
            return Err(GraphError::InvalidInput(format!(
                "artifact has {} nodes, limit is {}",
                artifact.state.nodes.len(),
                MAX_IMPORT_NODE_COUNT
            )));
        }
        if artifact.state.edges.len() > MAX_IMPORT_EDGE_COUNT {
            return Err(GraphError::InvalidInput(format!(
                "artifact has {} edges, limit is {}",
                artifact.state.edges.len(),
                MAX_IMPORT_EDGE_COUNT
            )));
        }
        Ok(artifact)
    }

    /// Read and parse an artifact file.
    pub fn read_from(path: &Path) -> Result<Self, GraphError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Write the artifact, creating parent directories as needed.
    pub fn write_to(&self, path: &Path) -> Result<(), GraphError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| GraphError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        let json = self.to_json_pretty()?;
        std::fs::write(path, json)
            .map_err(|e| GraphError::Io(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), "artifact written");
        Ok(())
    }

    /// Rebuild a store from the artifact's graph state.
    pub fn to_graph(&self) -> Result<Graph, GraphError> {
        Graph::from_state(self.state.clone())
    }
}

// =============================================================================
// CRYPTOGRAPHIC HASH
// =============================================================================

/// BLAKE3 hex digest (64 characters) of the artifact's pretty JSON.
///
/// Two artifacts hash equal exactly when their files are byte-identical.
///
/// # Requires
///
/// This function is only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
pub fn artifact_hash(artifact: &Artifact) -> Result<String, GraphError> {
    let json = artifact.to_json_pretty()?;
    Ok(compute_blake3_hash(json.as_bytes()))
}

/// Compute a BLAKE3 hash of raw bytes.
///
/// # Requires
///
/// This function is only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn compute_blake3_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::resolver::ReferenceResolver;
    use crate::types::props;
    use crate::{FzQuestion, Properties};

    fn sample_artifact() -> Artifact {
        let mut graph = Graph::new();
        let section = graph.upsert_node(
            "document_section",
            "app_1:section:app_1.1",
            props([("appendix_id", "app_1"), ("legal_ref", "706-П, приложение 1")]),
        );
        let action = graph.upsert_node(
            "registration_action",
            "action:1",
            props([("name", "Действие")]),
        );
        graph
            .add_edge("RELATED_TO", &action, &section, Properties::new())
            .expect("edge");
        graph.add_pending_reference(action, "см. приложение 1".into(), Properties::new());
        graph.add_fz_question(FzQuestion::new("Вопрос?", "706-П"));
        let resolver_report = ReferenceResolver::default().resolve(&mut graph);

        Artifact::new(
            graph.snapshot(),
            ArtifactMeta {
                input_path: "doc.txt".into(),
                resolver_report,
                ..ArtifactMeta::default()
            },
        )
    }

    #[test]
    fn json_has_top_level_layout() {
        let json = sample_artifact().to_json_pretty().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("value");
        let keys: Vec<_> = value
            .as_object()
            .expect("object")
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["nodes", "edges", "pending_refs", "fz_questions", "meta"]);
        assert_eq!(value["edges"][0]["type"], "RELATED_TO");
        assert_eq!(value["meta"]["input_path"], "doc.txt");
    }

    #[test]
    fn json_keeps_cyrillic_unescaped() {
        let json = sample_artifact().to_json_pretty().expect("json");
        assert!(json.contains("приложение 1"));
        assert!(!json.contains("\\u04"));
        assert!(json.contains("\n  \"nodes\""));
    }

    #[test]
    fn reload_is_lossless() {
        let artifact = sample_artifact();
        let json = artifact.to_json_pretty().expect("json");
        let reloaded = Artifact::from_json(&json).expect("reload");
        assert_eq!(reloaded, artifact);
        assert_eq!(reloaded.to_json_pretty().expect("json"), json);
    }

    #[test]
    fn to_graph_restores_store() {
        let artifact = sample_artifact();
        let graph = artifact.to_graph().expect("graph");
        assert_eq!(graph.snapshot(), artifact.state);
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        assert!(matches!(
            Artifact::from_json("{\"nodes\": 3}"),
            Err(GraphError::Serialization(_))
        ));
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let a = sample_artifact();
        let h1 = artifact_hash(&a).expect("hash");
        let h2 = artifact_hash(&sample_artifact()).expect("hash");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        let mut b = a.clone();
        b.meta.input_path = "other.txt".into();
        assert_ne!(artifact_hash(&b).expect("hash"), h1);
    }
}
