//! # Ingestor Module
//!
//! Candidate batch validation and ingestion for the reggraph core.
//!
//! - Validate candidates before graph mutation
//! - Skip malformed candidates, but count and log every one
//! - Auto-vivify endpoints that were referenced but never declared
//! - No semantic inference or enrichment

use crate::graph::GraphStore;
use crate::identity::node_id_for;
use crate::primitives::{
    DEFAULT_LEGAL_REF, EDGE_RELATED_TO, MAX_BATCH_CANDIDATES, MAX_NATURAL_KEY_LENGTH,
    NODE_EXTRACTED_ENTITY,
};
use crate::{FzQuestion, GraphError, NodeId, PropertyValue, Properties};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// CANDIDATES
// =============================================================================

fn default_node_type() -> String {
    NODE_EXTRACTED_ENTITY.to_string()
}

fn default_edge_type() -> String {
    EDGE_RELATED_TO.to_string()
}

/// A node an upstream producer believes exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCandidate {
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    #[serde(default)]
    pub natural_key: String,
    #[serde(default)]
    pub properties: Properties,
}

/// An edge between two natural keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCandidate {
    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,
    #[serde(default)]
    pub source_natural_key: String,
    #[serde(default)]
    pub target_natural_key: String,
    #[serde(default)]
    pub properties: Properties,
}

/// A citation attached to a natural key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceCandidate {
    pub source_natural_key: String,
    pub ref_text: String,
    pub context: Properties,
}

/// One unit of producer output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateBatch {
    pub nodes: Vec<NodeCandidate>,
    pub edges: Vec<EdgeCandidate>,
    pub references: Vec<ReferenceCandidate>,
    pub fz_questions: Vec<FzQuestion>,
}

impl CandidateBatch {
    /// Total number of candidates of every kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len() + self.references.len() + self.fz_questions.len()
    }

    /// Whether the batch carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append another batch, keeping order.
    pub fn extend(&mut self, other: CandidateBatch) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
        self.references.extend(other.references);
        self.fz_questions.extend(other.fz_questions);
    }
}

// =============================================================================
// MALFORMED CANDIDATES
// =============================================================================

/// Which list a malformed candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Node,
    Edge,
    Reference,
}

/// Why a candidate was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    MissingNaturalKey,
    MissingSourceKey,
    MissingTargetKey,
    MissingRefText,
    KeyTooLong,
}

/// A skipped candidate: its list, position and reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedCandidate {
    pub kind: CandidateKind,
    pub index: usize,
    pub reason: MalformedReason,
}

impl fmt::Display for MalformedCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}]: {:?}", self.kind, self.index, self.reason)
    }
}

fn check_key(key: &str, missing: MalformedReason) -> Option<MalformedReason> {
    let key = key.trim();
    if key.is_empty() {
        Some(missing)
    } else if key.len() > MAX_NATURAL_KEY_LENGTH {
        Some(MalformedReason::KeyTooLong)
    } else {
        None
    }
}

// =============================================================================
// INGEST REPORT
// =============================================================================

/// What one or more `Ingestor::apply` calls did to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestReport {
    pub nodes_upserted: usize,
    pub edges_added: usize,
    pub references_added: usize,
    pub fz_questions_added: usize,
    /// Natural keys that got an `extracted_entity` placeholder.
    pub placeholders: Vec<String>,
    pub malformed: Vec<MalformedCandidate>,
}

impl IngestReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: IngestReport) {
        self.nodes_upserted += other.nodes_upserted;
        self.edges_added += other.edges_added;
        self.references_added += other.references_added;
        self.fz_questions_added += other.fz_questions_added;
        self.placeholders.extend(other.placeholders);
        self.malformed.extend(other.malformed);
    }
}

// =============================================================================
// INGESTOR
// =============================================================================

/// The Ingestor turns candidate batches into store mutations.
///
/// The Ingestor:
/// - Resolves natural keys to ids through `upsert_node`
/// - Never lets a malformed candidate abort the batch
/// - Creates placeholders instead of dangling edges
pub struct Ingestor;

impl Ingestor {
    /// Reject batches above `MAX_BATCH_CANDIDATES` before touching the store.
    pub fn check_size(batch: &CandidateBatch) -> Result<(), GraphError> {
        if batch.len() > MAX_BATCH_CANDIDATES {
            return Err(GraphError::InvalidInput(format!(
                "batch of {} candidates exceeds the limit of {}",
                batch.len(),
                MAX_BATCH_CANDIDATES
            )));
        }
        Ok(())
    }

    /// List every malformed candidate in the batch.
    ///
    /// A candidate is malformed if:
    /// - a node has no natural key
    /// - an edge has no source or no target key
    /// - a reference has no source key or no ref text
    /// - any of those keys exceeds `MAX_NATURAL_KEY_LENGTH`
    #[must_use]
    pub fn validate(batch: &CandidateBatch) -> Vec<MalformedCandidate> {
        let mut malformed = Vec::new();
        let mut push = |kind, index, reason: Option<MalformedReason>| {
            if let Some(reason) = reason {
                malformed.push(MalformedCandidate {
                    kind,
                    index,
                    reason,
                });
            }
        };

        for (index, node) in batch.nodes.iter().enumerate() {
            push(
                CandidateKind::Node,
                index,
                check_key(&node.natural_key, MalformedReason::MissingNaturalKey),
            );
        }
        for (index, edge) in batch.edges.iter().enumerate() {
            push(
                CandidateKind::Edge,
                index,
                check_key(&edge.source_natural_key, MalformedReason::MissingSourceKey)
                    .or_else(|| {
                        check_key(&edge.target_natural_key, MalformedReason::MissingTargetKey)
                    }),
            );
        }
        for (index, reference) in batch.references.iter().enumerate() {
            let reason =
                check_key(&reference.source_natural_key, MalformedReason::MissingSourceKey)
                    .or_else(|| {
                        reference
                            .ref_text
                            .trim()
                            .is_empty()
                            .then_some(MalformedReason::MissingRefText)
                    });
            push(CandidateKind::Reference, index, reason);
        }

        malformed
    }

    /// Apply a batch to any graph store.
    ///
    /// Order: nodes, edges, references, fz questions. Endpoints and sources
    /// are looked up among the batch's own declared nodes; unknown keys get
    /// an `extracted_entity` placeholder `{name, legal_ref}`.
    pub fn apply<G: GraphStore>(
        graph: &mut G,
        batch: &CandidateBatch,
    ) -> Result<IngestReport, GraphError> {
        Self::check_size(batch)?;

        let malformed = Self::validate(batch);
        for item in &malformed {
            tracing::warn!(
                kind = ?item.kind,
                index = item.index,
                reason = ?item.reason,
                "malformed candidate skipped"
            );
        }
        let is_malformed = |kind: CandidateKind, index: usize| {
            malformed
                .iter()
                .any(|m| m.kind == kind && m.index == index)
        };

        let mut report = IngestReport::default();
        let mut keys: BTreeMap<String, NodeId> = BTreeMap::new();

        for (index, node) in batch.nodes.iter().enumerate() {
            if is_malformed(CandidateKind::Node, index) {
                continue;
            }
            let natural_key = node.natural_key.trim();
            let node_type = match node.node_type.trim() {
                "" => NODE_EXTRACTED_ENTITY,
                t => t,
            };
            let id = graph.upsert_node(node_type, natural_key, node.properties.clone());
            keys.insert(natural_key.to_string(), id);
            report.nodes_upserted += 1;
        }

        for (index, edge) in batch.edges.iter().enumerate() {
            if is_malformed(CandidateKind::Edge, index) {
                continue;
            }
            let legal_ref = legal_ref_of(&edge.properties);
            let source = ensure_node(
                graph,
                &mut keys,
                &mut report,
                &edge.source_natural_key,
                &legal_ref,
            );
            let target = ensure_node(
                graph,
                &mut keys,
                &mut report,
                &edge.target_natural_key,
                &legal_ref,
            );
            let edge_type = match edge.edge_type.trim() {
                "" => EDGE_RELATED_TO,
                t => t,
            };
            graph.add_edge(edge_type, &source, &target, edge.properties.clone())?;
            report.edges_added += 1;
        }

        for (index, reference) in batch.references.iter().enumerate() {
            if is_malformed(CandidateKind::Reference, index) {
                continue;
            }
            let legal_ref = legal_ref_of(&reference.context);
            let source = ensure_node(
                graph,
                &mut keys,
                &mut report,
                &reference.source_natural_key,
                &legal_ref,
            );
            graph.add_pending_reference(
                source,
                reference.ref_text.clone(),
                reference.context.clone(),
            );
            report.references_added += 1;
        }

        for question in &batch.fz_questions {
            graph.add_fz_question(question.clone());
            report.fz_questions_added += 1;
        }

        report.malformed = malformed;
        tracing::debug!(
            nodes = report.nodes_upserted,
            edges = report.edges_added,
            references = report.references_added,
            placeholders = report.placeholders.len(),
            malformed = report.malformed.len(),
            "candidate batch applied"
        );
        Ok(report)
    }
}

fn legal_ref_of(properties: &Properties) -> String {
    match properties.get("legal_ref") {
        None | Some(PropertyValue::Null) => DEFAULT_LEGAL_REF.to_string(),
        Some(value) => value.to_string(),
    }
}

fn ensure_node<G: GraphStore>(
    graph: &mut G,
    keys: &mut BTreeMap<String, NodeId>,
    report: &mut IngestReport,
    natural_key: &str,
    legal_ref: &str,
) -> NodeId {
    let natural_key = natural_key.trim();
    if let Some(id) = keys.get(natural_key) {
        return id.clone();
    }

    let existed = graph.contains_node(&node_id_for(NODE_EXTRACTED_ENTITY, natural_key));
    let mut properties = Properties::new();
    properties.insert("name".into(), natural_key.into());
    properties.insert("legal_ref".into(), legal_ref.into());
    let id = graph.upsert_node(NODE_EXTRACTED_ENTITY, natural_key, properties);
    keys.insert(natural_key.to_string(), id.clone());

    // A placeholder from an earlier batch is reused, not reported again.
    if !existed {
        tracing::warn!(natural_key, node_id = %id, "undeclared natural key, placeholder created");
        report.placeholders.push(natural_key.to_string());
    }
    id
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::types::props;

    fn node(node_type: &str, key: &str) -> NodeCandidate {
        NodeCandidate {
            node_type: node_type.into(),
            natural_key: key.into(),
            properties: props([("name", key), ("legal_ref", "706-П")]),
        }
    }

    fn edge(source: &str, target: &str) -> EdgeCandidate {
        EdgeCandidate {
            edge_type: "REQUIRES".into(),
            source_natural_key: source.into(),
            target_natural_key: target.into(),
            properties: props([("legal_ref", "706-П, гл. 2")]),
        }
    }

    #[test]
    fn deserialize_applies_type_defaults() {
        let batch: CandidateBatch = serde_json::from_str(
            r#"{
                "nodes": [{"natural_key": "k"}],
                "edges": [{"source_natural_key": "a", "target_natural_key": "b"}]
            }"#,
        )
        .expect("batch");
        assert_eq!(batch.nodes[0].node_type, NODE_EXTRACTED_ENTITY);
        assert_eq!(batch.edges[0].edge_type, EDGE_RELATED_TO);
        assert!(batch.references.is_empty());
    }

    #[test]
    fn validate_lists_every_malformed_candidate() {
        let batch = CandidateBatch {
            nodes: vec![node("document", ""), node("document", "ok")],
            edges: vec![edge("a", " "), edge("", "b")],
            references: vec![ReferenceCandidate {
                source_natural_key: "a".into(),
                ref_text: "  ".into(),
                context: Properties::new(),
            }],
            fz_questions: Vec::new(),
        };

        let malformed = Ingestor::validate(&batch);
        let reasons: Vec<_> = malformed.iter().map(|m| (m.kind, m.index, m.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (CandidateKind::Node, 0, MalformedReason::MissingNaturalKey),
                (CandidateKind::Edge, 0, MalformedReason::MissingTargetKey),
                (CandidateKind::Edge, 1, MalformedReason::MissingSourceKey),
                (CandidateKind::Reference, 0, MalformedReason::MissingRefText),
            ]
        );
    }

    #[test]
    fn overlong_key_is_malformed() {
        let batch = CandidateBatch {
            nodes: vec![node("document", &"k".repeat(MAX_NATURAL_KEY_LENGTH + 1))],
            ..CandidateBatch::default()
        };
        assert_eq!(
            Ingestor::validate(&batch)[0].reason,
            MalformedReason::KeyTooLong
        );
    }

    #[test]
    fn apply_skips_malformed_and_keeps_the_rest() {
        let mut graph = Graph::new();
        let batch = CandidateBatch {
            nodes: vec![node("document", ""), node("document", "doc")],
            ..CandidateBatch::default()
        };

        let report = Ingestor::apply(&mut graph, &batch).expect("apply");
        assert_eq!(report.nodes_upserted, 1);
        assert_eq!(report.malformed.len(), 1);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn placeholder_is_reported_once_across_batches() {
        let mut graph = Graph::new();
        let batch = CandidateBatch {
            nodes: vec![node("registration_action", "action:1")],
            edges: vec![edge("action:1", "issuer")],
            ..CandidateBatch::default()
        };

        let first = Ingestor::apply(&mut graph, &batch).expect("first");
        let second = Ingestor::apply(&mut graph, &batch).expect("second");
        assert_eq!(first.placeholders, vec!["issuer".to_string()]);
        assert!(second.placeholders.is_empty());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn apply_auto_vivifies_undeclared_endpoints() {
        let mut graph = Graph::new();
        let batch = CandidateBatch {
            nodes: vec![node("registration_action", "action:1")],
            edges: vec![edge("action:1", "issuer"), edge("issuer", "action:1")],
            ..CandidateBatch::default()
        };

        let report = Ingestor::apply(&mut graph, &batch).expect("apply");
        assert_eq!(report.placeholders, vec!["issuer".to_string()]);
        assert_eq!(report.edges_added, 2);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);

        let placeholder = graph
            .nodes()
            .find(|n| n.node_type == NODE_EXTRACTED_ENTITY)
            .expect("placeholder");
        assert_eq!(placeholder.properties.get("name"), Some(&"issuer".into()));
        assert_eq!(
            placeholder.properties.get("legal_ref"),
            Some(&"706-П, гл. 2".into())
        );
    }

    #[test]
    fn reference_source_defaults_legal_ref() {
        let mut graph = Graph::new();
        let batch = CandidateBatch {
            references: vec![ReferenceCandidate {
                source_natural_key: "ghost".into(),
                ref_text: "см. приложение 1".into(),
                context: Properties::new(),
            }],
            ..CandidateBatch::default()
        };

        let report = Ingestor::apply(&mut graph, &batch).expect("apply");
        assert_eq!(report.references_added, 1);
        assert_eq!(graph.pending_references().len(), 1);

        let placeholder = graph.nodes().next().expect("placeholder");
        assert_eq!(
            placeholder.properties.get("legal_ref"),
            Some(&DEFAULT_LEGAL_REF.into())
        );
        assert_eq!(graph.pending_references()[0].source_id, placeholder.id);
    }

    #[test]
    fn fz_questions_are_appended_in_order() {
        let mut graph = Graph::new();
        let batch = CandidateBatch {
            fz_questions: vec![FzQuestion::new("q1", "706-П"), FzQuestion::new("q2", "706-П")],
            ..CandidateBatch::default()
        };
        Ingestor::apply(&mut graph, &batch).expect("apply");
        let questions: Vec<_> = graph.fz_questions().iter().map(|q| q.question.as_str()).collect();
        assert_eq!(questions, vec!["q1", "q2"]);
    }

    #[test]
    fn oversized_batch_is_rejected_untouched() {
        let mut graph = Graph::new();
        let batch = CandidateBatch {
            fz_questions: vec![FzQuestion::new("q", "s"); MAX_BATCH_CANDIDATES + 1],
            ..CandidateBatch::default()
        };
        assert!(matches!(
            Ingestor::apply(&mut graph, &batch),
            Err(GraphError::InvalidInput(_))
        ));
        assert!(graph.fz_questions().is_empty());
    }

    #[test]
    fn report_merge_accumulates() {
        let mut total = IngestReport {
            nodes_upserted: 1,
            placeholders: vec!["a".into()],
            ..IngestReport::default()
        };
        total.merge(IngestReport {
            nodes_upserted: 2,
            placeholders: vec!["b".into()],
            ..IngestReport::default()
        });
        assert_eq!(total.nodes_upserted, 3);
        assert_eq!(total.placeholders.len(), 2);
    }
}
