//! # Validation
//!
//! Final QA pass: counts plus human-readable warnings. Never mutates.

use crate::ingestor::IngestReport;
use crate::{GraphState, NodeId, UnresolvedReason};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Counts and warnings describing a graph state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationReport {
    pub node_count: usize,
    pub edge_count: usize,
    pub pending_ref_count: usize,
    pub fz_question_count: usize,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Whether the state passed without warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Validate a state, optionally with the ingest report that produced it.
#[must_use]
pub fn validate_state(state: &GraphState, ingest: Option<&IngestReport>) -> ValidationReport {
    let mut warnings = Vec::new();

    if let Some(ingest) = ingest {
        if !ingest.placeholders.is_empty() {
            warnings.push(format!(
                "{} placeholder node(s) created for undeclared natural keys",
                ingest.placeholders.len()
            ));
        }
        if !ingest.malformed.is_empty() {
            warnings.push(format!(
                "{} malformed candidate(s) skipped",
                ingest.malformed.len()
            ));
        }
    }

    let mut by_reason: BTreeMap<UnresolvedReason, usize> = BTreeMap::new();
    let mut never_resolved = 0;
    for reference in &state.pending_refs {
        match reference.reason {
            Some(reason) => *by_reason.entry(reason).or_insert(0) += 1,
            None => never_resolved += 1,
        }
    }
    for (reason, count) in &by_reason {
        warnings.push(format!("{} unresolved reference(s): {}", count, reason));
    }
    if never_resolved > 0 {
        warnings.push(format!(
            "{} pending reference(s) not yet seen by the resolver",
            never_resolved
        ));
    }

    let node_ids: BTreeSet<&NodeId> = state.nodes.iter().map(|n| &n.id).collect();
    for edge in &state.edges {
        if !node_ids.contains(&edge.source) || !node_ids.contains(&edge.target) {
            warnings.push(format!("edge {} has a missing endpoint", edge.id));
        }
    }

    let report = ValidationReport {
        node_count: state.nodes.len(),
        edge_count: state.edges.len(),
        pending_ref_count: state.pending_refs.len(),
        fz_question_count: state.fz_questions.len(),
        warnings,
    };
    for warning in &report.warnings {
        tracing::warn!(warning = %warning, "validation");
    }
    tracing::info!(
        nodes = report.node_count,
        edges = report.edge_count,
        pending = report.pending_ref_count,
        questions = report.fz_question_count,
        "validation finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, GraphStore};
    use crate::resolver::ReferenceResolver;
    use crate::{Edge, EdgeId, FzQuestion, Properties};

    #[test]
    fn empty_state_is_clean() {
        let report = validate_state(&GraphState::default(), None);
        assert!(report.is_clean());
        assert_eq!(report.node_count, 0);
    }

    #[test]
    fn counts_match_state() {
        let mut graph = Graph::new();
        let a = graph.upsert_node("document", "a", Properties::new());
        let b = graph.upsert_node("document", "b", Properties::new());
        graph.add_edge("T", &a, &b, Properties::new()).expect("edge");
        graph.add_fz_question(FzQuestion::new("q", "706-П"));

        let report = validate_state(&graph.snapshot(), None);
        assert_eq!(report.node_count, 2);
        assert_eq!(report.edge_count, 1);
        assert_eq!(report.fz_question_count, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn unresolved_references_are_grouped_by_reason() {
        let mut graph = Graph::new();
        let a = graph.upsert_node("registration_action", "a", Properties::new());
        graph.add_pending_reference(a.clone(), String::new(), Properties::new());
        graph.add_pending_reference(a, " ".into(), Properties::new());
        ReferenceResolver::default().resolve(&mut graph);

        let report = validate_state(&graph.snapshot(), None);
        assert_eq!(report.pending_ref_count, 2);
        assert_eq!(
            report.warnings,
            vec!["2 unresolved reference(s): empty_ref_text".to_string()]
        );
    }

    #[test]
    fn ingest_findings_become_warnings() {
        let ingest = IngestReport {
            placeholders: vec!["issuer".into()],
            ..IngestReport::default()
        };
        let report = validate_state(&GraphState::default(), Some(&ingest));
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("placeholder"));
    }

    #[test]
    fn dangling_edge_in_foreign_state_is_flagged() {
        let state = GraphState {
            edges: vec![Edge {
                id: EdgeId("edge_x".into()),
                edge_type: "T".into(),
                source: NodeId::from("node_a"),
                target: NodeId::from("node_b"),
                properties: Properties::new(),
            }],
            ..GraphState::default()
        };
        let report = validate_state(&state, None);
        assert_eq!(report.warnings, vec!["edge edge_x has a missing endpoint".to_string()]);
    }
}
