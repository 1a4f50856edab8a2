//! # Property-Based Tests
//!
//! Determinism and correctness invariants of the store and the resolver,
//! checked with proptest.

#![allow(clippy::unwrap_used, clippy::panic)]

use proptest::collection::vec;
use proptest::prelude::*;
use reggraph_core::types::props;
use reggraph_core::{Graph, GraphStore, NodeId, Properties, ReferenceResolver};
use std::collections::BTreeSet;

fn natural_key() -> impl Strategy<Value = String> {
    "[a-zа-я0-9_:.]{1,24}"
}

fn node_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("document".to_string()),
        Just("document_section".to_string()),
        Just("document_field".to_string()),
        Just("field_group".to_string()),
    ]
}

fn citation() -> impl Strategy<Value = String> {
    "(см\\. )?(приложение|решение|устав|анкета|перечень) [0-9]{1,2}"
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Upserting the same pair twice returns the same id; the second
    /// property bag wins on key conflict.
    #[test]
    fn upsert_is_idempotent(
        node_type in node_type(),
        key in natural_key(),
        first in "[а-я ]{0,12}",
        second in "[а-я ]{0,12}",
    ) {
        let mut graph = Graph::new();
        let a = graph.upsert_node(
            &node_type,
            &key,
            props([("name", first.as_str()), ("legal_ref", "706-П")]),
        );
        let b = graph.upsert_node(&node_type, &key, props([("name", second.as_str())]));

        prop_assert_eq!(&a, &b);
        prop_assert_eq!(graph.node_count(), 1);
        let node = graph.node(&a).expect("node");
        prop_assert_eq!(node.properties.get("name"), Some(&second.as_str().into()));
        prop_assert_eq!(node.properties.get("legal_ref"), Some(&"706-П".into()));
    }

    /// Distinct `(type, natural_key)` pairs get distinct ids.
    #[test]
    fn distinct_pairs_get_distinct_ids(
        pairs in vec((node_type(), natural_key()), 1..60)
    ) {
        let mut graph = Graph::new();
        let unique: BTreeSet<(String, String)> = pairs.iter().cloned().collect();
        let ids: BTreeSet<NodeId> = pairs
            .iter()
            .map(|(t, k)| graph.upsert_node(t, k, Properties::new()))
            .collect();

        prop_assert_eq!(ids.len(), unique.len());
        prop_assert_eq!(graph.node_count(), unique.len());
    }

    /// `add_edge` with an unknown endpoint fails and leaves edges untouched.
    #[test]
    fn unknown_endpoint_never_mutates(
        keys in vec(natural_key(), 1..10),
        ghost in "node_[0-9a-f]{12}",
        ghost_is_source in any::<bool>(),
    ) {
        let mut graph = Graph::new();
        let ids: Vec<NodeId> = keys
            .iter()
            .map(|k| graph.upsert_node("document", k, Properties::new()))
            .collect();
        let ghost = NodeId::from(ghost.as_str());
        prop_assume!(!graph.contains_node(&ghost));

        let known = &ids[0];
        let before = graph.snapshot();
        let result = if ghost_is_source {
            graph.add_edge("REFERENCES", &ghost, known, Properties::new())
        } else {
            graph.add_edge("REFERENCES", known, &ghost, Properties::new())
        };

        prop_assert!(result.is_err());
        prop_assert_eq!(graph.snapshot(), before);
    }

    /// Repeated `add_edge` calls on one triple give one edge with the union
    /// of properties, later calls winning.
    #[test]
    fn edge_merge_is_union(
        first in "[a-z]{1,8}",
        second in "[a-z]{1,8}",
    ) {
        let mut graph = Graph::new();
        let a = graph.upsert_node("document", "a", Properties::new());
        let b = graph.upsert_node("document", "b", Properties::new());

        let e1 = graph
            .add_edge("RELATED_TO", &a, &b, props([("x", first.as_str()), ("y", first.as_str())]))
            .expect("edge");
        let e2 = graph
            .add_edge("RELATED_TO", &a, &b, props([("y", second.as_str())]))
            .expect("edge");

        prop_assert_eq!(&e1, &e2);
        prop_assert_eq!(graph.edge_count(), 1);
        let edge = graph.edge(&e1).expect("edge");
        prop_assert_eq!(edge.properties.get("x"), Some(&first.as_str().into()));
        prop_assert_eq!(edge.properties.get("y"), Some(&second.as_str().into()));
    }

    /// The same nodes and citations resolve to the same partition and the
    /// same edge ids, whatever order the nodes were inserted in.
    #[test]
    fn resolver_is_deterministic(
        names in vec("(приложение|решение|устав|анкета|перечень) [0-9]{1,2}", 1..12),
        citations in vec(citation(), 0..12),
    ) {
        let build = |reverse: bool| {
            let mut graph = Graph::new();
            let source = graph.upsert_node("registration_action", "action:1", Properties::new());
            let mut ordered: Vec<&String> = names.iter().collect();
            if reverse {
                ordered.reverse();
            }
            for name in ordered {
                graph.upsert_node("document", name, props([("name", name.as_str())]));
            }
            for text in &citations {
                graph.add_pending_reference(source.clone(), text.clone(), Properties::new());
            }
            let output = ReferenceResolver::default().resolve(&mut graph);
            (output, graph.snapshot())
        };

        let (out_a, state_a) = build(false);
        let (out_b, state_b) = build(true);

        prop_assert_eq!(out_a, out_b);
        prop_assert_eq!(state_a, state_b);
    }

    /// Every citation ends up either as an edge or back in the pending list.
    #[test]
    fn resolver_accounts_for_every_reference(citations in vec(citation(), 0..20)) {
        let mut graph = Graph::new();
        let source = graph.upsert_node("registration_action", "action:1", Properties::new());
        graph.upsert_node("document", "decision", props([("name", "Решение о выпуске")]));
        for text in &citations {
            graph.add_pending_reference(source.clone(), text.clone(), Properties::new());
        }

        let output = ReferenceResolver::default().resolve(&mut graph);

        prop_assert_eq!(output.summary.input_count, citations.len());
        prop_assert_eq!(
            output.summary.resolved_count + output.summary.unresolved_count,
            citations.len()
        );
        prop_assert_eq!(graph.pending_references().len(), output.summary.unresolved_count);
    }
}
