//! # Graph Store
//!
//! The single source of truth for nodes and edges.
//!
//! This module implements the `GraphStore` trait. All collections use
//! `BTreeMap` keyed by id, so every snapshot lists nodes and edges in the
//! same order for the same content.

use crate::identity::{IdentityRegistry, edge_signature, node_registry_key};
use crate::{
    Edge, EdgeId, EndpointRole, FzQuestion, GraphError, GraphState, Node, NodeId,
    PendingReference, Properties,
};
use std::collections::BTreeMap;

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// Merge-safe mutation interface of a graph store.
///
/// Nothing here deletes: nodes and edges are created on first observation
/// and property-merged on every later one.
pub trait GraphStore {
    /// Insert a node for `(node_type, natural_key)` or merge `properties`
    /// into the existing one. Never fails; returns the same id for the same
    /// pair every time.
    ///
    /// If the id is already held by a node of another type, that node is
    /// left untouched and its id is returned.
    fn upsert_node(&mut self, node_type: &str, natural_key: &str, properties: Properties)
    -> NodeId;

    /// Insert an edge or merge `properties` into the existing edge with the
    /// same `(edge_type, source, target)`.
    ///
    /// Returns `GraphError::DanglingReference` without touching the store if
    /// either endpoint is not a known node.
    fn add_edge(
        &mut self,
        edge_type: &str,
        source: &NodeId,
        target: &NodeId,
        properties: Properties,
    ) -> Result<EdgeId, GraphError>;

    /// Append a pending citation. Duplicates are kept.
    fn add_pending_reference(&mut self, source_id: NodeId, ref_text: String, context: Properties);

    /// Append an open question. Duplicates are kept.
    fn add_fz_question(&mut self, question: FzQuestion);

    /// Replace the whole pending-reference list in one step.
    fn replace_pending_references(&mut self, references: Vec<PendingReference>);

    /// Check if a node exists.
    fn contains_node(&self, id: &NodeId) -> bool;

    /// Get the total number of nodes.
    fn node_count(&self) -> usize;

    /// Get the total number of edges.
    fn edge_count(&self) -> usize;

    /// Export the current state.
    fn snapshot(&self) -> GraphState;
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The in-memory graph store.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage: NodeId -> Node
    nodes: BTreeMap<NodeId, Node>,

    /// Edge storage: EdgeId -> Edge
    edges: BTreeMap<EdgeId, Edge>,

    /// Unresolved citations, in arrival order.
    pending_refs: Vec<PendingReference>,

    /// Open questions, in arrival order.
    fz_questions: Vec<FzQuestion>,

    /// Natural key -> id maps backing deduplication.
    registry: IdentityRegistry,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from an exported state.
    ///
    /// Rejects repeated ids and edges whose endpoints are missing. The edge
    /// registry is rebuilt from the edges themselves. Node keys cannot be
    /// recovered from a snapshot, but they do not need to be: an id is a pure
    /// function of its key, so a later `upsert_node` lands on the loaded node.
    pub fn from_state(state: GraphState) -> Result<Self, GraphError> {
        let mut graph = Self::new();

        for node in state.nodes {
            if graph.nodes.contains_key(&node.id) {
                return Err(GraphError::DuplicateId(node.id.0));
            }
            graph.nodes.insert(node.id.clone(), node);
        }

        for edge in state.edges {
            if graph.edges.contains_key(&edge.id) {
                return Err(GraphError::DuplicateId(edge.id.0));
            }
            graph.check_endpoints(&edge.source, &edge.target)?;
            let signature = edge_signature(&edge.edge_type, &edge.source, &edge.target);
            graph.registry.register_edge(signature, edge.id.clone());
            graph.edges.insert(edge.id.clone(), edge);
        }

        graph.pending_refs = state.pending_refs;
        graph.fz_questions = state.fz_questions;
        Ok(graph)
    }

    /// Lookup a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Lookup an edge by id.
    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Get all nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Pending references in arrival order.
    #[must_use]
    pub fn pending_references(&self) -> &[PendingReference] {
        &self.pending_refs
    }

    /// Open questions in arrival order.
    #[must_use]
    pub fn fz_questions(&self) -> &[FzQuestion] {
        &self.fz_questions
    }

    /// The identity registry backing this graph.
    #[must_use]
    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    fn check_endpoints(&self, source: &NodeId, target: &NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(source) {
            return Err(GraphError::DanglingReference {
                role: EndpointRole::Source,
                node_id: source.clone(),
            });
        }
        if !self.nodes.contains_key(target) {
            return Err(GraphError::DanglingReference {
                role: EndpointRole::Target,
                node_id: target.clone(),
            });
        }
        Ok(())
    }
}

impl GraphStore for Graph {
    fn upsert_node(
        &mut self,
        node_type: &str,
        natural_key: &str,
        properties: Properties,
    ) -> NodeId {
        let key = node_registry_key(node_type, natural_key);
        let (node_id, _) = self.registry.resolve_node(&key);

        match self.nodes.get_mut(&node_id) {
            Some(existing) if existing.node_type != node_type => {
                tracing::warn!(
                    node_id = %node_id,
                    existing_type = %existing.node_type,
                    node_type,
                    "node id already held by another type, properties not merged"
                );
            }
            Some(existing) => existing.properties.extend(properties),
            None => {
                tracing::trace!(node_id = %node_id, node_type, natural_key, "node created");
                self.nodes
                    .insert(node_id.clone(), Node::new(node_id.clone(), node_type, properties));
            }
        }

        node_id
    }

    fn add_edge(
        &mut self,
        edge_type: &str,
        source: &NodeId,
        target: &NodeId,
        properties: Properties,
    ) -> Result<EdgeId, GraphError> {
        self.check_endpoints(source, target)?;

        let signature = edge_signature(edge_type, source, target);
        let (edge_id, _) = self.registry.resolve_edge(&signature);

        match self.edges.get_mut(&edge_id) {
            Some(existing) => existing.properties.extend(properties),
            None => {
                tracing::trace!(edge_id = %edge_id, edge_type, %source, %target, "edge created");
                self.edges.insert(
                    edge_id.clone(),
                    Edge {
                        id: edge_id.clone(),
                        edge_type: edge_type.to_string(),
                        source: source.clone(),
                        target: target.clone(),
                        properties,
                    },
                );
            }
        }

        Ok(edge_id)
    }

    fn add_pending_reference(&mut self, source_id: NodeId, ref_text: String, context: Properties) {
        self.pending_refs
            .push(PendingReference::new(source_id, ref_text, context));
    }

    fn add_fz_question(&mut self, question: FzQuestion) {
        self.fz_questions.push(question);
    }

    fn replace_pending_references(&mut self, references: Vec<PendingReference>) {
        self.pending_refs = references;
    }

    fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn snapshot(&self) -> GraphState {
        GraphState {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
            pending_refs: self.pending_refs.clone(),
            fz_questions: self.fz_questions.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
