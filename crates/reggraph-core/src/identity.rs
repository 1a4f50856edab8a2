//! # Identity Registry
//!
//! Maps natural keys to graph-assigned identifiers.
//!
//! Ids are fingerprints: `prefix + "_" + first 12 hex chars of SHA-1(signature)`.
//! The same signature always yields the same id, in this process, in the next
//! run, and in any other implementation using the same scheme. The registry
//! only remembers which signatures have already been seen by this store.

use crate::primitives::{EDGE_ID_PREFIX, FINGERPRINT_HEX_LEN, NODE_ID_PREFIX};
use crate::{EdgeId, NodeId};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Compute the fingerprint id for a signature.
///
/// ```
/// use reggraph_core::identity::fingerprint;
///
/// let id = fingerprint("node", "document:doc");
/// assert!(id.starts_with("node_"));
/// assert_eq!(id.len(), "node_".len() + 12);
/// ```
#[must_use]
pub fn fingerprint(prefix: &str, signature: &str) -> String {
    let digest = hex::encode(Sha1::digest(signature.as_bytes()));
    format!("{}_{}", prefix, &digest[..FINGERPRINT_HEX_LEN])
}

/// Registry key of a node: `type:natural_key`.
#[must_use]
pub fn node_registry_key(node_type: &str, natural_key: &str) -> String {
    format!("{}:{}", node_type, natural_key)
}

/// Id a node of this type and natural key gets in any store.
#[must_use]
pub fn node_id_for(node_type: &str, natural_key: &str) -> NodeId {
    NodeId(fingerprint(NODE_ID_PREFIX, &node_registry_key(node_type, natural_key)))
}

/// Signature of an edge: `type:source_id:target_id`.
#[must_use]
pub fn edge_signature(edge_type: &str, source: &NodeId, target: &NodeId) -> String {
    format!("{}:{}:{}", edge_type, source, target)
}

/// Natural-key → id maps for nodes and edges.
///
/// Owned by exactly one store; there is no process-wide registry.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    nodes: BTreeMap<String, NodeId>,
    edges: BTreeMap<String, EdgeId>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the id registered for a node key, minting and registering it
    /// on first sight. Returns the id and whether it was newly registered.
    pub fn resolve_node(&mut self, registry_key: &str) -> (NodeId, bool) {
        if let Some(id) = self.nodes.get(registry_key) {
            return (id.clone(), false);
        }
        let id = NodeId(fingerprint(NODE_ID_PREFIX, registry_key));
        self.nodes.insert(registry_key.to_string(), id.clone());
        (id, true)
    }

    /// Look up the id registered for an edge signature, minting and
    /// registering it on first sight.
    pub fn resolve_edge(&mut self, signature: &str) -> (EdgeId, bool) {
        if let Some(id) = self.edges.get(signature) {
            return (id.clone(), false);
        }
        let id = EdgeId(fingerprint(EDGE_ID_PREFIX, signature));
        self.edges.insert(signature.to_string(), id.clone());
        (id, true)
    }

    /// Id already registered for a node key, if any.
    #[must_use]
    pub fn node_id(&self, registry_key: &str) -> Option<&NodeId> {
        self.nodes.get(registry_key)
    }

    /// Id already registered for an edge signature, if any.
    #[must_use]
    pub fn edge_id(&self, signature: &str) -> Option<&EdgeId> {
        self.edges.get(signature)
    }

    /// Register an edge signature with a known id (used when reloading state).
    pub fn register_edge(&mut self, signature: String, id: EdgeId) {
        self.edges.insert(signature, id);
    }

    /// Number of registered node keys.
    #[must_use]
    pub fn node_key_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of registered edge signatures.
    #[must_use]
    pub fn edge_signature_count(&self) -> usize {
        self.edges.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_matches_sha1_prefix() {
        // sha1("abc") = a9993e364706816aba3e25717850c26c9cd0d89d
        assert_eq!(fingerprint("node", "abc"), "node_a9993e364706");
        assert_eq!(fingerprint("edge", "abc"), "edge_a9993e364706");
    }

    #[test]
    fn node_id_for_matches_registry() {
        let mut registry = IdentityRegistry::new();
        let (id, _) = registry.resolve_node(&node_registry_key("document", "doc"));
        assert_eq!(node_id_for("document", "doc"), id);
    }

    #[test]
    fn resolve_node_is_stable() {
        let mut registry = IdentityRegistry::new();
        let (first, fresh) = registry.resolve_node("document:doc");
        assert!(fresh);
        let (second, fresh) = registry.resolve_node("document:doc");
        assert!(!fresh);
        assert_eq!(first, second);
        assert_eq!(registry.node_key_count(), 1);
    }

    #[test]
    fn resolve_is_pure_across_registries() {
        let mut a = IdentityRegistry::new();
        let mut b = IdentityRegistry::new();
        assert_eq!(a.resolve_node("x:y").0, b.resolve_node("x:y").0);
        assert_eq!(a.resolve_edge("T:a:b").0, b.resolve_edge("T:a:b").0);
    }

    #[test]
    fn node_and_edge_spaces_do_not_collide() {
        let mut registry = IdentityRegistry::new();
        let (node, _) = registry.resolve_node("same");
        let (edge, _) = registry.resolve_edge("same");
        assert_ne!(node.as_str(), edge.as_str());
    }

    #[test]
    fn keys_embed_type() {
        assert_eq!(node_registry_key("document_field", "k"), "document_field:k");
        let s = edge_signature("BELONGS_TO", &NodeId::from("node_a"), &NodeId::from("node_b"));
        assert_eq!(s, "BELONGS_TO:node_a:node_b");
    }
}
