//! # Core Type Definitions
//!
//! This module contains all core types for the reggraph labeled property graph:
//! - Graph identifiers (`NodeId`, `EdgeId`)
//! - The property container (`PropertyValue`, `Properties`)
//! - Graph records (`Node`, `Edge`, `PendingReference`, `FzQuestion`)
//! - The exported aggregate (`GraphState`)
//! - Error types (`GraphError`)
//!
//! ## Determinism Guarantees
//!
//! All collections in this module:
//! - Use `BTreeMap` so property bags serialize in key order
//! - Derive `Ord` on identifiers so node/edge maps iterate in id order

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Identifier of a node in the graph.
///
/// Always minted by the store from a natural key fingerprint (`node_<hex>`);
/// callers never choose it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of an edge in the graph (`edge_<hex>`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PROPERTY CONTAINER
// =============================================================================

/// A single property value.
///
/// Closed union of the JSON-like value kinds a property bag may carry.
/// Variant order matters for untagged deserialization: integers are tried
/// before floats so `3` stays an `Int`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Borrow the text payload, if this is a `Text` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Self::Map(map) => {
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// A property bag attached to nodes, edges and reference contexts.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Build a property bag from `(key, value)` pairs.
///
/// ```
/// use reggraph_core::types::props;
///
/// let p = props([("name", "Копия решения"), ("legal_ref", "706-П")]);
/// assert_eq!(p.len(), 2);
/// ```
pub fn props<K, V, I>(pairs: I) -> Properties
where
    K: Into<String>,
    V: Into<PropertyValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Read a property as display text, empty when absent.
#[must_use]
pub fn property_text(properties: &Properties, key: &str) -> String {
    properties
        .get(key)
        .map(ToString::to_string)
        .unwrap_or_default()
}

// =============================================================================
// NODE & EDGE
// =============================================================================

/// A typed node with its property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Node {
    /// Create a new node.
    #[must_use]
    pub fn new(id: NodeId, node_type: impl Into<String>, properties: Properties) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            properties,
        }
    }
}

/// A typed, directed edge between two existing nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub properties: Properties,
}

// =============================================================================
// PENDING REFERENCES & QUESTIONS
// =============================================================================

/// Why the resolver left a reference pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The citing node is not in the graph.
    SourceNotFound,
    /// The citation text is blank.
    EmptyRefText,
    /// No citable node shares a token with the citation.
    NoCandidateMatch,
}

impl UnresolvedReason {
    /// The machine-readable reason code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceNotFound => "source_not_found",
            Self::EmptyRefText => "empty_ref_text",
            Self::NoCandidateMatch => "no_candidate_match",
        }
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A free-text citation waiting to be turned into a `REFERENCES` edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReference {
    pub source_id: NodeId,
    #[serde(default)]
    pub ref_text: String,
    #[serde(default)]
    pub context: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnresolvedReason>,
}

impl PendingReference {
    /// Create a fresh (never resolved) pending reference.
    #[must_use]
    pub fn new(source_id: NodeId, ref_text: impl Into<String>, context: Properties) -> Self {
        Self {
            source_id,
            ref_text: ref_text.into(),
            context,
            reason: None,
        }
    }
}

/// An open question logged for human review. Stored, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FzQuestion {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub source: String,
}

impl FzQuestion {
    /// Create a new question record.
    #[must_use]
    pub fn new(question: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            source: source.into(),
        }
    }
}

// =============================================================================
// GRAPH STATE
// =============================================================================

/// Read-only export of a graph: nodes and edges in id order, pending
/// references and questions in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub pending_refs: Vec<PendingReference>,
    pub fz_questions: Vec<FzQuestion>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Which end of an edge a dangling id was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Source,
    Target,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Errors that can occur in the reggraph system.
///
/// - No silent failures
/// - Use `Result<T, GraphError>` for fallible operations
/// - A failed operation never leaves the store partially mutated
#[derive(Debug, Error)]
pub enum GraphError {
    /// An edge endpoint is not a known node id.
    #[error("Unknown {role} node: {node_id}")]
    DanglingReference { role: EndpointRole, node_id: NodeId },

    /// A reloaded state contains the same id twice.
    #[error("Duplicate id in graph state: {0}")]
    DuplicateId(String),

    /// A domain entity is missing a property the schema requires.
    #[error("{entity} is missing required property '{key}'")]
    MissingProperty { entity: &'static str, key: &'static str },

    /// Caller input could not be interpreted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_value_untagged_keeps_integers() {
        let value: PropertyValue = serde_json::from_str("3").expect("parse");
        assert_eq!(value, PropertyValue::Int(3));

        let value: PropertyValue = serde_json::from_str("1.5").expect("parse");
        assert_eq!(value, PropertyValue::Float(1.5));
    }

    #[test]
    fn property_value_from_json_nested() {
        let json = serde_json::json!({"a": [1, "x"], "b": null});
        let value = PropertyValue::from(json);

        let PropertyValue::Map(map) = value else {
            unreachable!("object converts to map");
        };
        assert_eq!(
            map.get("a"),
            Some(&PropertyValue::List(vec![
                PropertyValue::Int(1),
                PropertyValue::Text("x".into())
            ]))
        );
        assert_eq!(map.get("b"), Some(&PropertyValue::Null));
    }

    #[test]
    fn property_text_defaults_to_empty() {
        let p = props([("name", "Поле")]);
        assert_eq!(property_text(&p, "name"), "Поле");
        assert_eq!(property_text(&p, "title"), "");
    }

    #[test]
    fn pending_reference_omits_absent_reason() {
        let r = PendingReference::new(
            NodeId::from("node_x"),
            "см. приложение 1",
            Properties::new(),
        );
        let json = serde_json::to_string(&r).expect("serialize");
        assert!(!json.contains("reason"));

        let mut r = r;
        r.reason = Some(UnresolvedReason::EmptyRefText);
        let json = serde_json::to_string(&r).expect("serialize");
        assert!(json.contains("\"reason\":\"empty_ref_text\""));
    }

    #[test]
    fn node_serializes_type_field() {
        let node = Node::new(NodeId::from("node_a"), "document", Properties::new());
        let json = serde_json::to_string(&node).expect("serialize");
        assert!(json.contains("\"type\":\"document\""));
    }

    #[test]
    fn dangling_reference_message_names_role() {
        let err = GraphError::DanglingReference {
            role: EndpointRole::Target,
            node_id: NodeId::from("node_missing"),
        };
        assert_eq!(err.to_string(), "Unknown target node: node_missing");
    }
}
