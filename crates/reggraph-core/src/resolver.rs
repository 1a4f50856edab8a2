//! # Reference Resolver
//!
//! Turns free-text citations ("см. приложение 1") into `REFERENCES` edges by
//! conservative lexical matching against citable nodes.
//!
//! The resolver never invents nodes. Every pending reference ends up either
//! as an edge (resolved) or back in the pending list with a reason code.
//!
//! ## Matching
//!
//! 1. A candidate index is built once per pass from the node snapshot,
//!    restricted to citable types, in ascending id order.
//! 2. Citation text is lower-cased and split into runs of Latin/Cyrillic
//!    letters, digits and `_`; runs shorter than `min_token_len` characters
//!    are dropped, repeats are dropped.
//! 3. A candidate scores one point per token found as a substring of its
//!    searchable text. The strictly highest score wins; on a tie the
//!    candidate with the lowest id wins.

use crate::graph::GraphStore;
use crate::primitives::{
    APPENDIX_LABEL, CITABLE_NODE_TYPES, DEFAULT_LEGAL_REF, EDGE_REFERENCES, MIN_TOKEN_LEN,
    RESOLVER_NAME,
};
use crate::types::property_text;
use crate::{EdgeId, Node, NodeId, PendingReference, PropertyValue, Properties, UnresolvedReason};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zа-яё0-9_]+").expect("token pattern is valid"));

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Tunables of the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Node types that may be the target of a citation.
    pub citable_types: BTreeSet<String>,
    /// Minimum token length in characters.
    pub min_token_len: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            citable_types: CITABLE_NODE_TYPES.iter().map(|t| t.to_string()).collect(),
            min_token_len: MIN_TOKEN_LEN,
        }
    }
}

// =============================================================================
// TOKENIZATION
// =============================================================================

/// Split citation text into distinct lower-cased tokens, in first-seen order.
///
/// ```
/// use reggraph_core::resolver::tokenize;
///
/// assert_eq!(tokenize("См. Приложение 1, приложение", 3), vec!["приложение"]);
/// ```
#[must_use]
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = BTreeSet::new();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| token.chars().count() >= min_len)
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}

/// Human label of an appendix id: `app_3` → `приложение 3`.
#[must_use]
pub fn appendix_label(appendix_id: &str) -> Option<String> {
    let rest = appendix_id.strip_prefix("app_")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("{} {}", APPENDIX_LABEL, digits))
}

// =============================================================================
// CANDIDATE INDEX
// =============================================================================

/// A citable node with its pre-computed searchable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: NodeId,
    pub node_type: String,
    pub searchable_text: String,
}

impl Candidate {
    /// Build the candidate entry of a node.
    #[must_use]
    pub fn from_node(node: &Node) -> Self {
        let appendix_id = property_text(&node.properties, "appendix_id");
        let label = appendix_label(&appendix_id).unwrap_or_default();

        let parts = [
            node.node_type.clone(),
            property_text(&node.properties, "name"),
            property_text(&node.properties, "title"),
            property_text(&node.properties, "section_path"),
            property_text(&node.properties, "field_code"),
            appendix_id,
            label,
        ];
        let searchable_text = parts
            .iter()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        Self {
            id: node.id.clone(),
            node_type: node.node_type.clone(),
            searchable_text,
        }
    }

    /// Number of tokens contained in the searchable text.
    #[must_use]
    pub fn score(&self, tokens: &[String]) -> usize {
        tokens
            .iter()
            .filter(|token| self.searchable_text.contains(token.as_str()))
            .count()
    }
}

/// Lexical index over the citable nodes of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct CandidateIndex {
    candidates: Vec<Candidate>,
}

impl CandidateIndex {
    /// Build the index from nodes, keeping only citable types.
    ///
    /// Candidates are ordered by node id regardless of input order, which is
    /// what makes tie-breaking reproducible.
    pub fn build<'a>(nodes: impl IntoIterator<Item = &'a Node>, config: &ResolverConfig) -> Self {
        let mut candidates: Vec<Candidate> = nodes
            .into_iter()
            .filter(|node| config.citable_types.contains(&node.node_type))
            .map(Candidate::from_node)
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        Self { candidates }
    }

    /// Best-scoring candidate, or `None` when nothing scores above zero.
    #[must_use]
    pub fn best_match(&self, tokens: &[String]) -> Option<&Candidate> {
        let mut best: Option<&Candidate> = None;
        let mut best_score = 0;
        for candidate in &self.candidates {
            let score = candidate.score(tokens);
            if score > best_score {
                best_score = score;
                best = Some(candidate);
            }
        }
        best
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the index holds no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

// =============================================================================
// RESOLVER OUTPUT
// =============================================================================

/// A citation that became an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub target_type: String,
    pub ref_text: String,
    pub edge_id: EdgeId,
}

/// Counts of one resolver pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSummary {
    pub input_count: usize,
    pub resolved_count: usize,
    pub unresolved_count: usize,
}

/// Everything one resolver pass produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverOutput {
    pub resolved_refs: Vec<ResolvedReference>,
    pub unresolved_refs: Vec<PendingReference>,
    pub summary: ResolverSummary,
}

impl ResolverOutput {
    /// Unresolved count per reason code.
    #[must_use]
    pub fn unresolved_by_reason(&self) -> BTreeMap<UnresolvedReason, usize> {
        let mut counts = BTreeMap::new();
        for reference in &self.unresolved_refs {
            if let Some(reason) = reference.reason {
                *counts.entry(reason).or_insert(0) += 1;
            }
        }
        counts
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolves the store's pending references in one pass.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    config: ResolverConfig,
}

impl ReferenceResolver {
    /// Create a resolver with the given configuration.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Run one pass over the graph's pending references.
    ///
    /// Takes the store exclusively: no writer may run while the candidate
    /// index built at the start of the pass is in use. The pending list is
    /// replaced once, at the end, with exactly the unresolved entries.
    pub fn resolve<G: GraphStore>(&self, graph: &mut G) -> ResolverOutput {
        let state = graph.snapshot();
        let node_ids: BTreeSet<&NodeId> = state.nodes.iter().map(|n| &n.id).collect();
        let index = CandidateIndex::build(&state.nodes, &self.config);

        let mut resolved_refs = Vec::new();
        let mut unresolved_refs = Vec::new();

        for reference in &state.pending_refs {
            let ref_text = reference.ref_text.trim();

            if !node_ids.contains(&reference.source_id) {
                unresolved_refs.push(mark_unresolved(reference, UnresolvedReason::SourceNotFound));
                continue;
            }
            if ref_text.is_empty() {
                unresolved_refs.push(mark_unresolved(reference, UnresolvedReason::EmptyRefText));
                continue;
            }

            let tokens = tokenize(ref_text, self.config.min_token_len);
            let Some(target) = index.best_match(&tokens) else {
                tracing::debug!(source_id = %reference.source_id, ref_text, "no candidate match");
                unresolved_refs
                    .push(mark_unresolved(reference, UnresolvedReason::NoCandidateMatch));
                continue;
            };

            let legal_ref = reference
                .context
                .get("legal_ref")
                .filter(|v| !matches!(v, PropertyValue::Null))
                .cloned()
                .unwrap_or_else(|| PropertyValue::from(DEFAULT_LEGAL_REF));
            let mut properties = Properties::new();
            properties.insert("legal_ref".into(), legal_ref);
            properties.insert("resolver".into(), RESOLVER_NAME.into());
            properties.insert("ref_text".into(), ref_text.into());
            properties.insert("target_type".into(), target.node_type.as_str().into());

            match graph.add_edge(EDGE_REFERENCES, &reference.source_id, &target.id, properties) {
                Ok(edge_id) => {
                    tracing::debug!(
                        source_id = %reference.source_id,
                        target_id = %target.id,
                        %edge_id,
                        "reference resolved"
                    );
                    resolved_refs.push(ResolvedReference {
                        source_id: reference.source_id.clone(),
                        target_id: target.id.clone(),
                        target_type: target.node_type.clone(),
                        ref_text: ref_text.to_string(),
                        edge_id,
                    });
                }
                Err(e) => {
                    // Unreachable with an exclusive borrow: both ends come from the snapshot.
                    tracing::warn!(error = %e, "reference edge rejected");
                    unresolved_refs
                        .push(mark_unresolved(reference, UnresolvedReason::SourceNotFound));
                }
            }
        }

        let summary = ResolverSummary {
            input_count: state.pending_refs.len(),
            resolved_count: resolved_refs.len(),
            unresolved_count: unresolved_refs.len(),
        };
        graph.replace_pending_references(unresolved_refs.clone());

        tracing::info!(
            candidates = index.len(),
            input = summary.input_count,
            resolved = summary.resolved_count,
            unresolved = summary.unresolved_count,
            "reference resolution finished"
        );

        ResolverOutput {
            resolved_refs,
            unresolved_refs,
            summary,
        }
    }
}

fn mark_unresolved(reference: &PendingReference, reason: UnresolvedReason) -> PendingReference {
    let mut unresolved = reference.clone();
    unresolved
        .context
        .insert("resolver".into(), RESOLVER_NAME.into());
    unresolved.reason = Some(reason);
    unresolved
}

// =============================================================================
// TESTS
// =============================================================================
