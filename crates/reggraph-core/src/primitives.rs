//! # Graph Primitives
//!
//! Fixed vocabulary and runtime constants for the reggraph core.
//!
//! Node types, edge types and natural-key shapes are part of the contract
//! with the producers feeding the store; changing any of them changes the
//! minted fingerprints and therefore every downstream artifact.

// =============================================================================
// IDENTIFIER PREFIXES
// =============================================================================

/// Prefix of every minted node id.
pub const NODE_ID_PREFIX: &str = "node";

/// Prefix of every minted edge id.
pub const EDGE_ID_PREFIX: &str = "edge";

/// Number of hex characters of the SHA-1 digest kept in an id.
pub const FINGERPRINT_HEX_LEN: usize = 12;

// =============================================================================
// NODE TYPES
// =============================================================================

pub const NODE_DOCUMENT: &str = "document";
pub const NODE_DOCUMENT_SECTION: &str = "document_section";
pub const NODE_DOCUMENT_FIELD: &str = "document_field";
pub const NODE_FIELD_GROUP: &str = "field_group";

/// Type given to nodes that were referenced by a candidate edge or reference
/// without ever being declared.
pub const NODE_EXTRACTED_ENTITY: &str = "extracted_entity";

/// Type of the node the fallback extraction emits for an unparseable window.
pub const NODE_REGISTRATION_ACTION: &str = "registration_action";

// =============================================================================
// EDGE TYPES
// =============================================================================

pub const EDGE_GROUP_IN_SECTION: &str = "GROUP_IN_SECTION";
pub const EDGE_BELONGS_TO: &str = "BELONGS_TO";
pub const EDGE_CONTAINS_FIELD: &str = "CONTAINS_FIELD";
pub const EDGE_REFERENCES: &str = "REFERENCES";

/// Type given to candidate edges that arrive without one.
pub const EDGE_RELATED_TO: &str = "RELATED_TO";

// =============================================================================
// RESOLVER
// =============================================================================

/// Value of the `resolver` marker written into edges and unresolved contexts.
pub const RESOLVER_NAME: &str = "reference_resolver";

/// Node types the resolver considers citable.
pub const CITABLE_NODE_TYPES: [&str; 3] =
    [NODE_DOCUMENT_SECTION, NODE_DOCUMENT_FIELD, NODE_DOCUMENT];

/// Minimum token length, in characters, for a citation token to count.
pub const MIN_TOKEN_LEN: usize = 3;

// =============================================================================
// DOCUMENT DEFAULTS
// =============================================================================

/// Legal reference assumed when a producer supplies none.
pub const DEFAULT_LEGAL_REF: &str = "706-П";

/// Human label prefix derived from `app_<N>` appendix ids.
pub const APPENDIX_LABEL: &str = "приложение";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of candidates (all kinds together) in a single batch.
///
/// Batches larger than this are rejected before touching the store.
pub const MAX_BATCH_CANDIDATES: usize = 50_000;

/// Maximum length of a natural key, in bytes.
pub const MAX_NATURAL_KEY_LENGTH: usize = 1024;
