//! # Knowledge Extraction
//!
//! Feeds text windows to an `Extractor`, parses whatever comes back into
//! candidate batches and applies them through the `Ingestor`.
//!
//! Responses are untrusted. Parsing is lenient: the whole response is tried
//! as JSON first, then the outermost `{...}` span. A window whose response
//! still does not parse gets a fallback batch that flags it for manual
//! review instead of failing the run.

use super::ingestion::IngestionOutput;
use crate::graph::GraphStore;
use crate::ingestor::{
    CandidateBatch, EdgeCandidate, IngestReport, Ingestor, NodeCandidate, ReferenceCandidate,
};
use crate::primitives::{
    DEFAULT_LEGAL_REF, EDGE_RELATED_TO, NODE_EXTRACTED_ENTITY, NODE_REGISTRATION_ACTION,
};
use crate::resolver::appendix_label;
use crate::{FzQuestion, GraphError, PropertyValue, Properties};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

static JSON_OBJECT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("json object pattern is valid"));

static NON_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]+").expect("key pattern is valid"));

const FALLBACK_CHAPTER: &str = "fallback";
const FALLBACK_REF_TEXT: &str = "авто-референс: требуется ручная проверка";
const FALLBACK_QUESTION: &str =
    "Проверьте корректность извлечения после fallback-парсинга ответа LLM.";
const SNIPPET_CHARS: usize = 300;

// =============================================================================
// WINDOWS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowParagraph {
    pub paragraph_id: String,
    pub text: String,
    pub legal_ref: String,
}

/// A chapter's worth of paragraphs sent to the extractor in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWindow {
    pub chapter: String,
    pub paragraphs: Vec<WindowParagraph>,
}

impl ExtractionWindow {
    /// First non-empty paragraph legal ref, or the default.
    #[must_use]
    pub fn legal_ref(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.legal_ref.trim())
            .find(|r| !r.is_empty())
            .unwrap_or(DEFAULT_LEGAL_REF)
            .to_string()
    }

    /// Paragraph texts joined by single spaces.
    #[must_use]
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Build one window per traversal item; items whose paragraphs are all
/// unknown are skipped. With no windows at all, every paragraph goes into
/// a single `fallback` window.
#[must_use]
pub fn build_windows(ingestion: &IngestionOutput) -> Vec<ExtractionWindow> {
    let to_window_paragraph = |id: &str, text: &str, legal_ref: &str| WindowParagraph {
        paragraph_id: id.to_string(),
        text: text.trim().to_string(),
        legal_ref: legal_ref.trim().to_string(),
    };

    let mut windows: Vec<ExtractionWindow> = ingestion
        .traversal_plan
        .iter()
        .filter_map(|item| {
            let paragraphs: Vec<WindowParagraph> = item
                .paragraph_ids
                .iter()
                .filter_map(|id| ingestion.paragraph(id))
                .map(|p| to_window_paragraph(&p.id, &p.text, &p.legal_ref))
                .collect();
            (!paragraphs.is_empty()).then(|| ExtractionWindow {
                chapter: item.chapter.clone(),
                paragraphs,
            })
        })
        .collect();

    if windows.is_empty() && !ingestion.paragraphs.is_empty() {
        windows.push(ExtractionWindow {
            chapter: FALLBACK_CHAPTER.into(),
            paragraphs: ingestion
                .paragraphs
                .iter()
                .map(|p| to_window_paragraph(&p.id, &p.text, &p.legal_ref))
                .collect(),
        });
    }
    windows
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// Metadata of one extractor call, kept in the artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractorCall {
    pub chapter: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub token_usage: Value,
}

/// Raw text returned for a window plus call metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorResponse {
    pub content: String,
    pub call: ExtractorCall,
}

/// The knowledge-extraction collaborator.
///
/// Implementations own transport, prompting and retries. An `Err` aborts the
/// run; an unusable `Ok` response is handled by the fallback path.
pub trait Extractor {
    fn extract(&self, window: &ExtractionWindow) -> Result<ExtractorResponse, GraphError>;
}

/// Extractor replaying canned responses keyed by chapter.
///
/// Chapters without a response get empty content, which routes them through
/// the fallback batch.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExtractor {
    responses: BTreeMap<String, String>,
}

impl ScriptedExtractor {
    /// Model name reported in call metadata.
    pub const MODEL: &'static str = "scripted";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the response for a chapter.
    #[must_use]
    pub fn with_response(mut self, chapter: impl Into<String>, content: impl Into<String>) -> Self {
        self.responses.insert(chapter.into(), content.into());
        self
    }

    /// Load from a JSON object mapping chapter to response. A string value is
    /// used verbatim; any other value is re-serialized.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let map: BTreeMap<String, Value> = serde_json::from_str(json)?;
        let responses = map
            .into_iter()
            .map(|(chapter, value)| {
                let content = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (chapter, content)
            })
            .collect();
        Ok(Self { responses })
    }

    /// Load from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, GraphError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Number of scripted chapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl Extractor for ScriptedExtractor {
    fn extract(&self, window: &ExtractionWindow) -> Result<ExtractorResponse, GraphError> {
        let content = self.responses.get(&window.chapter).cloned();
        let finish_reason = content.as_ref().map(|_| "stop".to_string());
        Ok(ExtractorResponse {
            content: content.unwrap_or_default(),
            call: ExtractorCall {
                chapter: window.chapter.clone(),
                model: Self::MODEL.into(),
                finish_reason,
                token_usage: Value::Null,
            },
        })
    }
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

/// Why a response could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    EmptyResponse,
    JsonObjectNotFound,
    JsonDecode(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyResponse => f.write_str("empty_response"),
            Self::JsonObjectNotFound => f.write_str("json_object_not_found"),
            Self::JsonDecode(msg) => write!(f, "json_decode_error: {}", msg),
        }
    }
}

/// Parse a response as JSON, falling back to its outermost `{...}` span.
pub fn parse_extraction_json(response: &str) -> Result<Value, ParseError> {
    let response = response.trim();
    if response.is_empty() {
        return Err(ParseError::EmptyResponse);
    }
    if let Ok(value) = serde_json::from_str(response) {
        return Ok(value);
    }
    let span = JSON_OBJECT_PATTERN
        .find(response)
        .ok_or(ParseError::JsonObjectNotFound)?;
    serde_json::from_str(span.as_str()).map_err(|e| ParseError::JsonDecode(e.to_string()))
}

/// Batch emitted for a window whose response could not be parsed.
#[must_use]
pub fn fallback_extraction(window: &ExtractionWindow) -> CandidateBatch {
    let legal_ref = window.legal_ref();
    let clean = NON_KEY_CHARS.replace_all(&window.chapter, "_");
    let clean = match clean.trim_matches('_') {
        "" => "window",
        key => key,
    };
    let action_key = format!("action:{}", clean);
    let snippet: String = window.text().chars().take(SNIPPET_CHARS).collect();

    let mut node_props = Properties::new();
    node_props.insert(
        "name".into(),
        format!("Извлечено из окна {}", window.chapter).into(),
    );
    node_props.insert("legal_ref".into(), legal_ref.as_str().into());

    let mut context = Properties::new();
    context.insert("legal_ref".into(), legal_ref.as_str().into());
    context.insert("snippet".into(), snippet.into());

    CandidateBatch {
        nodes: vec![NodeCandidate {
            node_type: NODE_REGISTRATION_ACTION.into(),
            natural_key: action_key.clone(),
            properties: node_props,
        }],
        edges: Vec::new(),
        references: vec![ReferenceCandidate {
            source_natural_key: action_key,
            ref_text: FALLBACK_REF_TEXT.into(),
            context,
        }],
        fz_questions: vec![FzQuestion::new(FALLBACK_QUESTION, legal_ref)],
    }
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Candidates dropped during normalization, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCandidates {
    pub nodes: usize,
    pub edges: usize,
    pub references: usize,
    pub fz_questions: usize,
}

impl SkippedCandidates {
    #[must_use]
    pub fn total(&self) -> usize {
        self.nodes + self.edges + self.references + self.fz_questions
    }

    fn add(&mut self, other: SkippedCandidates) {
        self.nodes += other.nodes;
        self.edges += other.edges;
        self.references += other.references;
        self.fz_questions += other.fz_questions;
    }
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn properties_of(value: Option<&Value>) -> Properties {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), PropertyValue::from(v.clone())))
            .collect(),
        _ => Properties::new(),
    }
}

fn objects<'a>(
    payload: &'a Value,
    key: &str,
) -> impl Iterator<Item = Option<&'a serde_json::Map<String, Value>>> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(Value::as_object)
}

/// Coerce an untrusted payload into a candidate batch.
///
/// Defaults: node type `extracted_entity`, natural key `<type>:<chapter>`,
/// `name` = natural key, `legal_ref` = the window's; edge type `RELATED_TO`.
/// Non-object entries, edges missing an endpoint key and references missing
/// a source key or text are dropped and counted.
#[must_use]
pub fn normalize_payload(
    payload: &Value,
    legal_ref: &str,
    chapter: &str,
) -> (CandidateBatch, SkippedCandidates) {
    let mut batch = CandidateBatch::default();
    let mut skipped = SkippedCandidates::default();
    fn set_default(props: &mut Properties, key: &str, value: &str) {
        props
            .entry(key.to_string())
            .or_insert_with(|| PropertyValue::from(value));
    }

    for entry in objects(payload, "nodes") {
        let Some(node) = entry else {
            skipped.nodes += 1;
            continue;
        };
        let node_type = text_of(node.get("type")).unwrap_or_else(|| NODE_EXTRACTED_ENTITY.into());
        let natural_key = text_of(node.get("natural_key"))
            .unwrap_or_else(|| format!("{}:{}", node_type, chapter));
        let mut properties = properties_of(node.get("properties"));
        set_default(&mut properties, "name", &natural_key);
        set_default(&mut properties, "legal_ref", legal_ref);
        batch.nodes.push(NodeCandidate {
            node_type,
            natural_key,
            properties,
        });
    }

    for entry in objects(payload, "edges") {
        let Some(edge) = entry else {
            skipped.edges += 1;
            continue;
        };
        let source = text_of(edge.get("source_natural_key")).unwrap_or_default();
        let target = text_of(edge.get("target_natural_key")).unwrap_or_default();
        if source.is_empty() || target.is_empty() {
            skipped.edges += 1;
            continue;
        }
        let mut properties = properties_of(edge.get("properties"));
        set_default(&mut properties, "legal_ref", legal_ref);
        batch.edges.push(EdgeCandidate {
            edge_type: text_of(edge.get("type")).unwrap_or_else(|| EDGE_RELATED_TO.into()),
            source_natural_key: source,
            target_natural_key: target,
            properties,
        });
    }

    for entry in objects(payload, "references") {
        let Some(reference) = entry else {
            skipped.references += 1;
            continue;
        };
        let source = text_of(reference.get("source_natural_key")).unwrap_or_default();
        let ref_text = text_of(reference.get("ref_text"))
            .unwrap_or_default()
            .trim()
            .to_string();
        if source.is_empty() || ref_text.is_empty() {
            skipped.references += 1;
            continue;
        }
        let mut context = properties_of(reference.get("context"));
        set_default(&mut context, "legal_ref", legal_ref);
        batch.references.push(ReferenceCandidate {
            source_natural_key: source,
            ref_text,
            context,
        });
    }

    for entry in objects(payload, "fz_questions") {
        let question = entry.map(|q| FzQuestion {
            question: text_of(q.get("question")).unwrap_or_default(),
            source: text_of(q.get("source")).unwrap_or_default(),
        });
        match question {
            Some(q) => batch.fz_questions.push(q),
            None => skipped.fz_questions += 1,
        }
    }

    (batch, skipped)
}

/// For an `app_N` chapter that produced nodes but no references, cite the
/// appendix from the first node so the resolver links the chapter to it.
fn add_appendix_reference(batch: &mut CandidateBatch, chapter: &str, legal_ref: &str) {
    if !batch.references.is_empty() {
        return;
    }
    let Some(first) = batch.nodes.first() else {
        return;
    };
    let is_appendix_chapter = chapter
        .strip_prefix("app_")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    if !is_appendix_chapter {
        return;
    }
    let Some(label) = appendix_label(chapter) else {
        return;
    };

    let mut context = Properties::new();
    context.insert("legal_ref".into(), legal_ref.into());
    batch.references.push(ReferenceCandidate {
        source_natural_key: first.natural_key.clone(),
        ref_text: format!("см. {}", label),
        context,
    });
}

// =============================================================================
// PHASE
// =============================================================================

/// A response that needed the fallback batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub chapter: String,
    pub error: String,
}

/// Outcome of the extraction phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionReport {
    pub node_candidates: usize,
    pub edge_candidates: usize,
    pub reference_candidates: usize,
    pub llm_calls: Vec<ExtractorCall>,
    pub parse_failures: Vec<ParseFailure>,
    pub skipped: SkippedCandidates,
    pub ingest: IngestReport,
}

impl ExtractionReport {
    /// Account for a batch that reached the store outside a pipeline run.
    pub fn record_batch(&mut self, batch: &CandidateBatch, ingest: IngestReport) {
        self.node_candidates += batch.nodes.len();
        self.edge_candidates += batch.edges.len();
        self.reference_candidates += batch.references.len();
        self.ingest.merge(ingest);
    }
}

/// Run extraction over every window and apply the merged batch.
pub fn run_extraction<G, E>(
    graph: &mut G,
    ingestion: &IngestionOutput,
    extractor: &E,
) -> Result<ExtractionReport, GraphError>
where
    G: GraphStore,
    E: Extractor + ?Sized,
{
    let mut merged = CandidateBatch::default();
    let mut report = ExtractionReport::default();

    for window in build_windows(ingestion) {
        let response = extractor.extract(&window)?;
        report.llm_calls.push(response.call);

        let legal_ref = window.legal_ref();
        let (mut batch, skipped) = match parse_extraction_json(&response.content) {
            Ok(payload) => normalize_payload(&payload, &legal_ref, &window.chapter),
            Err(error) => {
                tracing::warn!(
                    chapter = %window.chapter,
                    %error,
                    "unparseable extractor response, using fallback batch"
                );
                report.parse_failures.push(ParseFailure {
                    chapter: window.chapter.clone(),
                    error: error.to_string(),
                });
                (fallback_extraction(&window), SkippedCandidates::default())
            }
        };
        if skipped.total() > 0 {
            tracing::warn!(
                chapter = %window.chapter,
                skipped = skipped.total(),
                "malformed candidates dropped"
            );
        }
        report.skipped.add(skipped);

        add_appendix_reference(&mut batch, &window.chapter, &legal_ref);
        merged.extend(batch);
    }

    let ingest = Ingestor::apply(graph, &merged)?;
    report.record_batch(&merged, ingest);

    tracing::info!(
        calls = report.llm_calls.len(),
        nodes = report.node_candidates,
        edges = report.edge_candidates,
        references = report.reference_candidates,
        fallbacks = report.parse_failures.len(),
        "extraction finished"
    );
    Ok(report)
}

// =============================================================================
// TESTS
// =============================================================================
