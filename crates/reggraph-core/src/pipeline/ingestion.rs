//! # Document Ingestion
//!
//! Turns plain regulatory text into a paragraph index, an appendix index and
//! a traversal plan. One non-empty line (or DOCX paragraph) is one
//! paragraph.
//!
//! Line heuristics, checked in order once an appendix is open:
//! - `Приложение N ...` opens appendix `app_N`
//! - `1.2) Title`, `3. Title`, `4 - Title` open a section
//! - `группа: X` or `раздел - X` adds a field group
//! - `- X`, `* X` or `поле: X` adds a field
//! - otherwise the first content line of a section without fields becomes
//!   `field_1`
//!
//! Lines before the first appendix are kept as paragraphs only.

use super::docx::{is_docx, read_docx_paragraphs};
use crate::GraphError;
use crate::primitives::DEFAULT_LEGAL_REF;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static APPENDIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*приложение\s+(\d+)").expect("appendix pattern is valid")
});

static SECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)*)[\)\.\s-]+(.+)$").expect("section pattern is valid")
});

static GROUP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:группа|раздел)\s*[:\-]\s*(.+)$").expect("group pattern is valid")
});

static FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[-*]\s+|поле\s*[:\-]\s*)(.+)$").expect("field pattern is valid")
});

/// Section opened implicitly when content precedes any numbered heading.
const IMPLICIT_SECTION_CODE: &str = "1";
const IMPLICIT_SECTION_TITLE: &str = "Общие сведения";

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// One source paragraph with its citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: String,
    pub text: String,
    pub legal_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub field_code: String,
    pub name: String,
    pub required: bool,
    pub legal_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub group_code: String,
    pub name: String,
    pub legal_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub section_code: String,
    pub title: String,
    pub legal_ref: String,
    pub field_groups: Vec<GroupEntry>,
    pub fields: Vec<FieldEntry>,
}

impl SectionEntry {
    fn new(code: &str, title: &str, legal_ref: &str) -> Self {
        Self {
            section_code: code.to_string(),
            title: title.to_string(),
            legal_ref: legal_ref.to_string(),
            field_groups: Vec::new(),
            fields: Vec::new(),
        }
    }
}

/// One appendix (`app_N`) and its sections, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendixEntry {
    pub appendix_id: String,
    pub title: String,
    pub legal_ref: String,
    pub sections: Vec<SectionEntry>,
}

impl AppendixEntry {
    /// Total number of fields over all sections.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.sections.iter().map(|s| s.fields.len()).sum()
    }
}

/// A unit of work for knowledge extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalItem {
    pub chapter: String,
    pub paragraph_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appendix_field_count: Option<usize>,
}

/// Everything the ingestion phase hands to the later phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionOutput {
    pub paragraphs: Vec<Paragraph>,
    pub appendices: Vec<AppendixEntry>,
    pub traversal_plan: Vec<TraversalItem>,
}

impl IngestionOutput {
    /// Lookup a paragraph by id.
    #[must_use]
    pub fn paragraph(&self, id: &str) -> Option<&Paragraph> {
        self.paragraphs.iter().find(|p| p.id == id)
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse plain text. Returns `None` when the text has no content lines.
#[must_use]
pub fn ingest_text(text: &str) -> Option<IngestionOutput> {
    let mut paragraphs = Vec::new();
    let mut appendices: Vec<AppendixEntry> = Vec::new();
    // Index into `appendices` of the appendix being filled.
    let mut current: Option<usize> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let number = paragraphs.len() + 1;
        paragraphs.push(Paragraph {
            id: format!("p_{}", number),
            text: line.to_string(),
            legal_ref: format!("{}, абз. {}", DEFAULT_LEGAL_REF, number),
        });

        if let Some(caps) = APPENDIX_PATTERN.captures(line) {
            let appendix_no = &caps[1];
            let entry = AppendixEntry {
                appendix_id: format!("app_{}", appendix_no),
                title: line.to_string(),
                legal_ref: format!("{}, приложение {}", DEFAULT_LEGAL_REF, appendix_no),
                sections: Vec::new(),
            };
            // A repeated heading restarts the appendix in its original slot.
            let slot = match appendices
                .iter()
                .position(|a| a.appendix_id == entry.appendix_id)
            {
                Some(i) => {
                    appendices[i] = entry;
                    i
                }
                None => {
                    appendices.push(entry);
                    appendices.len() - 1
                }
            };
            current = Some(slot);
            continue;
        }

        let Some(appendix) = current.and_then(|i| appendices.get_mut(i)) else {
            continue;
        };
        absorb_line(appendix, line);
    }

    if paragraphs.is_empty() {
        return None;
    }

    let all_ids: Vec<String> = paragraphs.iter().map(|p| p.id.clone()).collect();
    let traversal_plan = if appendices.is_empty() {
        vec![TraversalItem {
            chapter: "1".into(),
            paragraph_ids: all_ids,
            appendix_field_count: None,
        }]
    } else {
        appendices
            .iter()
            .map(|a| TraversalItem {
                chapter: a.appendix_id.clone(),
                paragraph_ids: all_ids.clone(),
                appendix_field_count: Some(a.field_count()),
            })
            .collect()
    };

    tracing::debug!(
        paragraphs = paragraphs.len(),
        appendices = appendices.len(),
        "text ingested"
    );

    Some(IngestionOutput {
        paragraphs,
        appendices,
        traversal_plan,
    })
}

fn absorb_line(appendix: &mut AppendixEntry, line: &str) {
    let legal_ref = appendix.legal_ref.clone();

    if let Some(caps) = SECTION_PATTERN.captures(line) {
        appendix
            .sections
            .push(SectionEntry::new(&caps[1], caps[2].trim(), &legal_ref));
        return;
    }

    if appendix.sections.is_empty() {
        appendix.sections.push(SectionEntry::new(
            IMPLICIT_SECTION_CODE,
            IMPLICIT_SECTION_TITLE,
            &legal_ref,
        ));
    }
    let Some(section) = appendix.sections.last_mut() else {
        return;
    };

    if let Some(caps) = GROUP_PATTERN.captures(line) {
        let group_code = format!("group_{}", section.field_groups.len() + 1);
        section.field_groups.push(GroupEntry {
            group_code,
            name: caps[1].trim().to_string(),
            legal_ref,
        });
        return;
    }

    if let Some(caps) = FIELD_PATTERN.captures(line) {
        let field_code = format!("field_{}", section.fields.len() + 1);
        section.fields.push(FieldEntry {
            field_code,
            name: caps[1].trim().to_string(),
            required: true,
            legal_ref,
        });
        return;
    }

    if section.fields.is_empty() {
        section.fields.push(FieldEntry {
            field_code: "field_1".into(),
            name: line.to_string(),
            required: true,
            legal_ref,
        });
    }
}

/// Built-in single-paragraph document used when there is no usable input.
#[must_use]
pub fn fallback_ingestion() -> IngestionOutput {
    IngestionOutput {
        paragraphs: vec![Paragraph {
            id: "p_1".into(),
            text: "Регистрация выпуска требует предоставления решения о выпуске.".into(),
            legal_ref: "706-П, гл. 1, п. 1.1".into(),
        }],
        appendices: vec![AppendixEntry {
            appendix_id: "app_1".into(),
            title: "Приложение 1. Перечень документов".into(),
            legal_ref: "706-П, приложение 1".into(),
            sections: Vec::new(),
        }],
        traversal_plan: vec![TraversalItem {
            chapter: "1".into(),
            paragraph_ids: vec!["p_1".into()],
            appendix_field_count: None,
        }],
    }
}

/// Run the ingestion phase for an optional input file.
///
/// `.docx` files are read paragraph by paragraph; anything else is read as
/// UTF-8 text.
///
/// A missing path, a missing file or a file without content falls back to
/// the built-in document. A file that exists but cannot be read is an error.
pub fn ingest_path(input_path: Option<&Path>) -> Result<IngestionOutput, GraphError> {
    let Some(path) = input_path else {
        tracing::info!("no input document, using built-in fallback");
        return Ok(fallback_ingestion());
    };
    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "input document not found, using built-in fallback"
        );
        return Ok(fallback_ingestion());
    }

    let text = if is_docx(path) {
        read_docx_paragraphs(path)?.join("\n")
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| GraphError::Io(format!("{}: {}", path.display(), e)))?
    };
    match ingest_text(&text) {
        Some(output) => Ok(output),
        None => {
            tracing::warn!(
                path = %path.display(),
                "input document is empty, using built-in fallback"
            );
            Ok(fallback_ingestion())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
