//! # DOCX Reader
//!
//! Pulls paragraph text out of a `.docx` package: the `word/document.xml`
//! part is read from the zip container and every `<w:p>` becomes one
//! paragraph, with its `<w:t>` runs concatenated. Formatting, tables of
//! contents and embedded objects are ignored.

use crate::GraphError;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Read, Seek};
use std::path::Path;

/// Main document part inside the package.
const DOCUMENT_PART: &str = "word/document.xml";

/// `document.xml` parts larger than this are rejected (64 MB).
const MAX_DOCUMENT_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Whether a path names a Word document by extension.
pub fn is_docx(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"))
}

fn malformed(path: &Path, detail: impl std::fmt::Display) -> GraphError {
    GraphError::InvalidInput(format!("{}: malformed DOCX: {}", path.display(), detail))
}

/// Read the non-empty paragraphs of a `.docx` file, in document order.
pub fn read_docx_paragraphs(path: &Path) -> Result<Vec<String>, GraphError> {
    let file = std::fs::File::open(path)
        .map_err(|e| GraphError::Io(format!("{}: {}", path.display(), e)))?;
    let xml = read_document_part(file).map_err(|e| malformed(path, e))?;
    paragraphs_from_xml(&xml).map_err(|e| malformed(path, e))
}

/// Extract `word/document.xml` from a zip container.
pub fn read_document_part<R: Read + Seek>(reader: R) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| e.to_string())?;
    let part = archive.by_name(DOCUMENT_PART).map_err(|e| e.to_string())?;
    if part.size() > MAX_DOCUMENT_PART_SIZE {
        return Err(format!(
            "{} is {} bytes, limit is {}",
            DOCUMENT_PART,
            part.size(),
            MAX_DOCUMENT_PART_SIZE
        ));
    }

    let mut xml = String::new();
    part.take(MAX_DOCUMENT_PART_SIZE)
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;
    Ok(xml)
}

/// Collect paragraph text from WordprocessingML.
///
/// `<w:tab/>` and `<w:br/>` become a single space so a paragraph stays on
/// one line for the text heuristics.
pub fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => current.clear(),
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => {
                if matches!(e.name().as_ref(), b"w:tab" | b"w:br") {
                    current.push(' ');
                }
            }
            Event::Text(t) if in_text => {
                current.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

// =============================================================================
// TESTS
// =============================================================================
