//! Format-specific text readers for text-like artifacts.
//!
//! Turns raw bytes plus a content type into plain UTF-8 text. Covers the
//! formats the pipeline accepts as text-like input: plain text (UTF-8 with
//! Latin-1 fallback), PDF, and DOCX. Image artifacts never reach this
//! module; they go through the vision capability instead.

use std::io::Read;
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Reader failure. Callers map this into
/// [`PipelineError::Extraction`](crate::error::PipelineError::Extraction).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Ooxml(String),
}

/// Extract plain text from raw bytes. The returned `&'static str` names the
/// reader used, for provenance tagging.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<(String, &'static str), ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes).map(|t| (t, "pdf")),
        MIME_DOCX => extract_docx(bytes).map(|t| (t, "docx")),
        ct if ct.starts_with("text/") || ct == "application/json" || ct == "application/yaml" => {
            Ok(decode_text(bytes))
        }
        other => Err(ExtractError::UnsupportedContentType(other.to_string())),
    }
}

/// Decode as UTF-8, falling back to Latin-1. Every byte maps to a char in
/// Latin-1, so the fallback never fails.
fn decode_text(bytes: &[u8]) -> (String, &'static str) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), "utf-8"),
        Err(_) => (bytes.iter().map(|&b| b as char).collect(), "latin-1"),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Ooxml("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_w_t_elements(&doc_xml)
}

/// Collect the text content of all `w:t` runs, separating paragraphs with
/// blank lines so the chunker sees real paragraph boundaries.
fn extract_w_t_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.is_empty() && !out.ends_with("\n\n") {
                    out.push_str("\n\n");
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_content_type_returns_error() {
        let err = extract_text(b"foo", "application/octet-stream").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedContentType(_)));
    }

    #[test]
    fn test_plain_utf8_passes_through() {
        let (text, via) = extract_text("héllo".as_bytes(), MIME_TEXT).unwrap();
        assert_eq!(text, "héllo");
        assert_eq!(via, "utf-8");
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_latin1() {
        let bytes = vec![0x68, 0xe9, 0x6c, 0x6c, 0x6f]; // "héllo" in Latin-1
        let (text, via) = extract_text(&bytes, MIME_TEXT).unwrap();
        assert_eq!(text, "héllo");
        assert_eq!(via, "latin-1");
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", MIME_DOCX).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }
}
