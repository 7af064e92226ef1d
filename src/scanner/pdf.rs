//! PDF sources.
//!
//! Page text comes from `lopdf`'s text extraction. No layout analysis is
//! attempted: each extracted line becomes a paragraph, as for plain text.

use std::io::Read;

use lopdf::Document as LopdfDocument;
use unicode_normalization::UnicodeNormalization;

use super::{ContentScanner, SourceStream};
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::model::{ContentModel, Metadata, Paragraph};

/// Extracts page text from PDF documents.
#[derive(Debug, Clone, Default)]
pub struct PdfScanner {
    _private: (),
}

impl PdfScanner {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Scan a PDF held in memory.
    pub fn scan_bytes(&self, data: &[u8], cancel: &CancellationToken) -> Result<ContentModel> {
        let doc = LopdfDocument::load_mem(data)?;
        if doc.is_encrypted() {
            return Err(Error::SourceUnreadable(
                "PDF: encrypted documents are not supported".to_string(),
            ));
        }

        let mut model = ContentModel::new();
        model.metadata = extract_metadata(&doc);

        let pages = doc.get_pages();
        for (index, &page_number) in pages.keys().enumerate() {
            cancel.check()?;
            if index > 0 {
                // Page boundary
                model.add_paragraph(Paragraph::new());
            }
            let text = match doc.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Failed to extract text from page {}: {}", page_number, e);
                    continue;
                }
            };
            let normalized: String = text.nfc().collect();
            for line in normalized.lines() {
                let line = line.trim_end();
                if line.is_empty() {
                    model.add_paragraph(Paragraph::new());
                } else {
                    model.add_paragraph(Paragraph::with_text(line));
                }
            }
        }

        log::debug!(
            "Scanned PDF: {} pages, {} paragraphs",
            pages.len(),
            model.paragraphs.len()
        );
        Ok(model)
    }
}

impl ContentScanner for PdfScanner {
    fn name(&self) -> &str {
        "pdf"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn scan(&self, source: &mut dyn SourceStream, cancel: &CancellationToken) -> Result<ContentModel> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        self.scan_bytes(&data, cancel)
    }
}

fn extract_metadata(doc: &LopdfDocument) -> Metadata {
    let mut metadata = Metadata::for_source(DocumentFormat::Pdf);

    let info = doc
        .trailer
        .get(b"Info")
        .and_then(|info| info.as_reference())
        .and_then(|id| doc.get_dictionary(id));
    if let Ok(info) = info {
        metadata.title = get_string_from_dict(info, b"Title");
        metadata.creator = get_string_from_dict(info, b"Author");
        metadata.subject = get_string_from_dict(info, b"Subject");
        metadata.created = get_string_from_dict(info, b"CreationDate").and_then(|d| parse_pdf_date(&d));
        metadata.modified = get_string_from_dict(info, b"ModDate").and_then(|d| parse_pdf_date(&d));
    }
    metadata
}

/// Read a text string from a PDF dictionary (UTF-16BE with BOM, else
/// UTF-8, else Latin-1).
fn get_string_from_dict(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    let value = match dict.get(key).ok()? {
        lopdf::Object::String(bytes, _) => {
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                let utf16: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&utf16).ok()?
            } else {
                String::from_utf8(bytes.clone())
                    .unwrap_or_else(|_| bytes.iter().map(|&b| char::from(b)).collect())
            }
        }
        lopdf::Object::Name(bytes) => String::from_utf8(bytes.clone()).ok()?,
        _ => return None,
    };
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSS...`), ignoring the offset.
fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);
    if s.len() < 4 {
        return None;
    }

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let field = |range: std::ops::Range<usize>, default: u32| {
        s.get(range).and_then(|v| v.parse().ok()).unwrap_or(default)
    };
    chrono::NaiveDate::from_ymd_opt(year, field(4..6, 1), field(6..8, 1))
        .and_then(|date| date.and_hms_opt(field(8..10, 0), field(10..12, 0), field(12..14, 0)))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_pdf_date() {
        let date = parse_pdf_date("D:20240115103045+09'00'").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 15);

        let minimal = parse_pdf_date("D:2024").unwrap();
        assert_eq!(minimal.month(), 1);
        assert!(parse_pdf_date("D:").is_none());
    }

    #[test]
    fn test_garbage_is_source_error() {
        let result = PdfScanner::new().scan_bytes(b"%PDF-1.4 nothing else", &CancellationToken::new());
        assert!(matches!(result, Err(ref e) if e.is_source_error()));
    }
}
