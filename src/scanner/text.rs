//! Plain text sources.

use std::io::Read;

use super::{decode_utf8, ContentScanner, SourceStream};
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::{ContentModel, Metadata, Paragraph};

/// One paragraph per line, one run per non-empty line.
#[derive(Debug, Clone, Default)]
pub struct TextScanner {
    _private: (),
}

impl TextScanner {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a model from already-decoded text.
    pub fn scan_str(&self, text: &str, cancel: &CancellationToken) -> Result<ContentModel> {
        let mut model = ContentModel::new();
        for line in text.lines() {
            cancel.check()?;
            if line.is_empty() {
                model.add_paragraph(Paragraph::new());
            } else {
                model.add_paragraph(Paragraph::with_text(line));
            }
        }
        Ok(model)
    }
}

impl ContentScanner for TextScanner {
    fn name(&self) -> &str {
        "txt"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Txt
    }

    fn scan(&self, source: &mut dyn SourceStream, cancel: &CancellationToken) -> Result<ContentModel> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        let mut model = self.scan_str(&decode_utf8(&bytes, "text source"), cancel)?;
        model.metadata = Metadata::for_source(DocumentFormat::Txt);
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_lines_to_paragraphs() {
        let mut source = Cursor::new(b"first line\r\n\r\nthird".to_vec());
        let model = TextScanner::new()
            .scan(&mut source, &CancellationToken::new())
            .unwrap();
        assert_eq!(model.paragraphs.len(), 3);
        assert_eq!(model.paragraphs[0].plain_text(), "first line");
        assert!(model.paragraphs[1].runs.is_empty());
        assert_eq!(model.run_count(), 2);
        assert_eq!(model.metadata.source_format, Some(DocumentFormat::Txt));
    }

    #[test]
    fn test_empty_source() {
        let model = TextScanner::new()
            .scan_str("", &CancellationToken::new())
            .unwrap();
        assert!(model.is_empty());
    }
}
