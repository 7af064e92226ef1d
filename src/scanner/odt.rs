//! OpenDocument text sources.

use super::metadata::parse_odf_meta;
use super::xml::{collapse_whitespace, decode_entities, AttributeReader, TagKind, Tags};
use super::{decode_utf8, ContentScanner, SourceStream};
use crate::archive::ArchiveReader;
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::model::{ContentModel, Paragraph, Table, TableCell, TableRow, MAX_HEADING_LEVEL};

/// Body part of an OpenDocument package.
pub const CONTENT_PART: &str = "content.xml";

/// Metadata part of an OpenDocument package.
pub const META_PART: &str = "meta.xml";

/// Reads `<text:p>` and `<text:h>` elements from `content.xml`.
///
/// Character styles are not resolved: each paragraph becomes a single
/// plain run. Notes and annotations are skipped.
pub struct OdtScanner {
    attributes: AttributeReader,
}

impl OdtScanner {
    pub fn new() -> Self {
        Self {
            attributes: AttributeReader::new(),
        }
    }

    /// Scan the text of `content.xml`.
    pub fn scan_content(&self, xml: &str, cancel: &CancellationToken) -> Result<ContentModel> {
        let mut state = OdtState::default();
        let mut gap_start = 0;

        for tag in Tags::new(xml) {
            if state.collecting() {
                state.push_raw(&xml[gap_start..tag.start]);
            }
            gap_start = tag.end;

            match (tag.name, tag.kind) {
                ("text:note" | "office:annotation", TagKind::Open) => state.skip_depth += 1,
                ("text:note" | "office:annotation", TagKind::Close) => {
                    state.skip_depth = state.skip_depth.saturating_sub(1)
                }
                _ if state.skip_depth > 0 => {}

                ("text:p" | "text:h", TagKind::Open) => {
                    if state.paragraph.is_none() {
                        state.paragraph = Some(String::new());
                        state.heading_level = self.heading_level(&tag);
                    }
                    state.paragraph_depth += 1;
                }
                ("text:p" | "text:h", TagKind::Empty) => {
                    if state.paragraph.is_none() {
                        state.heading_level = self.heading_level(&tag);
                        state.paragraph = Some(String::new());
                        state.finish_paragraph();
                    }
                }
                ("text:p" | "text:h", TagKind::Close) => {
                    state.paragraph_depth = state.paragraph_depth.saturating_sub(1);
                    if state.paragraph_depth == 0 {
                        state.finish_paragraph();
                        cancel.check()?;
                    }
                }

                ("text:tab", _) if state.collecting() && tag.kind != TagKind::Close => {
                    state.push_literal("\t")
                }
                ("text:line-break", _) if state.collecting() && tag.kind != TagKind::Close => {
                    state.push_literal("\n")
                }
                ("text:s", _) if state.collecting() && tag.kind != TagKind::Close => {
                    let count = self
                        .attributes
                        .get(&tag, "text:c")
                        .and_then(|c| c.parse::<usize>().ok())
                        .unwrap_or(1);
                    state.push_literal(&" ".repeat(count));
                }

                ("table:table", TagKind::Open) => {
                    state.table_depth += 1;
                    if state.table_depth == 1 {
                        state.table = Some(Table::new());
                    }
                }
                ("table:table", TagKind::Close) => {
                    if state.table_depth == 1 {
                        if let Some(table) = state.table.take() {
                            state.model.add_table(table);
                        }
                    }
                    state.table_depth = state.table_depth.saturating_sub(1);
                }
                ("table:table-row", TagKind::Open) if state.table_depth == 1 => {
                    state.row = Some(Vec::new())
                }
                ("table:table-row", TagKind::Close) if state.table_depth == 1 => {
                    if let (Some(table), Some(cells)) = (state.table.as_mut(), state.row.take()) {
                        table.add_row(TableRow::new(cells));
                    }
                }
                ("table:table-cell", TagKind::Open) if state.table_depth == 1 => {
                    state.cell = Some(String::new())
                }
                ("table:table-cell", TagKind::Empty) if state.table_depth == 1 => {
                    if let Some(row) = state.row.as_mut() {
                        row.push(TableCell::default());
                    }
                }
                ("table:table-cell", TagKind::Close) if state.table_depth == 1 => {
                    if let (Some(row), Some(text)) = (state.row.as_mut(), state.cell.take()) {
                        row.push(TableCell::text(text));
                    }
                }
                _ => {}
            }
        }

        log::debug!(
            "Scanned content.xml: {} paragraphs, {} tables",
            state.model.paragraphs.len(),
            state.model.tables.len()
        );
        Ok(state.model)
    }

    fn heading_level(&self, tag: &super::xml::Tag<'_>) -> u8 {
        if tag.name != "text:h" {
            return 0;
        }
        self.attributes
            .get(tag, "text:outline-level")
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(1)
            .clamp(1, MAX_HEADING_LEVEL)
    }
}

impl Default for OdtScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentScanner for OdtScanner {
    fn name(&self) -> &str {
        "odt"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Odt
    }

    fn scan(&self, source: &mut dyn SourceStream, cancel: &CancellationToken) -> Result<ContentModel> {
        let archive = ArchiveReader::new(source)?;

        let mut content = None;
        let mut meta = None;
        for entry in archive {
            match entry {
                Ok(entry) if entry.name == CONTENT_PART => content = Some(entry),
                Ok(entry) if entry.name == META_PART => meta = Some(entry),
                Ok(_) => {}
                Err(Error::EntryRead { name, reason }) if name != CONTENT_PART => {
                    log::warn!("Skipping unreadable entry '{}': {}", name, reason);
                }
                Err(e) => return Err(e),
            }
        }

        let content = content.ok_or_else(|| Error::MissingEntry(CONTENT_PART.to_string()))?;
        let mut model = self.scan_content(&decode_utf8(content.bytes(), CONTENT_PART), cancel)?;
        if let Some(entry) = meta {
            model.metadata = parse_odf_meta(&decode_utf8(entry.bytes(), META_PART));
        }
        model.metadata.source_format = Some(DocumentFormat::Odt);
        Ok(model)
    }
}

#[derive(Default)]
struct OdtState {
    model: ContentModel,
    paragraph: Option<String>,
    paragraph_depth: usize,
    heading_level: u8,
    skip_depth: usize,
    table_depth: usize,
    table: Option<Table>,
    row: Option<Vec<TableCell>>,
    cell: Option<String>,
}

impl OdtState {
    fn collecting(&self) -> bool {
        self.paragraph.is_some() && self.skip_depth == 0
    }

    /// Character data between tags: whitespace collapses, entities decode.
    fn push_raw(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let mut collapsed = String::with_capacity(raw.len());
        collapse_whitespace(raw, &mut collapsed);
        if let Some(buffer) = self.paragraph.as_mut() {
            let text = if buffer.is_empty() {
                collapsed.trim_start()
            } else {
                collapsed.as_str()
            };
            buffer.push_str(&decode_entities(text));
        }
    }

    fn push_literal(&mut self, text: &str) {
        if let Some(buffer) = self.paragraph.as_mut() {
            buffer.push_str(text);
        }
    }

    fn finish_paragraph(&mut self) {
        let Some(text) = self.paragraph.take() else {
            return;
        };
        self.paragraph_depth = 0;

        if let Some(cell) = self.cell.as_mut() {
            if !text.is_empty() {
                if !cell.is_empty() {
                    cell.push(' ');
                }
                cell.push_str(&text);
            }
            return;
        }

        let mut paragraph = if text.is_empty() {
            Paragraph::new()
        } else {
            Paragraph::with_text(text)
        };
        paragraph.heading_level = self.heading_level;
        self.model.add_paragraph(paragraph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(xml: &str) -> ContentModel {
        OdtScanner::new()
            .scan_content(xml, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn test_paragraphs_and_empty() {
        let model = scan(
            r#"<office:body><office:text><text:p text:style-name="P1">Hello <text:span text:style-name="T1">world</text:span></text:p><text:p/></office:text></office:body>"#,
        );
        assert_eq!(model.paragraphs.len(), 2);
        assert_eq!(model.paragraphs[0].plain_text(), "Hello world");
        assert!(model.paragraphs[1].runs.is_empty());
    }

    #[test]
    fn test_heading_and_special_elements() {
        let model = scan(concat!(
            r#"<text:h text:outline-level="2">Chapter</text:h>"#,
            r#"<text:p>a<text:tab/>b<text:line-break/>c<text:s text:c="3"/>d &amp; e</text:p>"#,
        ));
        assert_eq!(model.paragraphs[0].heading_level, 2);
        assert_eq!(model.paragraphs[1].plain_text(), "a\tb\nc   d & e");
    }

    #[test]
    fn test_pretty_printed_whitespace_collapses() {
        let model = scan("<text:p>\n    first\n    second\n</text:p>");
        assert_eq!(model.paragraphs[0].plain_text(), "first second ");
    }

    #[test]
    fn test_tables_and_notes() {
        let model = scan(concat!(
            "<table:table><table:table-row>",
            "<table:table-cell><text:p>A1</text:p></table:table-cell>",
            "<table:table-cell/>",
            "</table:table-row></table:table>",
            "<text:p>Body<text:note><text:note-body><text:p>footnote</text:p></text:note-body></text:note></text:p>",
        ));
        assert_eq!(model.tables.len(), 1);
        assert_eq!(model.tables[0].rows[0].cells.len(), 2);
        assert_eq!(model.tables[0].rows[0].cells[0].text, "A1");
        assert_eq!(model.paragraphs.len(), 1);
        assert_eq!(model.paragraphs[0].plain_text(), "Body");
    }
}
