//! Line-oriented WordprocessingML scanner.

use regex::Regex;

use super::metadata::parse_core_properties;
use super::table::extract_tables;
use super::xml::{decode_entities, text_span, AttributeReader, Tag, TagKind, Tags};
use super::{decode_utf8, ContentScanner, SourceStream};
use crate::archive::ArchiveReader;
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::model::{Alignment, ContentModel, Metadata, Paragraph, Run, MAX_HEADING_LEVEL};

/// Main document part of a WordprocessingML package.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Core properties part.
pub const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// Scanner for DOCX packages.
///
/// `word/document.xml` is walked line by line and, within a line, tag by
/// tag. Run style flags (`bold`, `italic`, `underline`) are tracked as the
/// tags are met and every `<w:t>` span becomes one run carrying the active
/// flags. A `<w:t>` must close on the line it opens on; when it does not,
/// the rest of that line is skipped.
///
/// Tables are extracted by a separate pass over the same text. Cell
/// paragraphs also stay in the body, so every `<w:t>` span yields a run.
pub struct DocxScanner {
    attributes: AttributeReader,
    heading_style: Regex,
}

impl DocxScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self {
            attributes: AttributeReader::new(),
            heading_style: Regex::new(r"^(?i:heading)\s?(\d+)$").unwrap(),
        }
    }

    /// Scan the text of `word/document.xml` into a model.
    pub fn scan_document(&self, xml: &str, cancel: &CancellationToken) -> Result<ContentModel> {
        let mut state = ScanState::default();
        for line in xml.lines() {
            self.scan_line(line, &mut state, cancel)?;
        }
        // A paragraph left open by a truncated document is still content.
        state.flush_paragraph();

        let mut model = ContentModel::new();
        model.paragraphs = state.paragraphs;
        model.tables = extract_tables(xml.lines());

        log::debug!(
            "Scanned document.xml: {} paragraphs, {} runs, {} tables, {} skipped lines",
            model.paragraphs.len(),
            model.run_count(),
            model.tables.len(),
            state.malformed_lines
        );
        if state.malformed_lines > 0 {
            log::warn!(
                "{} lines in document.xml had unterminated text spans",
                state.malformed_lines
            );
        }
        Ok(model)
    }

    fn scan_line(&self, line: &str, state: &mut ScanState, cancel: &CancellationToken) -> Result<()> {
        let mut tags = Tags::new(line);
        while let Some(tag) = tags.next() {
            match tag.name {
                "w:p" => match tag.kind {
                    TagKind::Open => state.open_paragraph(),
                    TagKind::Empty => {
                        state.open_paragraph();
                        state.flush_paragraph();
                        cancel.check()?;
                    }
                    TagKind::Close => {
                        state.flush_paragraph();
                        cancel.check()?;
                    }
                },
                "w:r" => match tag.kind {
                    TagKind::Open => state.open_run(),
                    TagKind::Close => state.in_run = false,
                    TagKind::Empty => {}
                },
                "w:b" => state.style.bold = self.toggle(&tag),
                "w:i" => state.style.italic = self.toggle(&tag),
                "w:u" => {
                    state.style.underline = self.toggle(&tag)
                        && self.attributes.get(&tag, "w:val").as_deref() != Some("none");
                }
                "w:sz" if tag.kind != TagKind::Close => {
                    state.style.size = self
                        .attributes
                        .get(&tag, "w:val")
                        .and_then(|v| v.parse().ok());
                }
                "w:rFonts" if tag.kind != TagKind::Close => {
                    state.style.font = self
                        .attributes
                        .get(&tag, "w:ascii")
                        .or_else(|| self.attributes.get(&tag, "w:hAnsi"));
                }
                "w:pStyle" if tag.kind != TagKind::Close => {
                    if let Some(level) = self
                        .attributes
                        .get(&tag, "w:val")
                        .and_then(|v| self.heading_level(&v))
                    {
                        state.heading_level = level;
                    }
                }
                "w:jc" if tag.kind != TagKind::Close && state.paragraph.is_some() => {
                    if let Some(alignment) = self
                        .attributes
                        .get(&tag, "w:val")
                        .and_then(|v| Alignment::from_ooxml(&v))
                    {
                        state.alignment = alignment;
                    }
                }
                "w:tab" if tag.kind == TagKind::Empty && state.in_run => state.push_break('\t'),
                "w:br" | "w:cr" if tag.kind == TagKind::Empty && state.in_run => {
                    state.push_break('\n')
                }
                "w:t" if tag.kind == TagKind::Open => {
                    let Some((text, next)) = text_span(line, tag.end, "</w:t>") else {
                        state.malformed_lines += 1;
                        return Ok(());
                    };
                    tags.skip_to(next);
                    state.push_text(&decode_entities(text));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// `<w:b/>` turns a flag on, `</w:b>` and `w:val="0"`/`"false"` off.
    fn toggle(&self, tag: &Tag<'_>) -> bool {
        if tag.kind == TagKind::Close {
            return false;
        }
        !matches!(
            self.attributes.get(tag, "w:val").as_deref(),
            Some("0") | Some("false") | Some("off")
        )
    }

    fn heading_level(&self, style: &str) -> Option<u8> {
        if style.eq_ignore_ascii_case("title") {
            return Some(1);
        }
        let caps = self.heading_style.captures(style)?;
        let level: u8 = caps[1].parse().ok()?;
        (level > 0).then(|| level.min(MAX_HEADING_LEVEL))
    }
}

impl Default for DocxScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentScanner for DocxScanner {
    fn name(&self) -> &str {
        "docx"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn scan(&self, source: &mut dyn SourceStream, cancel: &CancellationToken) -> Result<ContentModel> {
        let archive = ArchiveReader::new(source)?;

        let mut document = None;
        let mut core = None;
        for entry in archive {
            match entry {
                Ok(entry) if entry.name == DOCUMENT_PART => document = Some(entry),
                Ok(entry) if entry.name == CORE_PROPERTIES_PART => core = Some(entry),
                Ok(_) => {}
                Err(Error::EntryRead { name, reason }) if name != DOCUMENT_PART => {
                    log::warn!("Skipping unreadable entry '{}': {}", name, reason);
                }
                Err(e) => return Err(e),
            }
        }

        let document = document.ok_or_else(|| Error::MissingEntry(DOCUMENT_PART.to_string()))?;
        let xml = decode_utf8(document.bytes(), DOCUMENT_PART);
        let mut model = self.scan_document(&xml, cancel)?;

        model.metadata = match core {
            Some(entry) => parse_core_properties(&decode_utf8(entry.bytes(), CORE_PROPERTIES_PART)),
            None => Metadata::default(),
        };
        model.metadata.source_format = Some(DocumentFormat::Docx);
        Ok(model)
    }
}

#[derive(Debug, Default, Clone)]
struct RunStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    size: Option<u16>,
    font: Option<String>,
}

#[derive(Default)]
struct ScanState {
    paragraphs: Vec<Paragraph>,
    paragraph: Option<Paragraph>,
    style: RunStyle,
    heading_level: u8,
    alignment: Alignment,
    in_run: bool,
    /// Tab or break seen before the paragraph's first text
    pending: String,
    malformed_lines: usize,
}

impl ScanState {
    fn open_paragraph(&mut self) {
        // An unclosed previous paragraph still counts.
        self.flush_paragraph();
        self.paragraph = Some(Paragraph::new());
        self.heading_level = 0;
        self.alignment = Alignment::Left;
        self.pending.clear();
    }

    fn open_run(&mut self) {
        self.style = RunStyle::default();
        self.in_run = true;
    }

    fn flush_paragraph(&mut self) {
        let Some(mut paragraph) = self.paragraph.take() else {
            return;
        };
        self.in_run = false;
        // Tabs or breaks with no text after them form a run of their own.
        if !self.pending.is_empty() {
            paragraph.add_run(Run::new(std::mem::take(&mut self.pending)));
        }
        paragraph.heading_level = self.heading_level;
        paragraph.alignment = self.alignment;
        self.paragraphs.push(paragraph);
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() && self.pending.is_empty() {
            return;
        }
        let paragraph = self.paragraph.get_or_insert_with(Paragraph::new);
        let mut content = std::mem::take(&mut self.pending);
        content.push_str(text);
        paragraph.add_run(Run {
            text: content,
            bold: self.style.bold,
            italic: self.style.italic,
            underline: self.style.underline,
            font_size_half_points: self.style.size,
            font_family: self.style.font.clone(),
        });
    }

    fn push_break(&mut self, c: char) {
        match self.paragraph.as_mut().and_then(|p| p.runs.last_mut()) {
            Some(run) => run.text.push(c),
            None => self.pending.push(c),
        }
    }
}
