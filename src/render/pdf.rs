//! Simple-layout PDF encoder.
//!
//! Paragraphs are word-wrapped onto fixed-size pages using the standard
//! Helvetica faces, so no fonts are embedded. Text widths are estimated
//! from [`PdfLayout::average_glyph_width`] rather than real glyph metrics.

use std::fmt::Write as _;
use std::io::Write;

use chrono::{DateTime, Utc};

use super::{Encoder, PdfLayout, RenderOptions};
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::{Alignment, ContentModel, Metadata, Paragraph};

/// Spaces a tab expands to.
const TAB_WIDTH: usize = 4;

/// Cells of a table row are laid out as one line, separated by this gap.
const CELL_SEPARATOR: &str = "    ";

/// The four standard Helvetica faces, in resource order `/F1`..`/F4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
    Oblique,
    BoldOblique,
}

impl Face {
    const ALL: [Face; 4] = [Face::Regular, Face::Bold, Face::Oblique, Face::BoldOblique];

    fn of(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => Face::Regular,
            (true, false) => Face::Bold,
            (false, true) => Face::Oblique,
            (true, true) => Face::BoldOblique,
        }
    }

    fn resource(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
            Face::Oblique => "F3",
            Face::BoldOblique => "F4",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Face::Regular => "Helvetica",
            Face::Bold => "Helvetica-Bold",
            Face::Oblique => "Helvetica-Oblique",
            Face::BoldOblique => "Helvetica-BoldOblique",
        }
    }
}

/// A stretch of text in one face and size.
#[derive(Debug, Clone, PartialEq)]
struct Span {
    text: String,
    face: Face,
    size: f32,
    underline: bool,
}

impl Span {
    fn same_style(&self, other: &Span) -> bool {
        self.face == other.face && self.size == other.size && self.underline == other.underline
    }
}

#[derive(Debug, Default)]
struct Line {
    spans: Vec<Span>,
    /// Size used for the line height when the line has no spans
    base_size: f32,
}

impl Line {
    fn new(base_size: f32) -> Self {
        Self {
            spans: Vec::new(),
            base_size,
        }
    }

    fn push(&mut self, span: Span) {
        match self.spans.last_mut() {
            Some(last) if last.same_style(&span) => last.text.push_str(&span.text),
            _ => self.spans.push(span),
        }
    }

    fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }

    fn height(&self, layout: &PdfLayout) -> f32 {
        let size = self
            .spans
            .iter()
            .map(|s| s.size)
            .fold(self.base_size, f32::max);
        size * layout.line_spacing
    }

    /// Estimated width with trailing spaces ignored.
    fn visible_width(&self, layout: &PdfLayout) -> f32 {
        let mut width: f32 = self.spans.iter().map(|s| text_width(&s.text, s.size, layout)).sum();
        if let Some(last) = self.spans.last() {
            let trailing = last.text.len() - last.text.trim_end_matches(' ').len();
            width -= trailing as f32 * last.size * layout.average_glyph_width;
        }
        width.max(0.0)
    }
}

fn text_width(text: &str, size: f32, layout: &PdfLayout) -> f32 {
    text.chars().count() as f32 * size * layout.average_glyph_width
}

/// Break one paragraph into lines that fit `max_width`.
fn wrap_paragraph(paragraph: &Paragraph, layout: &PdfLayout) -> Vec<Line> {
    let heading = paragraph.heading_level.min(3);
    let base_size = layout.size_for_heading(heading);
    let max_width = layout.text_width();

    let mut lines = Vec::new();
    let mut line = Line::new(base_size);
    let mut line_width = 0.0f32;

    for run in &paragraph.runs {
        let face = Face::of(run.bold || heading > 0, run.italic);
        let size = if heading > 0 {
            base_size
        } else {
            run.font_size_pt().unwrap_or(base_size)
        };
        let span = |text: String| Span {
            text,
            face,
            size,
            underline: run.underline,
        };

        let expanded = run.text.replace('\t', &" ".repeat(TAB_WIDTH)).replace('\r', "");
        for (index, segment) in expanded.split('\n').enumerate() {
            if index > 0 {
                lines.push(std::mem::replace(&mut line, Line::new(base_size)));
                line_width = 0.0;
            }
            for word in segment.split_inclusive(' ') {
                let word_width = text_width(word, size, layout);
                let visible = text_width(word.trim_end_matches(' '), size, layout);

                if line_width + visible > max_width && !line.is_empty() {
                    lines.push(std::mem::replace(&mut line, Line::new(base_size)));
                    line_width = 0.0;
                }

                if visible > max_width {
                    // Longer than a full line: hard-break by characters.
                    let per_line = ((max_width / (size * layout.average_glyph_width)) as usize).max(1);
                    let chars: Vec<char> = word.chars().collect();
                    for chunk in chars.chunks(per_line) {
                        if !line.is_empty() {
                            lines.push(std::mem::replace(&mut line, Line::new(base_size)));
                        }
                        let text: String = chunk.iter().collect();
                        line_width = text_width(&text, size, layout);
                        line.push(span(text));
                    }
                    continue;
                }

                line.push(span(word.to_string()));
                line_width += word_width;
            }
        }
    }
    lines.push(line);
    lines
}

/// Accumulates page content streams.
struct PageBuilder<'a> {
    layout: &'a PdfLayout,
    cancel: &'a CancellationToken,
    pages: Vec<String>,
    current: String,
    y: f32,
}

impl<'a> PageBuilder<'a> {
    fn new(layout: &'a PdfLayout, cancel: &'a CancellationToken) -> Result<Self> {
        cancel.check()?;
        Ok(Self {
            layout,
            cancel,
            pages: Vec::new(),
            current: String::new(),
            y: layout.page_height - layout.margin,
        })
    }

    fn new_page(&mut self) -> Result<()> {
        self.cancel.check()?;
        self.pages.push(std::mem::take(&mut self.current));
        self.y = self.layout.page_height - self.layout.margin;
        Ok(())
    }

    fn place_paragraph(&mut self, paragraph: &Paragraph) -> Result<()> {
        for line in wrap_paragraph(paragraph, self.layout) {
            self.place_line(&line, paragraph.alignment)?;
        }
        self.y -= self.layout.paragraph_spacing;
        Ok(())
    }

    fn place_line(&mut self, line: &Line, alignment: Alignment) -> Result<()> {
        let height = line.height(self.layout);
        if self.y - height < self.layout.margin && !self.current.is_empty() {
            self.new_page()?;
        }
        self.y -= height;

        let slack = (self.layout.text_width() - line.visible_width(self.layout)).max(0.0);
        let mut x = self.layout.margin
            + match alignment {
                Alignment::Center => slack / 2.0,
                Alignment::Right => slack,
                Alignment::Left | Alignment::Justify => 0.0,
            };

        let baseline = self.y + height - line.spans.iter().map(|s| s.size).fold(line.base_size, f32::max);
        for span in line.spans.iter().filter(|s| !s.text.is_empty()) {
            let _ = writeln!(
                self.current,
                "BT /{} {} Tf {:.2} {:.2} Td ({}) Tj ET",
                span.face.resource(),
                number(span.size),
                x,
                baseline,
                pdf_text(&span.text)
            );
            let width = text_width(&span.text, span.size, self.layout);
            if span.underline {
                let under = baseline - span.size * 0.15;
                let _ = writeln!(
                    self.current,
                    "{:.2} w {:.2} {:.2} m {:.2} {:.2} l S",
                    (span.size / 20.0).max(0.5),
                    x,
                    under,
                    x + width,
                    under
                );
            }
            x += width;
        }

        // Keep blank lines visible to the page-break check.
        if line.is_empty() && self.current.is_empty() {
            self.current.push_str("% blank\n");
        }
        Ok(())
    }

    fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

/// Writes paginated PDF 1.4 output.
#[derive(Debug, Clone, Default)]
pub struct PdfEncoder {
    _private: (),
}

impl PdfEncoder {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Lay out the model and return one content stream per page.
    fn layout_pages(
        &self,
        model: &ContentModel,
        options: &RenderOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut builder = PageBuilder::new(&options.pdf, cancel)?;
        for paragraph in &model.paragraphs {
            builder.place_paragraph(paragraph)?;
        }
        if options.include_tables {
            for table in &model.tables {
                for row in &table.rows {
                    let text: Vec<&str> = row.cells.iter().map(|c| c.text.as_str()).collect();
                    builder.place_paragraph(&Paragraph::with_text(text.join(CELL_SEPARATOR)))?;
                }
            }
        }
        Ok(builder.finish())
    }

    /// Render the whole document into memory.
    pub fn render(
        &self,
        model: &ContentModel,
        options: &RenderOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let pages = self.layout_pages(model, options, cancel)?;
        let layout = &options.pdf;

        // 1 catalog, 2 page tree, 3-6 fonts, 7 info, then page/content pairs.
        let first_page = 8;
        let mut objects: Vec<String> = Vec::with_capacity(7 + pages.len() * 2);
        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());

        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", first_page + i * 2))
            .collect();
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ));

        for face in Face::ALL {
            objects.push(format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                face.base_font()
            ));
        }
        objects.push(info_dictionary(&model.metadata, options));

        let fonts: Vec<String> = Face::ALL
            .iter()
            .enumerate()
            .map(|(i, face)| format!("/{} {} 0 R", face.resource(), 3 + i))
            .collect();
        for (index, content) in pages.iter().enumerate() {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << {} >> >> /Contents {} 0 R >>",
                number(layout.page_width),
                number(layout.page_height),
                fonts.join(" "),
                first_page + index * 2 + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}endstream",
                content.len(),
                content
            ));
        }

        let mut out: Vec<u8> = Vec::with_capacity(objects.iter().map(|o| o.len() + 24).sum::<usize>() + 256);
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, object) in objects.iter().enumerate() {
            offsets.push(out.len());
            write!(out, "{} 0 obj\n{}\nendobj\n", index + 1, object)?;
        }

        let xref_offset = out.len();
        write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1)?;
        for offset in offsets {
            write!(out, "{:010} 00000 n \n", offset)?;
        }
        write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R /Info 7 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )?;

        log::debug!("Wrote PDF with {} pages", pages.len());
        Ok(out)
    }
}

impl Encoder for PdfEncoder {
    fn name(&self) -> &str {
        "pdf"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn encode(
        &self,
        model: &ContentModel,
        out: &mut dyn Write,
        options: &RenderOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        out.write_all(&self.render(model, options, cancel)?)?;
        Ok(())
    }
}

fn info_dictionary(metadata: &Metadata, options: &RenderOptions) -> String {
    let mut info = String::from("<<");
    let strings = [
        ("Title", metadata.title.as_deref()),
        ("Author", metadata.creator.as_deref()),
        ("Subject", metadata.subject.as_deref()),
        ("Producer", Some(options.generator.as_str())),
    ];
    for (key, value) in strings {
        if let Some(value) = value {
            let _ = write!(info, " /{} {}", key, pdf_text_string(value));
        }
    }
    for (key, value) in [("CreationDate", metadata.created), ("ModDate", metadata.modified)] {
        if let Some(at) = value {
            let _ = write!(info, " /{} ({})", key, pdf_date(at));
        }
    }
    info.push_str(" >>");
    info
}

fn pdf_date(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Escape page text for a literal string. Latin-1 characters above ASCII
/// become octal escapes; anything else becomes `?`.
fn pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{A0}'..='\u{FF}' => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

/// Document information strings: literal when ASCII, UTF-16BE hex otherwise.
fn pdf_text_string(text: &str) -> String {
    if text.chars().all(|c| matches!(c, ' '..='~')) {
        return format!("({})", pdf_text(text));
    }
    let mut hex = String::from("<FEFF");
    for unit in text.encode_utf16() {
        let _ = write!(hex, "{:04X}", unit);
    }
    hex.push('>');
    hex
}

/// Format a number without a trailing `.0`.
fn number(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}
