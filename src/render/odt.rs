//! OpenDocument Text encoder.

use std::fmt::Write as _;
use std::io::Write;

use chrono::{DateTime, Utc};

use super::{escape_xml, Encoder, RenderOptions};
use crate::archive::ArchiveWriter;
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::{Alignment, ContentModel, Metadata, Paragraph, Run, Table};

/// Font used when neither the run nor the options name one.
pub const DEFAULT_FONT: &str = "Liberation Serif";

const ODT_MIME: &str = "application/vnd.oasis.opendocument.text";

/// Heading sizes in points for levels 1-3.
const HEADING_SIZES: [&str; 3] = ["18pt", "16pt", "14pt"];

const NAMESPACES: &str = concat!(
    r#"xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
    r#"xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" "#,
    r#"xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" "#,
    r#"xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" "#,
    r#"xmlns:fo="urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0" "#,
    r#"xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
    r#"xmlns:meta="urn:oasis:names:tc:opendocument:xmlns:meta:1.0""#
);

/// Writes an ODF text package.
///
/// `mimetype` is always the first entry and is stored uncompressed so
/// that readers can identify the package from its first bytes. The
/// remaining parts are deflated.
#[derive(Debug, Clone, Default)]
pub struct OdtEncoder {
    _private: (),
}

impl OdtEncoder {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build `content.xml`.
    pub fn content_xml(&self, model: &ContentModel, options: &RenderOptions) -> String {
        let styles = AutomaticStyles::collect(model);
        let mut out = String::with_capacity(512 + model.run_count() * 48);

        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(out, "<office:document-content {} office:version=\"1.3\">", NAMESPACES);
        styles.write(&mut out);
        out.push_str("<office:body>\n<office:text>\n");

        for paragraph in &model.paragraphs {
            write_paragraph(&mut out, paragraph, &styles);
        }
        if options.include_tables {
            for (index, table) in model.tables.iter().enumerate() {
                write_table(&mut out, table, index + 1);
            }
        }

        out.push_str("</office:text>\n</office:body>\n</office:document-content>\n");
        out
    }

    /// Build `styles.xml` with the default paragraph style and headings.
    pub fn styles_xml(&self, options: &RenderOptions) -> String {
        let font = escape_xml(options.font_or(None, DEFAULT_FONT)).into_owned();
        let mut out = String::with_capacity(1024);

        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(out, "<office:document-styles {} office:version=\"1.3\">", NAMESPACES);
        out.push_str("<office:styles>\n");
        let _ = writeln!(
            out,
            "<style:default-style style:family=\"paragraph\"><style:text-properties fo:font-family=\"{}\" fo:font-size=\"12pt\"/></style:default-style>",
            font
        );
        out.push_str("<style:style style:name=\"Standard\" style:family=\"paragraph\" style:class=\"text\"/>\n");
        for (index, size) in HEADING_SIZES.iter().enumerate() {
            let level = index + 1;
            let _ = writeln!(
                out,
                "<style:style style:name=\"Heading_20_{level}\" style:display-name=\"Heading {level}\" style:family=\"paragraph\" style:parent-style-name=\"Standard\" style:default-outline-level=\"{level}\" style:class=\"text\"><style:text-properties fo:font-size=\"{size}\" fo:font-weight=\"bold\"/></style:style>"
            );
        }
        out.push_str("</office:styles>\n</office:document-styles>\n");
        out
    }

    /// Build `meta.xml` from the model metadata.
    pub fn meta_xml(&self, metadata: &Metadata, options: &RenderOptions) -> String {
        let mut out = String::with_capacity(512);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(out, "<office:document-meta {} office:version=\"1.3\">", NAMESPACES);
        out.push_str("<office:meta>\n");
        let _ = writeln!(out, "<meta:generator>{}</meta:generator>", escape_xml(&options.generator));

        let elements = [
            ("dc:title", &metadata.title),
            ("dc:subject", &metadata.subject),
            ("dc:description", &metadata.description),
            ("meta:initial-creator", &metadata.creator),
            ("dc:creator", &metadata.creator),
        ];
        for (element, value) in elements {
            if let Some(value) = value {
                let _ = writeln!(out, "<{element}>{}</{element}>", escape_xml(value));
            }
        }
        if let Some(created) = metadata.created {
            let _ = writeln!(out, "<meta:creation-date>{}</meta:creation-date>", odf_date(created));
        }
        if let Some(modified) = metadata.modified {
            let _ = writeln!(out, "<dc:date>{}</dc:date>", odf_date(modified));
        }

        out.push_str("</office:meta>\n</office:document-meta>\n");
        out
    }

    /// Build `META-INF/manifest.xml`.
    pub fn manifest_xml(&self) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<manifest:manifest xmlns:manifest=\"urn:oasis:names:tc:opendocument:xmlns:manifest:1.0\" manifest:version=\"1.3\">\n",
        );
        let _ = writeln!(
            out,
            " <manifest:file-entry manifest:full-path=\"/\" manifest:version=\"1.3\" manifest:media-type=\"{}\"/>",
            ODT_MIME
        );
        for part in ["content.xml", "styles.xml", "meta.xml"] {
            let _ = writeln!(
                out,
                " <manifest:file-entry manifest:full-path=\"{}\" manifest:media-type=\"text/xml\"/>",
                part
            );
        }
        out.push_str("</manifest:manifest>\n");
        out
    }
}

impl Encoder for OdtEncoder {
    fn name(&self) -> &str {
        "odt"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Odt
    }

    fn encode(
        &self,
        model: &ContentModel,
        out: &mut dyn Write,
        options: &RenderOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut archive = ArchiveWriter::new(out).with_compression_level(options.compression_level);
        if let Some(at) = options.timestamp {
            archive = archive.with_timestamp(at);
        }

        archive.write_stored("mimetype", ODT_MIME.as_bytes())?;
        archive.write_deflated("content.xml", self.content_xml(model, options).as_bytes())?;
        cancel.check()?;
        archive.write_deflated("styles.xml", self.styles_xml(options).as_bytes())?;
        archive.write_deflated("meta.xml", self.meta_xml(&model.metadata, options).as_bytes())?;
        archive.write_deflated("META-INF/manifest.xml", self.manifest_xml().as_bytes())?;

        log::debug!("Wrote ODT package with {} entries", archive.entry_count());
        archive.finish()?;
        Ok(())
    }
}

fn odf_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn write_paragraph(out: &mut String, paragraph: &Paragraph, styles: &AutomaticStyles) {
    let heading = paragraph.heading_level.min(3);
    let element = if heading > 0 { "text:h" } else { "text:p" };

    out.push('<');
    out.push_str(element);
    match styles.paragraph_style(paragraph) {
        Some(name) => {
            let _ = write!(out, " text:style-name=\"{}\"", name);
        }
        None if heading > 0 => {
            let _ = write!(out, " text:style-name=\"Heading_20_{}\"", heading);
        }
        None => {}
    }
    if heading > 0 {
        let _ = write!(out, " text:outline-level=\"{}\"", heading);
    }

    if paragraph.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push('>');

    let mut after_space = true;
    for run in &paragraph.runs {
        match styles.text_style(run) {
            Some(name) => {
                let _ = write!(out, "<text:span text:style-name=\"{}\">", name);
                write_text(out, &run.text, &mut after_space);
                out.push_str("</text:span>");
            }
            None => write_text(out, &run.text, &mut after_space),
        }
    }
    let _ = writeln!(out, "</{}>", element);
}

/// Write run text so that an ODF reader's whitespace collapsing gives it
/// back unchanged. `after_space` carries across runs of one paragraph and
/// starts `true`, since leading spaces are dropped by readers.
fn write_text(out: &mut String, text: &str, after_space: &mut bool) {
    let mut literal = String::new();
    let mut spaces = 0usize;

    for c in text.chars() {
        match c {
            ' ' if *after_space => spaces += 1,
            ' ' => {
                literal.push(' ');
                *after_space = true;
            }
            '\t' | '\n' => {
                flush_text(out, &mut literal, &mut spaces);
                out.push_str(if c == '\t' { "<text:tab/>" } else { "<text:line-break/>" });
                *after_space = false;
            }
            '\r' => {}
            c => {
                if spaces > 0 {
                    flush_text(out, &mut literal, &mut spaces);
                }
                literal.push(c);
                *after_space = false;
            }
        }
    }
    flush_text(out, &mut literal, &mut spaces);
}

fn flush_text(out: &mut String, literal: &mut String, spaces: &mut usize) {
    out.push_str(&escape_xml(literal));
    literal.clear();
    match *spaces {
        0 => {}
        1 => out.push_str("<text:s/>"),
        n => {
            let _ = write!(out, "<text:s text:c=\"{}\"/>", n);
        }
    }
    *spaces = 0;
}

fn write_table(out: &mut String, table: &Table, number: usize) {
    let columns = table.column_count().max(1);
    let _ = writeln!(out, "<table:table table:name=\"Table{}\">", number);
    let _ = writeln!(out, "<table:table-column table:number-columns-repeated=\"{}\"/>", columns);
    for row in &table.rows {
        out.push_str("<table:table-row>");
        for column in 0..columns {
            out.push_str("<table:table-cell office:value-type=\"string\">");
            match row.cells.get(column).filter(|cell| !cell.is_empty()) {
                Some(cell) => {
                    out.push_str("<text:p>");
                    let mut after_space = true;
                    write_text(out, &cell.text, &mut after_space);
                    out.push_str("</text:p>");
                }
                None => out.push_str("<text:p/>"),
            }
            out.push_str("</table:table-cell>");
        }
        out.push_str("</table:table-row>\n");
    }
    out.push_str("</table:table>\n");
}

#[derive(Debug, Clone, PartialEq)]
struct TextStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    size: Option<u16>,
    font: Option<String>,
}

impl TextStyle {
    fn of(run: &Run) -> Option<Self> {
        if !run.has_styling() && run.font_size_half_points.is_none() && run.font_family.is_none() {
            return None;
        }
        Some(Self {
            bold: run.bold,
            italic: run.italic,
            underline: run.underline,
            size: run.font_size_half_points,
            font: run.font_family.clone(),
        })
    }
}

/// Automatic styles for one document: `T1`.. for run style combinations,
/// `P1`.. for paragraph alignment.
struct AutomaticStyles {
    text: Vec<TextStyle>,
    paragraph: Vec<(Alignment, u8)>,
}

impl AutomaticStyles {
    fn collect(model: &ContentModel) -> Self {
        let mut text: Vec<TextStyle> = Vec::new();
        let mut paragraph = Vec::new();

        for p in &model.paragraphs {
            if p.alignment != Alignment::Left {
                let key = (p.alignment, p.heading_level.min(3));
                if !paragraph.contains(&key) {
                    paragraph.push(key);
                }
            }
            for style in p.runs.iter().filter_map(TextStyle::of) {
                if !text.contains(&style) {
                    text.push(style);
                }
            }
        }
        Self { text, paragraph }
    }

    fn text_style(&self, run: &Run) -> Option<String> {
        let style = TextStyle::of(run)?;
        self.text
            .iter()
            .position(|s| *s == style)
            .map(|i| format!("T{}", i + 1))
    }

    fn paragraph_style(&self, paragraph: &Paragraph) -> Option<String> {
        let key = (paragraph.alignment, paragraph.heading_level.min(3));
        self.paragraph
            .iter()
            .position(|k| *k == key)
            .map(|i| format!("P{}", i + 1))
    }

    fn write(&self, out: &mut String) {
        if self.text.is_empty() && self.paragraph.is_empty() {
            out.push_str("<office:automatic-styles/>\n");
            return;
        }

        out.push_str("<office:automatic-styles>\n");
        for (index, (alignment, heading)) in self.paragraph.iter().enumerate() {
            let parent = if *heading > 0 {
                format!("Heading_20_{}", heading)
            } else {
                "Standard".to_string()
            };
            let align = match alignment {
                Alignment::Left => "start",
                Alignment::Center => "center",
                Alignment::Right => "end",
                Alignment::Justify => "justify",
            };
            let _ = writeln!(
                out,
                "<style:style style:name=\"P{}\" style:family=\"paragraph\" style:parent-style-name=\"{}\"><style:paragraph-properties fo:text-align=\"{}\"/></style:style>",
                index + 1,
                parent,
                align
            );
        }
        for (index, style) in self.text.iter().enumerate() {
            let _ = write!(
                out,
                "<style:style style:name=\"T{}\" style:family=\"text\"><style:text-properties",
                index + 1
            );
            if style.bold {
                out.push_str(" fo:font-weight=\"bold\"");
            }
            if style.italic {
                out.push_str(" fo:font-style=\"italic\"");
            }
            if style.underline {
                out.push_str(" style:text-underline-style=\"solid\" style:text-underline-width=\"auto\" style:text-underline-color=\"font-color\"");
            }
            if let Some(half_points) = style.size {
                let _ = write!(out, " fo:font-size=\"{}pt\"", f32::from(half_points) / 2.0);
            }
            if let Some(font) = &style.font {
                let _ = write!(out, " fo:font-family=\"{}\"", escape_xml(font));
            }
            out.push_str("/></style:style>\n");
        }
        out.push_str("</office:automatic-styles>\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveReader, CompressionMethod};
    use crate::model::TableRow;
    use crate::scanner::{ContentScanner, OdtScanner};
    use std::io::Cursor;

    fn hello_world() -> ContentModel {
        let mut model = ContentModel::new();
        let mut p = Paragraph::new();
        p.add_run(Run::new("Hello "));
        p.add_run(Run::bold("world"));
        model.add_paragraph(p);
        model.add_paragraph(Paragraph::new());
        model
    }

    #[test]
    fn test_content_paragraphs() {
        let xml = OdtEncoder::new().content_xml(&hello_world(), &RenderOptions::default());
        assert!(xml.contains("<text:p>Hello <text:span text:style-name=\"T1\">world</text:span></text:p>"));
        assert!(xml.contains("<text:p/>"));
        assert_eq!(xml.matches("<text:p").count(), 2);
        assert!(xml.contains("style:name=\"T1\" style:family=\"text\"><style:text-properties fo:font-weight=\"bold\"/>"));
    }

    #[test]
    fn test_mimetype_first_and_stored() {
        let bytes = OdtEncoder::new()
            .encode_to_vec(&hello_world(), &RenderOptions::default())
            .unwrap();
        assert_eq!(&bytes[30..38], b"mimetype");
        assert_eq!(&bytes[38..38 + ODT_MIME.len()], ODT_MIME.as_bytes());

        let mut reader = ArchiveReader::new(Cursor::new(bytes)).unwrap();
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.name, "mimetype");
        assert_eq!(first.method, CompressionMethod::Stored);
        assert_eq!(first.crc32, crc32fast::hash(ODT_MIME.as_bytes()));

        let rest: Vec<String> = reader.map(|e| e.unwrap().name).collect();
        assert_eq!(rest, ["content.xml", "styles.xml", "meta.xml", "META-INF/manifest.xml"]);
    }

    #[test]
    fn test_whitespace_survives_reader() {
        let mut out = String::new();
        let mut after_space = true;
        write_text(&mut out, "  a   b\tc\n<d>", &mut after_space);
        assert_eq!(
            out,
            "<text:s text:c=\"2\"/>a <text:s text:c=\"2\"/>b<text:tab/>c<text:line-break/>&lt;d&gt;"
        );
    }

    #[test]
    fn test_alignment_and_heading_styles() {
        let mut model = ContentModel::new();
        model.add_paragraph(Paragraph::heading("Intro", 2));
        model.add_paragraph(Paragraph::with_text("centered").align(Alignment::Center));
        let xml = OdtEncoder::new().content_xml(&model, &RenderOptions::default());

        assert!(xml.contains("<text:h text:style-name=\"Heading_20_2\" text:outline-level=\"2\">Intro</text:h>"));
        assert!(xml.contains("<text:p text:style-name=\"P1\">centered</text:p>"));
        assert!(xml.contains("fo:text-align=\"center\""));
    }

    #[test]
    fn test_round_trip_through_scanner() {
        let text = "First line\n\nSecond  line with <markup> & \"quotes\"\n\tindented";
        let mut model = ContentModel::from_plain_text(text);
        let mut table = Table::new();
        table.add_row(TableRow::from_strings(["x", "y"]));
        model.add_table(table);
        model.metadata.title = Some("Round trip".to_string());

        let bytes = OdtEncoder::new()
            .encode_to_vec(&model, &RenderOptions::default())
            .unwrap();
        let scanned = OdtScanner::new()
            .scan(&mut Cursor::new(bytes), &CancellationToken::new())
            .unwrap();

        assert_eq!(scanned.plain_text(), model.plain_text());
        assert_eq!(scanned.tables, model.tables);
        assert_eq!(scanned.metadata.title.as_deref(), Some("Round trip"));
    }

    #[test]
    fn test_meta_and_manifest() {
        let encoder = OdtEncoder::new();
        let mut metadata = Metadata::default();
        metadata.title = Some("A & B".to_string());
        let meta = encoder.meta_xml(&metadata, &RenderOptions::default());
        assert!(meta.contains("<dc:title>A &amp; B</dc:title>"));
        assert!(meta.contains("<meta:generator>docvert/"));

        let manifest = encoder.manifest_xml();
        assert!(manifest.contains("manifest:full-path=\"/\""));
        assert!(manifest.contains("manifest:full-path=\"content.xml\""));
    }
}
