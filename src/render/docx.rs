//! Minimal OOXML (DOCX) encoder.

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
pub const DEFAULT_FONT: &str = "Calibri";

/// Heading sizes in half-points for levels 1-3.
const HEADING_SIZES: [u16; 3] = [32, 28, 24];

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const DOC_REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
</Types>
"#;

/// Writes a minimal word-processing package.
///
/// Runs keep their bold/italic/underline flags, size and font. Paragraphs
/// keep alignment and heading level (as `HeadingN` styles). Tables follow
/// the body.
#[derive(Debug, Clone, Default)]
pub struct DocxEncoder {
    _private: (),
}

impl DocxEncoder {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build `word/document.xml`. Each paragraph sits on its own line.
    pub fn document_xml(&self, model: &ContentModel, options: &RenderOptions) -> String {
        let mut out = String::with_capacity(512 + model.run_count() * 96);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        let _ = writeln!(
            out,
            "<w:document xmlns:w=\"{}\" xmlns:r=\"{}\">",
            WORD_NS, DOC_REL_TYPE
        );
        out.push_str("<w:body>\n");

        for paragraph in &model.paragraphs {
            write_paragraph(&mut out, paragraph);
            out.push('\n');
        }
        if options.include_tables {
            for table in &model.tables {
                write_table(&mut out, table);
            }
        }

        out.push_str("<w:sectPr><w:pgSz w:w=\"12240\" w:h=\"15840\"/><w:pgMar w:top=\"1440\" w:right=\"1440\" w:bottom=\"1440\" w:left=\"1440\" w:header=\"720\" w:footer=\"720\" w:gutter=\"0\"/></w:sectPr>\n");
        out.push_str("</w:body>\n</w:document>\n");
        out
    }

    /// Build `word/styles.xml` with the default font and heading styles.
    pub fn styles_xml(&self, options: &RenderOptions) -> String {
        let font = escape_xml(options.font_or(None, DEFAULT_FONT)).into_owned();
        let mut out = String::with_capacity(1024);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        let _ = writeln!(out, "<w:styles xmlns:w=\"{}\">", WORD_NS);
        let _ = writeln!(
            out,
            "<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii=\"{font}\" w:hAnsi=\"{font}\" w:cs=\"{font}\"/><w:sz w:val=\"22\"/></w:rPr></w:rPrDefault></w:docDefaults>"
        );
        out.push_str("<w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\"><w:name w:val=\"Normal\"/></w:style>\n");
        for (index, size) in HEADING_SIZES.iter().enumerate() {
            let level = index + 1;
            let _ = writeln!(
                out,
                "<w:style w:type=\"paragraph\" w:styleId=\"Heading{level}\"><w:name w:val=\"heading {level}\"/><w:basedOn w:val=\"Normal\"/><w:next w:val=\"Normal\"/><w:qFormat/><w:pPr><w:keepNext/><w:outlineLvl w:val=\"{}\"/></w:pPr><w:rPr><w:b/><w:sz w:val=\"{size}\"/></w:rPr></w:style>",
                index
            );
        }
        out.push_str("<w:style w:type=\"table\" w:styleId=\"TableGrid\"><w:name w:val=\"Table Grid\"/><w:tblPr><w:tblBorders><w:top w:val=\"single\" w:sz=\"4\"/><w:left w:val=\"single\" w:sz=\"4\"/><w:bottom w:val=\"single\" w:sz=\"4\"/><w:right w:val=\"single\" w:sz=\"4\"/><w:insideH w:val=\"single\" w:sz=\"4\"/><w:insideV w:val=\"single\" w:sz=\"4\"/></w:tblBorders></w:tblPr></w:style>\n");
        out.push_str("</w:styles>\n");
        out
    }

    /// Build `docProps/core.xml`.
    pub fn core_xml(&self, metadata: &Metadata) -> String {
        let mut out = String::with_capacity(512);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        out.push_str("<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n");

        let elements = [
            ("dc:title", &metadata.title),
            ("dc:subject", &metadata.subject),
            ("dc:creator", &metadata.creator),
            ("dc:description", &metadata.description),
        ];
        for (element, value) in elements {
            if let Some(value) = value {
                let _ = writeln!(out, "<{element}>{}</{element}>", escape_xml(value));
            }
        }
        for (element, value) in [("dcterms:created", metadata.created), ("dcterms:modified", metadata.modified)] {
            if let Some(at) = value {
                let _ = writeln!(
                    out,
                    "<{element} xsi:type=\"dcterms:W3CDTF\">{}</{element}>",
                    w3c_date(at)
                );
            }
        }
        out.push_str("</cp:coreProperties>\n");
        out
    }

    /// Build `docProps/app.xml`.
    pub fn app_xml(&self, options: &RenderOptions) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\"><Application>{}</Application></Properties>\n",
            escape_xml(&options.generator)
        )
    }
}

impl Encoder for DocxEncoder {
    fn name(&self) -> &str {
        "docx"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
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

        archive.write_deflated("[Content_Types].xml", CONTENT_TYPES.as_bytes())?;
        archive.write_deflated("_rels/.rels", package_rels().as_bytes())?;
        archive.write_deflated("word/document.xml", self.document_xml(model, options).as_bytes())?;
        cancel.check()?;
        archive.write_deflated("word/_rels/document.xml.rels", document_rels().as_bytes())?;
        archive.write_deflated("word/styles.xml", self.styles_xml(options).as_bytes())?;
        archive.write_deflated("docProps/core.xml", self.core_xml(&model.metadata).as_bytes())?;
        archive.write_deflated("docProps/app.xml", self.app_xml(options).as_bytes())?;

        log::debug!("Wrote DOCX package with {} entries", archive.entry_count());
        archive.finish()?;
        Ok(())
    }
}

fn package_rels() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"{REL_NS}\">\n\
<Relationship Id=\"rId1\" Type=\"{DOC_REL_TYPE}/relationships/officeDocument\" Target=\"word/document.xml\"/>\n\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>\n\
<Relationship Id=\"rId3\" Type=\"{DOC_REL_TYPE}/relationships/extended-properties\" Target=\"docProps/app.xml\"/>\n\
</Relationships>\n"
    )
}

fn document_rels() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"{REL_NS}\">\n\
<Relationship Id=\"rId1\" Type=\"{DOC_REL_TYPE}/relationships/styles\" Target=\"styles.xml\"/>\n\
</Relationships>\n"
    )
}

fn w3c_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn write_paragraph(out: &mut String, paragraph: &Paragraph) {
    out.push_str("<w:p>");

    let heading = paragraph.heading_level.min(3);
    if heading > 0 || paragraph.alignment != Alignment::Left {
        out.push_str("<w:pPr>");
        if heading > 0 {
            let _ = write!(out, "<w:pStyle w:val=\"Heading{}\"/>", heading);
        }
        let jc = match paragraph.alignment {
            Alignment::Left => None,
            Alignment::Center => Some("center"),
            Alignment::Right => Some("right"),
            Alignment::Justify => Some("both"),
        };
        if let Some(jc) = jc {
            let _ = write!(out, "<w:jc w:val=\"{}\"/>", jc);
        }
        out.push_str("</w:pPr>");
    }

    for run in &paragraph.runs {
        write_run(out, run);
    }
    out.push_str("</w:p>");
}

fn write_run(out: &mut String, run: &Run) {
    out.push_str("<w:r>");
    if run.has_styling() || run.font_size_half_points.is_some() || run.font_family.is_some() {
        out.push_str("<w:rPr>");
        if let Some(font) = &run.font_family {
            let font = escape_xml(font);
            let _ = write!(out, "<w:rFonts w:ascii=\"{font}\" w:hAnsi=\"{font}\"/>");
        }
        if run.bold {
            out.push_str("<w:b/>");
        }
        if run.italic {
            out.push_str("<w:i/>");
        }
        if run.underline {
            out.push_str("<w:u w:val=\"single\"/>");
        }
        if let Some(size) = run.font_size_half_points {
            let _ = write!(out, "<w:sz w:val=\"{}\"/>", size);
        }
        out.push_str("</w:rPr>");
    }

    let mut segment = String::new();
    for c in run.text.chars() {
        match c {
            '\t' | '\n' => {
                push_text(out, &segment);
                segment.clear();
                out.push_str(if c == '\t' { "<w:tab/>" } else { "<w:br/>" });
            }
            '\r' => {}
            c => segment.push(c),
        }
    }
    push_text(out, &segment);
    out.push_str("</w:r>");
}

fn push_text(out: &mut String, text: &str) {
    if !text.is_empty() {
        let _ = write!(out, "<w:t xml:space=\"preserve\">{}</w:t>", escape_xml(text));
    }
}

fn write_table(out: &mut String, table: &Table) {
    let columns = table.column_count().max(1);
    let width = 9360 / columns;
    out.push_str("<w:tbl><w:tblPr><w:tblStyle w:val=\"TableGrid\"/><w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr><w:tblGrid>");
    for _ in 0..columns {
        let _ = write!(out, "<w:gridCol w:w=\"{}\"/>", width);
    }
    out.push_str("</w:tblGrid>\n");
    for row in &table.rows {
        out.push_str("<w:tr>");
        for column in 0..columns {
            let _ = write!(out, "<w:tc><w:tcPr><w:tcW w:w=\"{}\" w:type=\"dxa\"/></w:tcPr><w:p>", width);
            if let Some(cell) = row.cells.get(column) {
                if !cell.is_empty() {
                    out.push_str("<w:r>");
                    push_text(out, &cell.text);
                    out.push_str("</w:r>");
                }
            }
            out.push_str("</w:p></w:tc>");
        }
        out.push_str("</w:tr>\n");
    }
    out.push_str("</w:tbl>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableRow;
    use crate::scanner::{ContentScanner, DocxScanner};
    use std::io::Cursor;

    #[test]
    fn test_document_runs_and_styles() {
        let mut model = ContentModel::new();
        model.add_paragraph(Paragraph::heading("Overview", 1));
        let mut p = Paragraph::new().align(Alignment::Justify);
        p.add_run(Run::new("plain "));
        p.add_run(Run::bold("bold").with_size_pt(14.0));
        model.add_paragraph(p);
        model.add_paragraph(Paragraph::new());

        let xml = DocxEncoder::new().document_xml(&model, &RenderOptions::default());
        assert!(xml.contains("<w:p><w:pPr><w:pStyle w:val=\"Heading1\"/></w:pPr>"));
        assert!(xml.contains("<w:jc w:val=\"both\"/>"));
        assert!(xml.contains("<w:r><w:rPr><w:b/><w:sz w:val=\"28\"/></w:rPr><w:t xml:space=\"preserve\">bold</w:t></w:r>"));
        assert!(xml.contains("<w:p></w:p>"));
    }

    #[test]
    fn test_tabs_and_breaks() {
        let mut out = String::new();
        write_run(&mut out, &Run::new("a\tb\nc & d"));
        assert_eq!(
            out,
            "<w:r><w:t xml:space=\"preserve\">a</w:t><w:tab/><w:t xml:space=\"preserve\">b</w:t><w:br/><w:t xml:space=\"preserve\">c &amp; d</w:t></w:r>"
        );
    }

    #[test]
    fn test_package_parts_readable_by_zip() {
        let bytes = DocxEncoder::new()
            .encode_to_vec(&ContentModel::from_plain_text("hi"), &RenderOptions::default())
            .unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = zip.file_names().map(String::from).collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/_rels/document.xml.rels",
            "word/styles.xml",
            "docProps/core.xml",
            "docProps/app.xml",
        ] {
            assert!(names.iter().any(|n| n == part), "missing {}", part);
        }
        assert!(zip.by_name("word/document.xml").unwrap().size() > 0);
    }

    #[test]
    fn test_round_trip_through_scanner() {
        let mut model = ContentModel::new();
        model.metadata.title = Some("Report".to_string());
        model.add_paragraph(Paragraph::heading("Summary", 2));
        let mut p = Paragraph::new().align(Alignment::Center);
        p.add_run(Run::new("Hello "));
        p.add_run(Run::italic("<world>").with_font("Arial"));
        model.add_paragraph(p);
        model.add_paragraph(Paragraph::new());
        let mut table = Table::new();
        table.add_row(TableRow::from_strings(["a", "b"]));
        model.add_table(table);

        let bytes = DocxEncoder::new()
            .encode_to_vec(&model, &RenderOptions::default())
            .unwrap();
        let scanned = DocxScanner::new()
            .scan(&mut Cursor::new(bytes), &CancellationToken::new())
            .unwrap();

        // Cell paragraphs follow the body paragraphs.
        assert_eq!(scanned.paragraphs[..3], model.paragraphs[..]);
        let cells: Vec<String> = scanned.paragraphs[3..].iter().map(|p| p.plain_text()).collect();
        assert_eq!(cells, ["a", "b"]);
        assert_eq!(scanned.tables, model.tables);
        assert_eq!(scanned.metadata.title.as_deref(), Some("Report"));
    }

    #[test]
    fn test_core_properties() {
        let mut metadata = Metadata::default();
        metadata.creator = Some("A & B".to_string());
        let xml = DocxEncoder::new().core_xml(&metadata);
        assert!(xml.contains("<dc:creator>A &amp; B</dc:creator>"));
        assert!(!xml.contains("dc:title"));
    }
}
