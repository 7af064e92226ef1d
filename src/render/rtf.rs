//! RTF encoder.

use std::fmt::Write as _;
use std::io::Write;

use super::{escape_rtf, Encoder, RenderOptions};
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::{Alignment, ContentModel, Paragraph, Run, Table};

/// Font used for runs that carry no family of their own.
pub const DEFAULT_FONT: &str = "Times New Roman";

/// Half-point sizes for heading levels 1-3.
const HEADING_SIZES: [u16; 3] = [32, 28, 24];

/// Body size in half-points (12 pt).
const BODY_SIZE: u16 = 24;

/// Usable line width in twips (6.5 in).
const TEXT_WIDTH_TWIPS: u32 = 9360;

/// Writes RTF 1.x with a fixed preamble.
///
/// Literal text is escaped before any markup is added, so `\`, `{` and `}`
/// in the source always come out as literals.
#[derive(Debug, Clone, Default)]
pub struct RtfEncoder {
    _private: (),
}

impl RtfEncoder {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Render a model to an RTF string.
    pub fn render(&self, model: &ContentModel, options: &RenderOptions) -> String {
        let fonts = FontTable::collect(model, options);
        let mut out = String::with_capacity(256 + model.run_count() * 32);

        out.push_str("{\\rtf1\\ansi\\ansicpg1252\\deff0\\deftab720\n");
        out.push_str("{\\fonttbl");
        for (index, name) in fonts.names.iter().enumerate() {
            let _ = write!(out, "{{\\f{}\\fnil {};}}", index, escape_rtf(name));
        }
        out.push_str("}\n");
        out.push_str("{\\colortbl;\\red0\\green0\\blue0;}\n");
        if let Some(title) = &model.metadata.title {
            let _ = writeln!(out, "{{\\info{{\\title {}}}}}", escape_rtf(title));
        }
        let _ = writeln!(out, "\\viewkind4\\uc1\\f0\\fs{}", BODY_SIZE);

        for paragraph in &model.paragraphs {
            self.write_paragraph(&mut out, paragraph, &fonts);
        }
        if options.include_tables {
            for table in &model.tables {
                self.write_table(&mut out, table);
            }
        }
        out.push('}');
        out
    }

    fn write_paragraph(&self, out: &mut String, paragraph: &Paragraph, fonts: &FontTable) {
        out.push_str("\\pard");
        out.push_str(match paragraph.alignment {
            Alignment::Left => "\\ql",
            Alignment::Center => "\\qc",
            Alignment::Right => "\\qr",
            Alignment::Justify => "\\qj",
        });

        let heading = paragraph.heading_level.min(3);
        if heading > 0 {
            let size = HEADING_SIZES[usize::from(heading) - 1];
            let _ = write!(out, "\\outlinelevel{} {{\\b\\fs{} ", heading - 1, size);
        } else {
            out.push(' ');
        }

        for run in &paragraph.runs {
            self.write_run(out, run, fonts);
        }

        if heading > 0 {
            out.push('}');
        }
        out.push_str("\\par\n");
    }

    fn write_run(&self, out: &mut String, run: &Run, fonts: &FontTable) {
        let text = escape_rtf(&run.text);
        let font = run
            .font_family
            .as_deref()
            .and_then(|f| fonts.index_of(f))
            .filter(|&i| i != 0);

        if !run.has_styling() && font.is_none() && run.font_size_half_points.is_none() {
            out.push_str(&text);
            return;
        }

        out.push('{');
        if run.bold {
            out.push_str("\\b");
        }
        if run.italic {
            out.push_str("\\i");
        }
        if run.underline {
            out.push_str("\\ul");
        }
        if let Some(index) = font {
            let _ = write!(out, "\\f{}", index);
        }
        if let Some(size) = run.font_size_half_points {
            let _ = write!(out, "\\fs{}", size);
        }
        out.push(' ');
        out.push_str(&text);
        out.push('}');
    }

    fn write_table(&self, out: &mut String, table: &Table) {
        let columns = table.column_count().max(1) as u32;
        let width = TEXT_WIDTH_TWIPS / columns;
        for row in &table.rows {
            out.push_str("\\trowd\\trgaph108");
            for column in 1..=columns {
                let _ = write!(out, "\\cellx{}", column * width);
            }
            out.push_str("\n\\pard\\intbl ");
            for column in 0..columns as usize {
                if let Some(cell) = row.cells.get(column) {
                    out.push_str(&escape_rtf(&cell.text));
                }
                out.push_str("\\cell ");
            }
            out.push_str("\\row\n");
        }
        out.push_str("\\pard\n");
    }
}

impl Encoder for RtfEncoder {
    fn name(&self) -> &str {
        "rtf"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Rtf
    }

    fn encode(
        &self,
        model: &ContentModel,
        out: &mut dyn Write,
        options: &RenderOptions,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        out.write_all(self.render(model, options).as_bytes())?;
        Ok(())
    }
}

/// Font table: the default font at index 0, then run fonts in first-use order.
struct FontTable {
    names: Vec<String>,
}

impl FontTable {
    fn collect(model: &ContentModel, options: &RenderOptions) -> Self {
        let mut names = vec![options.font_or(None, DEFAULT_FONT).to_string()];
        for family in model.runs().filter_map(|r| r.font_family.as_deref()) {
            if !names.iter().any(|n| n == family) {
                names.push(family.to_string());
            }
        }
        Self { names }
    }

    fn index_of(&self, family: &str) -> Option<usize> {
        self.names.iter().position(|n| n == family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableRow;

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
    fn test_bold_group_and_empty_par() {
        let rtf = RtfEncoder::new().render(&hello_world(), &RenderOptions::default());
        assert!(rtf.starts_with("{\\rtf1\\ansi"));
        assert!(rtf.contains("{\\fonttbl{\\f0\\fnil Times New Roman;}}"));
        assert!(rtf.contains("\\pard\\ql Hello {\\b world}\\par\n"));
        assert!(rtf.contains("\\pard\\ql \\par\n"));
        assert!(rtf.ends_with('}'));
    }

    #[test]
    fn test_literal_braces_escaped_once() {
        let model = ContentModel::from_plain_text(r"{literal} \ backslash");
        let rtf = RtfEncoder::new().render(&model, &RenderOptions::default());
        assert!(rtf.contains(r"\{literal\} \\ backslash\par"));
        assert!(!rtf.contains(r"\\\{"));
    }

    #[test]
    fn test_heading_and_styles() {
        let mut model = ContentModel::new();
        model.add_paragraph(Paragraph::heading("Title", 1).align(Alignment::Center));
        let mut p = Paragraph::new();
        p.add_run(Run::italic("it"));
        p.add_run(Run::underlined("ul").with_font("Arial").with_size_pt(9.0));
        model.add_paragraph(p);

        let rtf = RtfEncoder::new().render(&model, &RenderOptions::default());
        assert!(rtf.contains("\\pard\\qc\\outlinelevel0 {\\b\\fs32 Title}\\par"));
        assert!(rtf.contains("{\\i it}"));
        assert!(rtf.contains("{\\f1\\fnil Arial;}"));
        assert!(rtf.contains("{\\ul\\f1\\fs18 ul}"));
    }

    #[test]
    fn test_table_rows() {
        let mut model = ContentModel::new();
        let mut table = Table::new();
        table.add_row(TableRow::from_strings(["a", "b"]));
        model.add_table(table);

        let rtf = RtfEncoder::new().render(&model, &RenderOptions::default());
        assert!(rtf.contains("\\trowd\\trgaph108\\cellx4680\\cellx9360"));
        assert!(rtf.contains("\\intbl a\\cell b\\cell \\row"));
    }

    #[test]
    fn test_non_ascii() {
        let model = ContentModel::from_plain_text("naïve");
        let rtf = RtfEncoder::new().render(&model, &RenderOptions::default());
        assert!(rtf.contains("na\\u239?ve"));
    }
}
