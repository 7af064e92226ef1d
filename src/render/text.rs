//! Plain text rendering.

use std::io::Write;

use super::{Encoder, RenderOptions};
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::ContentModel;

/// Convert a model to plain text.
///
/// Run text is concatenated with no escaping and every paragraph ends with
/// `\n`, empty ones included. Tables follow the body, one row per line with
/// tab-separated cells.
pub fn to_text(model: &ContentModel, options: &RenderOptions) -> String {
    let mut output = String::new();
    for paragraph in &model.paragraphs {
        for run in &paragraph.runs {
            output.push_str(&run.text);
        }
        output.push('\n');
    }
    if options.include_tables {
        for row in model.tables.iter().flat_map(|t| &t.rows) {
            output.push_str(&row.plain_text());
            output.push('\n');
        }
    }
    output
}

/// UTF-8 plain text encoder.
#[derive(Debug, Clone, Default)]
pub struct PlainTextEncoder {
    _private: (),
}

impl PlainTextEncoder {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Encoder for PlainTextEncoder {
    fn name(&self) -> &str {
        "txt"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Txt
    }

    fn encode(
        &self,
        model: &ContentModel,
        out: &mut dyn Write,
        options: &RenderOptions,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        out.write_all(to_text(model, options).as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paragraph, Run, Table, TableRow};

    #[test]
    fn test_to_text() {
        let mut model = ContentModel::new();
        let mut p = Paragraph::new();
        p.add_run(Run::new("Hello "));
        p.add_run(Run::bold("world"));
        model.add_paragraph(p);
        model.add_paragraph(Paragraph::new());

        let result = to_text(&model, &RenderOptions::default());
        assert_eq!(result, "Hello world\n\n");
    }

    #[test]
    fn test_tables_follow_body() {
        let mut model = ContentModel::new();
        model.add_paragraph(Paragraph::with_text("Body"));
        let mut table = Table::new();
        table.add_row(TableRow::from_strings(["a", "b"]));
        model.add_table(table);

        assert_eq!(to_text(&model, &RenderOptions::default()), "Body\na\tb\n");
        assert_eq!(
            to_text(&model, &RenderOptions::default().with_tables(false)),
            "Body\n"
        );
    }

    #[test]
    fn test_no_escaping() {
        let model = ContentModel::from_plain_text("<&> {\\}");
        assert_eq!(to_text(&model, &RenderOptions::default()), "<&> {\\}\n");
    }
}
