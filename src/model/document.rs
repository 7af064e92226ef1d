//! Document-level types.

use super::{ExtractionStats, Paragraph, Run, Table};
use crate::detect::DocumentFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The structural content of one converted document.
///
/// Built fresh for every conversion and dropped once the encoder has
/// consumed it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentModel {
    /// Document metadata (title, creator, dates)
    pub metadata: Metadata,

    /// Body paragraphs in source order
    pub paragraphs: Vec<Paragraph>,

    /// Tables in source order
    pub tables: Vec<Table>,
}

impl ContentModel {
    /// Create a new empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model with one paragraph per line and one run per non-empty
    /// line. Blank lines become empty paragraphs.
    pub fn from_plain_text(text: &str) -> Self {
        let mut model = Self::new();
        for line in text.lines() {
            if line.is_empty() {
                model.add_paragraph(Paragraph::new());
            } else {
                model.add_paragraph(Paragraph::with_text(line));
            }
        }
        model
    }

    /// Add a paragraph.
    pub fn add_paragraph(&mut self, paragraph: Paragraph) {
        self.paragraphs.push(paragraph);
    }

    /// Add a table.
    pub fn add_table(&mut self, table: Table) {
        self.tables.push(table);
    }

    /// Check if the model has no paragraphs and no tables.
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty() && self.tables.is_empty()
    }

    /// All runs across all paragraphs.
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.paragraphs.iter().flat_map(|p| p.runs.iter())
    }

    /// Total number of runs.
    pub fn run_count(&self) -> usize {
        self.runs().count()
    }

    /// Plain text: every paragraph followed by `\n`, then tables with one
    /// row per line and tab-separated cells.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for paragraph in &self.paragraphs {
            for run in &paragraph.runs {
                out.push_str(&run.text);
            }
            out.push('\n');
        }
        for table in &self.tables {
            for row in &table.rows {
                out.push_str(&row.plain_text());
                out.push('\n');
            }
        }
        out
    }

    /// Compute extraction statistics for this model.
    pub fn stats(&self) -> ExtractionStats {
        ExtractionStats::from_model(self)
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,

    /// Author / creator
    pub creator: Option<String>,

    /// Subject
    pub subject: Option<String>,

    /// Description / comments
    pub description: Option<String>,

    /// Creation date
    pub created: Option<DateTime<Utc>>,

    /// Last modification date
    pub modified: Option<DateTime<Utc>>,

    /// Format the content was read from
    pub source_format: Option<DocumentFormat>,
}

impl Metadata {
    /// Create metadata for a given source format.
    pub fn for_source(format: DocumentFormat) -> Self {
        Self {
            source_format: Some(format),
            ..Default::default()
        }
    }

    /// Title, falling back to the given default.
    pub fn title_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.title.as_deref().unwrap_or(default)
    }

    /// Fill fields that are unset here from `other`.
    pub fn merge_missing(&mut self, other: Metadata) {
        self.title = self.title.take().or(other.title);
        self.creator = self.creator.take().or(other.creator);
        self.subject = self.subject.take().or(other.subject);
        self.description = self.description.take().or(other.description);
        self.created = self.created.or(other.created);
        self.modified = self.modified.or(other.modified);
        self.source_format = self.source_format.or(other.source_format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_new() {
        let model = ContentModel::new();
        assert!(model.is_empty());
        assert_eq!(model.run_count(), 0);
    }

    #[test]
    fn test_from_plain_text_keeps_blank_lines() {
        let model = ContentModel::from_plain_text("first\r\n\nthird\n");
        assert_eq!(model.paragraphs.len(), 3);
        assert!(model.paragraphs[1].runs.is_empty());
        assert_eq!(model.run_count(), 2);
        assert_eq!(model.plain_text(), "first\n\nthird\n");
    }

    #[test]
    fn test_plain_text_includes_tables() {
        let mut model = ContentModel::from_plain_text("Body");
        let mut table = Table::new();
        table.add_row(crate::model::TableRow::from_strings(["a", "b"]));
        model.add_table(table);
        assert_eq!(model.plain_text(), "Body\na\tb\n");
    }

    #[test]
    fn test_metadata_merge_missing() {
        let mut meta = Metadata {
            title: Some("Kept".into()),
            ..Default::default()
        };
        meta.merge_missing(Metadata {
            title: Some("Ignored".into()),
            creator: Some("Ann".into()),
            ..Default::default()
        });
        assert_eq!(meta.title.as_deref(), Some("Kept"));
        assert_eq!(meta.creator.as_deref(), Some("Ann"));
        assert_eq!(meta.title_or("Untitled"), "Kept");
    }
}
