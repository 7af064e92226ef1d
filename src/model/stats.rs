//! Extraction statistics.

use super::ContentModel;
use serde::{Deserialize, Serialize};

/// Statistics collected for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Number of paragraphs (including empty ones)
    pub paragraph_count: u32,

    /// Paragraphs without visible text
    pub empty_paragraph_count: u32,

    /// Number of headings
    pub heading_count: u32,

    /// Number of runs
    pub run_count: u32,

    /// Number of tables
    pub table_count: u32,

    /// Number of table cells
    pub cell_count: u32,

    /// Approximate word count (whitespace-separated tokens)
    pub word_count: u32,

    /// Character count (excluding whitespace)
    pub char_count: u32,
}

impl ExtractionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect statistics for a model.
    pub fn from_model(model: &ContentModel) -> Self {
        let mut stats = Self::new();
        for paragraph in &model.paragraphs {
            stats.paragraph_count += 1;
            if paragraph.is_empty() {
                stats.empty_paragraph_count += 1;
            }
            if paragraph.is_heading() {
                stats.heading_count += 1;
            }
            for run in &paragraph.runs {
                stats.run_count += 1;
                stats.count_text(&run.text);
            }
        }
        for table in &model.tables {
            stats.table_count += 1;
            for cell in table.rows.iter().flat_map(|r| &r.cells) {
                stats.cell_count += 1;
                stats.count_text(&cell.text);
            }
        }
        stats
    }

    /// Add word and character counts from text.
    ///
    /// Words are counted per call, so a word split across two runs counts
    /// twice.
    pub fn count_text(&mut self, text: &str) {
        self.word_count += text.split_whitespace().count() as u32;
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ExtractionStats) {
        self.paragraph_count += other.paragraph_count;
        self.empty_paragraph_count += other.empty_paragraph_count;
        self.heading_count += other.heading_count;
        self.run_count += other.run_count;
        self.table_count += other.table_count;
        self.cell_count += other.cell_count;
        self.word_count += other.word_count;
        self.char_count += other.char_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paragraph, Run, Table, TableRow};

    #[test]
    fn test_count_text() {
        let mut stats = ExtractionStats::new();
        stats.count_text("Hello, world! This is a test.");

        assert_eq!(stats.word_count, 6);
        assert_eq!(stats.char_count, 24);
    }

    #[test]
    fn test_from_model() {
        let mut model = ContentModel::new();
        model.add_paragraph(Paragraph::heading("Title", 1));
        let mut p = Paragraph::new();
        p.add_run(Run::new("Hello "));
        p.add_run(Run::bold("world"));
        model.add_paragraph(p);
        model.add_paragraph(Paragraph::new());
        let mut table = Table::new();
        table.add_row(TableRow::from_strings(["a", "b"]));
        model.add_table(table);

        let stats = ExtractionStats::from_model(&model);
        assert_eq!(stats.paragraph_count, 3);
        assert_eq!(stats.empty_paragraph_count, 1);
        assert_eq!(stats.heading_count, 1);
        assert_eq!(stats.run_count, 3);
        assert_eq!(stats.table_count, 1);
        assert_eq!(stats.cell_count, 2);
        assert_eq!(stats.word_count, 5);
    }

    #[test]
    fn test_merge() {
        let mut a = ExtractionStats {
            paragraph_count: 5,
            table_count: 2,
            ..Default::default()
        };
        let b = ExtractionStats {
            paragraph_count: 3,
            run_count: 4,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.paragraph_count, 8);
        assert_eq!(a.table_count, 2);
        assert_eq!(a.run_count, 4);
    }
}
