//! Table query over WordprocessingML.
//!
//! Runs independently of the paragraph scanner over the same document text.
//! Only text is collected; run styles inside cells are ignored.

use super::xml::{decode_entities, text_span, TagKind, Tags};
use crate::model::{Table, TableCell, TableRow};

/// Collect every top-level `<w:tbl>` in the document.
///
/// Follows the same `<w:t>` rule as the paragraph scanner: a text span must
/// close on the line it opens on, otherwise the rest of the line is
/// skipped. Paragraphs within one cell are joined by a space. Nested tables
/// contribute their text to the enclosing cell.
pub fn extract_tables<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<Table> {
    let mut query = TableQuery::default();
    for line in lines {
        query.feed_line(line);
    }
    query.tables
}

#[derive(Default)]
struct TableQuery {
    tables: Vec<Table>,
    depth: usize,
    table: Option<Table>,
    row: Option<Vec<TableCell>>,
    cell: Option<String>,
    /// A paragraph has ended inside the current cell
    cell_paragraph_break: bool,
}

impl TableQuery {
    fn feed_line(&mut self, line: &str) {
        let mut tags = Tags::new(line);
        while let Some(tag) = tags.next() {
            match tag.name {
                "w:tbl" if tag.opens("w:tbl") => {
                    self.depth += 1;
                    if self.depth == 1 {
                        self.table = Some(Table::new());
                    }
                }
                "w:tbl" if tag.closes("w:tbl") => {
                    if self.depth == 1 {
                        if let Some(table) = self.table.take() {
                            self.tables.push(table);
                        }
                    }
                    self.depth = self.depth.saturating_sub(1);
                }
                "w:tr" if self.depth == 1 => {
                    if tag.closes("w:tr") {
                        if let (Some(table), Some(cells)) = (self.table.as_mut(), self.row.take()) {
                            table.add_row(TableRow::new(cells));
                        }
                    } else {
                        self.row = Some(Vec::new());
                    }
                }
                "w:tc" if self.depth == 1 => {
                    if tag.closes("w:tc") {
                        if let (Some(row), Some(text)) = (self.row.as_mut(), self.cell.take()) {
                            row.push(TableCell::text(text));
                        }
                    } else {
                        self.cell = Some(String::new());
                        self.cell_paragraph_break = false;
                    }
                }
                "w:p" if tag.closes("w:p") => {
                    self.cell_paragraph_break = true;
                }
                "w:t" if tag.kind == TagKind::Open => {
                    let Some((text, next)) = text_span(line, tag.end, "</w:t>") else {
                        break;
                    };
                    tags.skip_to(next);
                    if let Some(cell) = self.cell.as_mut() {
                        if self.cell_paragraph_break && !cell.is_empty() {
                            cell.push(' ');
                        }
                        self.cell_paragraph_break = false;
                        cell.push_str(&decode_entities(text));
                    }
                }
                _ => {}
            }
        }
    }
}
