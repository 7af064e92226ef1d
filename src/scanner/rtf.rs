//! Rich Text Format sources.
//!
//! A control-word stripper rather than a full RTF reader: it follows group
//! nesting, character formatting and paragraph marks, and skips destination
//! groups such as the font table.

use std::io::Read;

use super::{ContentScanner, SourceStream};
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::model::{
    Alignment, ContentModel, Metadata, Paragraph, Run, Table, TableCell, TableRow,
    MAX_HEADING_LEVEL,
};

/// Destinations whose content is never document text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "footnote",
    "themedata",
    "colorschememapping",
    "latentstyles",
    "datastore",
    "xmlnstbl",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "object",
    "field",
    "fldinst",
];

/// Reads RTF into paragraphs, runs and tables.
#[derive(Debug, Clone, Default)]
pub struct RtfScanner {
    _private: (),
}

impl RtfScanner {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Scan RTF source bytes.
    pub fn scan_bytes(&self, data: &[u8], cancel: &CancellationToken) -> Result<ContentModel> {
        let start = data
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(data.len());
        if !data[start..].starts_with(b"{\\rtf") {
            return Err(Error::SourceUnreadable(
                "RTF: missing {\\rtf header".to_string(),
            ));
        }

        let mut reader = RtfReader::new(cancel);
        reader.run(&data[start..])?;
        let model = reader.finish();
        log::debug!(
            "Scanned RTF: {} paragraphs, {} runs, {} tables",
            model.paragraphs.len(),
            model.run_count(),
            model.tables.len()
        );
        Ok(model)
    }
}

impl ContentScanner for RtfScanner {
    fn name(&self) -> &str {
        "rtf"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Rtf
    }

    fn scan(&self, source: &mut dyn SourceStream, cancel: &CancellationToken) -> Result<ContentModel> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        let mut model = self.scan_bytes(&data, cancel)?;
        model.metadata = Metadata::for_source(DocumentFormat::Rtf);
        Ok(model)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CharFormat {
    bold: bool,
    italic: bool,
    underline: bool,
    size: Option<u16>,
}

#[derive(Debug, Clone)]
struct GroupState {
    format: CharFormat,
    skip: bool,
    /// Characters to drop after `\uN`
    unicode_skip: usize,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            format: CharFormat::default(),
            skip: false,
            unicode_skip: 1,
        }
    }
}

struct RtfReader<'c> {
    cancel: &'c CancellationToken,
    model: ContentModel,
    stack: Vec<GroupState>,
    group: GroupState,
    /// Next control word starts a group to skip (`\*`)
    ignorable_pending: bool,
    /// Fallback characters still to drop after a `\uN`
    pending_skip: usize,
    paragraph: Paragraph,
    run_text: String,
    run_format: CharFormat,
    heading_level: u8,
    alignment: Alignment,
    in_table: bool,
    table: Option<Table>,
    row: Vec<TableCell>,
    cell: String,
}

impl<'c> RtfReader<'c> {
    fn new(cancel: &'c CancellationToken) -> Self {
        Self {
            cancel,
            model: ContentModel::new(),
            stack: Vec::new(),
            group: GroupState::default(),
            ignorable_pending: false,
            pending_skip: 0,
            paragraph: Paragraph::new(),
            run_text: String::new(),
            run_format: CharFormat::default(),
            heading_level: 0,
            alignment: Alignment::Left,
            in_table: false,
            table: None,
            row: Vec::new(),
            cell: String::new(),
        }
    }

    fn run(&mut self, data: &[u8]) -> Result<()> {
        let mut i = 0;
        while i < data.len() {
            let byte = data[i];
            match byte {
                b'{' => {
                    self.stack.push(self.group.clone());
                    i += 1;
                }
                b'}' => {
                    if let Some(previous) = self.stack.pop() {
                        self.group = previous;
                    }
                    self.ignorable_pending = false;
                    i += 1;
                }
                b'\\' => i = self.control(data, i + 1)?,
                b'\r' | b'\n' => i += 1,
                _ => {
                    // Raw text is read as UTF-8 where possible, else Latin-1.
                    let len = utf8_len(byte).min(data.len() - i);
                    match std::str::from_utf8(&data[i..i + len]) {
                        Ok(s) => {
                            for c in s.chars() {
                                self.emit_char(c);
                            }
                        }
                        Err(_) => self.emit_char(char::from(byte)),
                    }
                    i += len.max(1);
                }
            }
        }
        Ok(())
    }

    /// Handle the control sequence after a backslash at `i`; returns the
    /// position after it.
    fn control(&mut self, data: &[u8], i: usize) -> Result<usize> {
        let Some(&next) = data.get(i) else {
            return Ok(i);
        };

        if !next.is_ascii_alphabetic() {
            // Control symbol
            match next {
                b'\\' | b'{' | b'}' => self.emit_char(char::from(next)),
                b'~' => self.emit_char('\u{00A0}'),
                b'_' => self.emit_char('\u{2011}'),
                b'-' => {}
                b'*' => self.ignorable_pending = true,
                b'\r' | b'\n' => self.end_paragraph()?,
                b'\'' => {
                    let hex = data.get(i + 1..i + 3).and_then(|h| std::str::from_utf8(h).ok());
                    if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                        self.emit_char(cp1252_to_char(value));
                        return Ok(i + 3);
                    }
                }
                _ => {}
            }
            return Ok(i + 1);
        }

        let word_end = data[i..]
            .iter()
            .position(|b| !b.is_ascii_alphabetic())
            .map_or(data.len(), |p| i + p);
        let word = std::str::from_utf8(&data[i..word_end]).unwrap_or_default();

        let mut end = word_end;
        if data.get(end) == Some(&b'-') {
            end += 1;
        }
        let digits_start = end;
        while data.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
        let param: Option<i32> = if end > digits_start {
            std::str::from_utf8(&data[word_end..end])
                .ok()
                .and_then(|p| p.parse().ok())
        } else {
            end = word_end;
            None
        };
        if data.get(end) == Some(&b' ') {
            end += 1;
        }

        self.control_word(word, param)?;
        Ok(end)
    }

    fn control_word(&mut self, word: &str, param: Option<i32>) -> Result<()> {
        if self.ignorable_pending || SKIPPED_DESTINATIONS.contains(&word) {
            self.ignorable_pending = false;
            self.group.skip = true;
            return Ok(());
        }
        if self.group.skip {
            return Ok(());
        }

        let on = param != Some(0);
        match word {
            "par" | "sect" | "page" => {
                if self.in_table {
                    self.cell_break();
                } else {
                    self.end_paragraph()?;
                }
            }
            "line" => self.emit_char('\n'),
            "tab" => self.emit_char('\t'),
            "emdash" => self.emit_char('\u{2014}'),
            "endash" => self.emit_char('\u{2013}'),
            "bullet" => self.emit_char('\u{2022}'),
            "lquote" => self.emit_char('\u{2018}'),
            "rquote" => self.emit_char('\u{2019}'),
            "ldblquote" => self.emit_char('\u{201C}'),
            "rdblquote" => self.emit_char('\u{201D}'),
            "b" => self.group.format.bold = on,
            "i" => self.group.format.italic = on,
            "ul" => self.group.format.underline = on,
            "ulnone" => self.group.format.underline = false,
            "fs" => {
                self.group.format.size = param.and_then(|p| u16::try_from(p).ok()).filter(|&p| p > 0)
            }
            "plain" => self.group.format = CharFormat::default(),
            "pard" => {
                self.alignment = Alignment::Left;
                self.heading_level = 0;
                self.in_table = false;
            }
            "ql" => self.alignment = Alignment::Left,
            "qc" => self.alignment = Alignment::Center,
            "qr" => self.alignment = Alignment::Right,
            "qj" => self.alignment = Alignment::Justify,
            "outlinelevel" => {
                if let Some(level) = param.and_then(|p| u8::try_from(p).ok()) {
                    self.heading_level = (level + 1).min(MAX_HEADING_LEVEL);
                }
            }
            "intbl" => {
                self.in_table = true;
                self.table.get_or_insert_with(Table::new);
            }
            "cell" => {
                self.flush_run();
                self.row.push(TableCell::text(std::mem::take(&mut self.cell)));
            }
            "row" => {
                let cells = std::mem::take(&mut self.row);
                self.table.get_or_insert_with(Table::new).add_row(TableRow::new(cells));
                self.in_table = false;
            }
            "uc" => {
                self.group.unicode_skip = param.and_then(|p| usize::try_from(p).ok()).unwrap_or(1)
            }
            "u" => {
                if let Some(code) = param {
                    let code = if code < 0 { code + 65536 } else { code };
                    let c = u32::try_from(code)
                        .ok()
                        .and_then(char::from_u32)
                        .unwrap_or('\u{FFFD}');
                    self.emit_char(c);
                    self.pending_skip = self.group.unicode_skip;
                    return Ok(());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn emit_char(&mut self, c: char) {
        if self.group.skip {
            return;
        }
        if self.pending_skip > 0 {
            self.pending_skip -= 1;
            return;
        }

        if self.in_table {
            self.cell.push(c);
            return;
        }

        // A table ends at the first body text after its last row.
        if let Some(table) = self.table.take() {
            self.model.add_table(table);
        }

        if self.run_format != self.group.format && !self.run_text.is_empty() {
            self.flush_run();
        }
        if self.run_text.is_empty() {
            self.run_format = self.group.format.clone();
        }
        self.run_text.push(c);
    }

    fn flush_run(&mut self) {
        if self.run_text.is_empty() {
            return;
        }
        let format = &self.run_format;
        self.paragraph.add_run(Run {
            text: std::mem::take(&mut self.run_text),
            bold: format.bold,
            italic: format.italic,
            underline: format.underline,
            font_size_half_points: format.size,
            font_family: None,
        });
    }

    fn cell_break(&mut self) {
        if !self.cell.is_empty() && !self.cell.ends_with(' ') {
            self.cell.push(' ');
        }
    }

    fn end_paragraph(&mut self) -> Result<()> {
        self.flush_run();
        let mut paragraph = std::mem::take(&mut self.paragraph);
        paragraph.alignment = self.alignment;
        paragraph.heading_level = self.heading_level;
        self.model.add_paragraph(paragraph);
        self.cancel.check()
    }

    fn finish(mut self) -> ContentModel {
        self.flush_run();
        if !self.paragraph.runs.is_empty() {
            let mut paragraph = std::mem::take(&mut self.paragraph);
            paragraph.alignment = self.alignment;
            paragraph.heading_level = self.heading_level;
            self.model.add_paragraph(paragraph);
        }
        if !self.row.is_empty() {
            let cells = std::mem::take(&mut self.row);
            self.table.get_or_insert_with(Table::new).add_row(TableRow::new(cells));
        }
        if let Some(table) = self.table.take() {
            if !table.is_empty() {
                self.model.add_table(table);
            }
        }
        self.model
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

/// Windows-1252, the usual `\ansicpg`. Bytes 0x80-0x9F differ from Latin-1.
fn cp1252_to_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}',
        '\u{2021}', '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}',
        '\u{017D}', '\u{FFFD}', '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}',
        '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}',
        '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
    ];
    match byte {
        0x80..=0x9F => HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(rtf: &str) -> ContentModel {
        RtfScanner::new()
            .scan_bytes(rtf.as_bytes(), &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn test_groups_and_styles() {
        let model = scan(
            r"{\rtf1\ansi{\fonttbl{\f0 Times New Roman;}}{\colortbl;\red0\green0\blue0;}\f0 Hello {\b world}\par\par}",
        );
        assert_eq!(model.paragraphs.len(), 2);
        let runs = &model.paragraphs[0].runs;
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "Hello ");
        assert_eq!(runs[1].text, "world");
        assert!(runs[1].bold);
        assert!(model.paragraphs[1].runs.is_empty());
        assert_eq!(model.plain_text(), "Hello world\n\n");
    }

    #[test]
    fn test_escapes_and_unicode() {
        let model = scan(r"{\rtf1 a\\b \{c\} caf\'e9 \u8364? \uc0\u8212 end\par}");
        assert_eq!(
            model.paragraphs[0].plain_text(),
            "a\\b {c} café € \u{2014}end"
        );
    }

    #[test]
    fn test_ignorable_destination() {
        let model = scan(r"{\rtf1{\*\generator Writer;}{\info{\title T}}Body\par}");
        assert_eq!(model.plain_text(), "Body\n");
    }

    #[test]
    fn test_toggle_off_and_underline() {
        let model = scan(r"{\rtf1\b bold\b0  plain \ul under\ulnone  done\par}");
        let runs = &model.paragraphs[0].runs;
        assert!(runs[0].bold);
        assert!(!runs[1].bold);
        assert!(runs[2].underline);
        assert!(!runs[3].underline);
    }

    #[test]
    fn test_table_rows() {
        let model = scan(
            r"{\rtf1 Before\par\trowd\cellx1000\cellx2000\pard\intbl A\cell B\cell\row\pard After\par}",
        );
        assert_eq!(model.tables.len(), 1);
        assert_eq!(model.tables[0].rows[0].plain_text(), "A\tB");
        assert_eq!(model.paragraphs.len(), 2);
        assert_eq!(model.paragraphs[1].plain_text(), "After");
    }

    #[test]
    fn test_not_rtf() {
        let result = RtfScanner::new().scan_bytes(b"plain text", &CancellationToken::new());
        assert!(matches!(result, Err(Error::SourceUnreadable(_))));
    }
}
