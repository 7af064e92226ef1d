//! Document format detection and the read-only format table.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// A document format the engine can read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Office Open XML word processing document
    Docx,
    /// OpenDocument text
    Odt,
    /// Rich Text Format
    Rtf,
    /// Portable Document Format
    Pdf,
    /// UTF-8 plain text
    Txt,
}

impl DocumentFormat {
    /// All formats, in a stable order.
    pub const ALL: [DocumentFormat; 5] = [
        DocumentFormat::Docx,
        DocumentFormat::Odt,
        DocumentFormat::Rtf,
        DocumentFormat::Pdf,
        DocumentFormat::Txt,
    ];

    /// Canonical file extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Docx => "docx",
            DocumentFormat::Odt => "odt",
            DocumentFormat::Rtf => "rtf",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Txt => "txt",
        }
    }

    /// Canonical MIME type.
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Odt => "application/vnd.oasis.opendocument.text",
            DocumentFormat::Rtf => "application/rtf",
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Txt => "text/plain",
        }
    }

    /// Whether the format is a ZIP container.
    pub fn is_archive(self) -> bool {
        matches!(self, DocumentFormat::Docx | DocumentFormat::Odt)
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.extension().to_uppercase())
    }
}

impl FromStr for DocumentFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DocumentFormat::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(s.trim_start_matches('.')))
            .ok_or_else(|| Error::UnsupportedFormat(format!("unknown format '{}'", s)))
    }
}

/// What the caller knows about a source document before it is read.
#[derive(Debug, Clone, Default)]
pub struct SourceHint {
    /// Explicit format, when the caller already knows it
    pub format: Option<DocumentFormat>,
    /// Original file name (used for the extension and the output name)
    pub file_name: Option<String>,
    /// MIME type reported by whoever handed over the stream
    pub mime_type: Option<String>,
}

impl SourceHint {
    /// Create an empty hint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hint derived from a path's file name.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file_name: path
                .as_ref()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            ..Self::default()
        }
    }

    /// Set an explicit format.
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the original file name.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// File name without its extension, if any.
    pub fn file_stem(&self) -> Option<String> {
        self.file_name.as_ref().and_then(|name| {
            Path::new(name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
    }
}

/// Read-only lookup table from extensions and MIME types to formats.
///
/// Built once and shared by reference; nothing mutates it after
/// construction.
#[derive(Debug, Clone)]
pub struct FormatTable {
    by_extension: HashMap<String, DocumentFormat>,
    by_mime: HashMap<String, DocumentFormat>,
}

impl FormatTable {
    /// Create the standard table.
    pub fn new() -> Self {
        let mut table = Self {
            by_extension: HashMap::new(),
            by_mime: HashMap::new(),
        };

        for format in DocumentFormat::ALL {
            table
                .by_extension
                .insert(format.extension().to_string(), format);
            table.by_mime.insert(format.mime_type().to_string(), format);
        }

        for (ext, format) in [
            ("text", DocumentFormat::Txt),
            ("md", DocumentFormat::Txt),
            ("log", DocumentFormat::Txt),
        ] {
            table.by_extension.insert(ext.to_string(), format);
        }

        for (mime, format) in [
            ("text/rtf", DocumentFormat::Rtf),
            ("application/x-rtf", DocumentFormat::Rtf),
            ("application/x-pdf", DocumentFormat::Pdf),
            ("text/markdown", DocumentFormat::Txt),
        ] {
            table.by_mime.insert(mime.to_string(), format);
        }

        table
    }

    /// Look up a format by extension (case-insensitive, leading dot allowed).
    pub fn from_extension(&self, ext: &str) -> Option<DocumentFormat> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.by_extension.get(&ext).copied()
    }

    /// Look up a format by MIME type, ignoring parameters such as `charset`.
    pub fn from_mime(&self, mime: &str) -> Option<DocumentFormat> {
        let essence = mime.split(';').next().unwrap_or(mime).trim().to_lowercase();
        self.by_mime.get(&essence).copied()
    }

    /// Look up a format from a path's extension.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Option<DocumentFormat> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.from_extension(e))
    }

    /// Resolve the source format: explicit hint, then MIME type, then file
    /// extension, then the content's leading bytes.
    pub fn resolve(&self, hint: &SourceHint, head: &[u8]) -> Result<DocumentFormat> {
        if let Some(format) = hint.format {
            return Ok(format);
        }
        if let Some(format) = hint.mime_type.as_deref().and_then(|m| self.from_mime(m)) {
            return Ok(format);
        }
        if let Some(format) = hint.file_name.as_deref().and_then(|n| self.from_path(n)) {
            return Ok(format);
        }
        detect_format_from_bytes(head)
    }

    /// Supported extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.by_extension.keys().map(|s| s.as_str()).collect();
        exts.sort_unstable();
        exts
    }
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::new()
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const RTF_MAGIC: &[u8] = b"{\\rtf";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ODT_MIMETYPE_ENTRY: &[u8] = b"mimetypeapplication/vnd.oasis.opendocument.text";

/// Number of leading bytes [`detect_format_from_bytes`] looks at.
pub const SNIFF_LEN: usize = 512;

/// Detect a document format from its leading bytes.
///
/// ZIP containers are reported as ODT when their first entry is the
/// OpenDocument `mimetype` entry, otherwise as DOCX.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<DocumentFormat> {
    if data.is_empty() {
        return Err(Error::UnsupportedFormat("empty input".to_string()));
    }

    if data.starts_with(PDF_MAGIC) {
        return Ok(DocumentFormat::Pdf);
    }
    if data.starts_with(RTF_MAGIC) {
        return Ok(DocumentFormat::Rtf);
    }
    if data.starts_with(ZIP_MAGIC) {
        // Local header is 30 bytes; an ODT's first name + data follow it.
        let odt = data
            .get(30..30 + ODT_MIMETYPE_ENTRY.len())
            .is_some_and(|s| s == ODT_MIMETYPE_ENTRY);
        return Ok(if odt {
            DocumentFormat::Odt
        } else {
            DocumentFormat::Docx
        });
    }

    let sample = &data[..data.len().min(SNIFF_LEN)];
    if looks_like_text(sample) {
        return Ok(DocumentFormat::Txt);
    }

    Err(Error::UnsupportedFormat(
        "content does not match any known format".to_string(),
    ))
}

/// Text sniffing: valid UTF-8 (allowing a character cut at the end of the
/// sample) with no NUL bytes.
fn looks_like_text(sample: &[u8]) -> bool {
    if sample.contains(&0) {
        return false;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && sample.len() - e.valid_up_to() < 4,
    }
}

/// Detect the format of a file from its extension (looked up in `table`)
/// or, failing that, its content.
pub fn detect_format_from_path<P: AsRef<Path>>(
    table: &FormatTable,
    path: P,
) -> Result<DocumentFormat> {
    let path = path.as_ref();
    if let Some(format) = table.from_path(path) {
        return Ok(format);
    }

    use std::io::Read;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    std::fs::File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    detect_format_from_bytes(&head)
}
