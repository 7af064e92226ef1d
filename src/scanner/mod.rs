//! Source scanners: turn a source document into a [`ContentModel`].
//!
//! Each supported source format has a [`ContentScanner`]. Scanners are
//! stateless across calls and looked up through a [`ScannerRegistry`].
//!
//! # Example
//!
//! ```no_run
//! use docvert::convert::CancellationToken;
//! use docvert::detect::DocumentFormat;
//! use docvert::scanner::ScannerRegistry;
//! use std::fs::File;
//!
//! fn main() -> docvert::Result<()> {
//!     let registry = ScannerRegistry::with_defaults();
//!     let scanner = registry.require(DocumentFormat::Docx)?;
//!     let mut file = File::open("report.docx")?;
//!     let model = scanner.scan(&mut file, &CancellationToken::new())?;
//!     println!("{}", model.plain_text());
//!     Ok(())
//! }
//! ```

mod docx;
mod metadata;
mod odt;
mod pdf;
mod rtf;
mod table;
mod text;
pub(crate) mod xml;

pub use docx::{DocxScanner, CORE_PROPERTIES_PART, DOCUMENT_PART};
pub use metadata::{parse_core_properties, parse_odf_meta};
pub use odt::{OdtScanner, CONTENT_PART, META_PART};
pub use pdf::PdfScanner;
pub use rtf::RtfScanner;
pub use table::extract_tables;
pub use text::TextScanner;
pub use xml::decode_entities;

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::Arc;

use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::model::ContentModel;

/// A readable, seekable byte source.
pub trait SourceStream: Read + Seek {}

impl<T: Read + Seek + ?Sized> SourceStream for T {}

/// Extracts a [`ContentModel`] from one source format.
///
/// Implement this trait to add support for a new source format.
pub trait ContentScanner: Send + Sync {
    /// Short name, e.g. `"docx"`.
    fn name(&self) -> &str;

    /// The format this scanner reads.
    fn format(&self) -> DocumentFormat;

    /// Read the whole source and build a model.
    ///
    /// Implementations check `cancel` between paragraphs (or pages).
    fn scan(&self, source: &mut dyn SourceStream, cancel: &CancellationToken) -> Result<ContentModel>;
}

/// Maps source formats to scanners.
pub struct ScannerRegistry {
    scanners: HashMap<DocumentFormat, Arc<dyn ContentScanner>>,
}

impl ScannerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            scanners: HashMap::new(),
        }
    }

    /// Registry with scanners for every built-in format.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DocxScanner::new()));
        registry.register(Arc::new(OdtScanner::new()));
        registry.register(Arc::new(RtfScanner::new()));
        registry.register(Arc::new(PdfScanner::new()));
        registry.register(Arc::new(TextScanner::new()));
        registry
    }

    /// Register a scanner, replacing any previous one for its format.
    pub fn register(&mut self, scanner: Arc<dyn ContentScanner>) {
        self.scanners.insert(scanner.format(), scanner);
    }

    pub fn get(&self, format: DocumentFormat) -> Option<Arc<dyn ContentScanner>> {
        self.scanners.get(&format).cloned()
    }

    /// Like [`get`](Self::get) but fails with `UnsupportedFormat`.
    pub fn require(&self, format: DocumentFormat) -> Result<Arc<dyn ContentScanner>> {
        self.get(format)
            .ok_or_else(|| Error::UnsupportedFormat(format!("no scanner for {} sources", format)))
    }

    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.scanners.contains_key(&format)
    }
}

impl Default for ScannerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Decode a part as UTF-8, replacing invalid sequences with a warning.
pub(crate) fn decode_utf8<'a>(bytes: &'a [u8], part: &str) -> Cow<'a, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = text {
        log::warn!("{} is not valid UTF-8; invalid sequences replaced", part);
    }
    text
}
