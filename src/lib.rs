//! # docvert
//!
//! Offline office document conversion for Rust.
//!
//! Documents are read into a small, format-neutral content model
//! (paragraphs of styled runs, tables, metadata) and written back out by
//! one encoder per target format. DOCX, ODT, RTF, PDF and plain text are
//! supported on both sides.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docvert::{convert_file, DocumentFormat};
//!
//! fn main() -> docvert::Result<()> {
//!     // Writes ./out/report.odt
//!     let result = convert_file("report.docx", DocumentFormat::Odt, "out")?;
//!     println!("{} bytes written", result.bytes_written);
//!
//!     // Text only, nothing written
//!     let text = docvert::extract_text("report.docx")?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Own ZIP layer**: stored and deflated entries, per-entry errors,
//!   exact control over entry order for ODT's `mimetype`
//! - **Streaming DOCX scanning**: no DOM, one pass over `word/document.xml`
//! - **Safe output**: files appear only after the encoder succeeds
//! - **Parallel batches**: Rayon-driven, with progress events over a channel

pub mod archive;
pub mod convert;
pub mod detect;
pub mod error;
pub mod model;
pub mod render;
pub mod scanner;

// Re-export commonly used types
pub use convert::{
    BatchEvent, BatchJob, CancellationToken, ConversionState, ConvertOptions, ConvertResult,
    Converter,
};
pub use detect::{detect_format_from_bytes, detect_format_from_path, DocumentFormat, FormatTable, SourceHint};
pub use error::{Error, Result};
pub use model::{Alignment, ContentModel, ExtractionStats, Metadata, Paragraph, Run, Table, TableCell, TableRow};
pub use render::{Encoder, EncoderRegistry, JsonFormat, PdfLayout, RenderOptions};
pub use scanner::{ContentScanner, ScannerRegistry};

use std::fs::File;
use std::path::{Path, PathBuf};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read a document file into a content model.
///
/// The format comes from the extension, or from the content when the
/// extension is unknown.
///
/// # Example
///
/// ```no_run
/// use docvert::read_file;
///
/// let model = read_file("letter.odt").unwrap();
/// println!("Paragraphs: {}", model.paragraphs.len());
/// ```
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<ContentModel> {
    Docvert::new().read(path).map(|result| result.model)
}

/// Read an in-memory document into a content model.
pub fn read_bytes(data: &[u8], hint: &SourceHint) -> Result<ContentModel> {
    Docvert::new().read_bytes(data, hint).map(|result| result.model)
}

/// Extract plain text from a document file.
///
/// # Example
///
/// ```no_run
/// use docvert::extract_text;
///
/// let text = extract_text("notes.rtf").unwrap();
/// println!("{}", text);
/// ```
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let converter = Converter::new(FormatTable::new(), ConvertOptions::default());
    converter.extract_text(File::open(path)?, &SourceHint::from_path(path))
}

/// Convert a document file into `output_dir`.
///
/// The output is named after the input, with the target's extension. An
/// existing file is never replaced; ` (1)`, ` (2)`, ... is appended instead.
pub fn convert_file<P: AsRef<Path>, D: Into<PathBuf>>(
    path: P,
    target: DocumentFormat,
    output_dir: D,
) -> Result<ConvertResult> {
    let options = ConvertOptions::new().with_output_dir(output_dir);
    Converter::new(FormatTable::new(), options).convert_file(path, target)
}

/// Dump a document file's content model as JSON.
///
/// # Example
///
/// ```no_run
/// use docvert::{to_json, JsonFormat};
///
/// let json = to_json("report.docx", JsonFormat::Pretty).unwrap();
/// std::fs::write("report.json", json).unwrap();
/// ```
pub fn to_json<P: AsRef<Path>>(path: P, format: JsonFormat) -> Result<String> {
    render::to_json(&read_file(path)?, format)
}

/// Builder for reading documents and encoding them in memory.
///
/// # Example
///
/// ```no_run
/// use docvert::{Docvert, DocumentFormat};
///
/// let bytes = Docvert::new()
///     .with_default_font("Georgia")
///     .without_tables()
///     .read("report.docx")?
///     .encode(DocumentFormat::Rtf)?;
/// std::fs::write("report.rtf", bytes)?;
/// # Ok::<(), docvert::Error>(())
/// ```
pub struct Docvert {
    formats: FormatTable,
    render_options: RenderOptions,
    cancel: CancellationToken,
}

impl Docvert {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            formats: FormatTable::new(),
            render_options: RenderOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the render options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// Fallback font for runs without one.
    pub fn with_default_font(mut self, family: impl Into<String>) -> Self {
        self.render_options = self.render_options.with_default_font(family);
        self
    }

    /// Leave tables out of the output.
    pub fn without_tables(mut self) -> Self {
        self.render_options = self.render_options.with_tables(false);
        self
    }

    /// Use a shared cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn converter(&self) -> Converter {
        let options = ConvertOptions::new()
            .with_render_options(self.render_options.clone())
            .with_cancellation(self.cancel.clone());
        Converter::new(self.formats.clone(), options)
    }

    /// Read a document file.
    pub fn read<P: AsRef<Path>>(self, path: P) -> Result<DocvertResult> {
        let path = path.as_ref();
        let model = self
            .converter()
            .read_model(File::open(path)?, &SourceHint::from_path(path))?;
        Ok(self.into_result(model))
    }

    /// Read an in-memory document.
    pub fn read_bytes(self, data: &[u8], hint: &SourceHint) -> Result<DocvertResult> {
        let model = self.converter().read_model(data, hint)?;
        Ok(self.into_result(model))
    }

    fn into_result(self, model: ContentModel) -> DocvertResult {
        DocvertResult {
            model,
            render_options: self.render_options,
            cancel: self.cancel,
        }
    }
}

impl Default for Docvert {
    fn default() -> Self {
        Self::new()
    }
}

/// A document read by [`Docvert`].
pub struct DocvertResult {
    /// The content model
    pub model: ContentModel,
    render_options: RenderOptions,
    cancel: CancellationToken,
}

impl DocvertResult {
    /// Encode into `target`.
    pub fn encode(&self, target: DocumentFormat) -> Result<Vec<u8>> {
        let encoder = EncoderRegistry::with_defaults().require(target)?;
        let mut out = Vec::new();
        encoder.encode(&self.model, &mut out, &self.render_options, &self.cancel)?;
        Ok(out)
    }

    /// Plain text, one line per paragraph.
    pub fn to_text(&self) -> String {
        render::to_text(&self.model, &self.render_options)
    }

    /// Convert to JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.model, format)
    }

    /// Statistics of the model.
    pub fn stats(&self) -> ExtractionStats {
        self.model.stats()
    }

    /// Get the model.
    pub fn model(&self) -> &ContentModel {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docvert_builder() {
        let builder = Docvert::new().with_default_font("Georgia").without_tables();
        assert_eq!(builder.render_options.default_font.as_deref(), Some("Georgia"));
        assert!(!builder.render_options.include_tables);
    }

    #[test]
    fn test_read_bytes_empty_data() {
        let result = read_bytes(&[], &SourceHint::new());
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_read_bytes_binary_garbage() {
        let data = [0xFF, 0xFE, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        assert!(read_bytes(&data, &SourceHint::new()).is_err());
    }

    #[test]
    fn test_read_bytes_with_hint() {
        let model = read_bytes(b"first\nsecond", &SourceHint::new().with_file_name("a.txt")).unwrap();
        assert_eq!(model.paragraphs.len(), 2);
        assert_eq!(model.metadata.source_format, Some(DocumentFormat::Txt));
    }

    #[test]
    fn test_encode_every_format() {
        let result = Docvert::new()
            .read_bytes(b"Hello", &SourceHint::new().with_format(DocumentFormat::Txt))
            .unwrap();
        for format in DocumentFormat::ALL {
            let bytes = result.encode(format).unwrap();
            assert!(!bytes.is_empty(), "{} output is empty", format);
        }
        assert_eq!(result.to_text(), "Hello\n");
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
