//! Encoders: serialize a [`ContentModel`] to a target format.
//!
//! Every target format has an [`Encoder`]. Encoders are stateless across
//! calls and looked up through an [`EncoderRegistry`].

mod docx;
mod escape;
mod json;
mod odt;
mod options;
mod pdf;
mod rtf;
mod text;

pub use docx::DocxEncoder;
pub use escape::{escape_rtf, escape_xml};
pub use json::{to_json, JsonFormat};
pub use odt::OdtEncoder;
pub use options::{PdfLayout, RenderOptions};
pub use pdf::PdfEncoder;
pub use rtf::RtfEncoder;
pub use text::{to_text, PlainTextEncoder};

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use crate::archive::CountingWriter;
use crate::convert::CancellationToken;
use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::model::ContentModel;

/// Serializes a [`ContentModel`] into one target format.
///
/// Implement this trait to add support for a new target format.
pub trait Encoder: Send + Sync {
    /// Short name, e.g. `"odt"`.
    fn name(&self) -> &str;

    /// The format this encoder writes.
    fn format(&self) -> DocumentFormat;

    /// Write the encoded document to `out`.
    ///
    /// Implementations that loop over pages check `cancel` between them.
    fn encode(
        &self,
        model: &ContentModel,
        out: &mut dyn Write,
        options: &RenderOptions,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Encode and return the number of bytes written.
    fn encode_counted(
        &self,
        model: &ContentModel,
        out: &mut dyn Write,
        options: &RenderOptions,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut counter = CountingWriter::new(out);
        self.encode(model, &mut counter, options, cancel)?;
        counter.flush()?;
        Ok(counter.written())
    }

    /// Encode into a new buffer.
    fn encode_to_vec(&self, model: &ContentModel, options: &RenderOptions) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.encode(model, &mut buffer, options, &CancellationToken::new())?;
        Ok(buffer)
    }
}

/// Maps target formats to encoders.
pub struct EncoderRegistry {
    encoders: HashMap<DocumentFormat, Arc<dyn Encoder>>,
}

impl EncoderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            encoders: HashMap::new(),
        }
    }

    /// Registry with encoders for every built-in format.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PlainTextEncoder::new()));
        registry.register(Arc::new(RtfEncoder::new()));
        registry.register(Arc::new(OdtEncoder::new()));
        registry.register(Arc::new(DocxEncoder::new()));
        registry.register(Arc::new(PdfEncoder::new()));
        registry
    }

    /// Register an encoder, replacing any previous one for its format.
    pub fn register(&mut self, encoder: Arc<dyn Encoder>) {
        self.encoders.insert(encoder.format(), encoder);
    }

    pub fn get(&self, format: DocumentFormat) -> Option<Arc<dyn Encoder>> {
        self.encoders.get(&format).cloned()
    }

    /// Like [`get`](Self::get) but fails with `UnsupportedFormat`.
    pub fn require(&self, format: DocumentFormat) -> Result<Arc<dyn Encoder>> {
        self.get(format)
            .ok_or_else(|| Error::UnsupportedFormat(format!("no encoder for {} output", format)))
    }

    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.encoders.contains_key(&format)
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Paragraph;

    #[test]
    fn test_registry_with_defaults() {
        let registry = EncoderRegistry::with_defaults();
        for format in DocumentFormat::ALL {
            assert_eq!(registry.require(format).unwrap().format(), format);
        }
    }

    #[test]
    fn test_encode_counted_matches_buffer() {
        let mut model = ContentModel::new();
        model.add_paragraph(Paragraph::with_text("count me"));

        let encoder = PlainTextEncoder::new();
        let mut buffer = Vec::new();
        let written = encoder
            .encode_counted(&model, &mut buffer, &RenderOptions::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(written, buffer.len() as u64);
        assert_eq!(buffer, b"count me\n");
    }
}
