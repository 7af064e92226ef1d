//! Rendering options and configuration.

use chrono::NaiveDateTime;

/// Options shared by all encoders.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Font family for runs without one; `None` uses each format's default
    pub default_font: Option<String>,

    /// Emit tables after the body paragraphs
    pub include_tables: bool,

    /// Fixed modification time for archive entries (reproducible output)
    pub timestamp: Option<NaiveDateTime>,

    /// Deflate level for archive entries (0-9)
    pub compression_level: u32,

    /// Application name written into document metadata
    pub generator: String,

    /// Page geometry and typography for PDF output
    pub pdf: PdfLayout,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback font family.
    pub fn with_default_font(mut self, family: impl Into<String>) -> Self {
        self.default_font = Some(family.into());
        self
    }

    /// Enable or disable table output.
    pub fn with_tables(mut self, include: bool) -> Self {
        self.include_tables = include;
        self
    }

    /// Stamp archive entries with a fixed time.
    pub fn with_timestamp(mut self, at: NaiveDateTime) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Set the deflate level.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Set the generator name.
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    /// Set the PDF layout.
    pub fn with_pdf_layout(mut self, layout: PdfLayout) -> Self {
        self.pdf = layout;
        self
    }

    /// Font for a run, falling back to the options and then to `format_default`.
    pub fn font_or<'a>(&'a self, run_font: Option<&'a str>, format_default: &'a str) -> &'a str {
        run_font
            .or(self.default_font.as_deref())
            .unwrap_or(format_default)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            default_font: None,
            include_tables: true,
            timestamp: None,
            compression_level: 6,
            generator: format!("docvert/{}", crate::VERSION),
            pdf: PdfLayout::default(),
        }
    }
}

/// Page geometry and typography for the PDF encoder. Units are points.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub page_width: f32,
    pub page_height: f32,

    /// Margin on all four sides
    pub margin: f32,

    /// Body text size
    pub font_size: f32,

    /// Heading sizes for levels 1, 2 and 3
    pub heading_sizes: [f32; 3],

    /// Line height as a multiple of the font size
    pub line_spacing: f32,

    /// Extra space after each paragraph
    pub paragraph_spacing: f32,

    /// Average glyph width as a fraction of the font size, used for wrapping
    pub average_glyph_width: f32,
}

impl PdfLayout {
    /// US Letter, 72 pt margins.
    pub fn letter() -> Self {
        Self {
            page_width: 612.0,
            page_height: 792.0,
            margin: 72.0,
            font_size: 12.0,
            heading_sizes: [20.0, 16.0, 14.0],
            line_spacing: 1.2,
            paragraph_spacing: 6.0,
            average_glyph_width: 0.5,
        }
    }

    /// ISO A4, 72 pt margins.
    pub fn a4() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            ..Self::letter()
        }
    }

    /// Set the margin.
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin.max(0.0);
        self
    }

    /// Set the body font size.
    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size.max(1.0);
        self
    }

    /// Width available for text.
    pub fn text_width(&self) -> f32 {
        (self.page_width - 2.0 * self.margin).max(1.0)
    }

    /// Size for a heading level (0 = body).
    pub fn size_for_heading(&self, level: u8) -> f32 {
        match level {
            0 => self.font_size,
            n => self.heading_sizes[usize::from(n.min(3)) - 1],
        }
    }
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self::letter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_builder() {
        let options = RenderOptions::new()
            .with_default_font("Georgia")
            .with_tables(false)
            .with_compression_level(12);

        assert_eq!(options.default_font.as_deref(), Some("Georgia"));
        assert!(!options.include_tables);
        assert_eq!(options.compression_level, 9);
    }

    #[test]
    fn test_font_fallback() {
        let options = RenderOptions::default();
        assert_eq!(options.font_or(None, "Calibri"), "Calibri");
        assert_eq!(options.font_or(Some("Arial"), "Calibri"), "Arial");

        let options = options.with_default_font("Georgia");
        assert_eq!(options.font_or(None, "Calibri"), "Georgia");
    }

    #[test]
    fn test_pdf_layout() {
        let layout = PdfLayout::letter();
        assert_eq!(layout.text_width(), 468.0);
        assert_eq!(layout.size_for_heading(0), 12.0);
        assert_eq!(layout.size_for_heading(1), 20.0);
        assert_eq!(layout.size_for_heading(9), 14.0);
        assert_eq!(PdfLayout::a4().margin, 72.0);
    }
}
