//! Paragraph and run types.

use serde::{Deserialize, Serialize};

/// Highest heading level the model distinguishes.
pub const MAX_HEADING_LEVEL: u8 = 3;

/// A paragraph of text content.
///
/// A paragraph with no runs is a blank line and is kept as such.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Text alignment
    pub alignment: Alignment,

    /// Heading level: 0 for body text, 1-3 for headings
    pub heading_level: u8,

    /// Runs in source order
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// Create a new empty paragraph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a paragraph with one plain run.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut p = Self::new();
        p.add_run(Run::new(text));
        p
    }

    /// Create a heading paragraph. Levels above 3 are clamped.
    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        let mut p = Self::with_text(text);
        p.heading_level = level.clamp(1, MAX_HEADING_LEVEL);
        p
    }

    /// Set alignment and return self.
    pub fn align(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Append a run.
    pub fn add_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    /// Concatenated run text.
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// True when the paragraph has no visible text.
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.is_empty())
    }

    /// Check if this is a heading.
    pub fn is_heading(&self) -> bool {
        self.heading_level > 0
    }
}

/// A contiguous span of text sharing one style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// The text content
    pub text: String,

    /// Bold
    pub bold: bool,

    /// Italic
    pub italic: bool,

    /// Underline
    pub underline: bool,

    /// Font size in half-points (OOXML `w:sz` units)
    pub font_size_half_points: Option<u16>,

    /// Font family; encoders substitute their own default when absent
    pub font_family: Option<String>,
}

impl Run {
    /// Create a plain run.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Create a bold run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::new(text)
        }
    }

    /// Create an italic run.
    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            italic: true,
            ..Self::new(text)
        }
    }

    /// Create an underlined run.
    pub fn underlined(text: impl Into<String>) -> Self {
        Self {
            underline: true,
            ..Self::new(text)
        }
    }

    /// Set the font size in points.
    pub fn with_size_pt(mut self, points: f32) -> Self {
        self.font_size_half_points = Some((points * 2.0).round() as u16);
        self
    }

    /// Set the font family.
    pub fn with_font(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    /// Font size in points, if set.
    pub fn font_size_pt(&self) -> Option<f32> {
        self.font_size_half_points.map(|hp| f32::from(hp) / 2.0)
    }

    /// Check if any of bold/italic/underline is set.
    pub fn has_styling(&self) -> bool {
        self.bold || self.italic || self.underline
    }

    /// Whether two runs share every style property.
    pub fn same_style(&self, other: &Run) -> bool {
        self.bold == other.bold
            && self.italic == other.italic
            && self.underline == other.underline
            && self.font_size_half_points == other.font_size_half_points
            && self.font_family == other.font_family
    }
}

/// Text alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Left alignment (default)
    #[default]
    Left,
    /// Center alignment
    Center,
    /// Right alignment
    Right,
    /// Justified alignment
    Justify,
}

impl Alignment {
    /// Parse an OOXML `w:jc` value.
    pub fn from_ooxml(value: &str) -> Option<Self> {
        match value {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" => Some(Alignment::Justify),
            _ => None,
        }
    }
}
