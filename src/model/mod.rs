//! Content model shared by the scanners and the encoders.
//!
//! This module defines the intermediate representation (IR) that bridges
//! source extraction and target serialization. It is format-agnostic: the
//! same model feeds the text, RTF, ODT, DOCX and PDF encoders.

mod document;
mod paragraph;
mod stats;
mod table;

pub use document::{ContentModel, Metadata};
pub use paragraph::{Alignment, Paragraph, Run, MAX_HEADING_LEVEL};
pub use stats::ExtractionStats;
pub use table::{Table, TableCell, TableRow};
