//! JSON dump of the content model.

use crate::error::{Error, Result};
use crate::model::ContentModel;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Serialize a model to JSON.
pub fn to_json(model: &ContentModel, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(model),
        JsonFormat::Compact => serde_json::to_string(model),
    };

    result.map_err(|e| Error::Encoding(format!("JSON serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paragraph, Run};

    #[test]
    fn test_to_json_pretty() {
        let mut model = ContentModel::new();
        model.metadata.title = Some("Test".to_string());
        model.add_paragraph(Paragraph::with_text("Hello"));

        let json = to_json(&model, JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"title\""));
        assert!(json.contains("Test"));
        assert!(json.contains('\n')); // Pretty has newlines
    }

    #[test]
    fn test_to_json_compact_round_trip() {
        let mut model = ContentModel::new();
        let mut p = Paragraph::new();
        p.add_run(Run::bold("strong"));
        model.add_paragraph(p);

        let json = to_json(&model, JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n')); // Compact has no newlines
        let back: ContentModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }
}
