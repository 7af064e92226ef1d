//! Document properties from OOXML `docProps/core.xml` and ODF `meta.xml`.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::xml::{decode_entities, TagKind, Tags};
use crate::model::Metadata;

/// Parse OOXML core properties.
pub fn parse_core_properties(xml: &str) -> Metadata {
    let mut metadata = Metadata::default();
    for (name, value) in simple_elements(xml) {
        match name {
            "dc:title" => metadata.title = Some(value),
            "dc:creator" => metadata.creator = Some(value),
            "dc:subject" => metadata.subject = Some(value),
            "dc:description" => metadata.description = Some(value),
            "dcterms:created" => metadata.created = parse_iso_date(&value),
            "dcterms:modified" => metadata.modified = parse_iso_date(&value),
            _ => {}
        }
    }
    metadata
}

/// Parse ODF document metadata.
pub fn parse_odf_meta(xml: &str) -> Metadata {
    let mut metadata = Metadata::default();
    let mut initial_creator = None;
    for (name, value) in simple_elements(xml) {
        match name {
            "dc:title" => metadata.title = Some(value),
            "dc:creator" => metadata.creator = Some(value),
            "meta:initial-creator" => initial_creator = Some(value),
            "dc:subject" => metadata.subject = Some(value),
            "dc:description" => metadata.description = Some(value),
            "meta:creation-date" => metadata.created = parse_iso_date(&value),
            "dc:date" => metadata.modified = parse_iso_date(&value),
            _ => {}
        }
    }
    if metadata.creator.is_none() {
        metadata.creator = initial_creator;
    }
    metadata
}

/// Collect `(name, text)` for every element whose content has no child
/// elements. Blank values are dropped.
fn simple_elements(xml: &str) -> Vec<(&str, String)> {
    let mut found = Vec::new();
    let mut open: Option<(&str, usize)> = None;
    for tag in Tags::new(xml) {
        match tag.kind {
            TagKind::Open => open = Some((tag.name, tag.end)),
            TagKind::Close => {
                if let Some((name, content_start)) = open.take() {
                    if name == tag.name {
                        let value = decode_entities(xml[content_start..tag.start].trim());
                        if !value.is_empty() {
                            found.push((name, value.into_owned()));
                        }
                    }
                }
            }
            TagKind::Empty => open = None,
        }
    }
    found
}

/// Parse an ISO 8601 timestamp. Values without an offset are taken as UTC.
pub(crate) fn parse_iso_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_core_properties() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:title>Quarterly &amp; Annual</dc:title><dc:creator>R. Author</dc:creator>
<dcterms:created xsi:type="dcterms:W3CDTF">2024-03-15T10:30:00Z</dcterms:created>
<dc:subject></dc:subject>
</cp:coreProperties>"#;
        let meta = parse_core_properties(xml);
        assert_eq!(meta.title.as_deref(), Some("Quarterly & Annual"));
        assert_eq!(meta.creator.as_deref(), Some("R. Author"));
        assert_eq!(meta.subject, None);
        let created = meta.created.unwrap();
        assert_eq!(created.year(), 2024);
        assert_eq!(created.hour(), 10);
    }

    #[test]
    fn test_odf_meta() {
        let xml = r#"<office:document-meta><office:meta>
<meta:initial-creator>First Writer</meta:initial-creator>
<meta:creation-date>2023-11-02T08:00:00.123</meta:creation-date>
<dc:title>Notes</dc:title>
</office:meta></office:document-meta>"#;
        let meta = parse_odf_meta(xml);
        assert_eq!(meta.title.as_deref(), Some("Notes"));
        assert_eq!(meta.creator.as_deref(), Some("First Writer"));
        assert_eq!(meta.created.unwrap().month(), 11);
    }

    #[test]
    fn test_parse_iso_date_variants() {
        assert!(parse_iso_date("2024-01-02T03:04:05+09:00").is_some());
        assert!(parse_iso_date("2024-01-02").is_some());
        assert!(parse_iso_date("last tuesday").is_none());
    }
}
