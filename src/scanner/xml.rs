//! Minimal tag lexer and entity handling shared by the scanners.
//!
//! This is not an XML parser. It finds `<...>` spans in a string, classifies
//! them as opening, closing or empty-element tags and exposes their names and
//! raw attribute text. Comments, processing instructions and declarations
//! are skipped.

use std::borrow::Cow;

use regex::Regex;

/// Kind of a lexed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind {
    /// `<name ...>`
    Open,
    /// `</name>`
    Close,
    /// `<name .../>`
    Empty,
}

/// A tag found in the input.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tag<'a> {
    pub name: &'a str,
    pub kind: TagKind,
    /// Attribute text between the name and the closing `>` or `/>`
    pub attributes: &'a str,
    /// Byte offset of `<`
    pub start: usize,
    /// Byte offset just past `>`
    pub end: usize,
}

impl<'a> Tag<'a> {
    /// Opening or empty-element tag with this name.
    pub fn opens(&self, name: &str) -> bool {
        self.name == name && self.kind != TagKind::Close
    }

    /// Closing tag with this name.
    pub fn closes(&self, name: &str) -> bool {
        self.name == name && self.kind == TagKind::Close
    }
}

/// Iterator over the tags of a string.
///
/// Iteration stops at a `<` with no matching `>`: the remainder of the
/// input is treated as malformed.
pub(crate) struct Tags<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tags<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Resume lexing at `pos`.
    pub fn skip_to(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Tag<'a>> {
        loop {
            let rest = &self.input[self.pos..];
            let start = self.pos + rest.find('<')?;
            let after = &self.input[start..];

            if after.starts_with("<!--") {
                let close = after.find("-->")?;
                self.pos = start + close + 3;
                continue;
            }
            if after.starts_with("<![CDATA[") {
                let close = after.find("]]>")?;
                self.pos = start + close + 3;
                continue;
            }

            let close = after.find('>')?;
            let end = start + close + 1;
            self.pos = end;

            let inner = &self.input[start + 1..end - 1];
            if inner.starts_with('?') || inner.starts_with('!') {
                continue;
            }

            let (kind, inner) = if let Some(stripped) = inner.strip_prefix('/') {
                (TagKind::Close, stripped)
            } else if let Some(stripped) = inner.strip_suffix('/') {
                (TagKind::Empty, stripped)
            } else {
                (TagKind::Open, inner)
            };
            let name_end = inner
                .find(|c: char| c.is_whitespace())
                .unwrap_or(inner.len());
            let name = &inner[..name_end];
            if name.is_empty() {
                continue;
            }

            return Some(Tag {
                name,
                kind,
                attributes: inner[name_end..].trim(),
                start,
                end,
            });
        }
    }
}

/// Reads attribute values out of a tag's attribute text.
pub(crate) struct AttributeReader {
    pattern: Regex,
}

impl AttributeReader {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r#"([\w:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap(),
        }
    }

    /// Value of the attribute `key`, entity-decoded.
    pub fn get(&self, tag: &Tag<'_>, key: &str) -> Option<String> {
        self.pattern
            .captures_iter(tag.attributes)
            .find(|caps| &caps[1] == key)
            .and_then(|caps| caps.get(2).or_else(|| caps.get(3)))
            .map(|m| decode_entities(m.as_str()).into_owned())
    }
}

impl Default for AttributeReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Text of an element that starts at `content_start` and must be closed by
/// `close` before any other markup. Returns the raw text and the offset just
/// past the closing tag, or `None` if the span is not terminated that way.
pub(crate) fn text_span<'a>(input: &'a str, content_start: usize, close: &str) -> Option<(&'a str, usize)> {
    let rest = &input[content_start..];
    let len = rest.find('<')?;
    if !rest[len..].starts_with(close) {
        return None;
    }
    Some((&rest[..len], content_start + len + close.len()))
}

/// Decode the five predefined XML entities and numeric character
/// references. Unknown or malformed references are kept verbatim.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .filter(|&semi| semi <= 12)
            .and_then(|semi| decode_reference(&candidate[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// Collapse XML whitespace runs (space, tab, CR, LF) to a single space.
pub(crate) fn collapse_whitespace(text: &str, out: &mut String) {
    let mut in_space = out.ends_with(' ');
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\r' | '\n') {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_classified() {
        let tags: Vec<_> =
            Tags::new(r#"<?xml version="1.0"?><w:p w:rsidR="1"><w:b/></w:p>"#).collect();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].name, "w:p");
        assert_eq!(tags[0].kind, TagKind::Open);
        assert_eq!(tags[0].attributes, r#"w:rsidR="1""#);
        assert_eq!(tags[1].kind, TagKind::Empty);
        assert!(tags[2].closes("w:p"));
    }

    #[test]
    fn test_unterminated_tag_stops() {
        let names: Vec<_> = Tags::new("<a><b").map(|t| t.name).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_comments_skipped() {
        let names: Vec<_> = Tags::new("<!-- <x> --><y/>").map(|t| t.name).collect();
        assert_eq!(names, vec!["y"]);
    }

    #[test]
    fn test_attribute_reader() {
        let reader = AttributeReader::new();
        let tag = Tags::new(r#"<w:rFonts w:ascii="Arial" w:hAnsi='A &amp; B'/>"#)
            .next()
            .unwrap();
        assert_eq!(reader.get(&tag, "w:ascii").as_deref(), Some("Arial"));
        assert_eq!(reader.get(&tag, "w:hAnsi").as_deref(), Some("A & B"));
        assert_eq!(reader.get(&tag, "w:cs"), None);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &amp; c"), "a <b> & c");
        assert_eq!(decode_entities("&#233;&#xE9;"), "éé");
        assert_eq!(decode_entities("&quot;&apos;"), "\"'");
        assert_eq!(decode_entities("AT&T &bogus;"), "AT&T &bogus;");
        assert!(matches!(decode_entities("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_text_span() {
        let line = "<w:t>abc</w:t><w:t>x</w:r>";
        assert_eq!(text_span(line, 5, "</w:t>"), Some(("abc", 14)));
        assert_eq!(text_span(line, 19, "</w:t>"), None);
    }

    #[test]
    fn test_collapse_whitespace() {
        let mut out = String::new();
        collapse_whitespace("a \n\t b", &mut out);
        assert_eq!(out, "a b");
    }
}
