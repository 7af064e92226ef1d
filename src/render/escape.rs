//! Text escaping for XML and RTF output.

use std::borrow::Cow;
use std::fmt::Write;

/// Escape text for XML content and attribute values.
pub fn escape_xml(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) && !text.chars().any(is_invalid_xml_char) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_invalid_xml_char(c) => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Control characters that XML 1.0 cannot carry at all.
fn is_invalid_xml_char(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

/// Escape literal text for an RTF body.
///
/// `\`, `{` and `}` are escaped first and only once; tabs and line breaks
/// become `\tab` and `\line`; characters outside ASCII become `\uN?`
/// (signed 16-bit, surrogate pairs for astral characters).
pub fn escape_rtf(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '\t' => out.push_str("\\tab "),
            '\n' => out.push_str("\\line "),
            '\r' => {}
            c if c.is_ascii() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{}?", *unit as i16);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a < b & c > \"d\" 'e'"), "a &lt; b &amp; c &gt; &quot;d&quot; &apos;e&apos;");
        assert!(matches!(escape_xml("plain"), Cow::Borrowed(_)));
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }

    #[test]
    fn test_escape_rtf_once() {
        assert_eq!(escape_rtf(r"C:\path {x}"), r"C:\\path \{x\}");
        // Already-escaped looking input is still treated as literal text.
        assert_eq!(escape_rtf(r"\\"), r"\\\\");
    }

    #[test]
    fn test_escape_rtf_unicode() {
        assert_eq!(escape_rtf("café"), r"caf\u233?");
        assert_eq!(escape_rtf("€"), r"\u8364?");
        assert_eq!(escape_rtf("한"), r"\u-10916?");
        assert_eq!(escape_rtf("😀"), r"\u-10179?\u-8704?");
        assert_eq!(escape_rtf("a\tb\nc"), r"a\tab b\line c");
    }
}
