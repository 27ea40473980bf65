//! XML entity decoding and special-character encoding
//!
//! Handles:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//! - Output escaping for text, attribute values and `encode_special_chars`
//!
//! Uses Cow for zero-copy when nothing needs rewriting.

use memchr::{memchr, memchr3};
use std::borrow::Cow;

/// Resolve one of the five predefined entities
#[inline]
pub fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Decode the body of a character reference (the part after `&#`).
///
/// Returns None when the reference is malformed or names a character that
/// is not an XML 1.0 Char.
pub fn decode_char_ref(body: &str) -> Option<char> {
    let codepoint = if let Some(hex) = body.strip_prefix('x') {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()?
    } else {
        if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        body.parse::<u32>().ok()?
    };

    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

/// First character of `text` outside the XML 1.0 Char production
pub fn find_invalid_char(text: &str) -> Option<char> {
    // Only C0 controls and U+FFFE/U+FFFF can be invalid in a Rust str
    let suspicious = text
        .bytes()
        .any(|b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r')) || b == 0xEF);
    if !suspicious {
        return None;
    }
    text.chars().find(|&c| !is_valid_xml_char(c as u32))
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Expand character references in an entity literal.
///
/// General entity references are left untouched; they are expanded when
/// the entity is referenced, not when it is declared.
pub fn expand_char_refs(input: &str) -> Cow<'_, str> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find("&#") {
        result.push_str(&rest[..amp]);
        let after = &rest[amp + 2..];
        match after.find(';').and_then(|semi| decode_char_ref(&after[..semi]).map(|c| (c, semi))) {
            Some((c, semi)) => {
                result.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                result.push_str("&#");
                rest = after;
            }
        }
    }
    result.push_str(rest);
    Cow::Owned(result)
}

/// Replace the five predefined entity references, leaving all other
/// references as written
pub fn decode_predefined(input: &str) -> Cow<'_, str> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = memchr(b'&', rest.as_bytes()) {
        result.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after
            .find(';')
            .and_then(|semi| predefined_entity(&after[..semi]).map(|c| (c, semi)))
        {
            Some((c, semi)) => {
                result.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                result.push('&');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    Cow::Owned(result)
}

/// Escape `&`, `<`, `>`, `"` and carriage return.
///
/// Ampersand is handled first so the entities produced for the other
/// characters are not escaped a second time.
pub fn encode_special_chars(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\r', "&#13;")
}

/// Escape character data for serialization
#[inline]
pub fn escape_text_to_buf(s: &str, buf: &mut String) {
    if memchr3(b'&', b'<', b'>', s.as_bytes()).is_none() && memchr(b'\r', s.as_bytes()).is_none() {
        buf.push_str(s);
        return;
    }
    for c in s.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '\r' => buf.push_str("&#13;"),
            _ => buf.push(c),
        }
    }
}

/// Escape an attribute value for serialization (double-quoted)
#[inline]
pub fn escape_attribute_to_buf(s: &str, buf: &mut String) {
    for c in s.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\n' => buf.push_str("&#10;"),
            '\r' => buf.push_str("&#13;"),
            '\t' => buf.push_str("&#9;"),
            _ => buf.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined() {
        assert_eq!(predefined_entity("amp"), Some('&'));
        assert_eq!(predefined_entity("nbsp"), None);
    }

    #[test]
    fn test_char_refs() {
        assert_eq!(decode_char_ref("65"), Some('A'));
        assert_eq!(decode_char_ref("x41"), Some('A'));
        assert_eq!(decode_char_ref("x1F600"), Some('😀'));
        assert_eq!(decode_char_ref("0"), None);
        assert_eq!(decode_char_ref("xZZ"), None);
        assert_eq!(decode_char_ref(""), None);
    }

    #[test]
    fn test_find_invalid_char() {
        assert_eq!(find_invalid_char("plain\ttext\r\n"), None);
        assert_eq!(find_invalid_char("caf\u{e9} \u{fffd}"), None);
        assert_eq!(find_invalid_char("a\u{1b}b"), Some('\u{1b}'));
        assert_eq!(find_invalid_char("x\u{fffe}"), Some('\u{fffe}'));
    }

    #[test]
    fn test_expand_char_refs_keeps_entity_refs() {
        assert_eq!(expand_char_refs("a&#66;c &x;"), "aBc &x;");
        assert!(matches!(expand_char_refs("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_predefined() {
        assert_eq!(decode_predefined("a &amp; &custom; &lt;"), "a & &custom; <");
    }

    #[test]
    fn test_encode_special_chars_order() {
        assert_eq!(encode_special_chars("a & b < c"), "a &amp; b &lt; c");
        assert_eq!(
            encode_special_chars("\"x\" > y\r"),
            "&quot;x&quot; &gt; y&#13;"
        );
    }

    #[test]
    fn test_escape_text_and_attribute() {
        let mut buf = String::new();
        escape_text_to_buf("1 < 2 & \"q\"", &mut buf);
        assert_eq!(buf, "1 &lt; 2 &amp; \"q\"");

        let mut buf = String::new();
        escape_attribute_to_buf("a\"b\nc", &mut buf);
        assert_eq!(buf, "a&quot;b&#10;c");
    }
}
