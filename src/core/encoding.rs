//! XML Encoding Detection and Conversion
//!
//! Resolves the character encoding of raw input and converts it to UTF-8.
//! Resolution order: byte order mark, UTF-16 byte pattern, the encoding
//! named in the XML declaration, the caller's hint, then UTF-8.

use crate::error::ParseError;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use std::borrow::Cow;

/// Encoding detected from the first bytes alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        match (input[0], input[1]) {
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // No BOM: '<' next to a NUL byte
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }
}

/// Decode raw input to UTF-8 text.
///
/// `hint` is only consulted when the document neither starts with a byte
/// order mark nor declares its encoding.
pub fn decode_input<'a>(input: &'a [u8], hint: Option<&str>) -> Result<Cow<'a, str>, ParseError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(input) {
        return decode_with(encoding, &input[bom_len..]);
    }

    match XmlEncoding::detect(input) {
        XmlEncoding::Utf16Le => return decode_with(UTF_16LE, input),
        XmlEncoding::Utf16Be => return decode_with(UTF_16BE, input),
        XmlEncoding::Utf8 => {}
    }

    let declared = declared_encoding(input);
    let label = declared.as_deref().or(hint);
    let Some(label) = label else {
        return decode_utf8(input);
    };

    match label.trim().to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => decode_utf8(input),
        "us-ascii" | "ascii" => {
            if input.is_ascii() {
                decode_utf8(input)
            } else {
                let pos = input.iter().position(|b| !b.is_ascii()).unwrap_or(0);
                Err(error_at("Input is not proper US-ASCII", input, pos))
            }
        }
        // WHATWG maps these labels to windows-1252; keep true latin-1
        "iso-8859-1" | "iso_8859-1" | "latin1" | "l1" => Ok(encoding_rs::mem::decode_latin1(input)),
        "utf-16" => decode_with(UTF_16LE, input),
        other => match Encoding::for_label(other.as_bytes()) {
            Some(encoding) => decode_with(encoding, input),
            None => Err(ParseError::new(
                format!("Unsupported encoding {}", label),
                1,
                1,
            )),
        },
    }
}

fn decode_utf8(input: &[u8]) -> Result<Cow<'_, str>, ParseError> {
    match std::str::from_utf8(input) {
        Ok(s) => Ok(Cow::Borrowed(s)),
        Err(e) => Err(error_at(
            "Input is not proper UTF-8, indicate encoding !",
            input,
            e.valid_up_to(),
        )),
    }
}

fn decode_with<'a>(encoding: &'static Encoding, input: &'a [u8]) -> Result<Cow<'a, str>, ParseError> {
    if encoding == UTF_8 {
        return decode_utf8(input);
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(input)
        .ok_or_else(|| ParseError::new(format!("Input is not proper {}", encoding.name()), 1, 1))
}

fn error_at(message: &str, input: &[u8], pos: usize) -> ParseError {
    // The prefix before `pos` is valid, so positions can be computed on it
    let prefix = String::from_utf8_lossy(&input[..pos.min(input.len())]);
    ParseError::at(message, &prefix, prefix.len())
}

/// Read the `encoding` pseudo-attribute of an ASCII-compatible XML declaration
fn declared_encoding(input: &[u8]) -> Option<String> {
    if !input.starts_with(b"<?xml") {
        return None;
    }
    let end = memchr::memmem::find(&input[..input.len().min(512)], b"?>")?;
    let decl = std::str::from_utf8(&input[5..end]).ok()?;
    let at = decl.find("encoding")?;
    let rest = decl[at + "encoding".len()..].trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let close = value.find(quote)?;
    Some(value[..close].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf8() {
        assert_eq!(XmlEncoding::detect(b"<root/>"), XmlEncoding::Utf8);
    }

    #[test]
    fn test_detect_utf16_without_bom() {
        assert_eq!(XmlEncoding::detect(&[b'<', 0, b'a', 0]), XmlEncoding::Utf16Le);
        assert_eq!(XmlEncoding::detect(&[0, b'<', 0, b'a']), XmlEncoding::Utf16Be);
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let decoded = decode_input(b"\xEF\xBB\xBF<a/>", None).unwrap();
        assert_eq!(decoded, "<a/>");
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a>é</a>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_input(&bytes, None).unwrap(), "<a>é</a>");
    }

    #[test]
    fn test_declared_latin1() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>\xE9</a>";
        let decoded = decode_input(bytes, None).unwrap();
        assert!(decoded.ends_with("<a>é</a>"));
    }

    #[test]
    fn test_hint_used_without_declaration() {
        let decoded = decode_input(b"<a>\xE9</a>", Some("latin1")).unwrap();
        assert_eq!(decoded, "<a>é</a>");
    }

    #[test]
    fn test_declaration_wins_over_hint() {
        let bytes = "<?xml version='1.0' encoding='UTF-8'?><a>é</a>".as_bytes();
        let decoded = decode_input(bytes, Some("latin1")).unwrap();
        assert!(decoded.ends_with("<a>é</a>"));
    }

    #[test]
    fn test_invalid_utf8_reports_position() {
        let err = decode_input(b"<a>\n\xFF</a>", None).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn test_unknown_encoding() {
        let err = decode_input(b"<?xml version='1.0' encoding='klingon'?><a/>", None).unwrap_err();
        assert!(err.message.contains("Unsupported encoding"));
    }
}
