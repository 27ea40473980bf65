//! XML Attributes
//!
//! Attribute records handed from the scanner to its handlers, plus the
//! name splitting and value normalization they need.

use memchr::{memchr, memchr3};
use std::borrow::Cow;

/// A parsed XML attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    /// Attribute name as written (may include a namespace prefix)
    pub name: &'a str,
    /// Normalized value with references replaced
    pub value: Cow<'a, str>,
}

impl<'a> Attribute<'a> {
    pub fn new(name: &'a str, value: impl Into<Cow<'a, str>>) -> Self {
        Attribute {
            name,
            value: value.into(),
        }
    }

    #[inline]
    pub fn prefix(&self) -> Option<&'a str> {
        split_name(self.name).0
    }

    #[inline]
    pub fn local_name(&self) -> &'a str {
        split_name(self.name).1
    }

    /// `xmlns` or `xmlns:prefix`
    pub fn is_namespace_declaration(&self) -> bool {
        self.name == "xmlns" || self.name.starts_with("xmlns:")
    }
}

/// Split a name into prefix and local name at the colon
#[inline]
pub fn split_name(name: &str) -> (Option<&str>, &str) {
    match memchr(b':', name.as_bytes()) {
        Some(colon) if colon > 0 && colon + 1 < name.len() => {
            (Some(&name[..colon]), &name[colon + 1..])
        }
        _ => (None, name),
    }
}

/// True when literal text needs whitespace normalization
#[inline]
pub fn needs_normalization(text: &str) -> bool {
    memchr3(b'\t', b'\n', b'\r', text.as_bytes()).is_some()
}

/// Append literal attribute text, mapping tab, CR and LF to a space.
///
/// Characters produced by character references are appended by the
/// caller directly and are not normalized.
pub fn push_normalized(text: &str, out: &mut String) {
    if !needs_normalization(text) {
        out.push_str(text);
        return;
    }
    out.extend(text.chars().map(|c| match c {
        '\t' | '\n' | '\r' => ' ',
        other => other,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("xlink:href"), (Some("xlink"), "href"));
        assert_eq!(split_name("id"), (None, "id"));
        assert_eq!(split_name(":odd"), (None, ":odd"));
    }

    #[test]
    fn test_namespace_declaration() {
        assert!(Attribute::new("xmlns", "urn:a").is_namespace_declaration());
        assert!(Attribute::new("xmlns:x", "urn:x").is_namespace_declaration());
        assert!(!Attribute::new("xmlnsx", "v").is_namespace_declaration());
        let attr = Attribute::new("xmlns:x", "urn:x");
        assert_eq!(attr.prefix(), Some("xmlns"));
        assert_eq!(attr.local_name(), "x");
    }

    #[test]
    fn test_push_normalized() {
        let mut out = String::new();
        push_normalized("a\tb\nc", &mut out);
        assert_eq!(out, "a b c");
    }
}
