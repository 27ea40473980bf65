//! SIMD-accelerated delimiter scanning using memchr
//!
//! The scanner works on already-decoded UTF-8 text; every position it
//! reports is a byte offset into that text.

use memchr::{memchr, memchr2, memmem};

/// Cursor over markup text
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Scanner { input, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    /// Text between two byte offsets
    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    /// Unconsumed input
    #[inline]
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos.min(self.input.len())..]
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes().get(self.pos + offset).copied()
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Skip XML whitespace, returning whether any was skipped
    #[inline]
    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
        self.pos > start
    }

    /// Find next '<' or '&' (text content boundaries)
    #[inline]
    pub fn find_text_boundary(&self) -> Option<usize> {
        memchr2(b'<', b'&', &self.bytes()[self.pos..]).map(|i| self.pos + i)
    }

    #[inline]
    pub fn find_byte(&self, byte: u8) -> Option<usize> {
        memchr(byte, &self.bytes()[self.pos..]).map(|i| self.pos + i)
    }

    /// Find a multi-byte terminator such as `-->` or `]]>`
    #[inline]
    pub fn find_str(&self, needle: &str) -> Option<usize> {
        memmem::find(&self.bytes()[self.pos..], needle.as_bytes()).map(|i| self.pos + i)
    }

    #[inline]
    pub fn starts_with(&self, needle: &str) -> bool {
        self.bytes()[self.pos..].starts_with(needle.as_bytes())
    }

    /// Read an XML name and advance past it
    pub fn read_name(&mut self) -> Option<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(b) if is_name_start_byte(b) => {}
            _ => return None,
        }
        self.pos += 1;
        while let Some(b) = self.peek() {
            if !is_name_byte(b) {
                break;
            }
            self.pos += 1;
        }
        Some(&self.input[start..self.pos])
    }

    /// Read a single- or double-quoted literal, returning its contents
    pub fn read_quoted(&mut self) -> Option<&'a str> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return None,
        };
        self.advance(1);
        let start = self.pos;
        let end = self.find_byte(quote)?;
        self.pos = end + 1;
        Some(&self.input[start..end])
    }
}

/// Check if byte can start an XML name.
/// Non-ASCII bytes are accepted so UTF-8 names pass through whole.
#[inline]
pub fn is_name_start_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

#[inline]
pub fn is_name_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

/// True if every character of `s` is XML whitespace
#[inline]
pub fn is_xml_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_text_boundary() {
        let scanner = Scanner::new("hello &amp; <world>");
        assert_eq!(scanner.find_text_boundary(), Some(6));
    }

    #[test]
    fn test_read_name() {
        let mut scanner = Scanner::new("element-name>");
        assert_eq!(scanner.read_name(), Some("element-name"));
        assert_eq!(scanner.position(), 12);
    }

    #[test]
    fn test_read_name_utf8() {
        let mut scanner = Scanner::new("título/>");
        assert_eq!(scanner.read_name(), Some("título"));
    }

    #[test]
    fn test_skip_whitespace() {
        let mut scanner = Scanner::new("  \t\n hello");
        assert!(scanner.skip_whitespace());
        assert_eq!(scanner.position(), 5);
        assert!(!scanner.skip_whitespace());
    }

    #[test]
    fn test_find_str_and_quoted() {
        let mut scanner = Scanner::new("'a>b' x -->");
        assert_eq!(scanner.read_quoted(), Some("a>b"));
        assert_eq!(scanner.find_str("-->"), Some(8));
    }
}
