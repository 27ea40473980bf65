//! Error taxonomy
//!
//! Every engine-level failure (malformed markup, I/O, XPath) is translated
//! into [`Error`] before it leaves the crate.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A well-formedness problem found while scanning markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// 1-based line of the offending input
    pub line: usize,
    /// 1-based column (in characters) of the offending input
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }

    /// Build an error for a byte offset into `input`
    pub fn at(message: impl Into<String>, input: &str, offset: usize) -> Self {
        let (line, column) = line_column(input, offset);
        Self::new(message, line, column)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}, column {}", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

#[derive(Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XPath error: {0}")]
    XPathSyntax(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl Error {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Parse(_) => "parse_error",
            Error::Io(_) => "io_error",
            Error::XPathSyntax(_) => "xpath_syntax_error",
            Error::Type(_) => "type_error",
            Error::InvalidState(_) => "invalid_state",
            Error::Unsupported(_) => "unsupported_operation",
        }
    }
}

/// Compute the 1-based line and column for a byte offset
fn line_column(input: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(input.len());
    while !input.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &input[..offset];
    let line = memchr::memchr_iter(b'\n', before.as_bytes()).count() + 1;
    let line_start = memchr::memrchr(b'\n', before.as_bytes()).map_or(0, |p| p + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column() {
        let input = "<a>\n  <b>\n</a>";
        let err = ParseError::at("boom", input, 6);
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn test_display() {
        let err = Error::from(ParseError::new("Document is empty", 1, 1));
        assert_eq!(
            err.to_string(),
            "parse error: Document is empty at line 1, column 1"
        );
        assert_eq!(err.kind(), "parse_error");
    }
}
