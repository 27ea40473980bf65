//! SAX Event Types
//!
//! Owned copies of the events a [`SaxHandler`](super::SaxHandler) receives.

/// A SAX parsing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaxEvent {
    StartDocument,
    EndDocument,
    StartElement {
        name: String,
        /// Flat `[name, value, ...]` pairs
        attributes: Vec<String>,
    },
    EndElement {
        name: String,
    },
    Characters(String),
    CDataBlock(String),
    Comment(String),
    Error(String),
    Warning(String),
}

impl SaxEvent {
    /// Check if this is a start element event
    #[inline]
    pub fn is_start_element(&self) -> bool {
        matches!(self, SaxEvent::StartElement { .. })
    }

    /// Check if this is an end element event
    #[inline]
    pub fn is_end_element(&self) -> bool {
        matches!(self, SaxEvent::EndElement { .. })
    }

    /// Get the element name if this is a start or end element
    pub fn element_name(&self) -> Option<&str> {
        match self {
            SaxEvent::StartElement { name, .. } | SaxEvent::EndElement { name } => Some(name),
            _ => None,
        }
    }

    /// Event name as used on the Elixir side
    pub fn tag(&self) -> &'static str {
        match self {
            SaxEvent::StartDocument => "start_document",
            SaxEvent::EndDocument => "end_document",
            SaxEvent::StartElement { .. } => "start_element",
            SaxEvent::EndElement { .. } => "end_element",
            SaxEvent::Characters(_) => "characters",
            SaxEvent::CDataBlock(_) => "cdata_block",
            SaxEvent::Comment(_) => "comment",
            SaxEvent::Error(_) => "error",
            SaxEvent::Warning(_) => "warning",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_name() {
        let start = SaxEvent::StartElement {
            name: "a".to_string(),
            attributes: vec![],
        };
        assert!(start.is_start_element());
        assert_eq!(start.element_name(), Some("a"));
        assert_eq!(SaxEvent::Characters("x".into()).element_name(), None);
        assert_eq!(SaxEvent::CDataBlock("x".into()).tag(), "cdata_block");
    }
}
