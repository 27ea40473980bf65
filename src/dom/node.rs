//! XML Node representation
//!
//! Uses NodeId (u32) for compact, cache-friendly node references.

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root (always arena slot 0)
    Document,
    Element,
    /// Attribute, owned by an element through its attribute list
    Attribute,
    Text,
    /// CDATA section
    CData,
    /// Entity reference kept unexpanded
    EntityReference,
    ProcessingInstruction,
    Comment,
    DocumentType,
}

impl NodeKind {
    /// Integer kind code, following the DOM `nodeType` numbering
    pub fn code(self) -> u8 {
        match self {
            NodeKind::Element => 1,
            NodeKind::Attribute => 2,
            NodeKind::Text => 3,
            NodeKind::CData => 4,
            NodeKind::EntityReference => 5,
            NodeKind::ProcessingInstruction => 7,
            NodeKind::Comment => 8,
            NodeKind::Document => 9,
            NodeKind::DocumentType => 14,
        }
    }

    /// Kinds whose textual value is their own content rather than the
    /// concatenation of descendant text
    #[inline]
    pub fn holds_text(self) -> bool {
        matches!(
            self,
            NodeKind::Text
                | NodeKind::CData
                | NodeKind::Comment
                | NodeKind::ProcessingInstruction
                | NodeKind::Attribute
        )
    }
}

/// A namespace declaration carried by an element (`xmlns` / `xmlns:p`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsDef {
    /// Interned prefix, 0 for the default namespace
    pub prefix_id: u32,
    /// Interned URI, 0 when the default namespace is undeclared
    pub uri_id: u32,
}

/// An XML node in the arena
#[derive(Debug, Clone)]
pub struct XmlNode {
    pub kind: NodeKind,
    /// Parent node (None for the document node and detached nodes).
    /// For attributes: the owning element.
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Interned qualified name (elements, attributes, PIs, entity references, doctype)
    pub name_id: u32,
    /// Interned namespace URI, or 0
    pub namespace_id: u32,
    /// Text, comment, PI data, attribute value or entity replacement text
    pub content: String,
    /// Attribute nodes in document order (elements only)
    pub attributes: Vec<NodeId>,
    /// Namespace declarations (elements only)
    pub ns_defs: Vec<NsDef>,
}

impl XmlNode {
    pub fn new(kind: NodeKind, name_id: u32) -> Self {
        XmlNode {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            name_id,
            namespace_id: 0,
            content: String::new(),
            attributes: Vec::new(),
            ns_defs: Vec::new(),
        }
    }

    pub fn with_content(kind: NodeKind, name_id: u32, content: impl Into<String>) -> Self {
        XmlNode {
            content: content.into(),
            ..Self::new(kind, name_id)
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    #[inline]
    pub fn is_attribute(&self) -> bool {
        self.kind == NodeKind::Attribute
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = XmlNode::new(NodeKind::Element, 3);
        assert!(node.is_element());
        assert!(node.parent.is_none());
        assert!(!node.has_children());
        assert_eq!(node.name_id, 3);
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(NodeKind::Element.code(), 1);
        assert_eq!(NodeKind::CData.code(), 4);
        assert_eq!(NodeKind::Document.code(), 9);
        assert_eq!(NodeKind::DocumentType.code(), 14);
    }

    #[test]
    fn test_text_holding_kinds() {
        assert!(NodeKind::Attribute.holds_text());
        assert!(!NodeKind::Element.holds_text());
        assert!(!NodeKind::EntityReference.holds_text());
    }
}
