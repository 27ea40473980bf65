//! Typed node wrappers
//!
//! [`construct`] is the single place where an arena node's kind selects
//! its wrapper. Every accessor that crosses the tree (parent, children,
//! siblings, attributes, query results) hands out nodes through it.

use super::document::XmlDocument;
use super::node::{NodeId, NodeKind};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_DOCUMENT_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique document identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u32);

impl DocumentId {
    pub(crate) fn next() -> Self {
        DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Stable reference to a node inside one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub doc: DocumentId,
    pub id: NodeId,
}

/// A node reference tagged with its wrapper kind
///
/// Wrappers are plain values: two wrappers for the same node compare
/// equal. Document and processing-instruction nodes use `Generic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Element(NodeHandle),
    Text(NodeHandle),
    CData(NodeHandle),
    Comment(NodeHandle),
    DocumentType(NodeHandle),
    EntityReference(NodeHandle),
    Attribute(NodeHandle),
    Generic(NodeHandle),
}

impl Node {
    /// Map a node kind to its wrapper
    pub(crate) fn wrap(kind: NodeKind, doc: DocumentId, id: NodeId) -> Node {
        let handle = NodeHandle { doc, id };
        match kind {
            NodeKind::Element => Node::Element(handle),
            NodeKind::Text => Node::Text(handle),
            NodeKind::CData => Node::CData(handle),
            NodeKind::Comment => Node::Comment(handle),
            NodeKind::DocumentType => Node::DocumentType(handle),
            NodeKind::EntityReference => Node::EntityReference(handle),
            NodeKind::Attribute => Node::Attribute(handle),
            NodeKind::Document | NodeKind::ProcessingInstruction => Node::Generic(handle),
        }
    }

    #[inline]
    pub fn handle(&self) -> NodeHandle {
        match *self {
            Node::Element(h)
            | Node::Text(h)
            | Node::CData(h)
            | Node::Comment(h)
            | Node::DocumentType(h)
            | Node::EntityReference(h)
            | Node::Attribute(h)
            | Node::Generic(h) => h,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.handle().id
    }

    #[inline]
    pub fn document_id(&self) -> DocumentId {
        self.handle().doc
    }

    /// `(document id << 32) | node id`
    #[inline]
    pub fn identity_key(&self) -> u64 {
        let h = self.handle();
        ((h.doc.as_u32() as u64) << 32) | h.id as u64
    }

    /// Name of the wrapper variant
    pub fn wrapper_name(&self) -> &'static str {
        match self {
            Node::Element(_) => "Element",
            Node::Text(_) => "Text",
            Node::CData(_) => "CDATA",
            Node::Comment(_) => "Comment",
            Node::DocumentType(_) => "DocumentType",
            Node::EntityReference(_) => "EntityReference",
            Node::Attribute(_) => "Attribute",
            Node::Generic(_) => "Node",
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element(_))
    }

    #[inline]
    pub fn is_attribute(&self) -> bool {
        matches!(self, Node::Attribute(_))
    }
}

/// Wrap an arena node. Absent ids, and ids outside the arena, give `None`.
pub fn construct(doc: &XmlDocument, id: Option<NodeId>) -> Option<Node> {
    let id = id?;
    let node = doc.get_node(id)?;
    Some(Node::wrap(node.kind, doc.id(), id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ParseOptions;

    #[test]
    fn test_construct_absent() {
        let doc = XmlDocument::new();
        assert_eq!(construct(&doc, None), None);
        assert_eq!(construct(&doc, Some(999)), None);
    }

    #[test]
    fn test_construct_by_kind() {
        let doc = XmlDocument::parse(
            b"<?pi x?><r a='1'>t<![CDATA[c]]><!--k--></r>",
            &ParseOptions::default(),
        )
        .unwrap();
        let wrappers: Vec<&str> = (0..doc.node_count() as NodeId)
            .filter_map(|id| construct(&doc, Some(id)))
            .map(|n| n.wrapper_name())
            .collect();
        assert_eq!(
            wrappers,
            vec!["Node", "Node", "Element", "Attribute", "Text", "CDATA", "Comment"]
        );
    }

    #[test]
    fn test_identity_key_stable() {
        let doc = XmlDocument::parse(b"<r><a/></r>", &ParseOptions::default()).unwrap();
        let root = doc.root().unwrap();
        let first = construct(&doc, doc.get_node(root.id()).unwrap().first_child).unwrap();
        let second = construct(&doc, doc.get_node(root.id()).unwrap().first_child).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.identity_key(), second.identity_key());
        assert_eq!(first.identity_key() >> 32, doc.id().as_u32() as u64);
    }
}
