//! DOM Module - Arena-based XML Document
//!
//! Implements a mutable DOM using:
//! - Arena allocation for nodes, attributes included
//! - NodeId (u32) indices for cache-friendly traversal
//! - String interning for names and namespace URIs
//! - Typed `Node` wrappers produced by a single dispatch function

pub(crate) mod builder;
pub mod dispatch;
pub mod document;
pub mod namespace;
pub mod node;
pub mod node_set;
pub mod operations;
pub mod serialize;
pub mod strings;

pub use dispatch::{construct, DocumentId, Node, NodeHandle};
pub use document::{XmlDocument, DOCUMENT_NODE};
pub use node::{NodeId, NodeKind, NsDef, XmlNode};
pub use node_set::NodeSet;
pub use strings::StringPool;

use crate::core::attributes::split_name;

/// Read access to a document tree; the XPath engine is written against this
pub trait DocumentAccess {
    /// Get root element ID
    fn root_element_id(&self) -> Option<NodeId>;

    /// Get a node by ID
    fn get_node(&self, id: NodeId) -> Option<&XmlNode>;

    /// Qualified name of a node
    fn node_name(&self, id: NodeId) -> Option<&str>;

    /// Namespace URI of a node, if it has one
    fn node_namespace_uri(&self, id: NodeId) -> Option<&str>;

    /// Children - returns collected Vec for trait object compatibility
    fn children_vec(&self, id: NodeId) -> Vec<NodeId>;

    /// Descendants in document order, attributes excluded
    fn descendants_vec(&self, id: NodeId) -> Vec<NodeId>;

    /// XPath string-value of a node
    fn string_value(&self, id: NodeId) -> String;

    /// Sort into document order and drop duplicates
    fn sort_document_order(&self, ids: &mut Vec<NodeId>);

    fn node_kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    /// Name without its prefix
    fn node_local_name(&self, id: NodeId) -> Option<&str> {
        self.node_name(id).map(|name| split_name(name).1)
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.parent
    }

    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.next_sibling
    }

    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.prev_sibling
    }

    /// Attribute node ids of an element, in document order
    fn attribute_ids(&self, id: NodeId) -> &[NodeId] {
        match self.get_node(id) {
            Some(node) => &node.attributes,
            None => &[],
        }
    }

    /// Value of the attribute with qualified name `name`
    fn attribute_value(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attribute_ids(id)
            .iter()
            .find(|&&attr| self.node_name(attr) == Some(name))
            .and_then(|&attr| self.get_node(attr))
            .map(|attr| attr.content.as_str())
    }
}
