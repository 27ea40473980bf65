//! Node navigation, mutation and attribute access
//!
//! `Node` is a plain handle, so every operation takes the owning document
//! explicitly: `&XmlDocument` for reads and `&mut XmlDocument` for
//! mutations. A read given a node of another document sees an absent
//! node; a mutation given one fails with [`Error::Type`].

use super::dispatch::{construct, Node};
use super::document::{check_leaf_text, XmlDocument, DOCUMENT_NODE};
use super::node::{NodeId, NodeKind, NsDef, XmlNode};
use crate::core::attributes::split_name;
use crate::core::entities;
use crate::core::scanner::is_xml_whitespace;
use crate::error::{Error, Result};
use std::collections::HashMap;

fn foreign() -> Error {
    Error::Type("node belongs to another document".into())
}

impl Node {
    #[inline]
    fn in_doc(&self, doc: &XmlDocument) -> bool {
        self.document_id() == doc.id() && doc.get_node(self.id()).is_some()
    }

    /// Arena node behind this handle, `None` for a foreign handle
    fn data<'d>(&self, doc: &'d XmlDocument) -> Option<&'d XmlNode> {
        if self.document_id() != doc.id() {
            return None;
        }
        doc.get_node(self.id())
    }

    fn check_owner(&self, doc: &XmlDocument) -> Result<()> {
        if self.in_doc(doc) {
            Ok(())
        } else {
            Err(foreign())
        }
    }

    // ---- naming ----

    /// Node name; fixed names for unnamed kinds
    pub fn name<'d>(&self, doc: &'d XmlDocument) -> Option<&'d str> {
        let node = self.data(doc)?;
        Some(match node.kind {
            NodeKind::Text => "text",
            NodeKind::CData => "#cdata-section",
            NodeKind::Comment => "comment",
            NodeKind::Document => "document",
            _ => doc.strings.get_str(node.name_id),
        })
    }

    pub fn set_name(&self, doc: &mut XmlDocument, name: &str) -> Result<()> {
        self.check_owner(doc)?;
        let kind = doc.kind_of(self.id()).ok_or_else(foreign)?;
        match kind {
            NodeKind::Element
            | NodeKind::Attribute
            | NodeKind::ProcessingInstruction
            | NodeKind::DocumentType => {}
            other => {
                return Err(Error::Unsupported(format!(
                    "cannot rename a node of kind {:?}",
                    other
                )))
            }
        }
        let name_id = doc.strings.intern(name);
        if let Some(node) = doc.get_node_mut(self.id()) {
            node.name_id = name_id;
        }
        if matches!(kind, NodeKind::Element | NodeKind::Attribute) {
            doc.resolve_namespace(self.id());
        }
        Ok(())
    }

    // ---- navigation ----

    pub fn parent(&self, doc: &XmlDocument) -> Option<Node> {
        construct(doc, self.data(doc)?.parent)
    }

    /// First child
    pub fn child(&self, doc: &XmlDocument) -> Option<Node> {
        construct(doc, self.data(doc)?.first_child)
    }

    pub fn next_sibling(&self, doc: &XmlDocument) -> Option<Node> {
        let node = self.data(doc)?;
        if node.is_attribute() {
            return self.attribute_neighbour(doc, 1);
        }
        construct(doc, node.next_sibling)
    }

    pub fn previous_sibling(&self, doc: &XmlDocument) -> Option<Node> {
        let node = self.data(doc)?;
        if node.is_attribute() {
            return self.attribute_neighbour(doc, -1);
        }
        construct(doc, node.prev_sibling)
    }

    /// Attributes are siblings of each other through the owner's list
    fn attribute_neighbour(&self, doc: &XmlDocument, step: isize) -> Option<Node> {
        let owner = doc.get_node(self.data(doc)?.parent?)?;
        let index = owner.attributes.iter().position(|&a| a == self.id())? as isize;
        let target = usize::try_from(index + step).ok()?;
        construct(doc, owner.attributes.get(target).copied())
    }

    pub fn children(&self, doc: &XmlDocument) -> Vec<Node> {
        if self.data(doc).is_none() {
            return Vec::new();
        }
        doc.children(self.id())
            .filter_map(|id| construct(doc, Some(id)))
            .collect()
    }

    // ---- content ----

    /// Text of the node (see [`XmlDocument::text_content`])
    pub fn content(&self, doc: &XmlDocument) -> String {
        if self.data(doc).is_none() {
            return String::new();
        }
        doc.text_content(self.id())
    }

    /// Replace the content wholesale. Containers lose all children and get
    /// a single text child holding `text` literally.
    pub fn set_content(&self, doc: &mut XmlDocument, text: &str) -> Result<()> {
        self.check_owner(doc)?;
        let id = self.id();
        match doc.kind_of(id).ok_or_else(foreign)? {
            k if k.holds_text() => {
                check_leaf_text(k, text)?;
                if let Some(node) = doc.get_node_mut(id) {
                    node.content = text.to_string();
                }
                Ok(())
            }
            NodeKind::Element => {
                doc.remove_children(id);
                if !text.is_empty() {
                    let child = doc.alloc(XmlNode::with_content(NodeKind::Text, 0, text));
                    doc.append_child(id, child);
                }
                Ok(())
            }
            other => Err(Error::Unsupported(format!(
                "cannot set the content of a node of kind {:?}",
                other
            ))),
        }
    }

    /// Integer kind code (DOM `nodeType` numbering)
    pub fn node_type(&self, doc: &XmlDocument) -> Option<u8> {
        self.data(doc).map(|n| n.kind.code())
    }

    /// True for text nodes holding nothing but XML whitespace
    pub fn blank(&self, doc: &XmlDocument) -> bool {
        match self.data(doc) {
            Some(node) if node.kind == NodeKind::Text => is_xml_whitespace(&node.content),
            _ => false,
        }
    }

    pub fn encode_special_chars(text: &str) -> String {
        entities::encode_special_chars(text)
    }

    /// Subtree markup, without an XML declaration
    pub fn to_markup(&self, doc: &XmlDocument) -> Vec<u8> {
        if self.data(doc).is_none() {
            return Vec::new();
        }
        doc.serialize_node(self.id())
    }

    /// Raw internal subset of the owning document's DOCTYPE
    pub fn internal_subset(&self, doc: &XmlDocument) -> Option<String> {
        self.data(doc)?;
        doc.doctype()?.internal_subset.clone()
    }

    // ---- attributes ----

    fn find_attribute(&self, doc: &XmlDocument, key: &str) -> Option<NodeId> {
        let node = self.data(doc)?;
        if !node.is_element() {
            return None;
        }
        node.attributes
            .iter()
            .copied()
            .find(|&attr| doc.name_of(attr) == key)
    }

    pub fn has_attribute(&self, doc: &XmlDocument, key: &str) -> bool {
        self.find_attribute(doc, key).is_some()
    }

    /// One attribute node by qualified name
    pub fn attribute(&self, doc: &XmlDocument, name: &str) -> Option<Node> {
        construct(doc, self.find_attribute(doc, name))
    }

    /// Attribute names and values; empty for non-elements
    pub fn attributes(&self, doc: &XmlDocument) -> HashMap<String, String> {
        let Some(node) = self.data(doc).filter(|n| n.is_element()) else {
            return HashMap::new();
        };
        node.attributes
            .iter()
            .filter_map(|&attr| doc.get_node(attr))
            .map(|attr| (doc.strings.get_str(attr.name_id).to_string(), attr.content.clone()))
            .collect()
    }

    /// Attribute nodes in document order
    pub fn attribute_nodes(&self, doc: &XmlDocument) -> Vec<Node> {
        let Some(node) = self.data(doc).filter(|n| n.is_element()) else {
            return Vec::new();
        };
        node.attributes
            .iter()
            .filter_map(|&attr| construct(doc, Some(attr)))
            .collect()
    }

    /// Set an attribute, returning the value. `xmlns` and `xmlns:p` keys
    /// declare namespaces. No-op on non-elements.
    pub fn set_attribute(&self, doc: &mut XmlDocument, key: &str, value: &str) -> Result<String> {
        self.check_owner(doc)?;
        let id = self.id();
        if doc.kind_of(id) != Some(NodeKind::Element) {
            return Ok(value.to_string());
        }

        if let Some(prefix) = namespace_declaration_prefix(key) {
            let prefix_id = doc.strings.intern(prefix);
            let uri_id = doc.strings.intern(value);
            if let Some(node) = doc.get_node_mut(id) {
                match node.ns_defs.iter_mut().find(|d| d.prefix_id == prefix_id) {
                    Some(def) => def.uri_id = uri_id,
                    None => node.ns_defs.push(NsDef { prefix_id, uri_id }),
                }
            }
            resolve_subtree(doc, id);
            return Ok(value.to_string());
        }

        match self.find_attribute(doc, key) {
            Some(attr) => {
                if let Some(node) = doc.get_node_mut(attr) {
                    node.content = value.to_string();
                }
            }
            None => {
                let name_id = doc.strings.intern(key);
                let attr = doc.alloc(XmlNode::with_content(NodeKind::Attribute, name_id, value));
                doc.append_attribute(id, attr);
                doc.resolve_namespace(attr);
            }
        }
        Ok(value.to_string())
    }

    pub fn remove_attribute(&self, doc: &mut XmlDocument, key: &str) -> Result<()> {
        self.check_owner(doc)?;
        let id = self.id();
        if doc.kind_of(id) != Some(NodeKind::Element) {
            return Ok(());
        }

        if let Some(prefix) = namespace_declaration_prefix(key) {
            let Some(prefix_id) = doc.strings.lookup(prefix) else {
                return Ok(());
            };
            if let Some(node) = doc.get_node_mut(id) {
                node.ns_defs.retain(|d| d.prefix_id != prefix_id);
            }
            resolve_subtree(doc, id);
            return Ok(());
        }

        if let Some(attr) = self.find_attribute(doc, key) {
            doc.detach(attr);
        }
        Ok(())
    }

    /// In-scope namespace bindings keyed `xmlns` / `xmlns:prefix`
    pub fn namespaces(&self, doc: &XmlDocument) -> HashMap<String, String> {
        if !self.data(doc).is_some_and(XmlNode::is_element) {
            return HashMap::new();
        }
        doc.in_scope_namespaces(self.id())
            .into_iter()
            .map(|(prefix_id, uri_id)| {
                let key = match prefix_id {
                    0 => "xmlns".to_string(),
                    p => format!("xmlns:{}", doc.strings.get_str(p)),
                };
                (key, doc.strings.get_str(uri_id).to_string())
            })
            .collect()
    }

    // ---- structure ----

    /// Append `self` as the last child of `parent`. Fails with
    /// [`Error::InvalidState`] when `self` is already attached, since a node
    /// has a single parent slot in the arena; [`Node::reparent`] moves it.
    pub fn set_parent(&self, doc: &mut XmlDocument, parent: Node) -> Result<()> {
        self.check_owner(doc)?;
        parent.check_owner(doc)?;
        if doc.get_node(self.id()).and_then(|n| n.parent).is_some() {
            return Err(Error::InvalidState(
                "node already has a parent; reparent it instead".into(),
            ));
        }
        self.attach_under(doc, parent)
    }

    /// Detach `self` from its current parent, then append it under `parent`
    pub fn reparent(&self, doc: &mut XmlDocument, parent: Node) -> Result<()> {
        self.check_owner(doc)?;
        parent.check_owner(doc)?;
        self.check_insertable_under(doc, parent)?;
        doc.detach(self.id());
        self.attach_under(doc, parent)
    }

    fn check_insertable_under(&self, doc: &XmlDocument, parent: Node) -> Result<()> {
        let id = self.id();
        if id == DOCUMENT_NODE {
            return Err(Error::InvalidState("the document node cannot be moved".into()));
        }
        if doc.is_ancestor_or_self(id, parent.id()) {
            return Err(Error::InvalidState(
                "a node cannot be attached inside its own subtree".into(),
            ));
        }
        let child_kind = doc.kind_of(id).ok_or_else(foreign)?;
        match (doc.kind_of(parent.id()), child_kind) {
            (Some(NodeKind::Element), _) => Ok(()),
            (Some(NodeKind::Document), NodeKind::Element)
            | (Some(NodeKind::Document), NodeKind::Comment)
            | (Some(NodeKind::Document), NodeKind::ProcessingInstruction) => {
                if child_kind == NodeKind::Element && doc.root_element_id().is_some() {
                    return Err(Error::InvalidState("document already has a root element".into()));
                }
                Ok(())
            }
            (parent_kind, _) => Err(Error::Type(format!(
                "a {:?} node cannot be placed under {:?}",
                child_kind, parent_kind
            ))),
        }
    }

    fn attach_under(&self, doc: &mut XmlDocument, parent: Node) -> Result<()> {
        self.check_insertable_under(doc, parent)?;
        let id = self.id();
        if doc.kind_of(id) == Some(NodeKind::Attribute) {
            if let Some(existing) = doc
                .get_node(parent.id())
                .and_then(|p| p.attributes.iter().copied().find(|&a| doc.name_of(a) == doc.name_of(id)))
            {
                doc.detach(existing);
            }
            doc.append_attribute(parent.id(), id);
        } else {
            doc.append_child(parent.id(), id);
        }
        resolve_subtree(doc, id);
        Ok(())
    }

    /// Put `other` where `self` is; `self` ends up detached
    pub fn replace(&self, doc: &mut XmlDocument, other: Node) -> Result<()> {
        self.check_owner(doc)?;
        other.check_owner(doc)?;
        if self == &other {
            return Ok(());
        }
        let owner = self.attached_parent(doc)?;
        self.check_sibling_compatible(doc, other)?;
        self.check_document_level(doc, owner, other, true)?;
        if doc.is_ancestor_or_self(other.id(), owner) {
            return Err(Error::InvalidState(
                "a node cannot replace one of its own descendants".into(),
            ));
        }

        doc.detach(other.id());
        if self.is_attribute_in(doc) {
            let index = attribute_index(doc, owner, self.id());
            doc.detach(self.id());
            doc.insert_attribute(owner, index, other.id());
        } else {
            doc.insert_before(self.id(), other.id());
            doc.detach(self.id());
        }
        resolve_subtree(doc, other.id());
        Ok(())
    }

    /// Detach from the parent; the subtree stays intact under `self`
    pub fn unlink(&self, doc: &mut XmlDocument) -> Result<()> {
        self.check_owner(doc)?;
        self.attached_parent(doc)?;
        doc.detach(self.id());
        Ok(())
    }

    pub fn add_previous_sibling(&self, doc: &mut XmlDocument, other: Node) -> Result<()> {
        self.add_sibling(doc, other, false)
    }

    pub fn add_next_sibling(&self, doc: &mut XmlDocument, other: Node) -> Result<()> {
        self.add_sibling(doc, other, true)
    }

    fn add_sibling(&self, doc: &mut XmlDocument, other: Node, after: bool) -> Result<()> {
        self.check_owner(doc)?;
        other.check_owner(doc)?;
        let owner = self.attached_parent(doc)?;
        self.check_sibling_compatible(doc, other)?;
        self.check_document_level(doc, owner, other, false)?;
        if doc.is_ancestor_or_self(other.id(), self.id()) {
            return Err(Error::InvalidState(
                "a node cannot become a sibling of itself or its descendants".into(),
            ));
        }

        doc.detach(other.id());
        if self.is_attribute_in(doc) {
            let index = attribute_index(doc, owner, self.id()) + usize::from(after);
            doc.insert_attribute(owner, index, other.id());
        } else if after {
            doc.insert_after(self.id(), other.id());
        } else {
            doc.insert_before(self.id(), other.id());
        }
        resolve_subtree(doc, other.id());

        if let Some(attached) = construct(doc, Some(other.id())) {
            doc.notify_attached(attached);
        }
        Ok(())
    }

    fn attached_parent(&self, doc: &XmlDocument) -> Result<NodeId> {
        doc.get_node(self.id())
            .and_then(|n| n.parent)
            .ok_or_else(|| Error::InvalidState("node has no parent".into()))
    }

    fn is_attribute_in(&self, doc: &XmlDocument) -> bool {
        doc.kind_of(self.id()) == Some(NodeKind::Attribute)
    }

    fn check_sibling_compatible(&self, doc: &XmlDocument, other: Node) -> Result<()> {
        if self.is_attribute_in(doc) != other.is_attribute_in(doc) {
            return Err(Error::Type(
                "attributes can only be placed next to attributes".into(),
            ));
        }
        Ok(())
    }

    /// Top-level children of the document are comments, PIs and exactly
    /// one element. `replacing` is set when `other` takes `self`'s place.
    fn check_document_level(
        &self,
        doc: &XmlDocument,
        owner: NodeId,
        other: Node,
        replacing: bool,
    ) -> Result<()> {
        if owner != DOCUMENT_NODE {
            return Ok(());
        }
        let root = doc.root_element_id();
        let replaces_root = replacing && root == Some(self.id());
        match doc.kind_of(other.id()).ok_or_else(foreign)? {
            NodeKind::Element => {
                if root.is_none() || root == Some(other.id()) || replaces_root {
                    Ok(())
                } else {
                    Err(Error::InvalidState("document already has a root element".into()))
                }
            }
            NodeKind::Comment | NodeKind::ProcessingInstruction if replaces_root => Err(
                Error::InvalidState("the root element can only be replaced by an element".into()),
            ),
            NodeKind::Comment | NodeKind::ProcessingInstruction => Ok(()),
            kind => Err(Error::Type(format!(
                "a {:?} node cannot be placed at document level",
                kind
            ))),
        }
    }

    /// Deep copy as a new detached node of the same document
    pub fn duplicate(&self, doc: &mut XmlDocument) -> Result<Node> {
        self.check_owner(doc)?;
        if self.id() == DOCUMENT_NODE {
            return Err(Error::Unsupported("the document node cannot be copied".into()));
        }
        let copy = doc.deep_copy(self.id());
        construct(doc, Some(copy)).ok_or_else(|| Error::InvalidState("copy was not created".into()))
    }
}

/// Prefix declared by an `xmlns` / `xmlns:p` key ("" for the default)
fn namespace_declaration_prefix(key: &str) -> Option<&str> {
    if key == "xmlns" {
        return Some("");
    }
    match split_name(key) {
        (Some("xmlns"), local) => Some(local),
        _ => None,
    }
}

fn attribute_index(doc: &XmlDocument, owner: NodeId, attr: NodeId) -> usize {
    doc.get_node(owner)
        .and_then(|o| o.attributes.iter().position(|&a| a == attr))
        .unwrap_or(0)
}

/// Recompute namespaces of `root`, its descendants and their attributes
fn resolve_subtree(doc: &mut XmlDocument, root: NodeId) {
    let mut ids = vec![root];
    ids.extend(doc.descendants(root));
    for id in ids {
        let attrs = match doc.get_node(id) {
            Some(node) if node.is_element() => node.attributes.clone(),
            Some(node) if node.is_attribute() => Vec::new(),
            _ => continue,
        };
        doc.resolve_namespace(id);
        for attr in attrs {
            doc.resolve_namespace(attr);
        }
    }
}
