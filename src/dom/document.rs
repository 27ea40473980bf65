//! XML Document - Arena-based DOM representation
//!
//! Efficient DOM storage with:
//! - Arena allocation for nodes (slot 0 is the document node)
//! - NodeId indices for traversal
//! - String interning for names and namespace URIs
//!
//! Nodes are never freed. Detaching a node leaves it in the arena as the
//! root of a detached subtree that insertion operations can attach again.

use super::builder::TreeBuilder;
use super::dispatch::{construct, DocumentId, Node};
use super::namespace::ns;
use super::node::{NodeId, NodeKind, XmlNode};
use super::strings::StringPool;
use super::DocumentAccess;
use crate::core::attributes::split_name;
use crate::core::dtd::DocTypeDecl;
use crate::core::scan_bytes;
use crate::error::{Error, ParseError, Result};
use crate::options::ParseOptions;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Callback run with every node attached through sibling insertion
pub type AttachHook = Box<dyn Fn(&XmlDocument, Node) + Send + Sync>;

/// Node id of the document node
pub const DOCUMENT_NODE: NodeId = 0;

/// An XML document stored in arena format
pub struct XmlDocument {
    id: DocumentId,
    nodes: Vec<XmlNode>,
    /// Interned names and namespace URIs
    pub strings: StringPool,
    doctype: Option<DocTypeDecl>,
    /// Recoverable errors kept in recover mode
    errors: Vec<ParseError>,
    /// Set once the tree is changed after parsing; arena order then no
    /// longer matches document order
    mutated: bool,
    attach_hook: Option<AttachHook>,
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocument")
            .field("id", &self.id)
            .field("nodes", &self.nodes.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl XmlDocument {
    /// An empty document holding only the document node
    pub fn new() -> Self {
        let mut strings = StringPool::new();
        strings.intern("xml");
        strings.intern(ns::XML);
        XmlDocument {
            id: DocumentId::next(),
            nodes: vec![XmlNode::new(NodeKind::Document, 0)],
            strings,
            doctype: None,
            errors: Vec::new(),
            mutated: false,
            attach_hook: None,
        }
    }

    /// Parse a document from bytes
    pub fn parse(input: &[u8], options: &ParseOptions) -> Result<Self> {
        Self::parse_with_hint(input, None, options)
    }

    /// Parse a document from bytes, with an encoding used when the input
    /// neither has a byte order mark nor declares one
    pub fn parse_with_hint(input: &[u8], hint: Option<&str>, options: &ParseOptions) -> Result<Self> {
        log::debug!("parsing document ({} bytes)", input.len());
        let mut builder = TreeBuilder::new(options.recover);
        let outcome = scan_bytes(input, hint, options, &mut builder);
        let doc = builder.finish(outcome)?;
        log::debug!(
            "parsed document {:?} ({} nodes, {} recovered errors)",
            doc.id,
            doc.nodes.len(),
            doc.errors.len()
        );
        Ok(doc)
    }

    /// Parse a document from a stream
    pub fn parse_reader<R: Read>(mut reader: R, hint: Option<&str>, options: &ParseOptions) -> Result<Self> {
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;
        Self::parse_with_hint(&input, hint, options)
    }

    /// Parse a document from a file. Relative external identifiers resolve
    /// against the file's directory unless `options` names a base.
    pub fn parse_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read(path)?;
        if options.base_dir.is_some() {
            return Self::parse(&input, options);
        }
        let mut options = options.clone();
        options.base_dir = path.parent().map(Path::to_path_buf);
        Self::parse(&input, &options)
    }

    #[inline]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Recoverable errors seen while parsing in recover mode
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub(crate) fn set_errors(&mut self, errors: Vec<ParseError>) {
        self.errors = errors;
    }

    pub fn doctype(&self) -> Option<&DocTypeDecl> {
        self.doctype.as_ref()
    }

    pub(crate) fn set_doctype(&mut self, decl: DocTypeDecl) {
        self.doctype = Some(decl);
    }

    /// Install the hook run with nodes attached by sibling insertion
    pub fn set_attach_hook<F>(&mut self, hook: F)
    where
        F: Fn(&XmlDocument, Node) + Send + Sync + 'static,
    {
        self.attach_hook = Some(Box::new(hook));
    }

    pub(crate) fn notify_attached(&self, node: Node) {
        if let Some(hook) = &self.attach_hook {
            hook(self, node);
        }
    }

    pub(crate) fn mark_parsed(&mut self) {
        self.mutated = false;
    }

    // ---- node access ----

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id as usize)
    }

    #[inline]
    pub(crate) fn get_node_mut(&mut self, id: NodeId) -> Option<&mut XmlNode> {
        self.nodes.get_mut(id as usize)
    }

    #[inline]
    pub fn kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    /// Qualified name of a node, empty for unnamed kinds
    pub fn name_of(&self, id: NodeId) -> &str {
        self.get_node(id)
            .map(|n| self.strings.get_str(n.name_id))
            .unwrap_or("")
    }

    /// Namespace URI of a node, if it has one
    pub fn namespace_of(&self, id: NodeId) -> Option<&str> {
        match self.get_node(id)?.namespace_id {
            0 => None,
            uri => Some(self.strings.get_str(uri)),
        }
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.get_node(id).and_then(|n| n.first_child),
        }
    }

    /// Descendants in document order (attributes excluded)
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.get_node(id).and_then(|n| n.first_child),
        }
    }

    /// Next node after `current` in a preorder walk bounded by `root`
    fn following_in_subtree(&self, current: NodeId, root: NodeId) -> Option<NodeId> {
        let node = self.get_node(current)?;
        if let Some(child) = node.first_child {
            return Some(child);
        }
        let mut cur = current;
        while cur != root {
            let n = self.get_node(cur)?;
            if let Some(next) = n.next_sibling {
                return Some(next);
            }
            cur = n.parent?;
        }
        None
    }

    /// True if `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get_node(id).and_then(|n| n.parent);
        }
        false
    }

    // ---- root ----

    /// The document element, if any
    pub fn root_element_id(&self) -> Option<NodeId> {
        self.children(DOCUMENT_NODE)
            .find(|&id| self.kind_of(id) == Some(NodeKind::Element))
    }

    pub fn root(&self) -> Option<Node> {
        construct(self, self.root_element_id())
    }

    /// The document node itself
    pub fn document_node(&self) -> Node {
        Node::wrap(NodeKind::Document, self.id, DOCUMENT_NODE)
    }

    /// Replace the document element with `node`, or attach it when the
    /// document has none yet
    pub fn set_root(&mut self, node: Node) -> Result<()> {
        if node.document_id() != self.id {
            return Err(Error::Type("node belongs to another document".into()));
        }
        if self.kind_of(node.id()) != Some(NodeKind::Element) {
            return Err(Error::Type("document root must be an element".into()));
        }

        match self.root_element_id() {
            Some(old) if old == node.id() => Err(Error::InvalidState(
                "node is already the document element".into(),
            )),
            Some(old) => {
                self.detach(node.id());
                self.insert_before(old, node.id());
                self.detach(old);
                Ok(())
            }
            None => {
                self.detach(node.id());
                self.append_child(DOCUMENT_NODE, node.id());
                Ok(())
            }
        }
    }

    // ---- construction ----

    pub(crate) fn alloc(&mut self, node: XmlNode) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    /// New detached element. A prefixed name takes its namespace once the
    /// element is attached under a declaration of the prefix.
    pub fn create_element(&mut self, name: &str) -> Node {
        let name_id = self.strings.intern(name);
        let id = self.alloc(XmlNode::new(NodeKind::Element, name_id));
        Node::wrap(NodeKind::Element, self.id, id)
    }

    pub fn create_text(&mut self, text: &str) -> Node {
        self.create_leaf(NodeKind::Text, text)
    }

    pub fn create_cdata(&mut self, text: &str) -> Node {
        self.create_leaf(NodeKind::CData, text)
    }

    /// Fails with [`Error::Type`] for text a comment cannot hold
    pub fn create_comment(&mut self, text: &str) -> Result<Node> {
        check_leaf_text(NodeKind::Comment, text)?;
        Ok(self.create_leaf(NodeKind::Comment, text))
    }

    fn create_leaf(&mut self, kind: NodeKind, text: &str) -> Node {
        let id = self.alloc(XmlNode::with_content(kind, 0, text));
        Node::wrap(kind, self.id, id)
    }

    // ---- link primitives ----
    //
    // Callers check ownership, kinds and cycles; these only relink.

    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let last = self.nodes[parent as usize].last_child;
        {
            let c = &mut self.nodes[child as usize];
            c.parent = Some(parent);
            c.prev_sibling = last;
            c.next_sibling = None;
        }
        match last {
            Some(l) => self.nodes[l as usize].next_sibling = Some(child),
            None => self.nodes[parent as usize].first_child = Some(child),
        }
        self.nodes[parent as usize].last_child = Some(child);
        self.mutated = true;
    }

    /// Insert detached `node` immediately before attached `reference`
    pub(crate) fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        let Some(parent) = self.nodes[reference as usize].parent else {
            return;
        };
        let prev = self.nodes[reference as usize].prev_sibling;
        {
            let n = &mut self.nodes[node as usize];
            n.parent = Some(parent);
            n.prev_sibling = prev;
            n.next_sibling = Some(reference);
        }
        self.nodes[reference as usize].prev_sibling = Some(node);
        match prev {
            Some(p) => self.nodes[p as usize].next_sibling = Some(node),
            None => self.nodes[parent as usize].first_child = Some(node),
        }
        self.mutated = true;
    }

    /// Insert detached `node` immediately after attached `reference`
    pub(crate) fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        let Some(parent) = self.nodes[reference as usize].parent else {
            return;
        };
        let next = self.nodes[reference as usize].next_sibling;
        {
            let n = &mut self.nodes[node as usize];
            n.parent = Some(parent);
            n.prev_sibling = Some(reference);
            n.next_sibling = next;
        }
        self.nodes[reference as usize].next_sibling = Some(node);
        match next {
            Some(n) => self.nodes[n as usize].prev_sibling = Some(node),
            None => self.nodes[parent as usize].last_child = Some(node),
        }
        self.mutated = true;
    }

    /// Unlink a node from its parent; no-op for detached nodes
    pub(crate) fn detach(&mut self, id: NodeId) {
        let (parent, prev, next, kind) = {
            let n = &self.nodes[id as usize];
            (n.parent, n.prev_sibling, n.next_sibling, n.kind)
        };
        let Some(parent) = parent else {
            return;
        };

        if kind == NodeKind::Attribute {
            self.nodes[parent as usize].attributes.retain(|&a| a != id);
        } else {
            match prev {
                Some(p) => self.nodes[p as usize].next_sibling = next,
                None => self.nodes[parent as usize].first_child = next,
            }
            match next {
                Some(n) => self.nodes[n as usize].prev_sibling = prev,
                None => self.nodes[parent as usize].last_child = prev,
            }
        }

        let n = &mut self.nodes[id as usize];
        n.parent = None;
        n.prev_sibling = None;
        n.next_sibling = None;
        self.mutated = true;
    }

    /// Attach detached attribute `attr` to `element` at `index` (clamped)
    pub(crate) fn insert_attribute(&mut self, element: NodeId, index: usize, attr: NodeId) {
        self.nodes[attr as usize].parent = Some(element);
        let attrs = &mut self.nodes[element as usize].attributes;
        let index = index.min(attrs.len());
        attrs.insert(index, attr);
        self.mutated = true;
    }

    pub(crate) fn append_attribute(&mut self, element: NodeId, attr: NodeId) {
        let end = self.nodes[element as usize].attributes.len();
        self.insert_attribute(element, end, attr);
    }

    /// Detach every child of `id`
    pub(crate) fn remove_children(&mut self, id: NodeId) {
        while let Some(child) = self.nodes[id as usize].first_child {
            self.detach(child);
        }
    }

    /// Copy `id` with its attributes, namespace declarations and
    /// descendants into a new detached subtree
    pub(crate) fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let root = self.copy_shallow(id);
        let mut pending = vec![(id, root)];
        while let Some((from, to)) = pending.pop() {
            let mut child = self.nodes[from as usize].first_child;
            while let Some(c) = child {
                let copy = self.copy_shallow(c);
                self.append_child(to, copy);
                pending.push((c, copy));
                child = self.nodes[c as usize].next_sibling;
            }
        }
        root
    }

    fn copy_shallow(&mut self, id: NodeId) -> NodeId {
        let (mut copy, attrs) = {
            let n = &self.nodes[id as usize];
            let mut copy = XmlNode::with_content(n.kind, n.name_id, n.content.clone());
            copy.namespace_id = n.namespace_id;
            copy.ns_defs = n.ns_defs.clone();
            (copy, n.attributes.clone())
        };
        copy.attributes = Vec::with_capacity(attrs.len());
        let new_id = self.alloc(copy);
        for attr in attrs {
            let attr_copy = self.copy_shallow(attr);
            self.append_attribute(new_id, attr_copy);
        }
        new_id
    }

    // ---- namespaces ----

    /// Resolve a prefix ("" for the default namespace) in the scope of
    /// `element`, returning the interned URI (0 when undeclared)
    pub fn lookup_namespace(&self, element: NodeId, prefix: &str) -> Option<u32> {
        if prefix == "xml" {
            return self.strings.lookup(ns::XML);
        }
        let prefix_id = self.strings.lookup(prefix)?;
        let mut current = Some(element);
        while let Some(id) = current {
            let node = self.get_node(id)?;
            if node.kind == NodeKind::Element {
                if let Some(def) = node.ns_defs.iter().find(|d| d.prefix_id == prefix_id) {
                    return Some(def.uri_id);
                }
            }
            current = node.parent;
        }
        None
    }

    /// Recompute a node's namespace from its name prefix and the
    /// declarations in scope. Returns false when a prefix is unbound.
    pub(crate) fn resolve_namespace(&mut self, id: NodeId) -> bool {
        let Some(node) = self.get_node(id) else {
            return false;
        };
        let (prefix, _) = split_name(self.strings.get_str(node.name_id));
        let uri = match (node.kind, prefix) {
            (NodeKind::Element, Some(p)) => self.lookup_namespace(id, p),
            (NodeKind::Element, None) => Some(self.lookup_namespace(id, "").unwrap_or(0)),
            (NodeKind::Attribute, Some(p)) => node.parent.and_then(|owner| self.lookup_namespace(owner, p)),
            _ => Some(0),
        };
        let bound = uri.is_some_and(|u| u != 0) || prefix.is_none();
        if let Some(node) = self.get_node_mut(id) {
            node.namespace_id = uri.unwrap_or(0);
        }
        bound
    }

    /// Namespace bindings in scope at `element` as (prefix id, uri id),
    /// innermost declaration first; undeclared defaults are left out
    pub fn in_scope_namespaces(&self, element: NodeId) -> Vec<(u32, u32)> {
        let mut seen = Vec::new();
        let mut result = Vec::new();
        let mut current = Some(element);
        while let Some(id) = current {
            let Some(node) = self.get_node(id) else {
                break;
            };
            for def in &node.ns_defs {
                if seen.contains(&def.prefix_id) {
                    continue;
                }
                seen.push(def.prefix_id);
                if def.uri_id != 0 {
                    result.push((def.prefix_id, def.uri_id));
                }
            }
            current = node.parent;
        }
        result
    }

    // ---- text ----

    /// Text of a node: own content for text-holding kinds and entity
    /// references, concatenated descendant text otherwise
    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.get_node(id) else {
            return String::new();
        };
        match node.kind {
            k if k.holds_text() => node.content.clone(),
            NodeKind::EntityReference => node.content.clone(),
            NodeKind::DocumentType => String::new(),
            _ => {
                let mut text = String::new();
                for d in self.descendants(id) {
                    if let Some(n) = self.get_node(d) {
                        if matches!(
                            n.kind,
                            NodeKind::Text | NodeKind::CData | NodeKind::EntityReference
                        ) {
                            text.push_str(&n.content);
                        }
                    }
                }
                text
            }
        }
    }

    // ---- document order ----

    /// Sort ids into document order and drop duplicates. Nodes in detached
    /// subtrees sort after the attached tree.
    pub fn sort_document_order(&self, ids: &mut Vec<NodeId>) {
        if !self.mutated {
            ids.sort_unstable();
        } else {
            let rank = self.document_ranks();
            ids.sort_by_key(|&id| rank.get(id as usize).copied().unwrap_or(u32::MAX));
        }
        ids.dedup();
    }

    fn document_ranks(&self) -> Vec<u32> {
        let mut rank = vec![u32::MAX; self.nodes.len()];
        let mut next = 0u32;
        self.rank_subtree(DOCUMENT_NODE, &mut rank, &mut next);
        for id in 1..self.nodes.len() as NodeId {
            if self.nodes[id as usize].parent.is_none() {
                self.rank_subtree(id, &mut rank, &mut next);
            }
        }
        rank
    }

    fn rank_subtree(&self, root: NodeId, rank: &mut [u32], next: &mut u32) {
        let mut assign = |id: NodeId, rank: &mut [u32]| {
            rank[id as usize] = *next;
            *next += 1;
            for &attr in &self.nodes[id as usize].attributes {
                rank[attr as usize] = *next;
                *next += 1;
            }
        };
        assign(root, rank);
        for id in self.descendants(root) {
            assign(id, rank);
        }
    }
}

/// Iterator over child node ids
pub struct Children<'d> {
    doc: &'d XmlDocument,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.get_node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Preorder iterator over descendant node ids
pub struct Descendants<'d> {
    doc: &'d XmlDocument,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.following_in_subtree(current, self.root);
        Some(current)
    }
}

// ============================================================================
// DocumentAccess trait implementation
// ============================================================================

impl DocumentAccess for XmlDocument {
    fn root_element_id(&self) -> Option<NodeId> {
        XmlDocument::root_element_id(self)
    }

    fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        XmlDocument::get_node(self, id)
    }

    fn node_name(&self, id: NodeId) -> Option<&str> {
        self.get_node(id).map(|n| self.strings.get_str(n.name_id))
    }

    fn node_namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.namespace_of(id)
    }

    fn children_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).collect()
    }

    fn descendants_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id).collect()
    }

    fn string_value(&self, id: NodeId) -> String {
        self.text_content(id)
    }

    fn sort_document_order(&self, ids: &mut Vec<NodeId>) {
        XmlDocument::sort_document_order(self, ids)
    }
}

/// Reject content that would end a comment or PI early when serialized
pub(crate) fn check_leaf_text(kind: NodeKind, text: &str) -> Result<()> {
    match kind {
        NodeKind::Comment if text.contains("--") || text.ends_with('-') => Err(Error::Type(
            "comment text cannot contain \"--\" or end with '-'".into(),
        )),
        NodeKind::ProcessingInstruction if text.contains("?>") => Err(Error::Type(
            "processing instruction data cannot contain \"?>\"".into(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> XmlDocument {
        XmlDocument::parse(xml.as_bytes(), &ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let doc = parse("<root/>");
        let root = doc.root_element_id().unwrap();
        assert_eq!(doc.name_of(root), "root");
        assert_eq!(doc.kind_of(DOCUMENT_NODE), Some(NodeKind::Document));
    }

    #[test]
    fn test_very_deep_nesting() {
        let depth = 70_000;
        let xml = format!("{}<p:b xmlns:p='urn:p'/>{}", "<a>".repeat(depth), "</a>".repeat(depth));
        let doc = parse(&xml);
        let innermost = doc.descendants(doc.root_element_id().unwrap()).last().unwrap();
        assert_eq!(doc.namespace_of(innermost), Some("urn:p"));
    }

    #[test]
    fn test_descendants_in_order() {
        let doc = parse("<root><a><b/></a><c/></root>");
        let root = doc.root_element_id().unwrap();
        let names: Vec<&str> = doc.descendants(root).map(|id| doc.name_of(id)).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_text_content() {
        let doc = parse("<r>a<b>b<![CDATA[c]]></b><!--x--></r>");
        let root = doc.root_element_id().unwrap();
        assert_eq!(doc.text_content(root), "abc");
    }

    #[test]
    fn test_set_root_replaces() {
        let mut doc = parse("<old><x/></old>");
        let new_root = doc.create_element("new");
        doc.set_root(new_root).unwrap();
        assert_eq!(doc.name_of(doc.root_element_id().unwrap()), "new");
        assert!(matches!(doc.set_root(new_root), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_set_root_on_empty_document() {
        let mut doc = XmlDocument::new();
        assert!(doc.root().is_none());
        let root = doc.create_element("r");
        doc.set_root(root).unwrap();
        assert_eq!(doc.root(), Some(root));
    }

    #[test]
    fn test_set_root_rejects_text_and_foreign() {
        let mut doc = parse("<r/>");
        let text = doc.create_text("t");
        assert!(matches!(doc.set_root(text), Err(Error::Type(_))));

        let mut other = XmlDocument::new();
        let foreign = other.create_element("f");
        assert!(matches!(doc.set_root(foreign), Err(Error::Type(_))));
    }

    #[test]
    fn test_document_order_after_mutation() {
        let mut doc = parse("<r><a/><b/></r>");
        let root = doc.root_element_id().unwrap();
        let ids: Vec<NodeId> = doc.children(root).collect();
        let (a, b) = (ids[0], ids[1]);
        doc.detach(a);
        doc.insert_after(b, a);

        let mut order = vec![a, b, a];
        doc.sort_document_order(&mut order);
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn test_deep_copy_is_detached() {
        let mut doc = parse("<r><a x='1'><b>t</b></a></r>");
        let root = doc.root_element_id().unwrap();
        let a = doc.children(root).next().unwrap();
        let copy = doc.deep_copy(a);
        assert!(doc.get_node(copy).unwrap().parent.is_none());
        assert_eq!(doc.text_content(copy), "t");
        assert_eq!(doc.get_node(copy).unwrap().attributes.len(), 1);
        assert_ne!(doc.get_node(copy).unwrap().attributes[0], doc.get_node(a).unwrap().attributes[0]);
    }

    #[test]
    fn test_lookup_namespace() {
        let doc = parse("<r xmlns='urn:d' xmlns:p='urn:p'><p:a/></r>");
        let root = doc.root_element_id().unwrap();
        let a = doc.children(root).next().unwrap();
        let uri = doc.lookup_namespace(a, "p").unwrap();
        assert_eq!(doc.strings.get_str(uri), "urn:p");
        assert_eq!(doc.namespace_of(a), Some("urn:p"));
        assert_eq!(doc.namespace_of(root), Some("urn:d"));
        assert_eq!(doc.in_scope_namespaces(a).len(), 2);
    }

    #[test]
    fn test_parse_reader_and_file() {
        let doc = XmlDocument::parse_reader(&b"<r/>"[..], None, &ParseOptions::default()).unwrap();
        assert!(doc.root().is_some());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        std::fs::write(&path, "<r>file</r>").unwrap();
        let doc = XmlDocument::parse_file(&path, &ParseOptions::default()).unwrap();
        assert_eq!(doc.text_content(doc.root_element_id().unwrap()), "file");

        let missing = XmlDocument::parse_file(dir.path().join("nope.xml"), &ParseOptions::default());
        assert!(matches!(missing, Err(Error::Io(_))));
    }

    #[test]
    fn test_document_ids_unique() {
        assert_ne!(XmlDocument::new().id(), XmlDocument::new().id());
    }
}
