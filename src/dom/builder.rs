//! Tree construction from scan events
//!
//! `TreeBuilder` is the [`ScanHandler`] that turns scanner events into the
//! arena: it links nodes, resolves namespaces with a scope stack, and keeps
//! recoverable errors for the recover-mode decision at the end.

use super::document::{XmlDocument, DOCUMENT_NODE};
use super::namespace::NamespaceResolver;
use super::node::{NodeId, NodeKind, NsDef, XmlNode};
use crate::core::attributes::{split_name, Attribute};
use crate::core::dtd::DocTypeDecl;
use crate::core::ScanHandler;
use crate::error::{ParseError, Result};

pub(crate) struct TreeBuilder {
    doc: XmlDocument,
    /// Open containers, innermost last; starts at the document node
    stack: Vec<NodeId>,
    resolver: NamespaceResolver,
    /// CDATA node receiving characters, while inside a CDATA section
    cdata: Option<NodeId>,
    recover: bool,
    errors: Vec<ParseError>,
}

impl TreeBuilder {
    pub(crate) fn new(recover: bool) -> Self {
        let mut doc = XmlDocument::new();
        let resolver = NamespaceResolver::new(&mut doc.strings);
        TreeBuilder {
            doc,
            stack: vec![DOCUMENT_NODE],
            resolver,
            cdata: None,
            recover,
            errors: Vec::new(),
        }
    }

    /// Turn the scan outcome into a document. Fatal errors always fail;
    /// recoverable ones fail unless recovering.
    pub(crate) fn finish(mut self, outcome: std::result::Result<(), ParseError>) -> Result<XmlDocument> {
        outcome?;
        if !self.recover {
            if let Some(first) = self.errors.into_iter().next() {
                return Err(first.into());
            }
        } else {
            for error in &self.errors {
                log::warn!("recovered from parse error: {}", error);
            }
            let errors = std::mem::take(&mut self.errors);
            self.doc.set_errors(errors);
        }
        self.doc.mark_parsed();
        Ok(self.doc)
    }

    #[inline]
    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(DOCUMENT_NODE)
    }

    fn append(&mut self, node: XmlNode) -> NodeId {
        let parent = self.current();
        let id = self.doc.alloc(node);
        self.doc.append_child(parent, id);
        id
    }

    fn namespace_error(&mut self, message: String) {
        // Positions are known to the scanner only
        self.errors.push(ParseError::new(message, 0, 0));
    }

    /// Resolve a prefix through the scope stack; `None` when unbound
    fn resolve_prefix(&self, prefix: &str) -> Option<u32> {
        let prefix_id = self.doc.strings.lookup(prefix)?;
        self.resolver.resolve(prefix_id)
    }
}

impl ScanHandler for TreeBuilder {
    fn doctype(&mut self, decl: &DocTypeDecl) {
        let name_id = self.doc.strings.intern(&decl.name);
        self.append(XmlNode::new(NodeKind::DocumentType, name_id));
        self.doc.set_doctype(decl.clone());
    }

    fn start_element(&mut self, name: &str, attrs: &[Attribute<'_>]) {
        let name_id = self.doc.strings.intern(name);
        let mut element = XmlNode::new(NodeKind::Element, name_id);
        self.resolver.push_scope();

        for attr in attrs.iter().filter(|a| a.is_namespace_declaration()) {
            let prefix_id = match attr.name {
                "xmlns" => 0,
                _ => self.doc.strings.intern(attr.local_name()),
            };
            let uri_id = self.doc.strings.intern(&attr.value);
            self.resolver.declare(prefix_id, uri_id);
            element.ns_defs.push(NsDef { prefix_id, uri_id });
        }

        let (prefix, local) = split_name(name);
        element.namespace_id = match prefix {
            Some(p) => self.resolve_prefix(p).unwrap_or_else(|| {
                self.namespace_error(format!("Namespace prefix {} on {} is not defined", p, local));
                0
            }),
            None => self.resolver.resolve(0).unwrap_or(0),
        };

        let element_id = self.append(element);

        for attr in attrs.iter().filter(|a| !a.is_namespace_declaration()) {
            let attr_name_id = self.doc.strings.intern(attr.name);
            let mut node = XmlNode::with_content(NodeKind::Attribute, attr_name_id, attr.value.as_ref());
            if let Some(p) = attr.prefix() {
                node.namespace_id = self.resolve_prefix(p).unwrap_or_else(|| {
                    self.namespace_error(format!(
                        "Namespace prefix {} for {} on {} is not defined",
                        p,
                        attr.local_name(),
                        name
                    ));
                    0
                });
            }
            let attr_id = self.doc.alloc(node);
            self.doc.append_attribute(element_id, attr_id);
        }

        self.stack.push(element_id);
    }

    fn end_element(&mut self, _name: &str) {
        self.resolver.pop_scope();
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn characters(&mut self, text: &str) {
        if let Some(cdata) = self.cdata {
            if let Some(node) = self.doc.get_node_mut(cdata) {
                node.content.push_str(text);
            }
            return;
        }

        let parent = self.current();
        let last = self.doc.get_node(parent).and_then(|p| p.last_child);
        if let Some(last) = last {
            if let Some(node) = self.doc.get_node_mut(last) {
                if node.kind == NodeKind::Text {
                    node.content.push_str(text);
                    return;
                }
            }
        }
        self.append(XmlNode::with_content(NodeKind::Text, 0, text));
    }

    fn start_cdata(&mut self) {
        self.cdata = Some(self.append(XmlNode::new(NodeKind::CData, 0)));
    }

    fn end_cdata(&mut self) {
        self.cdata = None;
    }

    fn comment(&mut self, text: &str) {
        self.append(XmlNode::with_content(NodeKind::Comment, 0, text));
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) {
        let name_id = self.doc.strings.intern(target);
        self.append(XmlNode::with_content(
            NodeKind::ProcessingInstruction,
            name_id,
            data.unwrap_or(""),
        ));
    }

    fn entity_reference(&mut self, name: &str, replacement: Option<&str>) {
        let name_id = self.doc.strings.intern(name);
        self.append(XmlNode::with_content(
            NodeKind::EntityReference,
            name_id,
            replacement.unwrap_or(""),
        ));
    }

    fn error(&mut self, error: &ParseError) {
        self.errors.push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::XmlDocument;
    use crate::error::Error;
    use crate::options::ParseOptions;

    #[test]
    fn test_recoverable_error_fails_without_recover() {
        let err = XmlDocument::parse(b"<a>&undefined;</a>", &ParseOptions::default()).unwrap_err();
        match err {
            Error::Parse(e) => assert_eq!(e.message, "Entity 'undefined' not defined"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_recover_mode_collects_errors() {
        let options = ParseOptions::new().with_recover(true);
        let doc = XmlDocument::parse(b"<a x='1' x='2'>&undefined;</a>", &options).unwrap();
        assert_eq!(doc.errors().len(), 2);
        assert!(doc.root().is_some());
    }

    #[test]
    fn test_fatal_error_fails_even_when_recovering() {
        let options = ParseOptions::new().with_recover(true);
        let err = XmlDocument::parse(b"<a><b></a>", &options).unwrap_err();
        assert_eq!(err.kind(), "parse_error");
    }

    #[test]
    fn test_undeclared_prefix_is_recoverable() {
        let options = ParseOptions::new().with_recover(true);
        let doc = XmlDocument::parse(b"<p:a/>", &options).unwrap();
        assert_eq!(doc.errors()[0].message, "Namespace prefix p on a is not defined");
        assert!(XmlDocument::parse(b"<p:a/>", &ParseOptions::default()).is_err());
    }

    #[test]
    fn test_doctype_and_misc_nodes() {
        let doc = XmlDocument::parse(
            b"<!DOCTYPE r [<!ENTITY e 'v'>]><!--c--><?pi data?><r>&e;</r>",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(doc.doctype().unwrap().name, "r");
        // doctype, comment, pi, root
        assert_eq!(doc.children(0).count(), 4);
        let root = doc.root_element_id().unwrap();
        assert_eq!(doc.text_content(root), "v");
    }

    #[test]
    fn test_namespace_declarations_are_not_attributes() {
        let doc = XmlDocument::parse(b"<r xmlns:p='urn:p' p:x='1' y='2'/>", &ParseOptions::default()).unwrap();
        let root = doc.get_node(doc.root_element_id().unwrap()).unwrap();
        assert_eq!(root.attributes.len(), 2);
        assert_eq!(root.ns_defs.len(), 1);
        assert_eq!(doc.namespace_of(root.attributes[0]), Some("urn:p"));
        assert_eq!(doc.namespace_of(root.attributes[1]), None);
    }
}
