//! Markup serialization
//!
//! Uses an explicit stack instead of recursion so deeply nested trees
//! cannot overflow the call stack. Output is UTF-8 without an XML
//! declaration.

use super::document::{XmlDocument, DOCUMENT_NODE};
use super::node::{NodeId, NodeKind};
use crate::core::entities::{escape_attribute_to_buf, escape_text_to_buf};

impl XmlDocument {
    /// Markup for the whole document, one top-level node per line
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = String::with_capacity(self.node_count() * 16);
        for child in self.children(DOCUMENT_NODE) {
            write_node(self, child, &mut buf);
            buf.push('\n');
        }
        buf.into_bytes()
    }

    /// Markup for one node and its subtree
    pub fn serialize_node(&self, id: NodeId) -> Vec<u8> {
        if id == DOCUMENT_NODE {
            return self.serialize();
        }
        let mut buf = String::with_capacity(256);
        write_node(self, id, &mut buf);
        buf.into_bytes()
    }
}

/// Stack entries: either entering a node or writing an element's end tag
enum StackEntry {
    Enter(NodeId),
    Close(NodeId),
}

fn write_node(doc: &XmlDocument, node_id: NodeId, buf: &mut String) {
    let mut stack: Vec<StackEntry> = Vec::with_capacity(64);
    stack.push(StackEntry::Enter(node_id));

    while let Some(entry) = stack.pop() {
        let current_id = match entry {
            StackEntry::Close(id) => {
                buf.push_str("</");
                buf.push_str(doc.name_of(id));
                buf.push('>');
                continue;
            }
            StackEntry::Enter(id) => id,
        };
        let Some(node) = doc.get_node(current_id) else {
            continue;
        };

        match node.kind {
            NodeKind::Element => {
                buf.push('<');
                buf.push_str(doc.strings.get_str(node.name_id));

                for def in &node.ns_defs {
                    buf.push_str(" xmlns");
                    if def.prefix_id != 0 {
                        buf.push(':');
                        buf.push_str(doc.strings.get_str(def.prefix_id));
                    }
                    buf.push_str("=\"");
                    escape_attribute_to_buf(doc.strings.get_str(def.uri_id), buf);
                    buf.push('"');
                }
                for &attr in &node.attributes {
                    buf.push(' ');
                    write_attribute(doc, attr, buf);
                }

                if node.first_child.is_none() {
                    buf.push_str("/>");
                } else {
                    buf.push('>');
                    stack.push(StackEntry::Close(current_id));
                    // Children in reverse so the first is popped first
                    let mut child_id = node.last_child;
                    while let Some(cid) = child_id {
                        stack.push(StackEntry::Enter(cid));
                        child_id = doc.get_node(cid).and_then(|n| n.prev_sibling);
                    }
                }
            }
            NodeKind::Attribute => write_attribute(doc, current_id, buf),
            NodeKind::Text => escape_text_to_buf(&node.content, buf),
            NodeKind::CData => {
                // "]]>" cannot occur inside a section; split it across two
                buf.push_str("<![CDATA[");
                buf.push_str(&node.content.replace("]]>", "]]]]><![CDATA[>"));
                buf.push_str("]]>");
            }
            NodeKind::Comment => {
                buf.push_str("<!--");
                buf.push_str(&node.content);
                buf.push_str("-->");
            }
            NodeKind::ProcessingInstruction => {
                buf.push_str("<?");
                buf.push_str(doc.strings.get_str(node.name_id));
                if !node.content.is_empty() {
                    buf.push(' ');
                    buf.push_str(&node.content);
                }
                buf.push_str("?>");
            }
            NodeKind::EntityReference => {
                buf.push('&');
                buf.push_str(doc.strings.get_str(node.name_id));
                buf.push(';');
            }
            NodeKind::DocumentType => write_doctype(doc, current_id, buf),
            NodeKind::Document => {
                let mut child_id = node.last_child;
                while let Some(cid) = child_id {
                    stack.push(StackEntry::Enter(cid));
                    child_id = doc.get_node(cid).and_then(|n| n.prev_sibling);
                }
            }
        }
    }
}

fn write_attribute(doc: &XmlDocument, id: NodeId, buf: &mut String) {
    let Some(node) = doc.get_node(id) else {
        return;
    };
    buf.push_str(doc.strings.get_str(node.name_id));
    buf.push_str("=\"");
    escape_attribute_to_buf(&node.content, buf);
    buf.push('"');
}

fn write_doctype(doc: &XmlDocument, id: NodeId, buf: &mut String) {
    buf.push_str("<!DOCTYPE ");
    buf.push_str(doc.name_of(id));
    if let Some(decl) = doc.doctype() {
        match (&decl.public_id, &decl.system_id) {
            (Some(public), Some(system)) => {
                buf.push_str(&format!(" PUBLIC \"{}\" \"{}\"", public, system));
            }
            (None, Some(system)) => buf.push_str(&format!(" SYSTEM \"{}\"", system)),
            _ => {}
        }
        if let Some(subset) = &decl.internal_subset {
            buf.push_str(" [");
            buf.push_str(subset);
            buf.push(']');
        }
    }
    buf.push('>');
}

#[cfg(test)]
mod tests {
    use crate::dom::XmlDocument;
    use crate::error::Error;
    use crate::options::ParseOptions;

    fn roundtrip(xml: &str) -> String {
        let doc = XmlDocument::parse(xml.as_bytes(), &ParseOptions::default()).unwrap();
        String::from_utf8(doc.serialize()).unwrap()
    }

    #[test]
    fn test_serialize_document() {
        assert_eq!(
            roundtrip("<?xml version='1.0'?><r a=\"1\"><b>x &amp; y</b><c/></r>"),
            "<r a=\"1\"><b>x &amp; y</b><c/></r>\n"
        );
    }

    #[test]
    fn test_serialize_misc_nodes() {
        assert_eq!(
            roundtrip("<!DOCTYPE r SYSTEM \"r.dtd\" [<!ENTITY e 'v'>]><!--c--><r><?pi d?><![CDATA[<x>]]>&e;</r>"),
            "<!DOCTYPE r SYSTEM \"r.dtd\" [<!ENTITY e 'v'>]>\n<!--c-->\n<r><?pi d?><![CDATA[<x>]]>&e;</r>\n"
        );
    }

    #[test]
    fn test_serialize_namespaces_and_escaping() {
        assert_eq!(
            roundtrip("<p:r xmlns:p=\"urn:p\" v='a&quot;b&#10;'>&lt;</p:r>"),
            "<p:r xmlns:p=\"urn:p\" v=\"a&quot;b&#10;\">&lt;</p:r>\n"
        );
    }

    #[test]
    fn test_serialize_subtree() {
        let doc = XmlDocument::parse(b"<r><a><b/></a></r>", &ParseOptions::default()).unwrap();
        let root = doc.root_element_id().unwrap();
        let a = doc.children(root).next().unwrap();
        assert_eq!(doc.serialize_node(a), b"<a><b/></a>");
    }

    #[test]
    fn test_reparse_is_structurally_equal() {
        let xml = "<r xmlns='urn:d'><a k='v' j='w'>t</a><b/><!--c--></r>";
        let first = XmlDocument::parse(xml.as_bytes(), &ParseOptions::default()).unwrap();
        let second = XmlDocument::parse(&first.serialize(), &ParseOptions::default()).unwrap();
        assert_eq!(first.serialize(), second.serialize());
        assert_eq!(first.node_count(), second.node_count());
    }

    #[test]
    fn test_cdata_terminator_split_on_output() {
        let mut doc = XmlDocument::parse(b"<r><![CDATA[x]]></r>", &ParseOptions::default()).unwrap();
        let cdata = doc.root().unwrap().child(&doc).unwrap();
        cdata.set_content(&mut doc, "x]]>y").unwrap();

        let out = doc.serialize();
        assert_eq!(out, b"<r><![CDATA[x]]]]><![CDATA[>y]]></r>\n");
        let again = XmlDocument::parse(&out, &ParseOptions::default()).unwrap();
        assert_eq!(again.root().unwrap().content(&again), "x]]>y");
    }

    #[test]
    fn test_comment_text_that_cannot_serialize_is_rejected() {
        let mut doc = XmlDocument::parse(b"<r><!--c--></r>", &ParseOptions::default()).unwrap();
        let comment = doc.root().unwrap().child(&doc).unwrap();
        assert!(matches!(comment.set_content(&mut doc, "x--y"), Err(Error::Type(_))));
        assert!(matches!(comment.set_content(&mut doc, "x-"), Err(Error::Type(_))));
        assert!(matches!(doc.create_comment("a--b"), Err(Error::Type(_))));

        comment.set_content(&mut doc, "x - y").unwrap();
        let out = doc.serialize();
        assert_eq!(out, b"<r><!--x - y--></r>\n");
        assert!(XmlDocument::parse(&out, &ParseOptions::default()).is_ok());
    }
}
