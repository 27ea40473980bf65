//! Namespace Resolution
//!
//! Stack-based namespace resolver used while building a tree. Once a tree
//! exists, in-scope bindings are found by walking ancestors instead (see
//! `XmlDocument::lookup_namespace`).

use super::strings::StringPool;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI)
#[derive(Debug, Clone)]
struct NsBinding {
    prefix_id: u32,
    uri_id: u32,
    depth: usize,
}

/// Stack-based namespace resolver
#[derive(Debug)]
pub struct NamespaceResolver {
    bindings: Vec<NsBinding>,
    depth: usize,
    xml_prefix_id: u32,
    xmlns_prefix_id: u32,
}

impl NamespaceResolver {
    /// Create a new namespace resolver with pre-declared xml and xmlns namespaces
    pub fn new(strings: &mut StringPool) -> Self {
        let xml_prefix_id = strings.intern("xml");
        let xmlns_prefix_id = strings.intern("xmlns");
        let xml_uri_id = strings.intern(ns::XML);
        let xmlns_uri_id = strings.intern(ns::XMLNS);

        NamespaceResolver {
            bindings: vec![
                NsBinding {
                    prefix_id: xml_prefix_id,
                    uri_id: xml_uri_id,
                    depth: 0,
                },
                NsBinding {
                    prefix_id: xmlns_prefix_id,
                    uri_id: xmlns_uri_id,
                    depth: 0,
                },
            ],
            depth: 0,
            xml_prefix_id,
            xmlns_prefix_id,
        }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a binding for the current scope. Prefix id 0 is the default
    /// namespace; uri id 0 undeclares it.
    pub fn declare(&mut self, prefix_id: u32, uri_id: u32) {
        if prefix_id == self.xml_prefix_id || prefix_id == self.xmlns_prefix_id {
            return;
        }
        self.bindings.push(NsBinding {
            prefix_id,
            uri_id,
            depth: self.depth,
        });
    }

    /// Resolve a prefix to a namespace URI ID
    pub fn resolve(&self, prefix_id: u32) -> Option<u32> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix_id == prefix_id)
            .map(|b| b.uri_id)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}
