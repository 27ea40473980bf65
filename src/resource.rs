//! ResourceArc Wrappers
//!
//! Documents live behind a `Mutex` inside a resource. Node and node-set
//! resources hold a reference to their document resource, so a document
//! stays alive while Elixir still holds any of its nodes.

use crate::dom::{Node, NodeSet, XmlDocument};
use crate::error::{Error, Result};
use rustler::ResourceArc;
use std::sync::Mutex;

/// Wrapper for XmlDocument that can be stored in a ResourceArc
pub struct DocumentResource {
    pub doc: Mutex<XmlDocument>,
}

impl DocumentResource {
    pub fn new(doc: XmlDocument) -> Self {
        DocumentResource {
            doc: Mutex::new(doc),
        }
    }

    /// Run `f` with shared access to the document
    pub fn with_doc<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&XmlDocument) -> Result<R>,
    {
        let guard = self.doc.lock().map_err(|_| poisoned())?;
        f(&guard)
    }

    /// Run `f` with exclusive access to the document
    pub fn with_doc_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut XmlDocument) -> Result<R>,
    {
        let mut guard = self.doc.lock().map_err(|_| poisoned())?;
        f(&mut guard)
    }
}

fn poisoned() -> Error {
    Error::InvalidState("document lock poisoned by a panicked call".to_string())
}

#[rustler::resource_impl]
impl rustler::Resource for DocumentResource {}

/// Type alias for document ResourceArc
pub type DocumentRef = ResourceArc<DocumentResource>;

/// A node together with the document it belongs to
pub struct NodeResource {
    pub doc: DocumentRef,
    pub node: Node,
}

impl NodeResource {
    pub fn new(doc: DocumentRef, node: Node) -> Self {
        NodeResource { doc, node }
    }
}

#[rustler::resource_impl]
impl rustler::Resource for NodeResource {}

pub type NodeRef = ResourceArc<NodeResource>;

/// A node-set snapshot. `push` and `delete` change it in place.
pub struct NodeSetResource {
    pub doc: DocumentRef,
    pub set: Mutex<NodeSet>,
}

impl NodeSetResource {
    pub fn new(doc: DocumentRef, set: NodeSet) -> Self {
        NodeSetResource {
            doc,
            set: Mutex::new(set),
        }
    }

    pub fn with_set<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut NodeSet) -> Result<R>,
    {
        let mut guard = self
            .set
            .lock()
            .map_err(|_| Error::InvalidState("node-set lock poisoned".to_string()))?;
        f(&mut guard)
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> Result<NodeSet> {
        self.with_set(|set| Ok(set.clone()))
    }
}

#[rustler::resource_impl]
impl rustler::Resource for NodeSetResource {}

pub type NodeSetRef = ResourceArc<NodeSetResource>;
