//! Ordered node collections
//!
//! A `NodeSet` is a sequence, not a mathematical set: it keeps insertion
//! order and tolerates duplicates. Membership and the algebra operations
//! compare nodes by identity.

use super::dispatch::{construct, DocumentId, Node};
use super::document::XmlDocument;
use super::node::NodeId;
use crate::error::{Error, Result};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    doc: DocumentId,
    nodes: Vec<Node>,
}

impl NodeSet {
    pub fn new(doc: &XmlDocument) -> Self {
        NodeSet {
            doc: doc.id(),
            nodes: Vec::new(),
        }
    }

    /// Wrap arena ids through the dispatcher, skipping ids that do not exist
    pub fn from_ids(doc: &XmlDocument, ids: impl IntoIterator<Item = NodeId>) -> Self {
        NodeSet {
            doc: doc.id(),
            nodes: ids.into_iter().filter_map(|id| construct(doc, Some(id))).collect(),
        }
    }

    #[inline]
    pub fn document_id(&self) -> DocumentId {
        self.doc
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: Node) -> Result<()> {
        if node.document_id() != self.doc {
            return Err(Error::Type("node belongs to another document".into()));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Index from the front, or from the back when negative
    fn resolve_index(&self, index: isize) -> Option<usize> {
        let len = self.nodes.len() as isize;
        let resolved = if index < 0 { len + index } else { index };
        (0..len).contains(&resolved).then_some(resolved as usize)
    }

    pub fn at(&self, index: isize) -> Option<Node> {
        self.resolve_index(index).map(|i| self.nodes[i])
    }

    /// Up to `count` members starting at `index`; `None` when `index` is
    /// out of range
    pub fn slice(&self, index: isize, count: usize) -> Option<NodeSet> {
        let start = self.resolve_index(index)?;
        let end = start.saturating_add(count).min(self.nodes.len());
        Some(NodeSet {
            doc: self.doc,
            nodes: self.nodes[start..end].to_vec(),
        })
    }

    pub fn includes(&self, node: &Node) -> bool {
        self.nodes.contains(node)
    }

    /// Remove the first occurrence of `node`
    pub fn delete(&mut self, node: &Node) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n == node)?;
        Some(self.nodes.remove(index))
    }

    /// Shallow copy: same nodes, independent sequence
    pub fn duplicate(&self) -> NodeSet {
        self.clone()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    fn check_same_document(&self, other: &NodeSet) -> Result<()> {
        if self.doc != other.doc {
            return Err(Error::Type("node sets belong to different documents".into()));
        }
        Ok(())
    }

    /// Members of `self`, then members of `other` not already present
    pub fn union(&self, other: &NodeSet) -> Result<NodeSet> {
        self.check_same_document(other)?;
        let mut nodes = self.nodes.clone();
        let mut present: HashSet<Node> = self.nodes.iter().copied().collect();
        for &node in &other.nodes {
            if present.insert(node) {
                nodes.push(node);
            }
        }
        Ok(NodeSet { doc: self.doc, nodes })
    }

    /// Members of `self` also in `other`, without duplicates
    pub fn intersection(&self, other: &NodeSet) -> Result<NodeSet> {
        self.check_same_document(other)?;
        let theirs: HashSet<Node> = other.nodes.iter().copied().collect();
        Ok(self.filter_unique(|node| theirs.contains(node)))
    }

    /// Members of `self` not in `other`, without duplicates
    pub fn difference(&self, other: &NodeSet) -> Result<NodeSet> {
        self.check_same_document(other)?;
        let theirs: HashSet<Node> = other.nodes.iter().copied().collect();
        Ok(self.filter_unique(|node| !theirs.contains(node)))
    }

    fn filter_unique(&self, keep: impl Fn(&Node) -> bool) -> NodeSet {
        let mut seen = HashSet::new();
        let nodes = self
            .nodes
            .iter()
            .copied()
            .filter(|node| keep(node) && seen.insert(*node))
            .collect();
        NodeSet { doc: self.doc, nodes }
    }

    /// Unlink every member in order, stopping at the first failure
    pub fn unlink_all(&self, doc: &mut XmlDocument) -> Result<()> {
        for node in &self.nodes {
            node.unlink(doc)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ParseOptions;

    fn fixture() -> (XmlDocument, Vec<Node>) {
        let doc = XmlDocument::parse(b"<r><a/><b/><c/></r>", &ParseOptions::default()).unwrap();
        let children = doc.root().unwrap().children(&doc);
        (doc, children)
    }

    #[test]
    fn test_indexing() {
        let (doc, kids) = fixture();
        let set = NodeSet::from_ids(&doc, kids.iter().map(Node::id));
        assert_eq!(set.len(), 3);
        assert_eq!(set.at(0), Some(kids[0]));
        assert_eq!(set.at(-1), Some(kids[2]));
        assert_eq!(set.at(3), None);
        assert_eq!(set.at(-4), None);

        let tail = set.slice(-2, 5).unwrap();
        assert_eq!(tail.to_vec(), vec![kids[1], kids[2]]);
        assert_eq!(set.slice(1, 0).unwrap().len(), 0);
        assert!(set.slice(7, 1).is_none());
    }

    #[test]
    fn test_duplicates_kept() {
        let (doc, kids) = fixture();
        let mut set = NodeSet::new(&doc);
        set.push(kids[0]).unwrap();
        set.push(kids[0]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.delete(&kids[0]), Some(kids[0]));
        assert_eq!(set.len(), 1);
        assert!(set.includes(&kids[0]));
        assert_eq!(set.delete(&kids[1]), None);
    }

    #[test]
    fn test_push_foreign_rejected() {
        let (doc, _) = fixture();
        let mut other = XmlDocument::new();
        let foreign = other.create_element("x");
        let mut set = NodeSet::new(&doc);
        assert!(matches!(set.push(foreign), Err(Error::Type(_))));
        assert!(set.is_empty());
    }

    #[test]
    fn test_algebra() {
        let (doc, kids) = fixture();
        let ab = NodeSet::from_ids(&doc, [kids[0].id(), kids[1].id()]);
        let bc = NodeSet::from_ids(&doc, [kids[1].id(), kids[2].id()]);

        assert_eq!(ab.union(&bc).unwrap().to_vec(), vec![kids[0], kids[1], kids[2]]);
        assert_eq!(ab.intersection(&bc).unwrap().to_vec(), vec![kids[1]]);
        assert_eq!(ab.difference(&bc).unwrap().to_vec(), vec![kids[0]]);

        assert_eq!(ab.union(&ab).unwrap(), ab);
        assert!(ab.difference(&ab).unwrap().is_empty());

        let left: HashSet<Node> = ab.union(&bc).unwrap().iter().copied().collect();
        let right: HashSet<Node> = bc.union(&ab).unwrap().iter().copied().collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_algebra_across_documents() {
        let (doc, kids) = fixture();
        let other = XmlDocument::new();
        let ours = NodeSet::from_ids(&doc, [kids[0].id()]);
        let theirs = NodeSet::new(&other);
        assert!(matches!(ours.union(&theirs), Err(Error::Type(_))));
        assert!(matches!(ours.intersection(&theirs), Err(Error::Type(_))));
        assert!(matches!(ours.difference(&theirs), Err(Error::Type(_))));
    }

    #[test]
    fn test_duplicate_is_shallow() {
        let (doc, kids) = fixture();
        let set = NodeSet::from_ids(&doc, [kids[0].id()]);
        let mut copy = set.duplicate();
        copy.push(kids[1]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(copy.at(0), set.at(0));
    }

    #[test]
    fn test_unlink_all() {
        let (mut doc, kids) = fixture();
        let set = NodeSet::from_ids(&doc, [kids[0].id(), kids[2].id()]);
        set.unlink_all(&mut doc).unwrap();
        assert_eq!(doc.root().unwrap().children(&doc), vec![kids[1]]);
        // already detached members fail
        assert!(matches!(set.unlink_all(&mut doc), Err(Error::InvalidState(_))));
    }
}
