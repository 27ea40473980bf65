//! XPath Axes Implementation
//!
//! All 13 XPath 1.0 axes. Forward axes return nodes in document order,
//! reverse axes nearest first, which is the order proximity positions
//! count in. Namespace nodes are not modelled, so the namespace axis is
//! always empty.

use super::compiler::CompiledNodeTest;
use super::parser::Axis;
use crate::dom::{DocumentAccess, NodeId, NodeKind};

/// Navigate along an axis from a context node
pub fn navigate<D: DocumentAccess>(doc: &D, context: NodeId, axis: Axis) -> Vec<NodeId> {
    match axis {
        Axis::Child => doc.children_vec(context),
        Axis::Descendant => doc.descendants_vec(context),
        Axis::DescendantOrSelf => descendant_or_self_axis(doc, context),
        Axis::Parent => doc.parent_of(context).into_iter().collect(),
        Axis::Ancestor => ancestor_axis(doc, context),
        Axis::AncestorOrSelf => {
            let mut result = vec![context];
            result.extend(ancestor_axis(doc, context));
            result
        }
        Axis::FollowingSibling => sibling_chain(doc, context, |d, id| d.next_sibling_of(id)),
        Axis::PrecedingSibling => sibling_chain(doc, context, |d, id| d.prev_sibling_of(id)),
        Axis::Following => following_axis(doc, context),
        Axis::Preceding => preceding_axis(doc, context),
        Axis::Self_ => vec![context],
        Axis::Attribute => attribute_axis(doc, context),
        Axis::Namespace => Vec::new(),
    }
}

fn is_attribute<D: DocumentAccess>(doc: &D, id: NodeId) -> bool {
    doc.node_kind_of(id) == Some(NodeKind::Attribute)
}

fn descendant_or_self_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let descendants = doc.descendants_vec(context);
    let mut result = Vec::with_capacity(1 + descendants.len());
    result.push(context);
    result.extend(descendants);
    result
}

/// Parent, grandparent, ... up to the root of the tree
fn ancestor_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = context;
    while let Some(parent) = doc.parent_of(current) {
        result.push(parent);
        current = parent;
    }
    result
}

/// Attributes have no siblings
fn sibling_chain<D: DocumentAccess>(
    doc: &D,
    context: NodeId,
    step: impl Fn(&D, NodeId) -> Option<NodeId>,
) -> Vec<NodeId> {
    let mut result = Vec::new();
    if is_attribute(doc, context) {
        return result;
    }
    let mut sibling = step(doc, context);
    while let Some(id) = sibling {
        result.push(id);
        sibling = step(doc, id);
    }
    result
}

/// Everything after the context node in document order, descendants excluded.
/// For an attribute that starts with its owner's descendants.
fn following_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = context;
    if is_attribute(doc, context) {
        match doc.parent_of(context) {
            Some(owner) => {
                result.extend(doc.descendants_vec(owner));
                current = owner;
            }
            None => return result,
        }
    }

    loop {
        let mut sibling = doc.next_sibling_of(current);
        while let Some(id) = sibling {
            result.push(id);
            result.extend(doc.descendants_vec(id));
            sibling = doc.next_sibling_of(id);
        }
        match doc.parent_of(current) {
            Some(parent) => current = parent,
            None => return result,
        }
    }
}

/// Everything before the context node in reverse document order,
/// ancestors excluded
fn preceding_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = context;
    if is_attribute(doc, context) {
        match doc.parent_of(context) {
            Some(owner) => current = owner,
            None => return result,
        }
    }

    loop {
        let mut sibling = doc.prev_sibling_of(current);
        while let Some(id) = sibling {
            let descendants = doc.descendants_vec(id);
            result.extend(descendants.into_iter().rev());
            result.push(id);
            sibling = doc.prev_sibling_of(id);
        }
        match doc.parent_of(current) {
            Some(parent) => current = parent,
            None => return result,
        }
    }
}

fn attribute_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    match doc.node_kind_of(context) {
        Some(NodeKind::Element) => doc.attribute_ids(context).to_vec(),
        _ => Vec::new(),
    }
}

/// Check a node against a node test. `principal` is the node kind the axis
/// selects by name: attributes on the attribute axis, elements elsewhere.
pub fn matches_node_test<D: DocumentAccess>(
    doc: &D,
    node_id: NodeId,
    node_test: &CompiledNodeTest,
    principal: NodeKind,
) -> bool {
    let Some(kind) = doc.node_kind_of(node_id) else {
        return false;
    };

    match node_test {
        CompiledNodeTest::Any => kind == principal,
        CompiledNodeTest::Name(name) => {
            kind == principal
                && doc.node_namespace_uri(node_id).is_none()
                && doc.node_local_name(node_id) == Some(name.as_str())
        }
        CompiledNodeTest::QName(uri, local) => {
            kind == principal
                && doc.node_namespace_uri(node_id) == Some(uri.as_str())
                && doc.node_local_name(node_id) == Some(local.as_str())
        }
        CompiledNodeTest::NamespaceWildcard(uri) => {
            kind == principal && doc.node_namespace_uri(node_id) == Some(uri.as_str())
        }
        CompiledNodeTest::Node => true,
        CompiledNodeTest::Text => matches!(kind, NodeKind::Text | NodeKind::CData),
        CompiledNodeTest::Comment => kind == NodeKind::Comment,
        CompiledNodeTest::ProcessingInstruction(target) => {
            kind == NodeKind::ProcessingInstruction
                && target
                    .as_deref()
                    .is_none_or(|t| doc.node_name(node_id) == Some(t))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;
    use crate::options::ParseOptions;

    fn parse(xml: &str) -> XmlDocument {
        XmlDocument::parse(xml.as_bytes(), &ParseOptions::default()).unwrap()
    }

    fn names(doc: &XmlDocument, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| doc.name_of(id).to_string()).collect()
    }

    fn find(doc: &XmlDocument, name: &str) -> NodeId {
        doc.descendants(0)
            .find(|&id| doc.name_of(id) == name)
            .unwrap()
    }

    #[test]
    fn test_child_and_descendant() {
        let doc = parse("<root><a><b/></a><c/></root>");
        let root = doc.root_element_id().unwrap();
        assert_eq!(names(&doc, &navigate(&doc, root, Axis::Child)), ["a", "c"]);
        assert_eq!(names(&doc, &navigate(&doc, root, Axis::Descendant)), ["a", "b", "c"]);
    }

    #[test]
    fn test_ancestor_axis() {
        let doc = parse("<root><a><b/></a></root>");
        let b = find(&doc, "b");
        // a, root, document
        assert_eq!(navigate(&doc, b, Axis::Ancestor).len(), 3);
    }

    #[test]
    fn test_following_and_preceding() {
        let doc = parse("<r><a><a1/></a><b><b1/></b><c><c1/></c></r>");
        let b = find(&doc, "b");
        assert_eq!(names(&doc, &navigate(&doc, b, Axis::Following)), ["c", "c1"]);
        assert_eq!(names(&doc, &navigate(&doc, b, Axis::Preceding)), ["a1", "a"]);
        let b1 = find(&doc, "b1");
        assert_eq!(names(&doc, &navigate(&doc, b1, Axis::Preceding)), ["a1", "a"]);
        assert_eq!(names(&doc, &navigate(&doc, b, Axis::PrecedingSibling)), ["a"]);
    }

    #[test]
    fn test_attribute_axis() {
        let doc = parse("<r x='1' y='2'><c/></r>");
        let root = doc.root_element_id().unwrap();
        let attrs = navigate(&doc, root, Axis::Attribute);
        assert_eq!(names(&doc, &attrs), ["x", "y"]);
        assert_eq!(navigate(&doc, attrs[0], Axis::Parent), vec![root]);
        assert!(navigate(&doc, attrs[0], Axis::FollowingSibling).is_empty());
        assert_eq!(names(&doc, &navigate(&doc, attrs[0], Axis::Following)), ["c"]);
    }

    #[test]
    fn test_namespace_aware_tests() {
        let doc = parse("<r xmlns:p='urn:p'><p:a/><a/></r>");
        let root = doc.root_element_id().unwrap();
        let kids = navigate(&doc, root, Axis::Child);
        let plain = CompiledNodeTest::Name("a".into());
        let qualified = CompiledNodeTest::QName("urn:p".into(), "a".into());
        let wildcard = CompiledNodeTest::NamespaceWildcard("urn:p".into());
        let el = NodeKind::Element;
        assert!(!matches_node_test(&doc, kids[0], &plain, el));
        assert!(matches_node_test(&doc, kids[1], &plain, el));
        assert!(matches_node_test(&doc, kids[0], &qualified, el));
        assert!(!matches_node_test(&doc, kids[1], &qualified, el));
        assert!(matches_node_test(&doc, kids[0], &wildcard, el));
    }
}
