//! RustyTree - an XML document tree with XPath 1.0 and SAX streaming
//!
//! - [`dom`]: arena document, typed node wrappers, node operations and
//!   node-set algebra
//! - [`xpath`]: XPath 1.0 contexts over a document
//! - [`sax`]: streaming events into a [`sax::SaxHandler`]
//!
//! The NIF surface at the bottom of this file exposes all three to Elixir
//! as `RustyTree.Native`.

use rustler::{Binary, Encoder, Env, ResourceArc, Term};

pub mod core;
pub mod dom;
pub mod error;
pub mod options;
mod resource;
pub mod sax;
mod term;
pub mod xpath;

pub use dom::{Node, NodeSet, XmlDocument};
pub use error::{Error, ParseError, Result};
pub use options::ParseOptions;
pub use sax::{SaxCollector, SaxEvent, SaxEventBridge, SaxHandler};
pub use xpath::{CompiledExpression, XPathContext, XPathObject};

use resource::{DocumentRef, DocumentResource, NodeRef};
use term::{
    bytes_to_binary, decode_document, decode_namespaces, decode_node, decode_node_set,
    decode_options, node_set_term, node_term, nodes_term,
    optional_node_term, reply, sax_events_term, str_to_binary, xpath_object_term,
};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Helpers
// ============================================================================

fn nil<'a>(env: Env<'a>) -> Term<'a> {
    rustler::types::atom::nil().encode(env)
}

fn optional_str<'a>(env: Env<'a>, s: Option<&str>) -> Term<'a> {
    match s {
        Some(s) => str_to_binary(env, s),
        None => nil(env),
    }
}

/// Decode a node argument and run `f` with read access to its document
fn with_node<'a, F>(term: Term<'a>, f: F) -> Result<Term<'a>>
where
    F: FnOnce(&XmlDocument, Node, &DocumentRef) -> Result<Term<'a>>,
{
    let node: NodeRef = decode_node(term)?;
    node.doc.with_doc(|doc| f(doc, node.node, &node.doc))
}

/// Decode a node argument and run `f` with write access to its document
fn with_node_mut<'a, F>(term: Term<'a>, f: F) -> Result<Term<'a>>
where
    F: FnOnce(&mut XmlDocument, Node, &DocumentRef) -> Result<Term<'a>>,
{
    let node: NodeRef = decode_node(term)?;
    node.doc.with_doc_mut(|doc| f(doc, node.node, &node.doc))
}

/// Node-to-node mutation. A node from another document shows up as a
/// foreign node and is rejected by the operation itself.
fn with_two_nodes<'a, F>(env: Env<'a>, first: Term<'a>, second: Term<'a>, f: F) -> Term<'a>
where
    F: FnOnce(&mut XmlDocument, Node, Node) -> Result<()>,
{
    reply(
        env,
        decode_node(second).and_then(|other| {
            with_node_mut(first, |doc, node, _| {
                f(doc, node, other.node)?;
                Ok(nil(env))
            })
        }),
    )
}

fn new_document<'a>(env: Env<'a>, doc: Result<XmlDocument>) -> Term<'a> {
    reply(env, doc.map(|doc| ResourceArc::new(DocumentResource::new(doc)).encode(env)))
}

// ============================================================================
// Documents
// ============================================================================

/// Parse XML into a document resource
#[rustler::nif(schedule = "DirtyCpu")]
fn parse<'a>(env: Env<'a>, input: Binary<'a>, options: Term<'a>) -> Term<'a> {
    let doc = decode_options(options).and_then(|opts| XmlDocument::parse(input.as_slice(), &opts));
    new_document(env, doc)
}

#[rustler::nif(schedule = "DirtyIo")]
fn parse_file<'a>(env: Env<'a>, path: String, options: Term<'a>) -> Term<'a> {
    let doc = decode_options(options).and_then(|opts| XmlDocument::parse_file(&path, &opts));
    new_document(env, doc)
}

#[rustler::nif(schedule = "DirtyCpu")]
fn serialize<'a>(env: Env<'a>, doc: Term<'a>) -> Term<'a> {
    reply(
        env,
        decode_document(doc).and_then(|doc| doc.with_doc(|d| Ok(bytes_to_binary(env, &d.serialize())))),
    )
}

#[rustler::nif]
fn root<'a>(env: Env<'a>, doc: Term<'a>) -> Term<'a> {
    reply(
        env,
        decode_document(doc).and_then(|doc| doc.with_doc(|d| Ok(optional_node_term(env, &doc, d.root())))),
    )
}

#[rustler::nif]
fn set_root<'a>(env: Env<'a>, doc: Term<'a>, node: Term<'a>) -> Term<'a> {
    let result = decode_document(doc).and_then(|doc| {
        let node = decode_node(node)?;
        doc.with_doc_mut(|d| d.set_root(node.node))?;
        Ok(nil(env))
    });
    reply(env, result)
}

#[rustler::nif]
fn create_element<'a>(env: Env<'a>, doc: Term<'a>, name: String) -> Term<'a> {
    let result = decode_document(doc)
        .and_then(|doc| doc.with_doc_mut(|d| Ok(node_term(env, &doc, d.create_element(&name)))));
    reply(env, result)
}

#[rustler::nif]
fn create_text<'a>(env: Env<'a>, doc: Term<'a>, text: String) -> Term<'a> {
    let result = decode_document(doc)
        .and_then(|doc| doc.with_doc_mut(|d| Ok(node_term(env, &doc, d.create_text(&text)))));
    reply(env, result)
}

// ============================================================================
// Node reads
// ============================================================================

#[rustler::nif]
fn node_name<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, _| Ok(optional_str(env, n.name(doc)))))
}

#[rustler::nif]
fn node_parent<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, r| Ok(optional_node_term(env, r, n.parent(doc)))))
}

#[rustler::nif]
fn node_child<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, r| Ok(optional_node_term(env, r, n.child(doc)))))
}

#[rustler::nif]
fn node_next_sibling<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, r| Ok(optional_node_term(env, r, n.next_sibling(doc)))))
}

#[rustler::nif]
fn node_previous_sibling<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(
        env,
        with_node(node, |doc, n, r| Ok(optional_node_term(env, r, n.previous_sibling(doc)))),
    )
}

#[rustler::nif]
fn node_children<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, r| Ok(nodes_term(env, r, &n.children(doc)))))
}

#[rustler::nif]
fn node_content<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, _| Ok(str_to_binary(env, &n.content(doc)))))
}

#[rustler::nif]
fn node_type<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(
        env,
        with_node(node, |doc, n, _| {
            Ok(n.node_type(doc).map_or_else(|| nil(env), |code| code.encode(env)))
        }),
    )
}

#[rustler::nif]
fn node_blank<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, _| Ok(n.blank(doc).encode(env))))
}

#[rustler::nif]
fn node_has_attribute<'a>(env: Env<'a>, node: Term<'a>, key: String) -> Term<'a> {
    reply(env, with_node(node, |doc, n, _| Ok(n.has_attribute(doc, &key).encode(env))))
}

#[rustler::nif]
fn node_attribute<'a>(env: Env<'a>, node: Term<'a>, name: String) -> Term<'a> {
    reply(
        env,
        with_node(node, |doc, n, r| Ok(optional_node_term(env, r, n.attribute(doc, &name)))),
    )
}

#[rustler::nif]
fn node_attributes<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, _| Ok(n.attributes(doc).encode(env))))
}

#[rustler::nif]
fn node_attribute_nodes<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, r| Ok(nodes_term(env, r, &n.attribute_nodes(doc)))))
}

#[rustler::nif]
fn node_namespaces<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, _| Ok(n.namespaces(doc).encode(env))))
}

#[rustler::nif]
fn node_to_markup<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node(node, |doc, n, _| Ok(bytes_to_binary(env, &n.to_markup(doc)))))
}

#[rustler::nif]
fn node_internal_subset<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(
        env,
        with_node(node, |doc, n, _| Ok(optional_str(env, n.internal_subset(doc).as_deref()))),
    )
}

/// Equal for every wrapper of the same node
#[rustler::nif]
fn node_identity<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, decode_node(node).map(|n| n.node.identity_key().encode(env)))
}

#[rustler::nif]
fn encode_special_chars(text: &str) -> String {
    Node::encode_special_chars(text)
}

// ============================================================================
// Node mutations
// ============================================================================

#[rustler::nif]
fn node_set_name<'a>(env: Env<'a>, node: Term<'a>, name: String) -> Term<'a> {
    reply(
        env,
        with_node_mut(node, |doc, n, _| {
            n.set_name(doc, &name)?;
            Ok(nil(env))
        }),
    )
}

#[rustler::nif]
fn node_set_content<'a>(env: Env<'a>, node: Term<'a>, text: String) -> Term<'a> {
    reply(
        env,
        with_node_mut(node, |doc, n, _| {
            n.set_content(doc, &text)?;
            Ok(nil(env))
        }),
    )
}

#[rustler::nif]
fn node_set_attribute<'a>(env: Env<'a>, node: Term<'a>, key: String, value: String) -> Term<'a> {
    reply(
        env,
        with_node_mut(node, |doc, n, _| Ok(str_to_binary(env, &n.set_attribute(doc, &key, &value)?))),
    )
}

#[rustler::nif]
fn node_remove_attribute<'a>(env: Env<'a>, node: Term<'a>, key: String) -> Term<'a> {
    reply(
        env,
        with_node_mut(node, |doc, n, _| {
            n.remove_attribute(doc, &key)?;
            Ok(nil(env))
        }),
    )
}

#[rustler::nif]
fn node_set_parent<'a>(env: Env<'a>, node: Term<'a>, parent: Term<'a>) -> Term<'a> {
    with_two_nodes(env, node, parent, |doc, n, p| n.set_parent(doc, p))
}

#[rustler::nif]
fn node_reparent<'a>(env: Env<'a>, node: Term<'a>, parent: Term<'a>) -> Term<'a> {
    with_two_nodes(env, node, parent, |doc, n, p| n.reparent(doc, p))
}

#[rustler::nif]
fn node_replace<'a>(env: Env<'a>, node: Term<'a>, other: Term<'a>) -> Term<'a> {
    with_two_nodes(env, node, other, |doc, n, o| n.replace(doc, o))
}

#[rustler::nif]
fn node_add_previous_sibling<'a>(env: Env<'a>, node: Term<'a>, other: Term<'a>) -> Term<'a> {
    with_two_nodes(env, node, other, |doc, n, o| n.add_previous_sibling(doc, o))
}

#[rustler::nif]
fn node_add_next_sibling<'a>(env: Env<'a>, node: Term<'a>, other: Term<'a>) -> Term<'a> {
    with_two_nodes(env, node, other, |doc, n, o| n.add_next_sibling(doc, o))
}

#[rustler::nif]
fn node_unlink<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(
        env,
        with_node_mut(node, |doc, n, _| {
            n.unlink(doc)?;
            Ok(nil(env))
        }),
    )
}

#[rustler::nif]
fn node_duplicate<'a>(env: Env<'a>, node: Term<'a>) -> Term<'a> {
    reply(env, with_node_mut(node, |doc, n, r| Ok(node_term(env, r, n.duplicate(doc)?))))
}

// ============================================================================
// XPath
// ============================================================================

fn xpath_context(node: Node, namespaces: Term<'_>) -> Result<XPathContext> {
    let mut context = XPathContext::new(node);
    for (prefix, uri) in decode_namespaces(namespaces)? {
        context.register_namespace(&prefix, &uri);
    }
    Ok(context)
}

/// Evaluate one expression from a context node
#[rustler::nif]
fn xpath_evaluate<'a>(env: Env<'a>, node: Term<'a>, text: String, namespaces: Term<'a>) -> Term<'a> {
    reply(
        env,
        with_node(node, |doc, n, r| {
            let context = xpath_context(n, namespaces)?;
            let result = context.evaluate(doc, &text)?;
            Ok(xpath_object_term(env, r, result.into_value()))
        }),
    )
}

/// Evaluate several expressions in parallel; each gets its own reply tuple
#[rustler::nif(schedule = "DirtyCpu")]
fn xpath_evaluate_all<'a>(
    env: Env<'a>,
    node: Term<'a>,
    texts: Vec<String>,
    namespaces: Term<'a>,
) -> Term<'a> {
    reply(
        env,
        with_node(node, |doc, n, r| {
            let context = xpath_context(n, namespaces)?;
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let replies: Vec<Term<'a>> = context
                .evaluate_all(doc, &refs)
                .into_iter()
                .map(|result| reply(env, result.map(|v| xpath_object_term(env, r, v.into_value()))))
                .collect();
            Ok(replies.encode(env))
        }),
    )
}

// ============================================================================
// Node sets
// ============================================================================

#[rustler::nif]
fn node_set_length<'a>(env: Env<'a>, set: Term<'a>) -> Term<'a> {
    reply(env, decode_node_set(set).and_then(|s| s.with_set(|set| Ok(set.len().encode(env)))))
}

#[rustler::nif]
fn node_set_to_list<'a>(env: Env<'a>, set: Term<'a>) -> Term<'a> {
    let result = decode_node_set(set)
        .and_then(|s| s.with_set(|set| Ok(nodes_term(env, &s.doc, &set.to_vec()))));
    reply(env, result)
}

#[rustler::nif]
fn node_set_push<'a>(env: Env<'a>, set: Term<'a>, node: Term<'a>) -> Term<'a> {
    let result = decode_node_set(set).and_then(|s| {
        let node = decode_node(node)?;
        s.with_set(|set| set.push(node.node))?;
        Ok(nil(env))
    });
    reply(env, result)
}

#[rustler::nif]
fn node_set_at<'a>(env: Env<'a>, set: Term<'a>, index: i64) -> Term<'a> {
    let result = decode_node_set(set)
        .and_then(|s| s.with_set(|set| Ok(optional_node_term(env, &s.doc, set.at(index as isize)))));
    reply(env, result)
}

#[rustler::nif]
fn node_set_slice<'a>(env: Env<'a>, set: Term<'a>, index: i64, count: usize) -> Term<'a> {
    let result = decode_node_set(set).and_then(|s| {
        s.with_set(|set| {
            Ok(match set.slice(index as isize, count) {
                Some(slice) => node_set_term(env, &s.doc, slice),
                None => nil(env),
            })
        })
    });
    reply(env, result)
}

#[rustler::nif]
fn node_set_includes<'a>(env: Env<'a>, set: Term<'a>, node: Term<'a>) -> Term<'a> {
    let result = decode_node_set(set).and_then(|s| {
        let node = decode_node(node)?;
        s.with_set(|set| Ok(set.includes(&node.node).encode(env)))
    });
    reply(env, result)
}

#[rustler::nif]
fn node_set_delete<'a>(env: Env<'a>, set: Term<'a>, node: Term<'a>) -> Term<'a> {
    let result = decode_node_set(set).and_then(|s| {
        let node = decode_node(node)?;
        s.with_set(|set| Ok(optional_node_term(env, &s.doc, set.delete(&node.node))))
    });
    reply(env, result)
}

fn node_set_binary<'a, F>(env: Env<'a>, left: Term<'a>, right: Term<'a>, op: F) -> Term<'a>
where
    F: FnOnce(&NodeSet, &NodeSet) -> Result<NodeSet>,
{
    let result = decode_node_set(left).and_then(|l| {
        let r = decode_node_set(right)?;
        let other = r.snapshot()?;
        let combined = l.with_set(|set| op(set, &other))?;
        Ok(node_set_term(env, &l.doc, combined))
    });
    reply(env, result)
}

#[rustler::nif]
fn node_set_union<'a>(env: Env<'a>, left: Term<'a>, right: Term<'a>) -> Term<'a> {
    node_set_binary(env, left, right, NodeSet::union)
}

#[rustler::nif]
fn node_set_intersection<'a>(env: Env<'a>, left: Term<'a>, right: Term<'a>) -> Term<'a> {
    node_set_binary(env, left, right, NodeSet::intersection)
}

#[rustler::nif]
fn node_set_difference<'a>(env: Env<'a>, left: Term<'a>, right: Term<'a>) -> Term<'a> {
    node_set_binary(env, left, right, NodeSet::difference)
}

#[rustler::nif]
fn node_set_unlink_all<'a>(env: Env<'a>, set: Term<'a>) -> Term<'a> {
    let result = decode_node_set(set).and_then(|s| {
        let snapshot = s.snapshot()?;
        s.doc.with_doc_mut(|doc| snapshot.unlink_all(doc))?;
        Ok(nil(env))
    });
    reply(env, result)
}

// ============================================================================
// SAX
// ============================================================================

/// Stream `input` and return the collected events, or the error tuple
/// when parsing stopped on a fatal error
#[rustler::nif(schedule = "DirtyCpu")]
fn sax_parse<'a>(env: Env<'a>, input: Binary<'a>, options: Term<'a>) -> Term<'a> {
    let result = decode_options(options).and_then(|opts| {
        let mut bridge = SaxEventBridge::with_options(SaxCollector::new(), opts);
        bridge.parse_from_buffer(input.as_slice())?;
        Ok(sax_events_term(env, bridge.handler().events()))
    });
    reply(env, result)
}

#[rustler::nif(schedule = "DirtyIo")]
fn sax_parse_file<'a>(env: Env<'a>, path: String, options: Term<'a>) -> Term<'a> {
    let result = decode_options(options).and_then(|opts| {
        let mut bridge = SaxEventBridge::with_options(SaxCollector::new(), opts);
        bridge.parse_from_file(&path)?;
        Ok(sax_events_term(env, bridge.handler().events()))
    });
    reply(env, result)
}

rustler::init!("Elixir.RustyTree.Native");
