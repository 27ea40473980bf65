//! Elixir Term Conversion Utilities
//!
//! Builds reply terms for the NIF layer and decodes its arguments. Every
//! fallible NIF replies `{:ok, value}` or `{:error, {kind, message}}`.

use crate::dom::{Node, NodeSet};
use crate::error::{Error, Result};
use crate::options::ParseOptions;
use crate::resource::{DocumentRef, NodeRef, NodeResource, NodeSetRef, NodeSetResource};
use crate::sax::SaxEvent;
use crate::xpath::XPathObject;
use rustler::types::map::MapIterator;
use rustler::{Atom, Encoder, Env, NewBinary, ResourceArc, Term};

// Pre-defined atoms for efficiency - created once at compile time
rustler::atoms! {
    ok,
    error,

    // node wrappers
    element,
    text,
    cdata,
    comment,
    document_type,
    entity_reference,
    attribute,
    generic = "node",

    // error kinds
    parse_error,
    io_error,
    xpath_syntax_error,
    type_error,
    invalid_state,
    unsupported_operation,

    // parse options
    substitute_entities,
    load_external_subsets,
    recover,
    base_dir,

    // SAX events
    start_document,
    end_document,
    start_element,
    end_element,
    characters,
    cdata_block,
    warning,
}

fn kind_atom(err: &Error) -> Atom {
    match err {
        Error::Parse(_) => parse_error(),
        Error::Io(_) => io_error(),
        Error::XPathSyntax(_) => xpath_syntax_error(),
        Error::Type(_) => type_error(),
        Error::InvalidState(_) => invalid_state(),
        Error::Unsupported(_) => unsupported_operation(),
    }
}

/// `{:error, {kind, message}}`
pub fn error_term<'a>(env: Env<'a>, err: &Error) -> Term<'a> {
    (error(), (kind_atom(err), err.to_string())).encode(env)
}

/// `{:ok, value}` or the error tuple
pub fn reply<'a>(env: Env<'a>, result: Result<Term<'a>>) -> Term<'a> {
    match result {
        Ok(value) => (ok(), value).encode(env),
        Err(err) => {
            log::debug!("nif call failed: {}", err);
            error_term(env, &err)
        }
    }
}

fn wrapper_atom(node: &Node) -> Atom {
    match node {
        Node::Element(_) => element(),
        Node::Text(_) => text(),
        Node::CData(_) => cdata(),
        Node::Comment(_) => comment(),
        Node::DocumentType(_) => document_type(),
        Node::EntityReference(_) => entity_reference(),
        Node::Attribute(_) => attribute(),
        Node::Generic(_) => generic(),
    }
}

/// `{wrapper, resource}` for a node of `doc`
pub fn node_term<'a>(env: Env<'a>, doc: &DocumentRef, node: Node) -> Term<'a> {
    let resource = ResourceArc::new(NodeResource::new(doc.clone(), node));
    (wrapper_atom(&node), resource).encode(env)
}

pub fn optional_node_term<'a>(env: Env<'a>, doc: &DocumentRef, node: Option<Node>) -> Term<'a> {
    match node {
        Some(node) => node_term(env, doc, node),
        None => rustler::types::atom::nil().encode(env),
    }
}

pub fn nodes_term<'a>(env: Env<'a>, doc: &DocumentRef, nodes: &[Node]) -> Term<'a> {
    let mut list = Term::list_new_empty(env);
    for &node in nodes.iter().rev() {
        list = list.list_prepend(node_term(env, doc, node));
    }
    list
}

pub fn node_set_term<'a>(env: Env<'a>, doc: &DocumentRef, set: NodeSet) -> Term<'a> {
    ResourceArc::new(NodeSetResource::new(doc.clone(), set)).encode(env)
}

pub fn xpath_object_term<'a>(env: Env<'a>, doc: &DocumentRef, value: XPathObject) -> Term<'a> {
    match value {
        XPathObject::NodeSet(set) => node_set_term(env, doc, set),
        XPathObject::Boolean(b) => b.encode(env),
        XPathObject::Number(n) => n.encode(env),
        XPathObject::String(s) => str_to_binary(env, &s),
    }
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
pub fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    bytes_to_binary(env, s.as_bytes())
}

pub fn bytes_to_binary<'a>(env: Env<'a>, bytes: &[u8]) -> Term<'a> {
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}

// ---- argument decoding ----

pub fn decode_document(term: Term<'_>) -> Result<DocumentRef> {
    term.decode()
        .map_err(|_| Error::Type("expected a document".to_string()))
}

/// A node is either the `{wrapper, resource}` tuple or the bare resource
pub fn decode_node(term: Term<'_>) -> Result<NodeRef> {
    if let Ok(resource) = term.decode::<NodeRef>() {
        return Ok(resource);
    }
    term.decode::<(Atom, NodeRef)>()
        .map(|(_, resource)| resource)
        .map_err(|_| Error::Type("expected a node".to_string()))
}

pub fn decode_node_set(term: Term<'_>) -> Result<NodeSetRef> {
    term.decode()
        .map_err(|_| Error::Type("expected a node set".to_string()))
}

pub fn decode_string(term: Term<'_>, what: &str) -> Result<String> {
    term.decode()
        .map_err(|_| Error::Type(format!("expected a string for {}", what)))
}

/// Parse options from a keyword list or a map with atom keys. Absent
/// keys keep their defaults; unknown keys are ignored.
pub fn decode_options(term: Term<'_>) -> Result<ParseOptions> {
    let pairs: Vec<(Term<'_>, Term<'_>)> = if let Ok(list) = term.decode::<Vec<(Term, Term)>>() {
        list
    } else if let Some(iter) = MapIterator::new(term) {
        iter.collect()
    } else {
        return Err(Error::Type("options must be a keyword list or a map".to_string()));
    };

    let mut options = ParseOptions::default();
    for (key, value) in pairs {
        let Ok(key) = key.decode::<Atom>() else {
            continue;
        };
        let flag = || {
            value
                .decode::<bool>()
                .map_err(|_| Error::Type("option flags must be booleans".to_string()))
        };
        if key == substitute_entities() {
            options.substitute_entities = flag()?;
        } else if key == load_external_subsets() {
            options.load_external_subsets = flag()?;
        } else if key == recover() {
            options.recover = flag()?;
        } else if key == base_dir() {
            options.base_dir = Some(decode_string(value, "base_dir")?.into());
        }
    }
    Ok(options)
}

// ---- SAX ----

fn sax_event_term<'a>(env: Env<'a>, event: &SaxEvent) -> Term<'a> {
    match event {
        SaxEvent::StartDocument => start_document().encode(env),
        SaxEvent::EndDocument => end_document().encode(env),
        SaxEvent::StartElement { name, attributes } => {
            let mut attrs = Term::list_new_empty(env);
            for value in attributes.iter().rev() {
                attrs = attrs.list_prepend(str_to_binary(env, value));
            }
            (start_element(), str_to_binary(env, name), attrs).encode(env)
        }
        SaxEvent::EndElement { name } => (end_element(), str_to_binary(env, name)).encode(env),
        SaxEvent::Characters(s) => (characters(), str_to_binary(env, s)).encode(env),
        SaxEvent::CDataBlock(s) => (cdata_block(), str_to_binary(env, s)).encode(env),
        SaxEvent::Comment(s) => (comment(), str_to_binary(env, s)).encode(env),
        SaxEvent::Error(s) => (error(), str_to_binary(env, s)).encode(env),
        SaxEvent::Warning(s) => (warning(), str_to_binary(env, s)).encode(env),
    }
}

/// Collected SAX events as a list, in order
pub fn sax_events_term<'a>(env: Env<'a>, events: &[SaxEvent]) -> Term<'a> {
    let mut list = Term::list_new_empty(env);
    for event in events.iter().rev() {
        list = list.list_prepend(sax_event_term(env, event));
    }
    list
}

/// Prefix table from a map or a list of `{prefix, uri}` pairs
pub fn decode_namespaces(term: Term<'_>) -> Result<Vec<(String, String)>> {
    if let Ok(map) = term.decode::<std::collections::HashMap<String, String>>() {
        return Ok(map.into_iter().collect());
    }
    term.decode::<Vec<(String, String)>>()
        .map_err(|_| Error::Type("namespaces must map prefixes to URIs".to_string()))
}
