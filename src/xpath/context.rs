//! XPath contexts
//!
//! An [`XPathContext`] binds a context node and a prefix table. Compiled
//! programs are cached per context, keyed by expression text; the table
//! is baked into each program, so registering a prefix drops the cache.

use super::compiler::{compile, CompiledExpr};
use super::eval::{evaluate_compiled, EvalContext};
use super::value::XPathValue;
use crate::dom::{Node, NodeSet, XmlDocument};
use crate::error::{Error, Result};
use log::debug;
use lru::LruCache;
use rayon::prelude::*;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

const CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// Result of an evaluation, detached from the engine's stack values
#[derive(Debug, Clone, PartialEq)]
pub enum XPathObject {
    NodeSet(NodeSet),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl XPathObject {
    fn from_value(doc: &XmlDocument, value: XPathValue) -> Self {
        match value {
            XPathValue::NodeSet(ids) => XPathObject::NodeSet(NodeSet::from_ids(doc, ids)),
            XPathValue::Boolean(b) => XPathObject::Boolean(b),
            XPathValue::Number(n) => XPathObject::Number(n),
            XPathValue::String(s) => XPathObject::String(s),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            XPathObject::NodeSet(_) => "node-set",
            XPathObject::Boolean(_) => "boolean",
            XPathObject::Number(_) => "number",
            XPathObject::String(_) => "string",
        }
    }
}

/// An evaluated expression: its source text and a snapshot of the result
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    expression: String,
    value: XPathObject,
}

impl CompiledExpression {
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn value(&self) -> &XPathObject {
        &self.value
    }

    pub fn into_value(self) -> XPathObject {
        self.value
    }

    /// The result as a node-set
    pub fn node_set(&self) -> Result<NodeSet> {
        match &self.value {
            XPathObject::NodeSet(set) => Ok(set.clone()),
            other => Err(Error::XPathSyntax(format!(
                "'{}' evaluates to a {}, not a node-set",
                self.expression,
                other.type_name()
            ))),
        }
    }
}

/// Evaluation root plus namespace prefix table
pub struct XPathContext {
    node: Node,
    namespaces: HashMap<String, String>,
    cache: Mutex<LruCache<String, Arc<CompiledExpr>>>,
}

impl XPathContext {
    pub fn new(node: Node) -> Self {
        XPathContext {
            node,
            namespaces: HashMap::new(),
            cache: Mutex::new(LruCache::new(CACHE_CAPACITY)),
        }
    }

    pub fn node(&self) -> Node {
        self.node
    }

    pub fn namespaces(&self) -> &HashMap<String, String> {
        &self.namespaces
    }

    /// Bind `prefix` to `uri` for expressions evaluated from now on.
    /// `xml` and `xmlns` are fixed and cannot be rebound.
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) {
        if prefix == "xml" || prefix == "xmlns" {
            debug!("ignoring registration of reserved prefix '{}'", prefix);
            return;
        }
        self.namespaces.insert(prefix.to_string(), uri.to_string());
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn compiled(&self, text: &str) -> Result<Arc<CompiledExpr>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(program) = cache.get(text) {
            debug!("xpath cache hit: {}", text);
            return Ok(Arc::clone(program));
        }
        debug!("xpath cache miss: {}", text);
        let program = Arc::new(
            compile(text, &self.namespaces)
                .map_err(|e| Error::XPathSyntax(format!("{} in '{}'", e, text)))?,
        );
        cache.put(text.to_string(), Arc::clone(&program));
        Ok(program)
    }

    /// Compile (or fetch from the cache) and evaluate `text` against `doc`
    pub fn evaluate(&self, doc: &XmlDocument, text: &str) -> Result<CompiledExpression> {
        let id = self.node.id();
        if self.node.document_id() != doc.id() || doc.get_node(id).is_none() {
            return Err(Error::Type(format!(
                "context node belongs to {}, not {}",
                self.node.document_id(),
                doc.id()
            )));
        }
        let program = self.compiled(text)?;
        let value = evaluate_compiled(&program, &EvalContext::new(doc, id))
            .map_err(|e| Error::XPathSyntax(format!("{} in '{}'", e, text)))?;
        Ok(CompiledExpression {
            expression: text.to_string(),
            value: XPathObject::from_value(doc, value),
        })
    }

    /// Evaluate independent expressions in parallel
    pub fn evaluate_all(&self, doc: &XmlDocument, texts: &[&str]) -> Vec<Result<CompiledExpression>> {
        texts.par_iter().map(|text| self.evaluate(doc, text)).collect()
    }
}
