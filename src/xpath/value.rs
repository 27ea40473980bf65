//! XPath Value Types
//!
//! XPath 1.0 has four data types: node-set, boolean, number, and string.
//! Converting a node-set needs the document, so the conversions take one.

use crate::dom::{DocumentAccess, NodeId};

/// XPath value types
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum XPathValue {
    /// Nodes in document order, no duplicates
    NodeSet(Vec<NodeId>),
    Boolean(bool),
    /// Floating-point number
    Number(f64),
    String(String),
}

impl XPathValue {
    pub fn empty_nodeset() -> Self {
        XPathValue::NodeSet(Vec::new())
    }

    pub fn single_node(id: NodeId) -> Self {
        XPathValue::NodeSet(vec![id])
    }

    /// boolean() semantics
    pub fn to_boolean(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::Boolean(b) => *b,
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
        }
    }

    /// number() semantics
    pub fn to_number<D: DocumentAccess>(&self, doc: &D) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            other => parse_number(&other.to_string_value(doc)),
        }
    }

    /// string() semantics; a node-set gives the string-value of its first node
    pub fn to_string_value<D: DocumentAccess>(&self, doc: &D) -> String {
        match self {
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|&n| doc.string_value(n))
                .unwrap_or_default(),
            XPathValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            XPathValue::Number(n) => number_to_string(*n),
            XPathValue::String(s) => s.clone(),
        }
    }

    pub fn is_nodeset(&self) -> bool {
        matches!(self, XPathValue::NodeSet(_))
    }

    pub fn as_nodeset(&self) -> Option<&Vec<NodeId>> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn into_nodeset(self) -> Result<Vec<NodeId>, String> {
        match self {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(format!("Expected a node-set, got {}", other.type_name())),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            XPathValue::NodeSet(_) => "node-set",
            XPathValue::Boolean(_) => "boolean",
            XPathValue::Number(_) => "number",
            XPathValue::String(_) => "string",
        }
    }
}

/// Number formatting for string(): integers without a fraction, no
/// exponent notation
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// String to number: optional whitespace, optional minus, digits with an
/// optional fraction. Anything else is NaN.
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let digits = t.strip_prefix('-').unwrap_or(t);
    let well_formed = !digits.is_empty()
        && digits != "."
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1;
    if well_formed {
        t.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

impl Default for XPathValue {
    fn default() -> Self {
        XPathValue::NodeSet(Vec::new())
    }
}

impl From<bool> for XPathValue {
    fn from(b: bool) -> Self {
        XPathValue::Boolean(b)
    }
}

impl From<f64> for XPathValue {
    fn from(n: f64) -> Self {
        XPathValue::Number(n)
    }
}

impl From<String> for XPathValue {
    fn from(s: String) -> Self {
        XPathValue::String(s)
    }
}

impl From<Vec<NodeId>> for XPathValue {
    fn from(nodes: Vec<NodeId>) -> Self {
        XPathValue::NodeSet(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;
    use crate::options::ParseOptions;

    #[test]
    fn test_boolean_conversion() {
        assert!(XPathValue::NodeSet(vec![1]).to_boolean());
        assert!(!XPathValue::NodeSet(vec![]).to_boolean());
        assert!(XPathValue::Number(1.0).to_boolean());
        assert!(!XPathValue::Number(f64::NAN).to_boolean());
        assert!(XPathValue::String("false".to_string()).to_boolean());
        assert!(!XPathValue::String(String::new()).to_boolean());
    }

    #[test]
    fn test_number_conversion() {
        let doc = XmlDocument::new();
        assert_eq!(XPathValue::Boolean(true).to_number(&doc), 1.0);
        assert_eq!(XPathValue::String(" 42 ".to_string()).to_number(&doc), 42.0);
        assert_eq!(XPathValue::String("-.5".to_string()).to_number(&doc), -0.5);
        assert!(XPathValue::String("1e3".to_string()).to_number(&doc).is_nan());
        assert!(XPathValue::String("+1".to_string()).to_number(&doc).is_nan());
        assert!(XPathValue::String("abc".to_string()).to_number(&doc).is_nan());
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(3.25), "3.25");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_nodeset_string_value() {
        let doc = XmlDocument::parse(b"<r><a>1</a><a>2</a></r>", &ParseOptions::default()).unwrap();
        let root = doc.root_element_id().unwrap();
        let ids: Vec<NodeId> = doc.children(root).collect();
        let value = XPathValue::NodeSet(ids);
        assert_eq!(value.to_string_value(&doc), "1");
        assert_eq!(value.to_number(&doc), 1.0);
        assert_eq!(XPathValue::empty_nodeset().to_string_value(&doc), "");
    }
}
