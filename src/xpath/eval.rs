//! XPath Evaluation Engine
//!
//! Evaluates compiled XPath expressions against an XML document.

use super::axes::{matches_node_test, navigate};
use super::compiler::{CompiledExpr, Op};
use super::functions;
use super::parser::{Axis, BinaryOp};
use super::value::{parse_number, XPathValue};
use crate::dom::{DocumentAccess, NodeId, NodeKind};
use std::collections::HashMap;

/// Evaluation context - generic over document type
pub struct EvalContext<'a, D: DocumentAccess> {
    pub doc: &'a D,
    pub context_node: NodeId,
    pub context_position: usize,
    pub context_size: usize,
}

impl<'a, D: DocumentAccess> EvalContext<'a, D> {
    pub fn new(doc: &'a D, context_node: NodeId) -> Self {
        EvalContext {
            doc,
            context_node,
            context_position: 1,
            context_size: 1,
        }
    }

    fn at(&self, node: NodeId, position: usize, size: usize) -> Self {
        EvalContext {
            doc: self.doc,
            context_node: node,
            context_position: position,
            context_size: size,
        }
    }
}

/// Compile and evaluate an expression from a context node
#[must_use = "XPath evaluation result should be used"]
pub fn evaluate<D: DocumentAccess>(
    doc: &D,
    context_node: NodeId,
    xpath: &str,
    namespaces: &HashMap<String, String>,
) -> Result<XPathValue, String> {
    let compiled = super::compiler::compile(xpath, namespaces)?;
    evaluate_compiled(&compiled, &EvalContext::new(doc, context_node))
}

fn pop(stack: &mut Vec<XPathValue>) -> Result<XPathValue, String> {
    stack
        .pop()
        .ok_or_else(|| "Malformed expression: operand stack underflow".to_string())
}

/// Evaluate a compiled expression
pub fn evaluate_compiled<D: DocumentAccess>(
    expr: &CompiledExpr,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, String> {
    let mut stack: Vec<XPathValue> = Vec::new();

    for op in &expr.ops {
        match op {
            Op::Root => {
                let mut root = ctx.context_node;
                while let Some(parent) = ctx.doc.parent_of(root) {
                    root = parent;
                }
                stack.push(XPathValue::single_node(root));
            }

            Op::Context => {
                stack.push(XPathValue::single_node(ctx.context_node));
            }

            Op::Step {
                axis,
                test,
                predicates,
            } => {
                let nodes = pop(&mut stack)?
                    .into_nodeset()
                    .map_err(|e| format!("Location step applied to a non-node-set: {}", e))?;
                let principal = if *axis == Axis::Attribute {
                    NodeKind::Attribute
                } else {
                    NodeKind::Element
                };

                let mut result = Vec::with_capacity(nodes.len());
                for node in nodes {
                    let mut selected: Vec<NodeId> = navigate(ctx.doc, node, *axis)
                        .into_iter()
                        .filter(|&candidate| matches_node_test(ctx.doc, candidate, test, principal))
                        .collect();
                    // Positions count along the axis, so reverse axes see
                    // the nearest node as position 1
                    for predicate in predicates {
                        selected = filter_by_predicate(selected, predicate, ctx)?;
                    }
                    result.extend(selected);
                }
                ctx.doc.sort_document_order(&mut result);
                stack.push(XPathValue::NodeSet(result));
            }

            Op::Predicate(pred_expr) => {
                let nodes = pop(&mut stack)?
                    .into_nodeset()
                    .map_err(|e| format!("Predicate applied to a non-node-set: {}", e))?;
                stack.push(XPathValue::NodeSet(filter_by_predicate(
                    nodes, pred_expr, ctx,
                )?));
            }

            Op::Union => {
                let right = pop(&mut stack)?;
                let left = pop(&mut stack)?;
                match (left, right) {
                    (XPathValue::NodeSet(mut l), XPathValue::NodeSet(r)) => {
                        l.extend(r);
                        ctx.doc.sort_document_order(&mut l);
                        stack.push(XPathValue::NodeSet(l));
                    }
                    _ => return Err("Union requires two node-sets".to_string()),
                }
            }

            Op::Number(n) => {
                stack.push(XPathValue::Number(*n));
            }

            Op::String(s) => {
                stack.push(XPathValue::String(s.clone()));
            }

            Op::Negate => {
                let val = pop(&mut stack)?;
                stack.push(XPathValue::Number(-val.to_number(ctx.doc)));
            }

            Op::Binary(op) => {
                let right = pop(&mut stack)?;
                let left = pop(&mut stack)?;
                let doc = ctx.doc;

                let result = match op {
                    BinaryOp::Or => XPathValue::Boolean(left.to_boolean() || right.to_boolean()),
                    BinaryOp::And => XPathValue::Boolean(left.to_boolean() && right.to_boolean()),
                    BinaryOp::Eq
                    | BinaryOp::NotEq
                    | BinaryOp::Lt
                    | BinaryOp::LtEq
                    | BinaryOp::Gt
                    | BinaryOp::GtEq => XPathValue::Boolean(compare(doc, *op, &left, &right)),
                    BinaryOp::Add => XPathValue::Number(left.to_number(doc) + right.to_number(doc)),
                    BinaryOp::Sub => XPathValue::Number(left.to_number(doc) - right.to_number(doc)),
                    BinaryOp::Mul => XPathValue::Number(left.to_number(doc) * right.to_number(doc)),
                    BinaryOp::Div => XPathValue::Number(left.to_number(doc) / right.to_number(doc)),
                    BinaryOp::Mod => XPathValue::Number(left.to_number(doc) % right.to_number(doc)),
                };

                stack.push(result);
            }

            Op::Call(name, arg_count) => {
                let at = stack
                    .len()
                    .checked_sub(*arg_count)
                    .ok_or_else(|| format!("Malformed call to {}()", name))?;
                let args = stack.split_off(at);
                stack.push(functions::call(name, args, ctx)?);
            }
        }
    }

    pop(&mut stack)
}

/// Keep the nodes for which the predicate holds. A numeric result selects
/// by position; anything else is converted to a boolean.
fn filter_by_predicate<D: DocumentAccess>(
    nodes: Vec<NodeId>,
    predicate: &CompiledExpr,
    ctx: &EvalContext<'_, D>,
) -> Result<Vec<NodeId>, String> {
    let size = nodes.len();
    let mut filtered = Vec::with_capacity(size);
    for (i, node) in nodes.into_iter().enumerate() {
        let position = i + 1;
        let include = match evaluate_compiled(predicate, &ctx.at(node, position, size))? {
            XPathValue::Number(n) => position as f64 == n,
            other => other.to_boolean(),
        };
        if include {
            filtered.push(node);
        }
    }
    Ok(filtered)
}

/// Swap operand order of a relational operator
fn flip(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::LtEq => BinaryOp::GtEq,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::GtEq => BinaryOp::LtEq,
        other => other,
    }
}

fn is_equality(op: BinaryOp) -> bool {
    matches!(op, BinaryOp::Eq | BinaryOp::NotEq)
}

fn compare_numbers(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::GtEq => a >= b,
        _ => false,
    }
}

/// Strings compare as strings for `=` and `!=`, as numbers otherwise
fn compare_strings(op: BinaryOp, a: &str, b: &str) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        _ => compare_numbers(op, parse_number(a), parse_number(b)),
    }
}

fn compare_booleans(op: BinaryOp, a: bool, b: bool) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        _ => compare_numbers(op, f64::from(u8::from(a)), f64::from(u8::from(b))),
    }
}

/// XPath 1.0 comparison. A node-set operand compares true when any of its
/// nodes satisfies the comparison.
fn compare<D: DocumentAccess>(doc: &D, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let right_values: Vec<String> = r.iter().map(|&n| doc.string_value(n)).collect();
            l.iter().any(|&n| {
                let lv = doc.string_value(n);
                right_values.iter().any(|rv| compare_strings(op, &lv, rv))
            })
        }
        (XPathValue::NodeSet(nodes), other) => match other {
            XPathValue::Boolean(b) => compare_booleans(op, !nodes.is_empty(), *b),
            XPathValue::Number(num) => nodes
                .iter()
                .any(|&n| compare_numbers(op, parse_number(&doc.string_value(n)), *num)),
            XPathValue::String(s) => nodes
                .iter()
                .any(|&n| compare_strings(op, &doc.string_value(n), s)),
            XPathValue::NodeSet(_) => false,
        },
        (_, XPathValue::NodeSet(_)) => compare(doc, flip(op), right, left),
        _ if !is_equality(op) => compare_numbers(op, left.to_number(doc), right.to_number(doc)),
        (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
            compare_booleans(op, left.to_boolean(), right.to_boolean())
        }
        (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
            compare_numbers(op, left.to_number(doc), right.to_number(doc))
        }
        _ => compare_strings(op, &left.to_string_value(doc), &right.to_string_value(doc)),
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

    fn eval(doc: &XmlDocument, xpath: &str) -> XPathValue {
        let root = doc.root_element_id().unwrap();
        evaluate(doc, root, xpath, &HashMap::new()).unwrap()
    }

    fn names(doc: &XmlDocument, xpath: &str) -> Vec<String> {
        eval(doc, xpath)
            .into_nodeset()
            .unwrap()
            .into_iter()
            .map(|id| doc.name_of(id).to_string())
            .collect()
    }

    #[test]
    fn test_simple_path() {
        let doc = parse("<root><child/></root>");
        assert_eq!(names(&doc, "/root/child"), ["child"]);
        assert_eq!(names(&doc, "child"), ["child"]);
    }

    #[test]
    fn test_descendant() {
        let doc = parse("<root><a><b/></a><b/></root>");
        assert_eq!(names(&doc, "//b").len(), 2);
        assert_eq!(names(&doc, "a//b").len(), 1);
    }

    #[test]
    fn test_positional_predicates() {
        let doc = parse("<root><a/><b/><c/></root>");
        assert_eq!(names(&doc, "/root/*[2]"), ["b"]);
        assert_eq!(names(&doc, "/root/*[last()]"), ["c"]);
        assert_eq!(names(&doc, "c/preceding-sibling::*[1]"), ["b"]);
        assert_eq!(names(&doc, "(c/preceding-sibling::*)[1]"), ["a"]);
    }

    #[test]
    fn test_step_predicates_apply_per_context_node() {
        let doc = parse("<r><p><i>1</i><i>2</i></p><p><i>3</i></p></r>");
        let first_items: Vec<String> = eval(&doc, "//i[1]")
            .into_nodeset()
            .unwrap()
            .into_iter()
            .map(|id| doc.text_content(id))
            .collect();
        assert_eq!(first_items, ["1", "3"]);
        assert_eq!(eval(&doc, "string((//i)[1])"), XPathValue::String("1".into()));
    }

    #[test]
    fn test_attributes_are_nodes() {
        let doc = parse("<r><item id='a' n='2'/><item id='b' n='10'/></r>");
        assert_eq!(names(&doc, "item/@id"), ["id", "id"]);
        assert_eq!(names(&doc, "item/@*").len(), 4);
        assert_eq!(eval(&doc, "string(item[@id='b']/@n)"), XPathValue::String("10".into()));
        assert_eq!(names(&doc, "item[@n > 5]/@id"), ["id"]);
        assert_eq!(names(&doc, "item/@id/.."), ["item", "item"]);
    }

    #[test]
    fn test_union_in_document_order() {
        let doc = parse("<r><a/><b/><c/></r>");
        assert_eq!(names(&doc, "c | a | a"), ["a", "c"]);
        let err = evaluate(&doc, 0, "1 | a", &HashMap::new()).unwrap_err();
        assert!(err.contains("Union"));
    }

    #[test]
    fn test_comparisons() {
        let doc = parse("<r><v>1</v><v>2</v></r>");
        let truthy = |xpath: &str| eval(&doc, xpath).to_boolean();
        assert!(truthy("v = 2"));
        assert!(truthy("v != 2"));
        assert!(truthy("v = '1'"));
        assert!(!truthy("v > 2"));
        assert!(truthy("2 > v"));
        assert!(truthy("v = true()"));
        assert!(truthy("missing = false()"));
        assert!(!truthy("missing = 'x'"));
        assert!(truthy("'2' = 2.0"));
        assert!(truthy("'abc' != 'abd'"));
        assert!(truthy("true() = 1"));
        assert!(truthy("'10' > '9'"));
    }

    #[test]
    fn test_arithmetic() {
        let doc = parse("<r/>");
        assert_eq!(eval(&doc, "7 mod 3"), XPathValue::Number(1.0));
        assert_eq!(eval(&doc, "-7 mod 3"), XPathValue::Number(-1.0));
        assert_eq!(eval(&doc, "6 div 4"), XPathValue::Number(1.5));
        assert_eq!(eval(&doc, "1 div 0"), XPathValue::Number(f64::INFINITY));
        assert_eq!(eval(&doc, "-(2 + 3) * 2"), XPathValue::Number(-10.0));
    }

    #[test]
    fn test_functions_in_context() {
        let doc = parse("<root><a/><b/><c/></root>");
        assert_eq!(eval(&doc, "count(*)"), XPathValue::Number(3.0));
        assert_eq!(eval(&doc, "string-length('hello')"), XPathValue::Number(5.0));
        assert_eq!(names(&doc, "*[position() mod 2 = 1]"), ["a", "c"]);
    }

    #[test]
    fn test_namespaced_names() {
        let doc = parse("<r xmlns='urn:d' xmlns:x='urn:x'><x:a/><a/></r>");
        let mut namespaces = HashMap::new();
        namespaces.insert("d".to_string(), "urn:d".to_string());
        namespaces.insert("x".to_string(), "urn:x".to_string());
        let root = doc.root_element_id().unwrap();
        let found = |xpath: &str| {
            evaluate(&doc, root, xpath, &namespaces)
                .unwrap()
                .into_nodeset()
                .unwrap()
                .len()
        };
        assert_eq!(found("d:a"), 1);
        assert_eq!(found("x:a"), 1);
        assert_eq!(found("a"), 0);
        assert_eq!(found("x:*"), 1);
    }

    #[test]
    fn test_filter_on_non_node_set() {
        let doc = parse("<r/>");
        assert!(evaluate(&doc, 0, "'abc'[1]", &HashMap::new()).is_err());
        assert!(evaluate(&doc, 0, "count(1)", &HashMap::new()).is_err());
    }
}
