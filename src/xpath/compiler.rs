//! XPath Expression Compiler
//!
//! Compiles parsed XPath expressions into a flat stack program. Namespace
//! prefixes in name tests are resolved to URIs here, so a program is only
//! valid for the namespace table it was compiled with.

use super::functions;
use super::parser::{Axis, BinaryOp, Expr, NodeTest, Step};
use crate::dom::namespace::ns;
use std::collections::HashMap;

/// Compiled XPath expression
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub ops: Vec<Op>,
}

/// Compiled operation
#[derive(Debug, Clone)]
pub enum Op {
    /// Push the root of the context node's tree
    Root,
    /// Push context node onto stack
    Context,
    /// Apply a location step, with its predicates, to each node of the
    /// node-set on top of the stack
    Step {
        axis: Axis,
        test: CompiledNodeTest,
        predicates: Vec<CompiledExpr>,
    },
    /// Filter the node-set on top of the stack
    Predicate(Box<CompiledExpr>),
    /// Union two node sets
    Union,
    /// Push literal number
    Number(f64),
    /// Push literal string
    String(String),
    /// Call function: name, arg count
    Call(String, usize),
    /// Binary operation
    Binary(BinaryOp),
    /// Negate
    Negate,
}

/// Compiled node test; prefixes are already namespace URIs
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledNodeTest {
    Any,
    /// Local name in no namespace
    Name(String),
    /// Namespace URI and local name
    QName(String, String),
    /// Any name in a namespace URI
    NamespaceWildcard(String),
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
}

struct Compiler<'n> {
    namespaces: &'n HashMap<String, String>,
}

impl Compiler<'_> {
    fn resolve_prefix(&self, prefix: &str) -> Result<String, String> {
        match prefix {
            "xml" => Ok(ns::XML.to_string()),
            "xmlns" => Ok(ns::XMLNS.to_string()),
            _ => self
                .namespaces
                .get(prefix)
                .cloned()
                .ok_or_else(|| format!("Undefined namespace prefix: {}", prefix)),
        }
    }

    fn compile(&self, expr: &Expr) -> Result<CompiledExpr, String> {
        let mut ops = Vec::new();
        self.compile_expr(expr, &mut ops)?;
        Ok(CompiledExpr { ops })
    }

    fn compile_expr(&self, expr: &Expr, ops: &mut Vec<Op>) -> Result<(), String> {
        match expr {
            Expr::Root => ops.push(Op::Root),
            Expr::Context => ops.push(Op::Context),
            Expr::Number(n) => ops.push(Op::Number(*n)),
            Expr::String(s) => ops.push(Op::String(s.clone())),
            Expr::Negate(inner) => {
                self.compile_expr(inner, ops)?;
                ops.push(Op::Negate);
            }
            Expr::Binary(left, op, right) => {
                self.compile_expr(left, ops)?;
                self.compile_expr(right, ops)?;
                ops.push(Op::Binary(*op));
            }
            Expr::Union(left, right) => {
                self.compile_expr(left, ops)?;
                self.compile_expr(right, ops)?;
                ops.push(Op::Union);
            }
            Expr::Path(base, step) => {
                self.compile_expr(base, ops)?;
                ops.push(self.compile_step(step)?);
            }
            Expr::Filter(base, pred) => {
                self.compile_expr(base, ops)?;
                ops.push(Op::Predicate(Box::new(self.compile(pred)?)));
            }
            Expr::Function(name, args) => {
                functions::check_call(name, args.len())?;
                for arg in args {
                    self.compile_expr(arg, ops)?;
                }
                ops.push(Op::Call(name.clone(), args.len()));
            }
        }
        Ok(())
    }

    fn compile_step(&self, step: &Step) -> Result<Op, String> {
        let test = match &step.node_test {
            NodeTest::Any => CompiledNodeTest::Any,
            NodeTest::Name(n) => CompiledNodeTest::Name(n.clone()),
            NodeTest::QName(prefix, local) => {
                CompiledNodeTest::QName(self.resolve_prefix(prefix)?, local.clone())
            }
            NodeTest::NamespaceWildcard(prefix) => {
                CompiledNodeTest::NamespaceWildcard(self.resolve_prefix(prefix)?)
            }
            NodeTest::Node => CompiledNodeTest::Node,
            NodeTest::Text => CompiledNodeTest::Text,
            NodeTest::Comment => CompiledNodeTest::Comment,
            NodeTest::ProcessingInstruction(target) => {
                CompiledNodeTest::ProcessingInstruction(target.clone())
            }
        };
        let predicates = step
            .predicates
            .iter()
            .map(|p| self.compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Op::Step {
            axis: step.axis,
            test,
            predicates,
        })
    }
}

/// Compile an XPath expression string against a prefix -> URI table
pub fn compile(xpath: &str, namespaces: &HashMap<String, String>) -> Result<CompiledExpr, String> {
    let expr = super::parser::parse(xpath)?;
    Compiler { namespaces }.compile(&expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_namespaces() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_compile_simple() {
        let compiled = compile("/root", &no_namespaces()).unwrap();
        assert!(matches!(compiled.ops[0], Op::Root));
        assert!(matches!(compiled.ops[1], Op::Step { axis: Axis::Child, .. }));
    }

    #[test]
    fn test_compile_descendant() {
        let compiled = compile("//item", &no_namespaces()).unwrap();
        assert_eq!(compiled.ops.len(), 3);
    }

    #[test]
    fn test_prefixes_resolve_to_uris() {
        let mut namespaces = HashMap::new();
        namespaces.insert("a".to_string(), "urn:a".to_string());
        let compiled = compile("a:x/xml:*", &namespaces).unwrap();
        match (&compiled.ops[1], &compiled.ops[2]) {
            (Op::Step { test: first, .. }, Op::Step { test: second, .. }) => {
                assert_eq!(first, &CompiledNodeTest::QName("urn:a".into(), "x".into()));
                assert_eq!(second, &CompiledNodeTest::NamespaceWildcard(ns::XML.into()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(compile("b:x", &namespaces).unwrap_err().contains("prefix"));
    }

    #[test]
    fn test_unknown_and_unsupported_functions() {
        assert!(compile("frobnicate()", &no_namespaces()).is_err());
        assert!(compile("id('x')", &no_namespaces()).is_err());
        assert!(compile("count()", &no_namespaces()).is_err());
    }
}
