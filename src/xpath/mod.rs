//! XPath 1.0 Engine
//!
//! - All 13 axes (the namespace axis is always empty)
//! - The core function library except `id()`
//! - Namespace prefixes resolved at compile time
//! - Compiled expression caching per [`XPathContext`]

pub mod axes;
pub mod compiler;
pub mod context;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use context::{CompiledExpression, XPathContext, XPathObject};
pub use eval::{evaluate, evaluate_compiled, EvalContext};
pub use value::XPathValue;
