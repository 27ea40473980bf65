//! XPath Parser
//!
//! Recursive descent parser for XPath 1.0 expressions. Relative location
//! paths become `Path` chains rooted at `Context`; `.` and `..` are plain
//! `self::node()` and `parent::node()` steps.

use super::lexer::{Lexer, Token};

/// XPath expression AST node
#[derive(Debug, Clone)]
pub enum Expr {
    /// Root of the context node's tree (/)
    Root,
    /// Context node
    Context,
    /// Union of two expressions (|)
    Union(Box<Expr>, Box<Expr>),
    /// A location step applied to every node of the base
    Path(Box<Expr>, Box<Step>),
    /// Filter expression with predicate
    Filter(Box<Expr>, Box<Expr>),
    /// Function call
    Function(String, Vec<Expr>),
    /// Binary operation
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    /// Unary negation
    Negate(Box<Expr>),
    /// Literal number
    Number(f64),
    /// Literal string
    String(String),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Location step in a path
#[derive(Debug, Clone)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn abbreviated(axis: Axis) -> Self {
        Step {
            axis,
            node_test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

/// XPath axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Self_,
    Attribute,
    Namespace,
}

impl Axis {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "parent" => Some(Axis::Parent),
            "ancestor" => Some(Axis::Ancestor),
            "ancestor-or-self" => Some(Axis::AncestorOrSelf),
            "following-sibling" => Some(Axis::FollowingSibling),
            "preceding-sibling" => Some(Axis::PrecedingSibling),
            "following" => Some(Axis::Following),
            "preceding" => Some(Axis::Preceding),
            "self" => Some(Axis::Self_),
            "attribute" => Some(Axis::Attribute),
            "namespace" => Some(Axis::Namespace),
            _ => None,
        }
    }

    /// Reverse axes number their proximity positions backwards
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent
                | Axis::Ancestor
                | Axis::AncestorOrSelf
                | Axis::PrecedingSibling
                | Axis::Preceding
        )
    }
}

/// Node test in a location step
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// Any node of the axis' principal kind (*)
    Any,
    /// Unprefixed name
    Name(String),
    /// prefix:local
    QName(String, String),
    /// prefix:*
    NamespaceWildcard(String),
    /// node() - matches any node
    Node,
    /// text() - matches text nodes
    Text,
    /// comment() - matches comments
    Comment,
    /// processing-instruction() - matches PIs
    ProcessingInstruction(Option<String>),
}

/// XPath parser
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Result<Self, String> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    /// Parse a complete expression; trailing tokens are an error
    pub fn parse(&mut self) -> Result<Expr, String> {
        let expr = self.parse_or_expr()?;
        if self.current != Token::Eof {
            return Err(format!("Unexpected token after expression: {:?}", self.current));
        }
        Ok(expr)
    }

    fn advance(&mut self) -> Result<(), String> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), String> {
        if self.current != token {
            return Err(format!("Expected {}, got {:?}", what, self.current));
        }
        self.advance()
    }

    fn parse_or_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and_expr()?;
        while self.current == Token::Or {
            self.advance()?;
            let right = self.parse_and_expr()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_equality_expr()?;
        while self.current == Token::And {
            self.advance()?;
            let right = self.parse_equality_expr()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_relational_expr()?;
        loop {
            let op = match self.current {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_relational_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_additive_expr()?;
        loop {
            let op = match self.current {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_additive_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match self.current {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.current {
                Token::Multiply => BinaryOp::Mul,
                Token::Div => BinaryOp::Div,
                Token::Mod => BinaryOp::Mod,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, String> {
        if self.current == Token::Minus {
            self.advance()?;
            let expr = self.parse_unary_expr()?;
            Ok(Expr::Negate(Box::new(expr)))
        } else {
            self.parse_union_expr()
        }
    }

    fn parse_union_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_path_expr()?;
        while self.current == Token::Pipe {
            self.advance()?;
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// True when the current token can begin a location step
    fn at_step_start(&self) -> bool {
        matches!(
            self.current,
            Token::Name(_)
                | Token::NameTest(_)
                | Token::Star
                | Token::At
                | Token::Axis(_)
                | Token::Dot
                | Token::DoubleDot
                | Token::NodeType(_)
        )
    }

    fn parse_path_expr(&mut self) -> Result<Expr, String> {
        let base = match self.current {
            Token::Slash => {
                self.advance()?;
                if !self.at_step_start() {
                    return Ok(Expr::Root);
                }
                let step = self.parse_step()?;
                Expr::Path(Box::new(Expr::Root), Box::new(step))
            }
            Token::DoubleSlash => {
                self.advance()?;
                let step = self.parse_step()?;
                descendant_path(Expr::Root, step)
            }
            _ if self.at_step_start() => {
                let step = self.parse_step()?;
                Expr::Path(Box::new(Expr::Context), Box::new(step))
            }
            _ => self.parse_filter_expr()?,
        };
        self.parse_path_tail(base)
    }

    /// `/step` and `//step` continuations
    fn parse_path_tail(&mut self, mut expr: Expr) -> Result<Expr, String> {
        loop {
            match self.current {
                Token::Slash => {
                    self.advance()?;
                    let step = self.parse_step()?;
                    expr = Expr::Path(Box::new(expr), Box::new(step));
                }
                Token::DoubleSlash => {
                    self.advance()?;
                    let step = self.parse_step()?;
                    expr = descendant_path(expr, step);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_filter_expr(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary_expr()?;
        while self.current == Token::LeftBracket {
            let pred = self.parse_predicate()?;
            expr = Expr::Filter(Box::new(expr), Box::new(pred));
        }
        Ok(expr)
    }

    fn parse_predicate(&mut self) -> Result<Expr, String> {
        self.expect(Token::LeftBracket, "[")?;
        let pred = self.parse_or_expr()?;
        self.expect(Token::RightBracket, "]")?;
        Ok(pred)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, String> {
        match &self.current {
            Token::Number(n) => {
                let n = *n;
                self.advance()?;
                Ok(Expr::Number(n))
            }
            Token::String(s) => {
                let s = s.clone();
                self.advance()?;
                Ok(Expr::String(s))
            }
            Token::Dollar => {
                self.advance()?;
                match &self.current {
                    Token::Name(name) | Token::NameTest(name) => {
                        Err(format!("Variable references are not supported: ${}", name))
                    }
                    _ => Err("Expected variable name".to_string()),
                }
            }
            Token::LeftParen => {
                self.advance()?;
                let expr = self.parse_or_expr()?;
                self.expect(Token::RightParen, ")")?;
                Ok(expr)
            }
            Token::FunctionName(name) => {
                let name = name.clone();
                self.advance()?;
                self.expect(Token::LeftParen, "(")?;
                let args = self.parse_function_args()?;
                Ok(Expr::Function(name, args))
            }
            other => Err(format!("Unexpected token: {:?}", other)),
        }
    }

    fn parse_step(&mut self) -> Result<Step, String> {
        let axis = match &self.current {
            Token::Dot => {
                self.advance()?;
                return Ok(Step::abbreviated(Axis::Self_));
            }
            Token::DoubleDot => {
                self.advance()?;
                return Ok(Step::abbreviated(Axis::Parent));
            }
            Token::At => {
                self.advance()?;
                Axis::Attribute
            }
            Token::Axis(name) => {
                let axis = Axis::from_name(name).ok_or_else(|| format!("Unknown axis: {}", name))?;
                self.advance()?;
                self.expect(Token::DoubleColon, "::")?;
                axis
            }
            _ => Axis::Child,
        };

        let node_test = self.parse_node_test()?;

        let mut predicates = Vec::new();
        while self.current == Token::LeftBracket {
            predicates.push(self.parse_predicate()?);
        }

        Ok(Step {
            axis,
            node_test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, String> {
        let test = match &self.current {
            Token::Star => NodeTest::Any,
            Token::Name(name) => NodeTest::Name(name.clone()),
            Token::NameTest(qname) => match qname.split_once(':') {
                Some((prefix, "*")) => NodeTest::NamespaceWildcard(prefix.to_string()),
                Some((prefix, local)) => NodeTest::QName(prefix.to_string(), local.to_string()),
                None => NodeTest::Name(qname.clone()),
            },
            Token::NodeType(name) => {
                let name = name.clone();
                self.advance()?;
                self.expect(Token::LeftParen, "(")?;
                let literal = match &self.current {
                    Token::String(s) if name == "processing-instruction" => {
                        let s = s.clone();
                        self.advance()?;
                        Some(s)
                    }
                    _ => None,
                };
                self.expect(Token::RightParen, ")")?;
                return Ok(match name.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => NodeTest::ProcessingInstruction(literal),
                });
            }
            other => return Err(format!("Expected node test, got {:?}", other)),
        };
        self.advance()?;
        Ok(test)
    }

    fn parse_function_args(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.current != Token::RightParen {
            args.push(self.parse_or_expr()?);
            while self.current == Token::Comma {
                self.advance()?;
                args.push(self.parse_or_expr()?);
            }
        }
        self.expect(Token::RightParen, ")")?;
        Ok(args)
    }
}

/// `base//step`, i.e. `base/descendant-or-self::node()/step`
fn descendant_path(base: Expr, step: Step) -> Expr {
    let desc = Expr::Path(Box::new(base), Box::new(Step::abbreviated(Axis::DescendantOrSelf)));
    Expr::Path(Box::new(desc), Box::new(step))
}

/// Parse an XPath expression string
pub fn parse(input: &str) -> Result<Expr, String> {
    Parser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_path() {
        let expr = parse("/root/child").unwrap();
        assert!(matches!(expr, Expr::Path(..)));
    }

    #[test]
    fn test_predicate_belongs_to_step() {
        match parse("item[@id='test']").unwrap() {
            Expr::Path(base, step) => {
                assert!(matches!(*base, Expr::Context));
                assert_eq!(step.predicates.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_filter_expression() {
        assert!(matches!(parse("(//a)[1]").unwrap(), Expr::Filter(..)));
    }

    #[test]
    fn test_abbreviations() {
        match parse("a/..").unwrap() {
            Expr::Path(_, step) => assert_eq!(step.axis, Axis::Parent),
            other => panic!("unexpected {:?}", other),
        }
        match parse("@p:x").unwrap() {
            Expr::Path(_, step) => {
                assert_eq!(step.axis, Axis::Attribute);
                assert_eq!(step.node_test, NodeTest::QName("p".into(), "x".into()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse("/").unwrap(), Expr::Root));
    }

    #[test]
    fn test_function() {
        let expr = parse("count(//item)").unwrap();
        assert!(matches!(expr, Expr::Function(name, _) if name == "count"));
    }

    #[test]
    fn test_errors() {
        assert!(parse("/a]").is_err());
        assert!(parse("a[").is_err());
        assert!(parse("$x").unwrap_err().contains("Variable"));
        assert!(parse("bogus::a").is_err());
        assert!(parse("").is_err());
    }
}
