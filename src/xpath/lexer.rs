//! XPath Lexer
//!
//! Tokenizes XPath expressions into tokens. `*` and the operator names
//! (`and`, `or`, `div`, `mod`) are operators only when they follow an
//! operand, so `//div` and `*` as a name test lex correctly.

/// XPath token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Operators
    Slash,       // /
    DoubleSlash, // //
    Dot,         // .
    DoubleDot,   // ..
    At,          // @
    Pipe,        // |
    Plus,        // +
    Minus,       // -
    Star,        // * as a name test
    Multiply,    // * after an operand
    Eq,          // =
    NotEq,       // !=
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=
    And,         // and
    Or,          // or
    Mod,         // mod
    Div,         // div

    // Brackets
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]

    // Literals
    Number(f64),
    String(String),

    // Names
    Name(String),     // NCName
    NameTest(String), // prefix:* or prefix:local
    NodeType(String), // node(), text(), comment(), processing-instruction()
    FunctionName(String),

    // Axis
    Axis(String), // child::, descendant::, etc.

    // Special
    DoubleColon, // ::
    Comma,       // ,
    Dollar,      // $

    // End of input
    Eof,
}

impl Token {
    /// Tokens after which `*` and operator names act as operators
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Number(_)
                | Token::String(_)
                | Token::Name(_)
                | Token::NameTest(_)
                | Token::Star
                | Token::RightParen
                | Token::RightBracket
                | Token::Dot
                | Token::DoubleDot
        )
    }
}

/// XPath lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    after_operand: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: 0,
            after_operand: false,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    /// Advance by n bytes
    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, ' ' | '\t' | '\n' | '\r') {
                self.advance(1);
            } else {
                break;
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, String> {
        let token = self.scan_token()?;
        self.after_operand = token.ends_operand();
        Ok(token)
    }

    fn scan_token(&mut self) -> Result<Token, String> {
        self.skip_whitespace();

        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };

        let simple = match c {
            '@' => Some(Token::At),
            '|' => Some(Token::Pipe),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '=' => Some(Token::Eq),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            ',' => Some(Token::Comma),
            '$' => Some(Token::Dollar),
            '*' if self.after_operand => Some(Token::Multiply),
            '*' => Some(Token::Star),
            _ => None,
        };
        if let Some(token) = simple {
            self.advance(1);
            return Ok(token);
        }

        match c {
            '/' => Ok(self.one_or_two('/', Token::Slash, Token::DoubleSlash)),
            '<' => Ok(self.one_or_two('=', Token::Lt, Token::LtEq)),
            '>' => Ok(self.one_or_two('=', Token::Gt, Token::GtEq)),
            '.' => {
                if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                    Ok(self.read_number())
                } else {
                    Ok(self.one_or_two('.', Token::Dot, Token::DoubleDot))
                }
            }
            '!' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Ok(Token::NotEq)
                } else {
                    Err("Expected '=' after '!'".to_string())
                }
            }
            ':' => {
                self.advance(1);
                if self.peek() == Some(':') {
                    self.advance(1);
                    Ok(Token::DoubleColon)
                } else {
                    Err("Unexpected ':'".to_string())
                }
            }
            '"' | '\'' => self.read_string(c),
            '0'..='9' => Ok(self.read_number()),
            _ if is_name_start_char(c) => Ok(self.read_name_or_keyword()),
            _ => Err(format!("Unexpected character '{}'", c)),
        }
    }

    fn one_or_two(&mut self, second: char, one: Token, two: Token) -> Token {
        self.advance(1);
        if self.peek() == Some(second) {
            self.advance(1);
            two
        } else {
            one
        }
    }

    /// Digits ('.' Digits?)? | '.' Digits
    fn read_number(&mut self) -> Token {
        let start = self.pos;
        self.skip_digits();
        if self.peek() == Some('.') {
            self.advance(1);
            self.skip_digits();
        }
        let value = self.input[start..self.pos].parse().unwrap_or(f64::NAN);
        Token::Number(value)
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, String> {
        self.advance(1);
        let rest = self.remaining();
        let Some(len) = rest.find(quote) else {
            return Err("Unterminated string literal".to_string());
        };
        let value = rest[..len].to_string();
        self.advance(len + 1);
        Ok(Token::String(value))
    }

    fn read_ncname(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn read_name_or_keyword(&mut self) -> Token {
        let name = self.read_ncname();

        if self.after_operand {
            match name {
                "and" => return Token::And,
                "or" => return Token::Or,
                "mod" => return Token::Mod,
                "div" => return Token::Div,
                _ => {}
            }
        }

        // prefix:local or prefix:*
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            if self.peek_at(1) == Some('*') {
                self.advance(2);
                return Token::NameTest(format!("{}:*", name));
            }
            if self.peek_at(1).is_some_and(is_name_start_char) {
                self.advance(1);
                let local = self.read_ncname();
                return Token::NameTest(format!("{}:{}", name, local));
            }
        }

        let mark = self.pos;
        self.skip_whitespace();
        if self.remaining().starts_with("::") {
            self.pos = mark;
            return Token::Axis(name.to_string());
        }
        let followed_by_paren = self.peek() == Some('(');
        self.pos = mark;
        if followed_by_paren {
            return match name {
                "node" | "text" | "comment" | "processing-instruction" => {
                    Token::NodeType(name.to_string())
                }
                _ => Token::FunctionName(name.to_string()),
            };
        }
        Token::Name(name.to_string())
    }

    /// Tokenize entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token()? {
                Token::Eof => break,
                token => tokens.push(token),
            }
        }
        Ok(tokens)
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(
            lex("/root/child"),
            vec![
                Token::Slash,
                Token::Name("root".to_string()),
                Token::Slash,
                Token::Name("child".to_string()),
            ]
        );
    }

    #[test]
    fn test_predicate() {
        let tokens = lex("item[@id='test']");
        assert_eq!(tokens[1], Token::LeftBracket);
        assert_eq!(tokens[2], Token::At);
        assert_eq!(tokens[5], Token::String("test".to_string()));
    }

    #[test]
    fn test_axis() {
        assert_eq!(
            lex("child :: element"),
            vec![
                Token::Axis("child".to_string()),
                Token::DoubleColon,
                Token::Name("element".to_string()),
            ]
        );
    }

    #[test]
    fn test_operator_names_depend_on_position() {
        assert_eq!(lex("//div")[1], Token::Name("div".to_string()));
        assert_eq!(lex("6 div 2")[1], Token::Div);
        assert_eq!(lex("a and and")[1], Token::And);
        assert_eq!(lex("a and and")[2], Token::Name("and".to_string()));
    }

    #[test]
    fn test_star() {
        assert_eq!(lex("*")[0], Token::Star);
        assert_eq!(lex("2 * 3")[1], Token::Multiply);
        assert_eq!(lex("a/*")[2], Token::Star);
    }

    #[test]
    fn test_names() {
        assert_eq!(lex("p:a")[0], Token::NameTest("p:a".to_string()));
        assert_eq!(lex("p:*")[0], Token::NameTest("p:*".to_string()));
        assert_eq!(lex("count(a)")[0], Token::FunctionName("count".to_string()));
        assert_eq!(lex("text()")[0], Token::NodeType("text".to_string()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex(".5")[0], Token::Number(0.5));
        assert_eq!(lex("1.")[0], Token::Number(1.0));
        assert_eq!(lex("position() = 12")[4], Token::Number(12.0));
    }

    #[test]
    fn test_errors() {
        assert!(Lexer::new("'open").tokenize().is_err());
        assert!(Lexer::new("a ! b").tokenize().is_err());
        assert!(Lexer::new("#").tokenize().is_err());
    }
}
