//! Expression lexer and recursive-descent parser

use crate::error::ExprError;
use std::fmt;

/// Binary operators, lowest precedence first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne | Self::Gt | Self::Ge | Self::Lt | Self::Le => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::Mod => 5,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(f64),
    String(String),
    Func {
        name: String,
        args: Vec<Node>,
        offset: usize,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Number(n) => write!(f, "{}", n),
            Node::String(s) => write!(f, "{:?}", s),
            Node::Func { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Node::Unary { op, arg } => write!(f, "{}{}", op.symbol(), arg),
            Node::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    String(String),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Not,
    Op(BinaryOp),
    Eof,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn syntax<T>(&self, offset: usize, message: impl Into<String>) -> Result<T, ExprError> {
        Err(ExprError::Syntax {
            offset,
            message: message.into(),
        })
    }

    fn next_token(&mut self) -> Result<(Token, usize), ExprError> {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        let start = self.pos;
        let Some(&c) = bytes.get(self.pos) else {
            return Ok((Token::Eof, start));
        };

        let two = |next: u8| bytes.get(start + 1) == Some(&next);
        let (token, len) = match c {
            b'(' => (Token::LParen, 1),
            b')' => (Token::RParen, 1),
            b',' => (Token::Comma, 1),
            b'+' => (Token::Op(BinaryOp::Add), 1),
            b'-' => (Token::Op(BinaryOp::Sub), 1),
            b'*' => (Token::Op(BinaryOp::Mul), 1),
            b'/' => (Token::Op(BinaryOp::Div), 1),
            b'%' => (Token::Op(BinaryOp::Mod), 1),
            b'|' if two(b'|') => (Token::Op(BinaryOp::Or), 2),
            b'&' if two(b'&') => (Token::Op(BinaryOp::And), 2),
            b'=' if two(b'=') => (Token::Op(BinaryOp::Eq), 2),
            b'!' if two(b'=') => (Token::Op(BinaryOp::Ne), 2),
            b'!' => (Token::Not, 1),
            b'>' if two(b'=') => (Token::Op(BinaryOp::Ge), 2),
            b'>' => (Token::Op(BinaryOp::Gt), 1),
            b'<' if two(b'=') => (Token::Op(BinaryOp::Le), 2),
            b'<' => (Token::Op(BinaryOp::Lt), 1),
            b'"' => return self.lex_string(start),
            b'0'..=b'9' | b'.' => return self.lex_number(start),
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let mut end = start;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                self.pos = end;
                return Ok((Token::Ident(self.src[start..end].to_string()), start));
            }
            _ => {
                let ch = self.src[start..].chars().next().unwrap_or('?');
                return self.syntax(start, format!("unexpected character {:?}", ch));
            }
        };
        self.pos += len;
        Ok((token, start))
    }

    fn lex_string(&mut self, start: usize) -> Result<(Token, usize), ExprError> {
        let mut out = String::new();
        let mut chars = self.src[start + 1..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos = start + 1 + i + 1;
                    return Ok((Token::String(out), start));
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c => out.push(c),
            }
        }
        self.syntax(start, "unterminated string")
    }

    fn lex_number(&mut self, start: usize) -> Result<(Token, usize), ExprError> {
        let bytes = self.src.as_bytes();
        let mut end = start;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
            end += 1;
        }
        if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut exp = end + 1;
            if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
                exp += 1;
            }
            if exp < bytes.len() && bytes[exp].is_ascii_digit() {
                end = exp;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
            }
        }
        let text = &self.src[start..end];
        let value: f64 = match text.parse() {
            Ok(v) => v,
            Err(_) => return self.syntax(start, format!("bad number {:?}", text)),
        };
        self.pos = end;
        Ok((Token::Number(value), start))
    }
}

/// Deepest syntax tree the parser will build
const MAX_NESTING: usize = 256;

/// Parser with one token of lookahead
struct Parser<'a> {
    lexer: Lexer<'a>,
    token: Token,
    offset: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Result<Self, ExprError> {
        let mut lexer = Lexer { src, pos: 0 };
        let (token, offset) = lexer.next_token()?;
        Ok(Self {
            lexer,
            token,
            offset,
            depth: 0,
        })
    }

    fn descend(&mut self, levels: usize) -> Result<(), ExprError> {
        self.depth += levels;
        if self.depth > MAX_NESTING {
            return self.lexer.syntax(self.offset, "expression nested too deeply");
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<Token, ExprError> {
        let (next, offset) = self.lexer.next_token()?;
        self.offset = offset;
        Ok(std::mem::replace(&mut self.token, next))
    }

    fn unexpected<T>(&self) -> Result<T, ExprError> {
        let message = match &self.token {
            Token::Eof => "unexpected end of expression".to_string(),
            t => format!("unexpected {:?}", t),
        };
        self.lexer.syntax(self.offset, message)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Node, ExprError> {
        self.descend(1)?;
        let mut levels = 1;
        let mut left = self.parse_unary()?;
        while let Token::Op(op) = self.token {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            // each operator in a chain deepens the left operand
            self.descend(1)?;
            levels += 1;
            self.advance()?;
            let right = self.parse_binary(prec + 1)?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= levels;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, ExprError> {
        let op = match self.token {
            Token::Op(BinaryOp::Sub) => UnaryOp::Neg,
            Token::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.descend(1)?;
        self.advance()?;
        let arg = self.parse_unary()?;
        self.depth -= 1;
        Ok(Node::Unary {
            op,
            arg: Box::new(arg),
        })
    }

    fn parse_primary(&mut self) -> Result<Node, ExprError> {
        let offset = self.offset;
        match self.token.clone() {
            Token::Number(n) => {
                self.advance()?;
                Ok(Node::Number(n))
            }
            Token::String(s) => {
                self.advance()?;
                Ok(Node::String(s))
            }
            Token::LParen => {
                self.advance()?;
                let inner = self.parse_binary(1)?;
                if self.token != Token::RParen {
                    return self.unexpected();
                }
                self.advance()?;
                Ok(inner)
            }
            Token::Ident(name) => {
                self.advance()?;
                if self.token != Token::LParen {
                    return self.lexer.syntax(offset, format!("{} is not a function call", name));
                }
                self.advance()?;
                let mut args = Vec::new();
                if self.token != Token::RParen {
                    loop {
                        args.push(self.parse_binary(1)?);
                        match self.token {
                            Token::Comma => {
                                self.advance()?;
                            }
                            Token::RParen => break,
                            _ => return self.unexpected(),
                        }
                    }
                }
                self.advance()?;
                Ok(Node::Func { name, args, offset })
            }
            _ => self.unexpected(),
        }
    }
}

/// Parse expression text into a syntax tree
pub fn parse(src: &str) -> Result<Node, ExprError> {
    let mut parser = Parser::new(src)?;
    let node = parser.parse_binary(1)?;
    if parser.token != Token::Eof {
        return parser.unexpected();
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let node = parse("1 + 2 * 3 > 4 && 1").unwrap();
        assert_eq!(node.to_string(), "(((1 + (2 * 3)) > 4) && 1)");
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(parse("8 - 2 - 1").unwrap().to_string(), "((8 - 2) - 1)");
    }

    #[test]
    fn test_function_call() {
        let node = parse(r#"avg(q("sum:os.cpu{host=*}", "5m", "")) > 80"#).unwrap();
        match node {
            Node::Binary { op, left, .. } => {
                assert_eq!(op, BinaryOp::Gt);
                match *left {
                    Node::Func { ref name, ref args, .. } => {
                        assert_eq!(name, "avg");
                        assert_eq!(args.len(), 1);
                    }
                    ref other => panic!("expected call, got {:?}", other),
                }
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_and_parens() {
        assert_eq!(parse("-(1 + 2)").unwrap().to_string(), "-(1 + 2)");
        assert_eq!(parse("!1").unwrap().to_string(), "!1");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse("1.5e3").unwrap(), Node::Number(1500.0));
        assert_eq!(parse(".5").unwrap(), Node::Number(0.5));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            parse(r#""a\"b""#).unwrap(),
            Node::String("a\"b".to_string())
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("avg(1").is_err());
        assert!(parse("foo").is_err());
        assert!(parse("\"open").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("1 $ 2").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let err = parse(&deep).unwrap_err();
        assert!(matches!(
            err,
            ExprError::Syntax { ref message, .. } if message == "expression nested too deeply"
        ));

        assert!(parse(&format!("{}1", "-".repeat(10_000))).is_err());
        assert!(parse(&format!("1{}", " + 1".repeat(10_000))).is_err());
        assert!(parse(&format!("avg({}1{})", "abs(".repeat(10_000), ")".repeat(10_000))).is_err());

        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse(&shallow).unwrap(), Node::Number(1.0));
    }
}
