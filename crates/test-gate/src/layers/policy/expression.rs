//! Marker / keyword expressions.
//!
//! Only boolean combinations of bare identifiers are accepted:
//!
//! ```text
//! expr  := or
//! or    := and ("or" and)*
//! and   := unary ("and" unary)*
//! unary := "not" unary | "(" expr ")" | IDENT
//! IDENT := [A-Za-z0-9_]+
//! ```
//!
//! The runner receives the canonical rendering of the parse tree, never the
//! caller's original text.

use std::fmt;

const MAX_EXPRESSION_LEN: usize = 512;
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expr {
    Ident(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    rendered: String,
}

impl FilterExpression {
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        let tree = parse_tree(input)?;
        Ok(Self {
            rendered: render(&tree, Precedence::Or),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

pub(crate) fn parse_tree(input: &str) -> Result<Expr, ExpressionError> {
    if input.len() > MAX_EXPRESSION_LEN {
        return Err(ExpressionError::new(
            MAX_EXPRESSION_LEN,
            format!("expression longer than {MAX_EXPRESSION_LEN} characters"),
        ));
    }
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExpressionError::new(0, "expression is empty"));
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        end: input.len(),
    };
    let tree = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(ExpressionError::new(
            token.offset,
            format!("unexpected {}", token.kind),
        ));
    }
    Ok(tree)
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionError {
    pub offset: usize,
    pub message: String,
}

impl ExpressionError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier {name:?}"),
            Self::And => f.write_str("'and'"),
            Self::Or => f.write_str("'or'"),
            Self::Not => f.write_str("'not'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(offset, ch)) = chars.peek() {
        if ch == ' ' || ch == '\t' {
            chars.next();
            continue;
        }
        if ch == '(' || ch == ')' {
            chars.next();
            let kind = if ch == '(' {
                TokenKind::LParen
            } else {
                TokenKind::RParen
            };
            tokens.push(Token { kind, offset });
            continue;
        }
        if is_ident_char(ch) {
            let mut word = String::new();
            while let Some(&(_, next)) = chars.peek() {
                if !is_ident_char(next) {
                    break;
                }
                word.push(next);
                chars.next();
            }
            let kind = match word.as_str() {
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                _ => TokenKind::Ident(word),
            };
            tokens.push(Token { kind, offset });
            continue;
        }
        return Err(ExpressionError::new(
            offset,
            format!("unexpected character {ch:?}"),
        ));
    }
    Ok(tokens)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next_if(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|token| &token.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.next_if(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        while self.next_if(&TokenKind::And) {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let offset = self.peek().map(|token| token.offset).unwrap_or(self.end);
            return Err(ExpressionError::new(offset, "expression nested too deeply"));
        }
        let result = self.parse_unary_inner();
        self.depth -= 1;
        result
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, ExpressionError> {
        let Some(token) = self.peek().cloned() else {
            return Err(ExpressionError::new(self.end, "unexpected end of expression"));
        };
        self.pos += 1;
        match token.kind {
            TokenKind::Not => Ok(Expr::Not(Box::new(self.parse_unary()?))),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                if !self.next_if(&TokenKind::RParen) {
                    let offset = self.peek().map(|token| token.offset).unwrap_or(self.end);
                    return Err(ExpressionError::new(offset, "expected ')'"));
                }
                Ok(inner)
            }
            TokenKind::Ident(name) => Ok(Expr::Ident(name)),
            other => Err(ExpressionError::new(
                token.offset,
                format!("unexpected {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Or,
    And,
    Unary,
}

fn render(expr: &Expr, context: Precedence) -> String {
    let (text, own) = match expr {
        Expr::Ident(name) => (name.clone(), Precedence::Unary),
        Expr::Not(inner) => (
            format!("not {}", render(inner, Precedence::Unary)),
            Precedence::Unary,
        ),
        Expr::And(left, right) => (
            format!(
                "{} and {}",
                render(left, Precedence::And),
                render(right, Precedence::Unary)
            ),
            Precedence::And,
        ),
        Expr::Or(left, right) => (
            format!(
                "{} or {}",
                render(left, Precedence::Or),
                render(right, Precedence::And)
            ),
            Precedence::Or,
        ),
    };
    if own < context {
        format!("({text})")
    } else {
        text
    }
}
