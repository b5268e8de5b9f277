//! Row filter expressions.
//!
//! A small boolean language evaluated against the cells of each row:
//!
//! ```text
//! title contains "login" && (port == 443 || port in ["8443", "9443"])
//! not (server matches "^nginx/1\\.1[0-9]") and country != "CN"
//! ```
//!
//! Every identifier is a free variable naming a result field. Expressions are
//! parsed once into a tree; evaluation never fails, and comparisons between
//! incompatible values are simply false.

use regex::Regex;
use std::cmp::Ordering;
use thiserror::Error;

/// Deepest `!`/parenthesis nesting accepted by [`FilterExpr::compile`].
pub const MAX_NESTING: usize = 64;

/// Reasons a filter expression fails to compile.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Source contained only whitespace
    #[error("empty filter expression")]
    Empty,

    /// Lexing or parsing failed
    #[error("{message} at offset {offset}")]
    Syntax {
        /// Byte offset into the source
        offset: usize,
        /// What was expected or found
        message: String,
    },

    /// A literal `matches` pattern is not a valid regex
    #[error("invalid regex {pattern:?}: {source}")]
    Regex {
        /// The offending pattern
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },
}

/// A compiled filter expression.
#[derive(Debug)]
pub struct FilterExpr {
    root: Expr,
    vars: Vec<String>,
}

impl FilterExpr {
    /// Parse and compile `source`.
    pub fn compile(source: &str) -> Result<Self, FilterError> {
        let tokens = lex(source)?;
        if tokens.is_empty() {
            return Err(FilterError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            vars: Vec::new(),
            end: source.len(),
            depth: 0,
        };
        let root = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(FilterError::Syntax {
                offset: tok.offset,
                message: format!("unexpected {}", tok.kind.describe()),
            });
        }
        Ok(Self {
            root,
            vars: parser.vars,
        })
    }

    /// Free variables in order of first appearance.
    #[must_use]
    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    /// Evaluate with `values[i]` bound to `vars()[i]`.
    ///
    /// Missing trailing values are bound to the empty string.
    #[must_use]
    pub fn matches(&self, values: &[&str]) -> bool {
        self.root.eval(values).truthy()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Num(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
        }
    }

    fn text(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            #[allow(clippy::cast_possible_truncation)]
            Self::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Num(n) => n.to_string(),
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        let numeric = matches!(self, Self::Num(_)) || matches!(other, Self::Num(_));
        if numeric {
            return self.number()?.partial_cmp(&other.number()?);
        }
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => Some(self.text().cmp(&other.text())),
        }
    }

    fn loosely_equals(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug)]
enum Pattern {
    Fixed(Regex),
    Dynamic(Box<Expr>),
}

#[derive(Debug)]
enum Expr {
    Literal(Value),
    Var(usize),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Matches(Box<Expr>, Pattern),
    In(Box<Expr>, Vec<Expr>),
}

impl Expr {
    fn eval(&self, values: &[&str]) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Var(idx) => Value::Str(values.get(*idx).copied().unwrap_or_default().to_string()),
            Self::Not(inner) => Value::Bool(!inner.eval(values).truthy()),
            Self::And(terms) => Value::Bool(terms.iter().all(|t| t.eval(values).truthy())),
            Self::Or(terms) => Value::Bool(terms.iter().any(|t| t.eval(values).truthy())),
            Self::Compare(op, lhs, rhs) => {
                let (a, b) = (lhs.eval(values), rhs.eval(values));
                let result = match op {
                    CmpOp::Eq => a.loosely_equals(&b),
                    CmpOp::Ne => !a.loosely_equals(&b),
                    CmpOp::Lt => a.compare(&b) == Some(Ordering::Less),
                    CmpOp::Le => matches!(a.compare(&b), Some(Ordering::Less | Ordering::Equal)),
                    CmpOp::Gt => a.compare(&b) == Some(Ordering::Greater),
                    CmpOp::Ge => matches!(a.compare(&b), Some(Ordering::Greater | Ordering::Equal)),
                    CmpOp::Contains => a.text().contains(&b.text()),
                    CmpOp::StartsWith => a.text().starts_with(&b.text()),
                    CmpOp::EndsWith => a.text().ends_with(&b.text()),
                };
                Value::Bool(result)
            }
            Self::Matches(subject, pattern) => {
                let text = subject.eval(values).text();
                let hit = match pattern {
                    Pattern::Fixed(re) => re.is_match(&text),
                    Pattern::Dynamic(expr) => Regex::new(&expr.eval(values).text())
                        .map(|re| re.is_match(&text))
                        .unwrap_or(false),
                };
                Value::Bool(hit)
            }
            Self::In(subject, items) => {
                let needle = subject.eval(values);
                Value::Bool(items.iter().any(|item| needle.loosely_equals(&item.eval(values))))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Num(f64),
    Bool(bool),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Cmp(CmpOp),
    Matches,
    In,
    And,
    Or,
    Not,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::Str(s) => format!("string {s:?}"),
            Self::Num(n) => format!("number {n}"),
            Self::Bool(b) => format!("'{b}'"),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::LBracket => "'['".to_string(),
            Self::RBracket => "']'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Cmp(op) => format!("operator {op:?}"),
            Self::Matches => "'matches'".to_string(),
            Self::In => "'in'".to_string(),
            Self::And => "'&&'".to_string(),
            Self::Or => "'||'".to_string(),
            Self::Not => "'!'".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn lex(source: &str) -> Result<Vec<Token>, FilterError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let syntax = |offset: usize, message: &str| FilterError::Syntax {
        offset,
        message: message.to_string(),
    };

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        let (kind, width) = match (c, next) {
            (c, _) if c.is_whitespace() => {
                i += 1;
                continue;
            }
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('=', Some('=')) => (TokenKind::Cmp(CmpOp::Eq), 2),
            ('!', Some('=')) => (TokenKind::Cmp(CmpOp::Ne), 2),
            ('<', Some('=')) => (TokenKind::Cmp(CmpOp::Le), 2),
            ('>', Some('=')) => (TokenKind::Cmp(CmpOp::Ge), 2),
            ('<', _) => (TokenKind::Cmp(CmpOp::Lt), 1),
            ('>', _) => (TokenKind::Cmp(CmpOp::Gt), 1),
            ('&', Some('&')) => (TokenKind::And, 2),
            ('|', Some('|')) => (TokenKind::Or, 2),
            ('!', _) => (TokenKind::Not, 1),
            ('"' | '\'', _) => {
                let quote = c;
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None => return Err(syntax(offset, "unterminated string")),
                        Some(&(_, ch)) if ch == quote => break,
                        Some(&(_, '\\')) => {
                            let escaped = chars
                                .get(j + 1)
                                .ok_or_else(|| syntax(offset, "unterminated string"))?
                                .1;
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                            j += 2;
                        }
                        Some(&(_, ch)) => {
                            text.push(ch);
                            j += 1;
                        }
                    }
                }
                (TokenKind::Str(text), j + 1 - i)
            }
            (c, _) if c.is_ascii_digit() => {
                let mut j = i;
                while chars
                    .get(j)
                    .is_some_and(|&(_, ch)| ch.is_ascii_digit() || ch == '.')
                {
                    j += 1;
                }
                let literal: String = chars[i..j].iter().map(|&(_, ch)| ch).collect();
                let number = literal
                    .parse()
                    .map_err(|_| syntax(offset, &format!("invalid number '{literal}'")))?;
                (TokenKind::Num(number), j - i)
            }
            (c, _) if c.is_alphabetic() || c == '_' => {
                let mut j = i;
                while chars
                    .get(j)
                    .is_some_and(|&(_, ch)| ch.is_alphanumeric() || ch == '_' || ch == '.')
                {
                    j += 1;
                }
                let word: String = chars[i..j].iter().map(|&(_, ch)| ch).collect();
                let kind = match word.as_str() {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    "in" => TokenKind::In,
                    "true" => TokenKind::Bool(true),
                    "false" => TokenKind::Bool(false),
                    "contains" => TokenKind::Cmp(CmpOp::Contains),
                    "startsWith" => TokenKind::Cmp(CmpOp::StartsWith),
                    "endsWith" => TokenKind::Cmp(CmpOp::EndsWith),
                    "matches" => TokenKind::Matches,
                    _ => TokenKind::Ident(word),
                };
                (kind, j - i)
            }
            _ => return Err(syntax(offset, &format!("unexpected character '{c}'"))),
        };

        tokens.push(Token { kind, offset });
        i += width;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    vars: Vec<String>,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: &str) -> FilterError {
        let (offset, found) = match self.peek() {
            Some(tok) => (tok.offset, tok.kind.describe()),
            None => (self.end, "end of input".to_string()),
        };
        FilterError::Syntax {
            offset,
            message: format!("{message}, found {found}"),
        }
    }

    /// Enter one nesting level; the caller must `leave` on success.
    fn enter(&mut self) -> Result<(), FilterError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let offset = self.tokens.get(self.pos.saturating_sub(1)).map_or(self.end, |t| t.offset);
            return Err(FilterError::Syntax {
                offset,
                message: "expression nested too deeply".to_string(),
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // Chains are kept flat so a long `a && b && ...` never deepens the tree.
    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut terms = vec![self.parse_and()?];
        while self.eat(&TokenKind::Or) {
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut terms = vec![self.parse_unary()?];
        while self.eat(&TokenKind::And) {
            terms.push(self.parse_unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::And(terms)
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, FilterError> {
        if self.eat(&TokenKind::Not) {
            self.enter()?;
            let inner = self.parse_unary()?;
            self.leave();
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, FilterError> {
        let lhs = self.parse_primary()?;
        let Some(kind) = self.peek().map(|t| t.kind.clone()) else {
            return Ok(lhs);
        };

        match kind {
            TokenKind::Cmp(op) => {
                self.pos += 1;
                let rhs = self.parse_primary()?;
                Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)))
            }
            TokenKind::Matches => {
                self.pos += 1;
                let rhs = self.parse_primary()?;
                let pattern = match rhs {
                    Expr::Literal(Value::Str(pattern)) => {
                        let re = Regex::new(&pattern)
                            .map_err(|source| FilterError::Regex { pattern, source })?;
                        Pattern::Fixed(re)
                    }
                    other => Pattern::Dynamic(Box::new(other)),
                };
                Ok(Expr::Matches(Box::new(lhs), pattern))
            }
            TokenKind::In => {
                self.pos += 1;
                if !self.eat(&TokenKind::LBracket) {
                    return Err(self.error_here("expected '[' after 'in'"));
                }
                let mut items = Vec::new();
                if !self.eat(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_primary()?);
                        if self.eat(&TokenKind::RBracket) {
                            break;
                        }
                        if !self.eat(&TokenKind::Comma) {
                            return Err(self.error_here("expected ',' or ']'"));
                        }
                    }
                }
                Ok(Expr::In(Box::new(lhs), items))
            }
            _ => Ok(lhs),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, FilterError> {
        let Some(tok) = self.advance() else {
            self.pos -= 1;
            return Err(self.error_here("expected a value"));
        };

        match tok.kind {
            TokenKind::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            TokenKind::Num(n) => Ok(Expr::Literal(Value::Num(n))),
            TokenKind::Bool(b) => Ok(Expr::Literal(Value::Bool(b))),
            TokenKind::Ident(name) => Ok(Expr::Var(self.bind(name))),
            TokenKind::LParen => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.leave();
                if !self.eat(&TokenKind::RParen) {
                    return Err(self.error_here("expected ')'"));
                }
                Ok(inner)
            }
            _ => {
                self.pos -= 1;
                Err(self.error_here("expected a value"))
            }
        }
    }

    fn bind(&mut self, name: String) -> usize {
        if let Some(idx) = self.vars.iter().position(|v| *v == name) {
            idx
        } else {
            self.vars.push(name);
            self.vars.len() - 1
        }
    }
}
