//! Recursive descent parser for filter/select expressions
//!
//! Precedence, lowest first:
//!
//! ```text
//! cond ? a : b
//! ||
//! &&
//! == != < <= > >= in
//! + -
//! * / %
//! ! -            (unary)
//! . [] ()        (member, index, call)
//! ```

use super::error::CompileError;
use super::lexer::{Lexer, SpannedToken, Token};
use super::MAX_DEPTH;

/// Expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    List(Vec<Expr>),
    /// Map literal, string keys only
    Map(Vec<(String, Expr)>),
    Ident(String),
    Member {
        expr: Box<Expr>,
        field: String,
    },
    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
    },
    /// `has(expr.field)`
    Has {
        expr: Box<Expr>,
        field: String,
    },
    /// Global call `f(args)` or method call `target.f(args)`
    Call {
        name: String,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

/// Parse an expression source string into an AST
pub fn parse(source: &str) -> Result<Expr, CompileError> {
    let mut parser = Parser::new(source);
    let expr = parser.parse_expr()?;
    parser.consume(&Token::Eof, "end of expression")?;
    Ok(expr)
}

/// Parser state
struct Parser<'source> {
    lexer: Lexer<'source>,
    current: SpannedToken,
    previous: SpannedToken,
    /// Nesting depth of the node currently being built
    depth: usize,
}

impl<'source> Parser<'source> {
    fn new(source: &'source str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next().unwrap_or(SpannedToken {
            token: Token::Eof,
            start: 0,
            end: 0,
        });
        Self {
            lexer,
            current: current.clone(),
            previous: current,
            depth: 0,
        }
    }

    fn advance(&mut self) {
        self.previous = self.current.clone();
        self.current = self.lexer.next().unwrap_or(SpannedToken {
            token: Token::Eof,
            start: self.previous.end,
            end: self.previous.end,
        });
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(&self.current.token) == std::mem::discriminant(token)
    }

    fn consume(&mut self, expected: &Token, msg: &str) -> Result<SpannedToken, CompileError> {
        if self.check(expected) {
            let tok = self.current.clone();
            self.advance();
            Ok(tok)
        } else {
            Err(self.unexpected(msg))
        }
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        CompileError::UnexpectedToken {
            position: self.current.start,
            expected: expected.to_string(),
            found: self.current.token.to_string(),
        }
    }

    /// Go one level deeper, failing past `MAX_DEPTH`
    fn descend(&mut self) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(CompileError::TooDeep(MAX_DEPTH))
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        let base = self.depth;
        self.descend()?;
        let expr = self.parse_conditional_expr();
        self.depth = base;
        expr
    }

    fn parse_conditional_expr(&mut self) -> Result<Expr, CompileError> {
        let cond = self.parse_or_expr()?;
        if !self.match_token(&Token::Question) {
            return Ok(cond);
        }
        let then = self.parse_or_expr()?;
        self.consume(&Token::Colon, ":")?;
        // Right-associative: a ? b : c ? d : e
        let otherwise = self.parse_expr()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or_expr(&mut self) -> Result<Expr, CompileError> {
        let base = self.depth;
        let mut left = self.parse_and_expr()?;
        while self.match_token(&Token::OrOr) {
            self.descend()?;
            let right = self.parse_and_expr()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, CompileError> {
        let base = self.depth;
        let mut left = self.parse_relation_expr()?;
        while self.match_token(&Token::AndAnd) {
            self.descend()?;
            let right = self.parse_relation_expr()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_relation_expr(&mut self) -> Result<Expr, CompileError> {
        let base = self.depth;
        let mut left = self.parse_additive_expr()?;
        loop {
            let op = match &self.current.token {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                Token::In => BinOp::In,
                _ => break,
            };
            self.advance();
            self.descend()?;
            let right = self.parse_additive_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, CompileError> {
        let base = self.depth;
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match &self.current.token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            self.descend()?;
            let right = self.parse_multiplicative_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr, CompileError> {
        let base = self.depth;
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match &self.current.token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            self.descend()?;
            let right = self.parse_unary_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, CompileError> {
        let op = match &self.current.token {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix_expr(),
        };
        self.advance();

        let base = self.depth;
        self.descend()?;
        let expr = self.parse_unary_expr()?;
        self.depth = base;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, CompileError> {
        let base = self.depth;
        let mut expr = self.parse_primary_expr()?;

        loop {
            if self.match_token(&Token::Dot) {
                self.descend()?;
                let field = self.parse_identifier()?;
                if self.match_token(&Token::LParen) {
                    let args = self.parse_arg_list(&Token::RParen, ")")?;
                    expr = Expr::Call {
                        name: field,
                        target: Some(Box::new(expr)),
                        args,
                    };
                } else {
                    expr = Expr::Member {
                        expr: Box::new(expr),
                        field,
                    };
                }
            } else if self.match_token(&Token::LBracket) {
                self.descend()?;
                let index = self.parse_expr()?;
                self.consume(&Token::RBracket, "]")?;
                expr = Expr::Index {
                    expr: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }

        self.depth = base;
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, CompileError> {
        match &self.current.token {
            Token::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            Token::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Integer(n) => {
                let n = *n;
                self.advance();
                Ok(Expr::Int(n))
            }
            Token::Double(n) => {
                let n = *n;
                self.advance();
                Ok(Expr::Double(n))
            }
            Token::String(raw) => {
                let s = unescape(raw)?;
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                if self.match_token(&Token::LParen) {
                    let args = self.parse_arg_list(&Token::RParen, ")")?;
                    if name == "has" {
                        return into_has(args);
                    }
                    Ok(Expr::Call {
                        name,
                        target: None,
                        args,
                    })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.consume(&Token::RParen, ")")?;
                Ok(expr)
            }
            Token::LBracket => {
                self.advance();
                let items = self.parse_arg_list(&Token::RBracket, "]")?;
                Ok(Expr::List(items))
            }
            Token::LBrace => {
                self.advance();
                self.parse_map_literal()
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Comma-separated expressions up to `close` (already past the opener)
    fn parse_arg_list(&mut self, close: &Token, msg: &str) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if self.match_token(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
            // Trailing comma
            if self.check(close) {
                break;
            }
        }
        self.consume(close, msg)?;
        Ok(args)
    }

    fn parse_map_literal(&mut self) -> Result<Expr, CompileError> {
        let mut entries = Vec::new();
        if self.match_token(&Token::RBrace) {
            return Ok(Expr::Map(entries));
        }
        loop {
            let key = match &self.current.token {
                Token::String(raw) => unescape(raw)?,
                _ => return Err(self.unexpected("string map key")),
            };
            self.advance();
            self.consume(&Token::Colon, ":")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.match_token(&Token::Comma) || self.check(&Token::RBrace) {
                break;
            }
        }
        self.consume(&Token::RBrace, "}")?;
        Ok(Expr::Map(entries))
    }

    fn parse_identifier(&mut self) -> Result<String, CompileError> {
        match &self.current.token {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }
}

fn into_has(mut args: Vec<Expr>) -> Result<Expr, CompileError> {
    if args.len() != 1 {
        return Err(CompileError::Arity {
            name: "has".to_string(),
            expected: 1,
            found: args.len(),
        });
    }
    match args.pop() {
        Some(Expr::Member { expr, field }) => Ok(Expr::Has { expr, field }),
        _ => Err(CompileError::InvalidHas),
    }
}

/// Resolve escape sequences in a raw string literal body
fn unescape(raw: &str) -> Result<String, CompileError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => return Err(CompileError::InvalidEscape(other.to_string())),
            None => return Err(CompileError::InvalidEscape(String::new())),
        }
    }
    Ok(out)
}
