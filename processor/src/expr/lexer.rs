//! Lexer for filter/select expressions using Logos

use logos::Logos;
use std::fmt;

/// Expression token
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // === Keywords ===
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("in")]
    In,

    // === Operators ===
    #[token("||")]
    OrOr,
    #[token("&&")]
    AndAnd,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Bang,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // === Literals ===
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Double(f64),

    /// String literal body, quotes stripped and escapes still raw
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        Some(s[1..s.len()-1].to_string())
    })]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| {
        let s = lex.slice();
        Some(s[1..s.len()-1].to_string())
    })]
    String(String),

    // === Identifier ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| Some(lex.slice().to_string()))]
    Ident(String),

    // === Special ===
    /// Text the lexer could not match (or an out-of-range number)
    Invalid(String),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::In => write!(f, "in"),
            Token::OrOr => write!(f, "||"),
            Token::AndAnd => write!(f, "&&"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Le => write!(f, "<="),
            Token::Ge => write!(f, ">="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Bang => write!(f, "!"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Integer(n) => write!(f, "{}", n),
            Token::Double(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Invalid(s) => write!(f, "'{}'", s),
            Token::Eof => write!(f, "end of expression"),
        }
    }
}

/// Token with its byte span in the source
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Lexer wrapper that produces spanned tokens, ending with a single `Eof`
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    eof_emitted: bool,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            eof_emitted: false,
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = SpannedToken;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(Ok(token)) => {
                let span = self.inner.span();
                Some(SpannedToken {
                    token,
                    start: span.start,
                    end: span.end,
                })
            }
            Some(Err(())) => {
                let span = self.inner.span();
                Some(SpannedToken {
                    token: Token::Invalid(self.inner.slice().to_string()),
                    start: span.start,
                    end: span.end,
                })
            }
            None if !self.eof_emitted => {
                self.eof_emitted = true;
                let pos = self.inner.span().end;
                Some(SpannedToken {
                    token: Token::Eof,
                    start: pos,
                    end: pos,
                })
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<SpannedToken> {
        Lexer::new(source).collect()
    }

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source).into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_comparison() {
        assert_eq!(
            tokens("orders.x > 0"),
            vec![
                Token::Ident("orders".to_string()),
                Token::Dot,
                Token::Ident("x".to_string()),
                Token::Gt,
                Token::Integer(0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_win_over_identifiers() {
        assert_eq!(
            tokens("true in inside"),
            vec![
                Token::True,
                Token::In,
                Token::Ident("inside".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("42 3.5 1e3"),
            vec![
                Token::Integer(42),
                Token::Double(3.5),
                Token::Double(1000.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_keep_raw_escapes() {
        assert_eq!(
            tokens(r#""a\"b" 'c'"#),
            vec![
                Token::String(r#"a\"b"#.to_string()),
                Token::String("c".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_logical_operators() {
        assert_eq!(
            tokens("!a && b || c"),
            vec![
                Token::Bang,
                Token::Ident("a".to_string()),
                Token::AndAnd,
                Token::Ident("b".to_string()),
                Token::OrOr,
                Token::Ident("c".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_invalid_character() {
        let toks = tokens("a # b");
        assert_eq!(toks[1], Token::Invalid("#".to_string()));
    }

    #[test]
    fn test_integer_overflow_is_invalid() {
        let toks = tokens("99999999999999999999");
        assert!(matches!(toks[0], Token::Invalid(_)));
    }

    #[test]
    fn test_spans() {
        let toks = tokenize("ab == 1");
        assert_eq!((toks[0].start, toks[0].end), (0, 2));
        assert_eq!((toks[1].start, toks[1].end), (3, 5));
        assert_eq!(toks[3].token, Token::Eof);
        assert_eq!(toks[3].start, 7);
    }
}
