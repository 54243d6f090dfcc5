//! Token types
//!
//! Tokens borrow their lexeme from the query string and carry the 1-based
//! line and column of their first character.

use std::borrow::Cow;
use std::fmt;

use crate::query::ast::Number;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    /// The kind of token
    pub kind: TokenKind,
    /// The raw text of the token, quotes included
    pub text: &'a str,
    /// Decoded value for numbers, strings and identifiers
    pub value: TokenValue<'a>,
    /// Line of the first character (1-based)
    pub line: u32,
    /// Column of the first character (1-based, in characters)
    pub column: u32,
}

impl<'a> Token<'a> {
    /// Create a token without a decoded value
    pub fn new(kind: TokenKind, text: &'a str, line: u32, column: u32) -> Self {
        Self {
            kind,
            text,
            value: TokenValue::None,
            line,
            column,
        }
    }

    /// Attach a decoded value
    pub fn with_value(mut self, value: TokenValue<'a>) -> Self {
        self.value = value;
        self
    }

    /// Whether this is the given keyword
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    /// Whether this is the end-of-input marker
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Name of an identifier-like token.
    ///
    /// Plain and backtick-quoted identifiers qualify, and so do contextual
    /// keywords such as `day` or `now`, which double as attribute names.
    pub fn identifier(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Identifier => match &self.value {
                TokenValue::Str(name) => Some(name.as_ref()),
                _ => Some(self.text),
            },
            TokenKind::Keyword(k) if !k.is_reserved() => Some(self.text),
            _ => None,
        }
    }

    /// Decoded contents of a string literal
    pub fn string(&self) -> Option<&str> {
        match (&self.kind, &self.value) {
            (TokenKind::String, TokenValue::Str(s)) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Numeric value of a number literal
    pub fn number(&self) -> Option<Number> {
        match (&self.kind, &self.value) {
            (TokenKind::Number, TokenValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Short description used in diagnostics
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Keyword(k) => format!("keyword {}", k),
            TokenKind::Identifier => format!("identifier {}", self.text),
            TokenKind::Number => format!("number {}", self.text),
            TokenKind::String => format!("string {}", self.text),
            TokenKind::Operator(_) | TokenKind::Punctuation(_) => format!("'{}'", self.text),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Decoded token payload
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue<'a> {
    /// No payload (keywords, operators, punctuation)
    None,
    /// Number literal
    Number(Number),
    /// Unescaped string literal or backtick identifier
    Str(Cow<'a, str>),
}

/// The kind of token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier,
    Number,
    String,
    Operator(Operator),
    Punctuation(Punctuation),
    /// End of input, emitted exactly once
    Eof,
}

/// Operator symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
        }
    }
}

/// Punctuation symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punctuation {
    Comma,
    LeftParen,
    RightParen,
}

impl Punctuation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Comma => ",",
            Self::LeftParen => "(",
            Self::RightParen => ")",
        }
    }
}

/// Language keywords, matched case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    In,
    Like,
    As,
    Facet,
    Limit,
    Since,
    Until,
    Ago,
    Compare,
    With,
    Timeseries,
    Auto,
    Today,
    Yesterday,
    Now,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl Keyword {
    /// Canonical upper-case spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::Where => "WHERE",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::In => "IN",
            Self::Like => "LIKE",
            Self::As => "AS",
            Self::Facet => "FACET",
            Self::Limit => "LIMIT",
            Self::Since => "SINCE",
            Self::Until => "UNTIL",
            Self::Ago => "AGO",
            Self::Compare => "COMPARE",
            Self::With => "WITH",
            Self::Timeseries => "TIMESERIES",
            Self::Auto => "AUTO",
            Self::Today => "TODAY",
            Self::Yesterday => "YESTERDAY",
            Self::Now => "NOW",
            Self::Second => "SECOND",
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Week => "WEEK",
            Self::Month => "MONTH",
        }
    }

    /// Reserved keywords can never be used as bare identifiers.
    ///
    /// The rest only mean something right after SINCE, UNTIL, COMPARE or
    /// TIMESERIES and are plain attribute names everywhere else.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Self::Select
                | Self::From
                | Self::Where
                | Self::And
                | Self::Or
                | Self::Not
                | Self::In
                | Self::Like
                | Self::As
                | Self::Facet
                | Self::Limit
                | Self::Since
                | Self::Until
                | Self::Compare
                | Self::Timeseries
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
