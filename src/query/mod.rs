//! NRQL Query Parser
//!
//! Turns query text into a typed AST:
//!
//! - **Lexer**: lazy tokenizer with line/column tracking
//! - **Parser**: recursive descent over clauses, precedence climbing for
//!   expressions, a separate grammar for time values
//! - **AST**: owned, serializable query tree with a canonical `Display`
//!
//! # Query Language
//!
//! ```text
//! SELECT function(args) [AS 'alias'] [, ...]
//! FROM EventType [, ...]
//! [WHERE condition]
//! [FACET attribute [, ...]]
//! [LIMIT n]
//! [SINCE n units AGO | TODAY | YESTERDAY | NOW | 'timestamp']
//! [UNTIL ...]
//! [COMPARE WITH ...]
//! [TIMESERIES AUTO | n unit]
//! ```
//!
//! # Examples
//!
//! ```rust
//! use nrql::query::{parse_query, TimeSpec, TimeUnit};
//!
//! let query = parse_query("SELECT average(duration) FROM PageView SINCE 1 week ago").unwrap();
//! assert_eq!(query.from, vec!["PageView".to_string()]);
//! assert_eq!(query.since, Some(TimeSpec::ago(1, TimeUnit::Week)));
//! ```
//!
//! Errors carry the position of the offending input:
//!
//! ```rust
//! use nrql::query::parse_query;
//!
//! let err = parse_query("SELECT FROM PageView").unwrap_err();
//! assert_eq!((err.line(), err.column()), (1, 8));
//! ```

mod ast;
mod error;
mod format;
mod keywords;
mod lexer;
mod parser;
mod token;

pub use ast::{
    Anchor, BinaryOperator, Clause, Direction, Expression, Literal, Number, Query, SelectItem,
    TimeSpec, TimeUnit, TimeseriesSpec, UnaryOperator,
};
pub use error::{QueryError, QueryResult};
pub use keywords::lookup_keyword;
pub use lexer::{tokenize, Lexer};
pub use parser::{parse_query, parse_query_with, ParseOptions, DEFAULT_MAX_DEPTH};
pub use token::{Keyword, Operator, Punctuation, Token, TokenKind, TokenValue};
