//! Query Parser
//!
//! Parses query strings into the [`Query`] AST.
//!
//! # Supported Syntax
//!
//! ```text
//! SELECT function(args) [AS 'alias'] [, ...]
//! FROM EventType [, ...]
//! [WHERE condition]
//! [FACET attribute [, ...]]
//! [LIMIT n]
//! [SINCE time]
//! [UNTIL time]
//! [COMPARE WITH time]
//! [TIMESERIES AUTO | n unit]
//! ```
//!
//! Clauses must appear in this order and at most once. Parsing stops at the
//! first error; see [`QueryError`] for the three error kinds.
//!
//! The grammar is split by concern:
//!
//! - `expr`: WHERE conditions, function arguments and select arithmetic
//! - `time`: SINCE / UNTIL / COMPARE WITH values
//! - `clause`: one parser per clause, dispatched through [`CLAUSES`]

mod clause;
mod expr;
mod time;

use std::collections::VecDeque;

use crate::query::ast::{Clause, Query};
use crate::query::error::{QueryError, QueryResult};
use crate::query::lexer::Lexer;
use crate::query::token::{Keyword, Punctuation, Token, TokenKind};

/// Default bound on expression nesting
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Tuning knobs for a parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Deepest allowed nesting of parentheses, calls and prefix operators
    pub max_depth: usize,
    /// Longest accepted query, in bytes
    pub max_query_length: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_query_length: usize::MAX,
        }
    }
}

/// Parse a query string into a Query AST
pub fn parse_query(input: &str) -> QueryResult<Query> {
    parse_query_with(input, &ParseOptions::default())
}

/// Parse a query string with explicit options
pub fn parse_query_with(input: &str, options: &ParseOptions) -> QueryResult<Query> {
    tracing::debug!(length = input.len(), "parsing query");

    let mut parser = Parser::new(input, options);
    let result = parser.parse_query();

    match &result {
        Ok(query) => tracing::debug!(clauses = ?query.clauses(), "query parsed"),
        Err(e) => tracing::debug!(line = e.line(), column = e.column(), error = %e, "query rejected"),
    }

    result
}

/// Signature shared by the optional clause parsers
type ClauseParser = fn(&mut Parser<'_>, &mut Query) -> QueryResult<()>;

/// An entry of the clause dispatch table
struct ClauseEntry {
    keyword: Keyword,
    clause: Clause,
    parse: ClauseParser,
}

/// Clauses that may follow FROM, in canonical order.
///
/// The assembler consults this table once per clause boundary.
const CLAUSES: [ClauseEntry; 7] = [
    ClauseEntry {
        keyword: Keyword::Where,
        clause: Clause::Where,
        parse: clause::where_clause,
    },
    ClauseEntry {
        keyword: Keyword::Facet,
        clause: Clause::Facet,
        parse: clause::facet_clause,
    },
    ClauseEntry {
        keyword: Keyword::Limit,
        clause: Clause::Limit,
        parse: clause::limit_clause,
    },
    ClauseEntry {
        keyword: Keyword::Since,
        clause: Clause::Since,
        parse: clause::since_clause,
    },
    ClauseEntry {
        keyword: Keyword::Until,
        clause: Clause::Until,
        parse: clause::until_clause,
    },
    ClauseEntry {
        keyword: Keyword::Compare,
        clause: Clause::CompareWith,
        parse: clause::compare_with_clause,
    },
    ClauseEntry {
        keyword: Keyword::Timeseries,
        clause: Clause::Timeseries,
        parse: clause::timeseries_clause,
    },
];

/// Single-owner cursor over the lexer with a lookahead buffer.
///
/// The EOF token is never popped, so peeking past the end keeps returning it.
struct TokenStream<'a> {
    lexer: Lexer<'a>,
    lookahead: VecDeque<Token<'a>>,
    failed: Option<QueryError>,
}

impl<'a> TokenStream<'a> {
    fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            lookahead: VecDeque::with_capacity(2),
            failed: None,
        }
    }

    fn fill(&mut self) -> QueryResult<()> {
        if !self.lookahead.is_empty() {
            return Ok(());
        }
        if let Some(e) = &self.failed {
            return Err(e.clone());
        }

        match self.lexer.next() {
            Some(Ok(token)) => {
                self.lookahead.push_back(token);
                Ok(())
            }
            Some(Err(e)) => {
                self.failed = Some(e.clone());
                Err(e)
            }
            None => Err(unreachable_stream_end()),
        }
    }

    fn peek(&mut self) -> QueryResult<&Token<'a>> {
        self.fill()?;
        self.lookahead.front().ok_or_else(unreachable_stream_end)
    }

    fn next(&mut self) -> QueryResult<Token<'a>> {
        self.fill()?;
        if self.lookahead.front().is_some_and(Token::is_eof) {
            return self.lookahead.front().cloned().ok_or_else(unreachable_stream_end);
        }
        self.lookahead.pop_front().ok_or_else(unreachable_stream_end)
    }
}

/// The lexer ended without an EOF token, which only follows a lex error
fn unreachable_stream_end() -> QueryError {
    QueryError::Parse {
        line: 0,
        column: 0,
        expected: vec!["token".to_string()],
        found: "exhausted token stream".to_string(),
    }
}

/// Recursive-descent parser state for one query
pub(crate) struct Parser<'a> {
    tokens: TokenStream<'a>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, options: &ParseOptions) -> Self {
        Self {
            tokens: TokenStream::new(Lexer::with_max_length(input, options.max_query_length)),
            depth: 0,
            max_depth: options.max_depth,
        }
    }

    /// Assemble the query, enforcing clause order
    fn parse_query(&mut self) -> QueryResult<Query> {
        self.expect_keyword(Keyword::Select)?;
        let select = self.parse_select_list()?;

        self.expect_keyword(Keyword::From)?;
        let from = self.parse_identifier_list("event type")?;

        let mut query = Query::new(select, from);
        let mut last = Clause::From;

        loop {
            let token = self.peek()?.clone();
            if token.is_eof() {
                return Ok(query);
            }

            let entry = match token.kind {
                TokenKind::Keyword(keyword) => CLAUSES
                    .iter()
                    .filter(|entry| entry.clause > last)
                    .find(|entry| entry.keyword == keyword),
                _ => None,
            };

            let Some(entry) = entry else {
                let mut expected: Vec<String> = CLAUSES
                    .iter()
                    .filter(|entry| entry.clause > last)
                    .map(|entry| entry.clause.keyword().to_string())
                    .collect();
                expected.push("end of input".to_string());
                return Err(unexpected(&token, expected));
            };

            tracing::trace!(clause = %entry.clause, line = token.line, column = token.column, "parsing clause");
            self.advance()?;
            (entry.parse)(self, &mut query)?;
            last = entry.clause;
        }
    }

    // ---- cursor helpers ----

    fn peek(&mut self) -> QueryResult<&Token<'a>> {
        self.tokens.peek()
    }

    fn peek_kind(&mut self) -> QueryResult<TokenKind> {
        Ok(self.tokens.peek()?.kind)
    }

    fn advance(&mut self) -> QueryResult<Token<'a>> {
        self.tokens.next()
    }

    /// Consume the keyword if it is next
    fn eat_keyword(&mut self, keyword: Keyword) -> QueryResult<bool> {
        if self.peek()?.is_keyword(keyword) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> QueryResult<Token<'a>> {
        let token = self.advance()?;
        if token.is_keyword(keyword) {
            return Ok(token);
        }
        Err(unexpected(&token, vec![keyword.to_string()]))
    }

    /// Consume the punctuation if it is next
    fn eat_punct(&mut self, punct: Punctuation) -> QueryResult<bool> {
        if self.peek_kind()? == TokenKind::Punctuation(punct) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect_punct(&mut self, punct: Punctuation) -> QueryResult<Token<'a>> {
        let token = self.advance()?;
        if token.kind == TokenKind::Punctuation(punct) {
            return Ok(token);
        }
        Err(unexpected(&token, vec![format!("'{}'", punct.symbol())]))
    }

    /// Consume an identifier, describing it as `what` on failure
    fn expect_identifier(&mut self, what: &str) -> QueryResult<String> {
        let token = self.advance()?;
        match token.identifier() {
            Some(name) => Ok(name.to_string()),
            None => Err(unexpected(&token, vec![what.to_string()])),
        }
    }

    /// Comma-separated list of one or more identifiers
    fn parse_identifier_list(&mut self, what: &str) -> QueryResult<Vec<String>> {
        let mut names = vec![self.expect_identifier(what)?];
        while self.eat_punct(Punctuation::Comma)? {
            names.push(self.expect_identifier(what)?);
        }
        Ok(names)
    }

    /// Enter one level of nesting at `token`
    fn enter(&mut self, token: &Token<'_>) -> QueryResult<()> {
        if self.depth >= self.max_depth {
            return Err(unexpected(
                token,
                vec![format!("at most {} levels of nesting", self.max_depth)],
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Build a parse error at `token`
fn unexpected(token: &Token<'_>, expected: Vec<String>) -> QueryError {
    QueryError::Parse {
        line: token.line,
        column: token.column,
        expected,
        found: token.describe(),
    }
}
