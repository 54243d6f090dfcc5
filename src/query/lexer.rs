//! Lexer
//!
//! Turns a query string into a lazy stream of [`Token`]s.
//!
//! # Features
//!
//! - Zero-copy tokenization (tokens borrow from the original input)
//! - Single- and double-quoted strings with backslash escapes
//! - Backtick-quoted identifiers for attribute names that clash with keywords
//! - `--`, `//` and `/* */` comments
//! - 1-based line and column on every token
//!
//! # Example
//!
//! ```rust
//! use nrql::query::{tokenize, TokenKind};
//!
//! let tokens: Vec<_> = tokenize("SELECT count(*) FROM Transaction")
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(tokens.len(), 8); // SELECT, count, (, *, ), FROM, Transaction, EOF
//! assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
//! ```

use std::borrow::Cow;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{opt, recognize, value},
    sequence::pair,
    IResult,
};

use crate::query::ast::Number;
use crate::query::error::{QueryError, QueryResult};
use crate::query::keywords::lookup_keyword;
use crate::query::token::{Operator, Punctuation, Token, TokenKind, TokenValue};

/// Create a lexer over `source` with no length limit
pub fn tokenize(source: &str) -> Lexer<'_> {
    Lexer::new(source)
}

/// A lexer for the query language
///
/// Implements `Iterator`, producing one token per call. The stream ends
/// with a single [`TokenKind::Eof`] token, or stops after the first error.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    /// The input string being tokenized
    input: &'a str,
    /// Current byte position in the input
    position: usize,
    /// Line of the character at `position`
    line: u32,
    /// Column of the character at `position`
    column: u32,
    /// Maximum accepted input length in bytes
    max_length: usize,
    /// Whether the length limit has been checked
    checked_length: bool,
    /// Whether EOF or an error has been emitted
    finished: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input
    pub fn new(input: &'a str) -> Self {
        Self::with_max_length(input, usize::MAX)
    }

    /// Create a lexer that rejects input longer than `max_length` bytes
    pub fn with_max_length(input: &'a str, max_length: usize) -> Self {
        Self {
            input,
            position: 0,
            line: 1,
            column: 1,
            max_length,
            checked_length: false,
            finished: false,
        }
    }

    /// Get the remaining input
    pub fn remaining(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.remaining().chars().nth(1)
    }

    /// Advance by `n` bytes, keeping line and column in step
    fn advance(&mut self, n: usize) {
        let end = (self.position + n).min(self.input.len());
        for c in self.input[self.position..end].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position = end;
    }

    fn lex_error(&self, line: u32, column: u32, unexpected: char, message: String) -> QueryError {
        QueryError::Lex {
            line,
            column,
            unexpected,
            message,
        }
    }

    /// Reject oversized input at the first character past the limit
    fn check_length(&self) -> QueryResult<()> {
        if self.input.len() <= self.max_length {
            return Ok(());
        }

        let boundary = (self.max_length..self.input.len())
            .find(|i| self.input.is_char_boundary(*i))
            .unwrap_or(self.input.len());

        let mut probe = self.clone();
        probe.advance(boundary);
        let unexpected = probe.peek().unwrap_or(' ');

        Err(self.lex_error(
            probe.line,
            probe.column,
            unexpected,
            format!("query exceeds the maximum length of {} bytes", self.max_length),
        ))
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> QueryResult<()> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => self.advance(c.len_utf8()),
                (Some('-'), Some('-')) | (Some('/'), Some('/')) => {
                    let len = self.remaining().find('\n').unwrap_or(self.remaining().len());
                    self.advance(len);
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    match self.remaining()[2..].find("*/") {
                        Some(end) => self.advance(end + 4),
                        None => {
                            return Err(self.lex_error(
                                line,
                                column,
                                '/',
                                "unterminated block comment".to_string(),
                            ))
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Scan a quoted string, decoding escapes
    fn scan_string(&mut self, quote: char) -> QueryResult<Token<'a>> {
        let (start, line, column) = (self.position, self.line, self.column);
        let body = &self.input[start + 1..];

        let mut decoded: Option<String> = None;
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            if c == quote {
                let value = match decoded {
                    Some(owned) => Cow::Owned(owned),
                    None => Cow::Borrowed(&body[..i]),
                };
                self.advance(1 + i + c.len_utf8());
                let text = &self.input[start..self.position];
                return Ok(Token::new(TokenKind::String, text, line, column)
                    .with_value(TokenValue::Str(value)));
            }

            if c == '\\' {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                let owned = decoded.get_or_insert_with(|| body[..i].to_string());
                owned.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            } else if let Some(owned) = decoded.as_mut() {
                owned.push(c);
            }
        }

        Err(self.lex_error(
            line,
            column,
            quote,
            "unterminated string literal".to_string(),
        ))
    }

    /// Scan a backtick-quoted identifier
    fn scan_quoted_identifier(&mut self) -> QueryResult<Token<'a>> {
        let (start, line, column) = (self.position, self.line, self.column);
        let body = &self.input[start + 1..];

        match body.find('`') {
            Some(0) => Err(self.lex_error(
                line,
                column,
                '`',
                "empty quoted identifier".to_string(),
            )),
            Some(end) => {
                self.advance(end + 2);
                let text = &self.input[start..self.position];
                Ok(Token::new(TokenKind::Identifier, text, line, column)
                    .with_value(TokenValue::Str(Cow::Borrowed(&body[..end]))))
            }
            None => Err(self.lex_error(
                line,
                column,
                '`',
                "unterminated quoted identifier".to_string(),
            )),
        }
    }

    /// Scan an identifier or keyword
    fn scan_word(&mut self) -> QueryResult<Token<'a>> {
        let (line, column) = (self.line, self.column);
        let (_, text) = identifier(self.remaining()).map_err(|_| self.unexpected_here())?;
        self.advance(text.len());

        let kind = lookup_keyword(text)
            .map(TokenKind::Keyword)
            .unwrap_or(TokenKind::Identifier);
        Ok(Token::new(kind, text, line, column))
    }

    /// Scan an integer or decimal literal
    fn scan_number(&mut self) -> QueryResult<Token<'a>> {
        let (line, column) = (self.line, self.column);
        let (_, text) = number(self.remaining()).map_err(|_| self.unexpected_here())?;

        let value = if text.contains('.') {
            text.parse::<f64>().ok().map(Number::Float)
        } else {
            text.parse::<i64>().ok().map(Number::Integer)
        };
        let Some(value) = value else {
            return Err(self.lex_error(
                line,
                column,
                text.chars().next().unwrap_or('0'),
                format!("number literal {} is out of range", text),
            ));
        };

        self.advance(text.len());
        Ok(Token::new(TokenKind::Number, text, line, column).with_value(TokenValue::Number(value)))
    }

    /// Scan an operator or punctuation symbol
    fn scan_symbol(&mut self) -> QueryResult<Token<'a>> {
        let (line, column) = (self.line, self.column);
        let remaining = self.remaining();
        let (rest, kind) = symbol(remaining).map_err(|_| self.unexpected_here())?;
        let len = remaining.len() - rest.len();
        let text = &remaining[..len];
        self.advance(len);
        Ok(Token::new(kind, text, line, column))
    }

    fn unexpected_here(&self) -> QueryError {
        let c = self.peek().unwrap_or(' ');
        self.lex_error(
            self.line,
            self.column,
            c,
            format!("unexpected character '{}'", c),
        )
    }

    /// Get the next token
    fn next_token(&mut self) -> QueryResult<Option<Token<'a>>> {
        if !self.checked_length {
            self.checked_length = true;
            self.check_length()?;
        }

        self.skip_trivia()?;

        let Some(c) = self.peek() else {
            if self.finished {
                return Ok(None);
            }
            self.finished = true;
            return Ok(Some(Token::new(
                TokenKind::Eof,
                "",
                self.line,
                self.column,
            )));
        };

        let token = match c {
            '\'' | '"' => self.scan_string(c)?,
            '`' => self.scan_quoted_identifier()?,
            '0'..='9' => self.scan_number()?,
            _ if c.is_alphabetic() || c == '_' => self.scan_word()?,
            _ => self.scan_symbol()?,
        };
        Ok(Some(token))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = QueryResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

fn symbol(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Operator(Operator::LtEq), tag("<=")),
        value(TokenKind::Operator(Operator::GtEq), tag(">=")),
        value(TokenKind::Operator(Operator::NotEq), alt((tag("!="), tag("<>")))),
        value(TokenKind::Operator(Operator::Eq), alt((tag("=="), tag("=")))),
        value(TokenKind::Operator(Operator::Lt), tag("<")),
        value(TokenKind::Operator(Operator::Gt), tag(">")),
        value(TokenKind::Operator(Operator::Plus), tag("+")),
        value(TokenKind::Operator(Operator::Minus), tag("-")),
        value(TokenKind::Operator(Operator::Star), tag("*")),
        value(TokenKind::Operator(Operator::Slash), tag("/")),
        value(TokenKind::Punctuation(Punctuation::Comma), tag(",")),
        value(TokenKind::Punctuation(Punctuation::LeftParen), tag("(")),
        value(TokenKind::Punctuation(Punctuation::RightParen), tag(")")),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::token::Keyword;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .map(|t| t.unwrap().kind)
            .collect()
    }

    fn lex_error(input: &str) -> QueryError {
        tokenize(input)
            .find_map(|t| t.err())
            .expect("expected a lex error")
    }

    #[test]
    fn test_simple_query() {
        assert_eq!(
            kinds("SELECT count(*) FROM Transaction"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Identifier,
                TokenKind::Punctuation(Punctuation::LeftParen),
                TokenKind::Operator(Operator::Star),
                TokenKind::Punctuation(Punctuation::RightParen),
                TokenKind::Keyword(Keyword::From),
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            kinds("since 1 WEEK Ago"),
            vec![
                TokenKind::Keyword(Keyword::Since),
                TokenKind::Number,
                TokenKind::Keyword(Keyword::Week),
                TokenKind::Keyword(Keyword::Ago),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        let ops: Vec<_> = tokenize("= != <> < <= > >= == + - * /")
            .map(|t| t.unwrap())
            .filter_map(|t| match t.kind {
                TokenKind::Operator(op) => Some(op),
                _ => None,
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                Operator::Eq,
                Operator::NotEq,
                Operator::NotEq,
                Operator::Lt,
                Operator::LtEq,
                Operator::Gt,
                Operator::GtEq,
                Operator::Eq,
                Operator::Plus,
                Operator::Minus,
                Operator::Star,
                Operator::Slash,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens: Vec<_> = tokenize("10000 0.5 95").map(|t| t.unwrap()).collect();
        assert_eq!(tokens[0].number(), Some(Number::Integer(10000)));
        assert_eq!(tokens[1].number(), Some(Number::Float(0.5)));
        assert_eq!(tokens[2].number(), Some(Number::Integer(95)));
    }

    #[test]
    fn test_strings_and_escapes() {
        let tokens: Vec<_> = tokenize(r#"'Mac' "Windows" 'it\'s' "a\"b\\c""#)
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(tokens[0].string(), Some("Mac"));
        assert_eq!(tokens[1].string(), Some("Windows"));
        assert_eq!(tokens[2].string(), Some("it's"));
        assert_eq!(tokens[3].string(), Some("a\"b\\c"));
        assert_eq!(tokens[0].text, "'Mac'");
    }

    #[test]
    fn test_backtick_identifier() {
        let tokens: Vec<_> = tokenize("`request.uri` `from`").map(|t| t.unwrap()).collect();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].identifier(), Some("request.uri"));
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].identifier(), Some("from"));
    }

    #[test]
    fn test_positions_across_lines() {
        let tokens: Vec<_> = tokenize("SELECT count(*)\n  FROM PageView")
            .map(|t| t.unwrap())
            .collect();
        let from = &tokens[5];
        assert!(from.is_keyword(Keyword::From));
        assert_eq!((from.line, from.column), (2, 3));
        let source = &tokens[6];
        assert_eq!((source.line, source.column), (2, 8));
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("SELECT -- trailing\n/* block\ncomment */ x // end"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = lex_error("SELECT count(*) FROM x WHERE a = 'abc");
        assert_eq!((err.line(), err.column()), (1, 34));
        assert!(matches!(err, QueryError::Lex { unexpected: '\'', .. }));
    }

    #[test]
    fn test_stray_character() {
        let err = lex_error("SELECT a\n  # b");
        assert_eq!((err.line(), err.column()), (2, 3));
        assert_eq!(err.message(), "unexpected character '#'");

        let err = lex_error("a ! b");
        assert_eq!((err.line(), err.column()), (1, 3));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = lex_error("SELECT /* never closed");
        assert_eq!((err.line(), err.column()), (1, 8));
    }

    #[test]
    fn test_stream_ends_after_error() {
        let mut lexer = tokenize("a $ b");
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_err());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_eof_emitted_once() {
        let mut lexer = tokenize("  ");
        assert_eq!(lexer.next().unwrap().unwrap().kind, TokenKind::Eof);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_max_length() {
        let err = Lexer::with_max_length("SELECT a\nFROM b", 11)
            .find_map(|t| t.err())
            .unwrap();
        assert_eq!((err.line(), err.column()), (2, 3));
        assert!(matches!(err, QueryError::Lex { unexpected: 'O', .. }));

        assert!(Lexer::with_max_length("SELECT a", 8).all(|t| t.is_ok()));
    }

    #[test]
    fn test_number_out_of_range() {
        let err = lex_error("LIMIT 99999999999999999999");
        assert_eq!((err.line(), err.column()), (1, 7));
    }
}
