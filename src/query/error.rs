//! Query error types
//!
//! Every error carries the 1-based line and column where parsing stopped.
//! The first failure aborts the parse; there is no recovery.

use thiserror::Error;

/// Errors that can occur while parsing a query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A character that starts no token, or an unterminated literal
    #[error("Lex error at line {line}, column {column}: {message}")]
    Lex {
        line: u32,
        column: u32,
        unexpected: char,
        message: String,
    },

    /// A token sequence that matches no alternative of the grammar
    #[error("Parse error at line {line}, column {column}: expected {}, found {found}", describe_expected(.expected))]
    Parse {
        line: u32,
        column: u32,
        expected: Vec<String>,
        found: String,
    },

    /// A malformed SINCE, UNTIL or COMPARE WITH value
    #[error("Time parse error at line {line}, column {column}: {reason}")]
    TimeParse {
        line: u32,
        column: u32,
        reason: String,
    },
}

impl QueryError {
    /// Line of the offending input (1-based)
    pub fn line(&self) -> u32 {
        match self {
            Self::Lex { line, .. } | Self::Parse { line, .. } | Self::TimeParse { line, .. } => {
                *line
            }
        }
    }

    /// Column of the offending input (1-based)
    pub fn column(&self) -> u32 {
        match self {
            Self::Lex { column, .. }
            | Self::Parse { column, .. }
            | Self::TimeParse { column, .. } => *column,
        }
    }

    /// Human-readable description without the location prefix
    pub fn message(&self) -> String {
        match self {
            Self::Lex { message, .. } => message.clone(),
            Self::Parse {
                expected, found, ..
            } => format!("expected {}, found {}", describe_expected(expected), found),
            Self::TimeParse { reason, .. } => format!("invalid time expression: {}", reason),
        }
    }
}

/// Join the alternatives a rule would have accepted
fn describe_expected(expected: &[String]) -> String {
    match expected {
        [] => "nothing".to_string(),
        [one] => one.clone(),
        [rest @ .., last] => format!("one of {} or {}", rest.join(", "), last),
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
