//! # nrql
//!
//! Parser for NRQL, a SQL-like language for aggregating and time-windowing
//! event data.
//!
//! ## Features
//!
//! - **Strict grammar**: clause order is enforced and the first error stops
//!   the parse, reported with its line and column
//! - **Typed AST**: serde-serializable nodes with stable JSON key order
//! - **Round-trippable**: `Display` renders canonical text that re-parses to
//!   the same tree
//! - **Time helpers**: resolve SINCE/UNTIL values and count TIMESERIES
//!   buckets with chrono
//!
//! ## Modules
//!
//! - [`query`]: lexer, parser and AST
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust
//! use nrql::{parse, Expression, BinaryOperator};
//!
//! let query = parse(
//!     "SELECT count(*) FROM Transaction WHERE appName = 'checkout' FACET host LIMIT 5",
//! )
//! .unwrap();
//!
//! assert_eq!(query.select[0].function, "count");
//! assert_eq!(query.limit, Some(5));
//! assert_eq!(
//!     query.where_clause,
//!     Some(Expression::binary(
//!         BinaryOperator::Eq,
//!         Expression::identifier("appName"),
//!         Expression::string("checkout"),
//!     ))
//! );
//! println!("{}", serde_json::to_string_pretty(&query).unwrap());
//! ```

pub mod config;
pub mod query;

// Re-export top-level types for convenience
pub use query::{
    parse_query as parse, parse_query_with as parse_with, Anchor, BinaryOperator, Clause,
    Expression, Literal, Number, ParseOptions, Query, QueryError, QueryResult, SelectItem,
    TimeSpec, TimeUnit, TimeseriesSpec, UnaryOperator,
};

pub use config::{Config, ConfigError, LoggingConfig, OutputConfig, ParserConfig};
