//! Query Abstract Syntax Tree
//!
//! Defines the AST produced by the parser. Nodes are plain owned values with
//! no back-references to the source text, so a parsed [`Query`] can outlive
//! the string it came from.
//!
//! # Example Queries
//!
//! ```text
//! SELECT average(duration) FROM PageView SINCE 1 week ago
//! SELECT count(*) FROM Transaction FACET appName LIMIT 10 SINCE YESTERDAY
//! SELECT percentile(duration, 50, 95) FROM PageView TIMESERIES 6 hours
//! ```
//!
//! Every node serializes with serde. Struct fields keep their declaration
//! order, so the JSON rendering has stable key ordering.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A parsed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Aggregates to compute, in output column order
    pub select: Vec<SelectItem>,
    /// Event types to read from
    pub from: Vec<String>,
    /// Row filter
    #[serde(rename = "where")]
    pub where_clause: Option<Expression>,
    /// Grouping attributes
    pub facet: Option<Vec<String>>,
    /// Maximum number of facets returned
    pub limit: Option<u64>,
    /// Start of the time window
    pub since: Option<TimeSpec>,
    /// End of the time window
    pub until: Option<TimeSpec>,
    /// Window to compare the main window against
    pub compare_with: Option<TimeSpec>,
    /// Time bucketing of the result
    pub timeseries: Option<TimeseriesSpec>,
}

impl Query {
    /// Create a query with the two mandatory clauses
    pub fn new(select: Vec<SelectItem>, from: Vec<String>) -> Self {
        Self {
            select,
            from,
            where_clause: None,
            facet: None,
            limit: None,
            since: None,
            until: None,
            compare_with: None,
            timeseries: None,
        }
    }

    /// Clauses present in this query, in the order they are rendered
    pub fn clauses(&self) -> Vec<Clause> {
        let mut clauses = vec![Clause::Select, Clause::From];
        let optional = [
            (Clause::Where, self.where_clause.is_some()),
            (Clause::Facet, self.facet.is_some()),
            (Clause::Limit, self.limit.is_some()),
            (Clause::Since, self.since.is_some()),
            (Clause::Until, self.until.is_some()),
            (Clause::CompareWith, self.compare_with.is_some()),
            (Clause::Timeseries, self.timeseries.is_some()),
        ];
        clauses.extend(
            optional
                .into_iter()
                .filter(|(_, present)| *present)
                .map(|(clause, _)| clause),
        );
        clauses
    }
}

/// Top-level clauses, ordered as they must appear in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Clause {
    Select,
    From,
    Where,
    Facet,
    Limit,
    Since,
    Until,
    CompareWith,
    Timeseries,
}

impl Clause {
    /// All clauses in canonical order
    pub const ALL: [Clause; 9] = [
        Clause::Select,
        Clause::From,
        Clause::Where,
        Clause::Facet,
        Clause::Limit,
        Clause::Since,
        Clause::Until,
        Clause::CompareWith,
        Clause::Timeseries,
    ];

    /// The keyword text that introduces this clause
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::Where => "WHERE",
            Self::Facet => "FACET",
            Self::Limit => "LIMIT",
            Self::Since => "SINCE",
            Self::Until => "UNTIL",
            Self::CompareWith => "COMPARE WITH",
            Self::Timeseries => "TIMESERIES",
        }
    }
}

impl std::fmt::Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// An item in the SELECT clause
///
/// Usually an aggregate call such as `percentile(duration, 95)`. Arithmetic
/// over aggregates (`count(*) / uniqueCount(session)`) is stored with the
/// operator symbol as `function` and the two operands as `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    /// Aggregate function name, or operator symbol
    pub function: String,
    /// Arguments in call order
    pub args: Vec<Expression>,
    /// Optional alias for the result column
    pub alias: Option<String>,
}

impl SelectItem {
    /// Create a select item for a function call
    pub fn new(function: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            function: function.into(),
            args,
            alias: None,
        }
    }

    /// Add an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Get the display name (alias or function name)
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.function)
    }

    /// The arithmetic operator this item applies, if it is not a plain call
    pub fn operator(&self) -> Option<BinaryOperator> {
        BinaryOperator::from_symbol(&self.function)
            .filter(|op| op.is_arithmetic() && self.args.len() == 2)
    }
}

/// An expression in WHERE, SELECT or argument position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    /// Number, string or boolean constant
    Literal { value: Literal },
    /// Attribute reference
    Identifier { name: String },
    /// `*` as a function argument, as in `count(*)`
    Wildcard,
    /// Function call
    FunctionCall { name: String, args: Vec<Expression> },
    /// Logical, comparison or arithmetic operator
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Prefix operator
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    /// `attr [NOT] IN (v1, v2, ...)`
    InList {
        identifier: String,
        values: Vec<Literal>,
        negated: bool,
    },
    /// `attr [NOT] LIKE 'pattern'`
    LikePattern {
        identifier: String,
        pattern: String,
        negated: bool,
    },
}

impl Expression {
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier { name: name.into() }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal {
            value: Literal::String(value.into()),
        }
    }

    pub fn integer(value: i64) -> Self {
        Self::Literal {
            value: Literal::Number(Number::Integer(value)),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self::Literal {
            value: Literal::Boolean(value),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::FunctionCall {
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Self::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Whether this expression has the shape of a condition.
    ///
    /// Only the structure is checked: comparisons, IN, LIKE, NOT and
    /// AND/OR over conditions qualify, and so do bare attributes and function
    /// calls, which may hold booleans. Literals, `*` and arithmetic do not.
    pub fn is_condition(&self) -> bool {
        match self {
            Self::Literal { .. } | Self::Wildcard => false,
            Self::Identifier { .. } | Self::FunctionCall { .. } => true,
            Self::InList { .. } | Self::LikePattern { .. } => true,
            Self::UnaryOp { op, operand } => match op {
                UnaryOperator::Not => operand.is_condition(),
                UnaryOperator::Negate => false,
            },
            Self::BinaryOp { op, left, right } => {
                if op.is_logical() {
                    left.is_condition() && right.is_condition()
                } else {
                    op.is_comparison()
                }
            }
        }
    }
}

/// Literal constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Number(Number),
    String(String),
    Boolean(bool),
}

/// Numeric literal, keeping its lexical class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    /// Arithmetic negation, used to fold `-5` into a single literal
    pub fn negate(self) -> Option<Self> {
        match self {
            Self::Integer(i) => i.checked_neg().map(Self::Integer),
            Self::Float(f) => Some(Self::Float(-f)),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(i) => *i as f64,
            Self::Float(f) => *f,
        }
    }
}

/// Binary operators, lowest precedence first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Or => "OR",
            Self::And => "AND",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    /// Parse from its symbol (keywords are matched case-insensitively)
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::NotEq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::LtEq),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::GtEq),
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            _ if s.eq_ignore_ascii_case("and") => Some(Self::And),
            _ if s.eq_ignore_ascii_case("or") => Some(Self::Or),
            _ => None,
        }
    }

    /// Binding strength; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div => 6,
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    #[serde(rename = "NOT")]
    Not,
    #[serde(rename = "-")]
    Negate,
}

/// A point in time used by SINCE, UNTIL and COMPARE WITH
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TimeSpec {
    /// `3 days ago`
    RelativeDuration {
        amount: u64,
        unit: TimeUnit,
        direction: Direction,
    },
    /// `TODAY`, `YESTERDAY`, `NOW`
    NamedAnchor { anchor: Anchor },
    /// `'2014-02-14 00:00:00'`, kept as written
    AbsoluteTimestamp { timestamp: String },
}

impl TimeSpec {
    /// `amount unit AGO`
    pub fn ago(amount: u64, unit: TimeUnit) -> Self {
        Self::RelativeDuration {
            amount,
            unit,
            direction: Direction::Ago,
        }
    }

    pub fn anchor(anchor: Anchor) -> Self {
        Self::NamedAnchor { anchor }
    }

    pub fn absolute(timestamp: impl Into<String>) -> Self {
        Self::AbsoluteTimestamp {
            timestamp: timestamp.into(),
        }
    }

    /// Resolve to a concrete instant relative to `now`.
    ///
    /// Returns `None` when an absolute timestamp is not a valid date or the
    /// arithmetic overflows.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::RelativeDuration { amount, unit, .. } => unit.subtract(now, *amount),
            Self::NamedAnchor { anchor } => anchor.resolve(now),
            Self::AbsoluteTimestamp { timestamp } => parse_timestamp(timestamp),
        }
    }
}

/// Direction of a relative duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ago,
}

/// Named time anchors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Anchor {
    /// Midnight UTC of the current day
    Today,
    /// Midnight UTC of the previous day
    Yesterday,
    /// The moment the query runs
    Now,
}

impl Anchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "TODAY",
            Self::Yesterday => "YESTERDAY",
            Self::Now => "NOW",
        }
    }

    fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let midnight = now.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
        match self {
            Self::Today => Some(midnight),
            Self::Yesterday => midnight.checked_sub_signed(Duration::days(1)),
            Self::Now => Some(now),
        }
    }
}

/// Time units for durations and TIMESERIES intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimeUnit {
    /// Singular lower-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Name agreeing in number with `amount`
    pub fn name_for(&self, amount: u64) -> String {
        if amount == 1 {
            self.as_str().to_string()
        } else {
            format!("{}s", self.as_str())
        }
    }

    /// Length in seconds; `None` for calendar months
    pub fn fixed_seconds(&self) -> Option<i64> {
        match self {
            Self::Second => Some(1),
            Self::Minute => Some(60),
            Self::Hour => Some(3600),
            Self::Day => Some(24 * 3600),
            Self::Week => Some(7 * 24 * 3600),
            Self::Month => None,
        }
    }

    fn subtract(&self, from: DateTime<Utc>, amount: u64) -> Option<DateTime<Utc>> {
        match self.fixed_seconds() {
            Some(secs) => {
                let total = i64::try_from(amount).ok()?.checked_mul(secs)?;
                from.checked_sub_signed(Duration::try_seconds(total)?)
            }
            None => from.checked_sub_months(Months::new(u32::try_from(amount).ok()?)),
        }
    }

    fn add(&self, from: DateTime<Utc>, amount: u64) -> Option<DateTime<Utc>> {
        match self.fixed_seconds() {
            Some(secs) => {
                let total = i64::try_from(amount).ok()?.checked_mul(secs)?;
                from.checked_add_signed(Duration::try_seconds(total)?)
            }
            None => from.checked_add_months(Months::new(u32::try_from(amount).ok()?)),
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// TIMESERIES bucketing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TimeseriesSpec {
    /// Bucket size chosen by the consumer
    Auto,
    /// Buckets of `amount` units each
    FixedInterval { amount: u64, unit: TimeUnit },
}

impl TimeseriesSpec {
    /// Number of buckets needed to cover `[start, end)`.
    ///
    /// `None` for AUTO, an empty range or a zero-length interval.
    pub fn bucket_count(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<u64> {
        let (amount, unit) = match self {
            Self::Auto => return None,
            Self::FixedInterval { amount, unit } => (*amount, *unit),
        };
        if end <= start || amount == 0 {
            return None;
        }

        match unit.fixed_seconds() {
            Some(secs) => {
                let interval = amount.checked_mul(secs.unsigned_abs())?;
                let range = (end - start).num_seconds().unsigned_abs();
                Some(range.div_ceil(interval).max(1))
            }
            None => {
                let mut count = 0u64;
                let mut cursor = start;
                while cursor < end {
                    cursor = unit.add(cursor, amount)?;
                    count += 1;
                }
                Some(count)
            }
        }
    }
}

/// Parse the timestamp formats accepted in absolute time specs
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
