//! Canonical query text
//!
//! `Display` for the AST renders text that parses back to an equal tree:
//! keywords upper-case, strings single-quoted, identifiers backtick-quoted
//! when they would not lex as a plain identifier. Operands get parentheses
//! wherever precedence or associativity would otherwise regroup them.

use std::fmt::{self, Display, Formatter, Write};

use crate::query::ast::{
    BinaryOperator, Expression, Literal, Number, Query, SelectItem, TimeSpec, TimeseriesSpec,
    UnaryOperator,
};
use crate::query::keywords::lookup_keyword;

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        write_list(f, &self.select)?;

        f.write_str(" FROM ")?;
        write_identifiers(f, &self.from)?;

        if let Some(condition) = &self.where_clause {
            write!(f, " WHERE {}", condition)?;
        }
        if let Some(facet) = &self.facet {
            f.write_str(" FACET ")?;
            write_identifiers(f, facet)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(since) = &self.since {
            write!(f, " SINCE {}", since)?;
        }
        if let Some(until) = &self.until {
            write!(f, " UNTIL {}", until)?;
        }
        if let Some(compare) = &self.compare_with {
            write!(f, " COMPARE WITH {}", compare)?;
        }
        if let Some(timeseries) = &self.timeseries {
            write!(f, " TIMESERIES {}", timeseries)?;
        }
        Ok(())
    }
}

impl Display for SelectItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.operator(), self.args.as_slice()) {
            (Some(op), [left, right]) => write_binary(f, op, left, right)?,
            _ => {
                write_identifier(f, &self.function)?;
                f.write_char('(')?;
                write_list(f, &self.args)?;
                f.write_char(')')?;
            }
        }

        if let Some(alias) = &self.alias {
            f.write_str(" AS ")?;
            write_string(f, alias)?;
        }
        Ok(())
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { value } => write!(f, "{}", value),
            Self::Identifier { name } => write_identifier(f, name),
            Self::Wildcard => f.write_char('*'),
            Self::FunctionCall { name, args } => {
                write_identifier(f, name)?;
                f.write_char('(')?;
                write_list(f, args)?;
                f.write_char(')')
            }
            Self::BinaryOp { op, left, right } => write_binary(f, *op, left, right),
            Self::UnaryOp { op, operand } => match op {
                UnaryOperator::Not => {
                    f.write_str("NOT ")?;
                    write_operand(f, operand, NOT_PRECEDENCE)
                }
                UnaryOperator::Negate => {
                    f.write_char('-')?;
                    // `--` would start a comment
                    if starts_with_minus(operand) {
                        write!(f, "({})", operand)
                    } else {
                        write_operand(f, operand, ATOM_PRECEDENCE)
                    }
                }
            },
            Self::InList {
                identifier,
                values,
                negated,
            } => {
                write_identifier(f, identifier)?;
                f.write_str(if *negated { " NOT IN (" } else { " IN (" })?;
                write_list(f, values)?;
                f.write_char(')')
            }
            Self::LikePattern {
                identifier,
                pattern,
                negated,
            } => {
                write_identifier(f, identifier)?;
                f.write_str(if *negated { " NOT LIKE " } else { " LIKE " })?;
                write_string(f, pattern)
            }
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write_string(f, s),
            Self::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(x) => {
                // Keep the decimal point so the value lexes back as a float
                let text = x.to_string();
                if text.contains('.') || !x.is_finite() {
                    f.write_str(&text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
        }
    }
}

impl Display for TimeSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RelativeDuration { amount, unit, .. } => write!(
                f,
                "{} {} AGO",
                amount,
                unit.name_for(*amount).to_ascii_uppercase()
            ),
            Self::NamedAnchor { anchor } => f.write_str(anchor.as_str()),
            Self::AbsoluteTimestamp { timestamp } => write_string(f, timestamp),
        }
    }
}

impl Display for TimeseriesSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("AUTO"),
            Self::FixedInterval { amount, unit } => write!(
                f,
                "{} {}",
                amount,
                unit.name_for(*amount).to_ascii_uppercase()
            ),
        }
    }
}

const NOT_PRECEDENCE: u8 = 3;
const MEMBERSHIP_PRECEDENCE: u8 = 4;
const ATOM_PRECEDENCE: u8 = u8::MAX;

/// How tightly `expr` binds when printed bare
fn precedence(expr: &Expression) -> u8 {
    match expr {
        Expression::BinaryOp { op, .. } => op.precedence(),
        Expression::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } => NOT_PRECEDENCE,
        Expression::InList { .. } | Expression::LikePattern { .. } => MEMBERSHIP_PRECEDENCE,
        _ => ATOM_PRECEDENCE,
    }
}

fn starts_with_minus(expr: &Expression) -> bool {
    match expr {
        Expression::UnaryOp {
            op: UnaryOperator::Negate,
            ..
        } => true,
        Expression::Literal {
            value: Literal::Number(n),
        } => n.as_f64().is_sign_negative(),
        _ => false,
    }
}

fn write_binary(
    f: &mut Formatter<'_>,
    op: BinaryOperator,
    left: &Expression,
    right: &Expression,
) -> fmt::Result {
    let prec = op.precedence();
    // Left-associative, except comparisons which do not chain
    let left_min = if op.is_comparison() { prec + 1 } else { prec };

    write_operand(f, left, left_min)?;
    write!(f, " {} ", op)?;
    write_operand(f, right, prec + 1)
}

/// Write `expr`, parenthesized if it binds looser than `min`
fn write_operand(f: &mut Formatter<'_>, expr: &Expression, min: u8) -> fmt::Result {
    if precedence(expr) < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_identifiers(f: &mut Formatter<'_>, names: &[String]) -> fmt::Result {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_identifier(f, name)?;
    }
    Ok(())
}

fn write_identifier(f: &mut Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_identifier(name) {
        f.write_str(name)
    } else {
        write!(f, "`{}`", name)
    }
}

/// Whether `name` lexes back as the same bare identifier
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    if name.eq_ignore_ascii_case("true") || name.eq_ignore_ascii_case("false") {
        return false;
    }
    lookup_keyword(name).map_or(true, |keyword| !keyword.is_reserved())
}

fn write_string(f: &mut Formatter<'_>, value: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in value.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            _ => f.write_char(c)?,
        }
    }
    f.write_char('\'')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{Anchor, TimeUnit};
    use crate::query::parse_query;

    fn roundtrip(input: &str) -> String {
        let query = parse_query(input).unwrap();
        let rendered = query.to_string();
        let reparsed = parse_query(&rendered)
            .unwrap_or_else(|e| panic!("rendered text {:?} failed to parse: {}", rendered, e));
        assert_eq!(query, reparsed, "rendered as {:?}", rendered);
        rendered
    }

    #[test]
    fn test_canonical_keywords() {
        assert_eq!(
            roundtrip("select average(duration) from PageView since 1 week ago"),
            "SELECT average(duration) FROM PageView SINCE 1 WEEK AGO"
        );
    }

    #[test]
    fn test_full_query() {
        assert_eq!(
            roundtrip(
                "SELECT count(*) AS 'Total' FROM PageView WHERE a = 1 OR b != 'x' AND c > 2 \
                 FACET appName LIMIT 10 SINCE '2014-02-14' UNTIL TODAY \
                 COMPARE WITH 2 days ago TIMESERIES 6 hours"
            ),
            "SELECT count(*) AS 'Total' FROM PageView WHERE a = 1 OR b != 'x' AND c > 2 \
             FACET appName LIMIT 10 SINCE '2014-02-14' UNTIL TODAY \
             COMPARE WITH 2 DAYS AGO TIMESERIES 6 HOURS"
        );
    }

    #[test]
    fn test_arithmetic_select_item() {
        assert_eq!(
            roundtrip("SELECT count(*)/uniqueCount(session) AS 'Per Session' FROM PageView"),
            "SELECT count(*) / uniqueCount(session) AS 'Per Session' FROM PageView"
        );
        roundtrip("SELECT (max(a) - min(a)) * 2 FROM E");
    }

    #[test]
    fn test_membership_and_negation() {
        assert_eq!(
            roundtrip("SELECT count(*) FROM E WHERE code NOT IN (1, -2, 3.5) AND NOT name LIKE '%x%'"),
            "SELECT count(*) FROM E WHERE code NOT IN (1, -2, 3.5) AND NOT name LIKE '%x%'"
        );
        roundtrip("SELECT count(*) FROM E WHERE -delta < 0 AND isMobile = true");
    }

    #[test]
    fn test_identifier_quoting() {
        let expr = Expression::identifier("request.uri");
        assert_eq!(expr.to_string(), "`request.uri`");
        assert_eq!(Expression::identifier("from").to_string(), "`from`");
        assert_eq!(Expression::identifier("TRUE").to_string(), "`TRUE`");
        assert_eq!(Expression::identifier("day").to_string(), "day");
        roundtrip("SELECT count(*) FROM `Page View` FACET `host.name`, day");
    }

    #[test]
    fn test_string_escapes() {
        let literal = Literal::String("it's a \\ test\n".to_string());
        assert_eq!(literal.to_string(), r"'it\'s a \\ test\n'");
        roundtrip(r#"SELECT count(*) FROM E WHERE name = "say \"hi\"""#);
    }

    #[test]
    fn test_float_keeps_decimal_point() {
        assert_eq!(Number::Float(2.0).to_string(), "2.0");
        assert_eq!(Number::Float(0.25).to_string(), "0.25");
        assert_eq!(Number::Integer(-7).to_string(), "-7");
    }

    #[test]
    fn test_time_specs() {
        assert_eq!(TimeSpec::ago(1, TimeUnit::Hour).to_string(), "1 HOUR AGO");
        assert_eq!(TimeSpec::anchor(Anchor::Yesterday).to_string(), "YESTERDAY");
        assert_eq!(
            TimeSpec::absolute("2014-02-14 00:00:00").to_string(),
            "'2014-02-14 00:00:00'"
        );
        assert_eq!(TimeseriesSpec::Auto.to_string(), "AUTO");
    }

    #[test]
    fn test_nested_operands_parenthesized() {
        let expr = Expression::binary(
            BinaryOperator::Mul,
            Expression::binary(
                BinaryOperator::Add,
                Expression::identifier("a"),
                Expression::integer(1),
            ),
            Expression::identifier("b"),
        );
        assert_eq!(expr.to_string(), "(a + 1) * b");

        let expr = Expression::binary(
            BinaryOperator::Or,
            Expression::identifier("a"),
            Expression::binary(
                BinaryOperator::Or,
                Expression::identifier("b"),
                Expression::identifier("c"),
            ),
        );
        assert_eq!(expr.to_string(), "a OR (b OR c)");
    }

    #[test]
    fn test_regrouping_roundtrips() {
        roundtrip("SELECT count(*) FROM E WHERE (a = 1 OR b = 2) AND NOT (c = 3 OR d = 4)");
        roundtrip("SELECT count(*) FROM E WHERE a - (b - c) > 2 * (x + 1)");
        roundtrip("SELECT count(*) FROM E WHERE (a = b) = c");
        roundtrip("SELECT count(*) FROM E WHERE -(a + b) < -f(-1)");
        roundtrip("SELECT count(*) FROM E WHERE -(-x) > 0");
    }
}
