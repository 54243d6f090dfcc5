//! SINCE / UNTIL / COMPARE WITH values

use super::Parser;
use crate::query::ast::{Anchor, Number, TimeSpec, TimeUnit};
use crate::query::error::{QueryError, QueryResult};
use crate::query::keywords::time_unit;
use crate::query::token::{Keyword, Token, TokenKind};

impl<'a> Parser<'a> {
    /// Parse the value after `clause`
    pub(super) fn parse_time_spec(&mut self, clause: &str) -> QueryResult<TimeSpec> {
        let token = self.advance()?;

        match token.kind {
            TokenKind::Keyword(Keyword::Today) => return Ok(TimeSpec::anchor(Anchor::Today)),
            TokenKind::Keyword(Keyword::Yesterday) => {
                return Ok(TimeSpec::anchor(Anchor::Yesterday))
            }
            TokenKind::Keyword(Keyword::Now) => return Ok(TimeSpec::anchor(Anchor::Now)),
            TokenKind::String => {
                if let Some(timestamp) = token.string() {
                    return Ok(TimeSpec::absolute(timestamp));
                }
            }
            TokenKind::Number => {
                let amount = positive_amount(&token)?;

                let unit_token = self.advance()?;
                let unit = unit_of(&unit_token)?;

                let ago = self.advance()?;
                if !ago.is_keyword(Keyword::Ago) {
                    let reason = format!(
                        "expected AGO after '{} {}', found {}",
                        amount,
                        unit_token.text,
                        ago.describe()
                    );
                    return Err(time_error(&ago, reason));
                }
                return Ok(TimeSpec::ago(amount, unit));
            }
            _ => {}
        }

        Err(time_error(
            &token,
            format!(
                "expected duration, TODAY, YESTERDAY, NOW or timestamp after {}, found {}",
                clause,
                token.describe()
            ),
        ))
    }
}

/// The leading integer of `n unit AGO`
fn positive_amount(token: &Token<'_>) -> QueryResult<u64> {
    match token.number() {
        Some(Number::Integer(n)) if n > 0 => Ok(n as u64),
        _ => Err(time_error(
            token,
            format!("duration must be a positive integer, found {}", token.text),
        )),
    }
}

fn unit_of(token: &Token<'_>) -> QueryResult<TimeUnit> {
    match token.kind {
        TokenKind::Keyword(keyword) => time_unit(keyword),
        _ => None,
    }
    .ok_or_else(|| {
        time_error(
            token,
            format!("expected time unit, found {}", token.describe()),
        )
    })
}

fn time_error(token: &Token<'_>, reason: String) -> QueryError {
    QueryError::TimeParse {
        line: token.line,
        column: token.column,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use crate::query::ast::*;
    use crate::query::{parse_query, QueryError};

    fn since(value: &str) -> TimeSpec {
        parse_query(&format!("SELECT count(*) FROM E SINCE {}", value))
            .unwrap()
            .since
            .unwrap()
    }

    fn since_error(value: &str) -> QueryError {
        parse_query(&format!("SELECT count(*) FROM E SINCE {}", value)).unwrap_err()
    }

    #[test]
    fn test_relative_durations() {
        assert_eq!(since("1 week ago"), TimeSpec::ago(1, TimeUnit::Week));
        assert_eq!(since("3 DAYS AGO"), TimeSpec::ago(3, TimeUnit::Day));
        assert_eq!(since("30 minutes ago"), TimeSpec::ago(30, TimeUnit::Minute));
        assert_eq!(since("1 second ago"), TimeSpec::ago(1, TimeUnit::Second));
        assert_eq!(since("2 hours ago"), TimeSpec::ago(2, TimeUnit::Hour));
        assert_eq!(since("6 months ago"), TimeSpec::ago(6, TimeUnit::Month));
    }

    #[test]
    fn test_anchors() {
        assert_eq!(since("TODAY"), TimeSpec::anchor(Anchor::Today));
        assert_eq!(since("yesterday"), TimeSpec::anchor(Anchor::Yesterday));
        assert_eq!(since("Now"), TimeSpec::anchor(Anchor::Now));
    }

    #[test]
    fn test_absolute_timestamp_kept_verbatim() {
        assert_eq!(
            since("'2014-02-14 00:00:00'"),
            TimeSpec::absolute("2014-02-14 00:00:00")
        );
        assert_eq!(since("'2014-13-40'"), TimeSpec::absolute("2014-13-40"));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let err = since_error("0 days ago");
        assert!(matches!(err, QueryError::TimeParse { .. }));
        assert_eq!((err.line(), err.column()), (1, 30));
    }

    #[test]
    fn test_fractional_amount_rejected() {
        let err = since_error("1.5 days ago");
        assert!(matches!(err, QueryError::TimeParse { .. }));
        assert_eq!(
            err.message(),
            "invalid time expression: duration must be a positive integer, found 1.5"
        );
    }

    #[test]
    fn test_missing_ago() {
        let err = since_error("3 days");
        assert!(matches!(err, QueryError::TimeParse { .. }));
        assert_eq!((err.line(), err.column()), (1, 36));
    }

    #[test]
    fn test_unknown_unit() {
        let err = since_error("3 fortnights ago");
        assert!(matches!(err, QueryError::TimeParse { .. }));
        assert_eq!((err.line(), err.column()), (1, 32));
        assert_eq!(
            err.message(),
            "invalid time expression: expected time unit, found identifier fortnights"
        );
    }

    #[test]
    fn test_missing_value() {
        let err = since_error("");
        assert!(matches!(err, QueryError::TimeParse { .. }));
        assert!(err.message().contains("after SINCE"));
    }

    #[test]
    fn test_compare_with_and_until() {
        let query = parse_query(
            "SELECT count(*) FROM E SINCE '2014-02-14' UNTIL TODAY COMPARE WITH 1 week ago",
        )
        .unwrap();
        assert_eq!(query.since, Some(TimeSpec::absolute("2014-02-14")));
        assert_eq!(query.until, Some(TimeSpec::anchor(Anchor::Today)));
        assert_eq!(query.compare_with, Some(TimeSpec::ago(1, TimeUnit::Week)));
    }
}
