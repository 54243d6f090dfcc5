//! Clause parsers
//!
//! SELECT is parsed directly by the assembler; every clause after FROM is a
//! free function so it can sit in the dispatch table. Each is called with
//! its leading keyword already consumed.

use super::{unexpected, Parser};
use crate::query::ast::{
    BinaryOperator, Expression, Literal, Number, Query, SelectItem, TimeseriesSpec, UnaryOperator,
};
use crate::query::error::QueryResult;
use crate::query::keywords::time_unit;
use crate::query::token::{Keyword, Operator, Punctuation, Token, TokenKind};

const SELECT_ITEM: &str = "aggregate function call";

impl<'a> Parser<'a> {
    /// `item [, item]*`
    pub(super) fn parse_select_list(&mut self) -> QueryResult<Vec<SelectItem>> {
        let mut items = vec![self.parse_select_item()?];
        while self.eat_punct(Punctuation::Comma)? {
            items.push(self.parse_select_item()?);
        }
        Ok(items)
    }

    /// `call [AS alias]`, or arithmetic over calls such as
    /// `count(*) / uniqueCount(session)`
    fn parse_select_item(&mut self) -> QueryResult<SelectItem> {
        let start = self.peek()?.clone();
        if !can_start_select_item(&start) {
            return Err(unexpected(&start, vec![SELECT_ITEM.to_string()]));
        }

        let expr = self.parse_arithmetic()?;
        if aggregate_operand(&expr) != Some(true) {
            return Err(unexpected(&start, vec![SELECT_ITEM.to_string()]));
        }

        let mut item = match expr {
            Expression::FunctionCall { name, args } => SelectItem::new(name, args),
            Expression::BinaryOp { op, left, right } => {
                SelectItem::new(op.symbol(), vec![*left, *right])
            }
            _ => return Err(unexpected(&start, vec![SELECT_ITEM.to_string()])),
        };

        if self.eat_keyword(Keyword::As)? {
            let token = self.advance()?;
            let alias = token.string().or_else(|| token.identifier());
            match alias {
                Some(alias) => item.alias = Some(alias.to_string()),
                None => return Err(unexpected(&token, vec!["alias".to_string()])),
            }
        }

        Ok(item)
    }
}

fn can_start_select_item(token: &Token<'_>) -> bool {
    token.identifier().is_some()
        || matches!(
            token.kind,
            TokenKind::Number
                | TokenKind::Punctuation(Punctuation::LeftParen)
                | TokenKind::Operator(Operator::Minus)
        )
}

/// Whether `expr` is arithmetic over aggregate calls and numbers.
///
/// `Some(true)` when it contains at least one call, `Some(false)` for
/// numbers only, `None` when anything else appears. Calls named after an
/// arithmetic operator would read back as the operator itself.
fn aggregate_operand(expr: &Expression) -> Option<bool> {
    match expr {
        Expression::FunctionCall { name, .. } => {
            let operator_name =
                BinaryOperator::from_symbol(name).is_some_and(|op| op.is_arithmetic());
            (!operator_name).then_some(true)
        }
        Expression::Literal {
            value: Literal::Number(_),
        } => Some(false),
        Expression::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => aggregate_operand(operand),
        Expression::BinaryOp { op, left, right } if op.is_arithmetic() => {
            let left = aggregate_operand(left)?;
            let right = aggregate_operand(right)?;
            Some(left || right)
        }
        _ => None,
    }
}

pub(super) fn where_clause(parser: &mut Parser<'_>, query: &mut Query) -> QueryResult<()> {
    query.where_clause = Some(parser.parse_condition()?);
    Ok(())
}

pub(super) fn facet_clause(parser: &mut Parser<'_>, query: &mut Query) -> QueryResult<()> {
    query.facet = Some(parser.parse_identifier_list("facet attribute")?);
    Ok(())
}

pub(super) fn limit_clause(parser: &mut Parser<'_>, query: &mut Query) -> QueryResult<()> {
    let token = parser.advance()?;
    query.limit = Some(positive_integer(&token)?);
    Ok(())
}

pub(super) fn since_clause(parser: &mut Parser<'_>, query: &mut Query) -> QueryResult<()> {
    query.since = Some(parser.parse_time_spec("SINCE")?);
    Ok(())
}

pub(super) fn until_clause(parser: &mut Parser<'_>, query: &mut Query) -> QueryResult<()> {
    query.until = Some(parser.parse_time_spec("UNTIL")?);
    Ok(())
}

pub(super) fn compare_with_clause(parser: &mut Parser<'_>, query: &mut Query) -> QueryResult<()> {
    parser.expect_keyword(Keyword::With)?;
    query.compare_with = Some(parser.parse_time_spec("COMPARE WITH")?);
    Ok(())
}

/// `TIMESERIES AUTO` or `TIMESERIES n unit`
pub(super) fn timeseries_clause(parser: &mut Parser<'_>, query: &mut Query) -> QueryResult<()> {
    let token = parser.advance()?;

    let spec = match token.kind {
        TokenKind::Keyword(Keyword::Auto) => TimeseriesSpec::Auto,
        TokenKind::Number => {
            let amount = positive_integer(&token)?;
            let unit_token = parser.advance()?;
            let unit = match unit_token.kind {
                TokenKind::Keyword(keyword) => time_unit(keyword),
                _ => None,
            };
            let Some(unit) = unit else {
                return Err(unexpected(&unit_token, vec!["time unit".to_string()]));
            };
            TimeseriesSpec::FixedInterval { amount, unit }
        }
        _ => {
            return Err(unexpected(
                &token,
                vec!["AUTO".to_string(), "bucket interval".to_string()],
            ))
        }
    };

    query.timeseries = Some(spec);
    Ok(())
}

fn positive_integer(token: &Token<'_>) -> QueryResult<u64> {
    match token.number() {
        Some(Number::Integer(n)) if n > 0 => Ok(n as u64),
        _ => Err(unexpected(token, vec!["positive integer".to_string()])),
    }
}
