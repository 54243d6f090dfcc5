//! Expression grammar
//!
//! Precedence, lowest first:
//!
//! ```text
//! OR
//! AND
//! NOT                     (prefix)
//! = != < <= > >= IN LIKE  (non-associative)
//! + -
//! * /
//! -                       (prefix)
//! literal | attribute | call | ( expr )
//! ```
//!
//! Logical levels are written out by hand because their operators are
//! keywords; the arithmetic levels use precedence climbing.

use super::{unexpected, Parser};
use crate::query::ast::{BinaryOperator, Expression, Literal, UnaryOperator};
use crate::query::error::{QueryError, QueryResult};
use crate::query::token::{Keyword, Operator, Punctuation, Token, TokenKind};

/// Where an expression appears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Context {
    /// Any value: arguments, parenthesized groups
    Value,
    /// WHERE bodies; every operand of AND/OR/NOT must be a condition
    Condition,
    /// A parenthesized group inside a WHERE body. It may be a value, as in
    /// `(a + 1) > 3`, but operands of AND/OR/NOT must still be conditions.
    Group,
}

impl<'a> Parser<'a> {
    /// Parse a general expression
    pub(super) fn parse_expression(&mut self) -> QueryResult<Expression> {
        self.parse_or(Context::Value)
    }

    /// Parse a WHERE body
    pub(super) fn parse_condition(&mut self) -> QueryResult<Expression> {
        self.parse_or(Context::Condition)
    }

    fn parse_or(&mut self, ctx: Context) -> QueryResult<Expression> {
        let start = self.peek()?.clone();
        let mut left = self.parse_and(ctx)?;
        while self.eat_keyword(Keyword::Or)? {
            check_operand(ctx, &start, &left)?;
            let right_start = self.peek()?.clone();
            let right = self.parse_and(ctx)?;
            check_operand(ctx, &right_start, &right)?;
            left = Expression::binary(BinaryOperator::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self, ctx: Context) -> QueryResult<Expression> {
        let start = self.peek()?.clone();
        let mut left = self.parse_not(ctx)?;
        while self.eat_keyword(Keyword::And)? {
            check_operand(ctx, &start, &left)?;
            let right_start = self.peek()?.clone();
            let right = self.parse_not(ctx)?;
            check_operand(ctx, &right_start, &right)?;
            left = Expression::binary(BinaryOperator::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self, ctx: Context) -> QueryResult<Expression> {
        let start = self.peek()?.clone();

        if start.is_keyword(Keyword::Not) {
            // NOT inside a WHERE body, grouped or not, negates a condition
            let operand_ctx = match ctx {
                Context::Value => Context::Value,
                Context::Condition | Context::Group => Context::Condition,
            };
            self.enter(&start)?;
            self.advance()?;
            let operand = self.parse_not(operand_ctx)?;
            self.leave();
            return Ok(Expression::unary(UnaryOperator::Not, operand));
        }

        let expr = self.parse_comparison(ctx)?;
        if ctx == Context::Condition {
            check_operand(ctx, &start, &expr)?;
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self, ctx: Context) -> QueryResult<Expression> {
        let start = self.peek()?.clone();
        let left = self.parse_binary(0, ctx)?;

        let token = self.peek()?.clone();
        if let Some(op) = comparison_operator(token.kind) {
            self.advance()?;
            let right = self.parse_arithmetic()?;
            return Ok(Expression::binary(op, left, right));
        }

        let negated = token.is_keyword(Keyword::Not);
        if negated {
            self.advance()?;
        }

        let token = self.peek()?.clone();
        if token.is_keyword(Keyword::In) {
            self.advance()?;
            let identifier = membership_subject(&start, left, "IN")?;
            let values = self.parse_literal_list()?;
            return Ok(Expression::InList {
                identifier,
                values,
                negated,
            });
        }

        if token.is_keyword(Keyword::Like) {
            self.advance()?;
            let identifier = membership_subject(&start, left, "LIKE")?;
            let pattern = self.advance()?;
            let Some(text) = pattern.string() else {
                return Err(unexpected(&pattern, vec!["string pattern".to_string()]));
            };
            return Ok(Expression::LikePattern {
                identifier,
                pattern: text.to_string(),
                negated,
            });
        }

        if negated {
            return Err(unexpected(&token, vec!["IN".to_string(), "LIKE".to_string()]));
        }
        Ok(left)
    }

    /// Parse `+ - * /` expressions (the SELECT item grammar)
    pub(super) fn parse_arithmetic(&mut self) -> QueryResult<Expression> {
        self.parse_binary(0, Context::Value)
    }

    /// `ctx` applies to a leading parenthesized group only; operands after an
    /// operator are plain values.
    fn parse_binary(&mut self, min_prec: u8, ctx: Context) -> QueryResult<Expression> {
        let mut left = self.parse_unary(ctx)?;

        loop {
            let Some(op) = arithmetic_operator(self.peek_kind()?) else {
                break;
            };
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }

            self.advance()?;
            let right = self.parse_binary(prec + 1, Context::Value)?;
            left = Expression::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self, ctx: Context) -> QueryResult<Expression> {
        let token = self.peek()?.clone();
        if token.kind != TokenKind::Operator(Operator::Minus) {
            return self.parse_primary(ctx);
        }

        self.enter(&token)?;
        self.advance()?;
        let operand = self.parse_unary(Context::Value)?;
        self.leave();

        // -5 is a literal, not an operator applied to one
        if let Expression::Literal {
            value: Literal::Number(n),
        } = &operand
        {
            if let Some(negated) = n.negate() {
                return Ok(Expression::Literal {
                    value: Literal::Number(negated),
                });
            }
        }
        Ok(Expression::unary(UnaryOperator::Negate, operand))
    }

    fn parse_primary(&mut self, ctx: Context) -> QueryResult<Expression> {
        let token = self.advance()?;

        match token.kind {
            TokenKind::Number => {
                if let Some(n) = token.number() {
                    return Ok(Expression::Literal {
                        value: Literal::Number(n),
                    });
                }
            }
            TokenKind::String => {
                if let Some(s) = token.string() {
                    return Ok(Expression::string(s));
                }
            }
            TokenKind::Punctuation(Punctuation::LeftParen) => {
                let inner_ctx = match ctx {
                    Context::Value => Context::Value,
                    Context::Condition | Context::Group => Context::Group,
                };
                self.enter(&token)?;
                let inner = self.parse_or(inner_ctx)?;
                self.expect_punct(Punctuation::RightParen)?;
                self.leave();
                return Ok(inner);
            }
            _ => {}
        }

        if let Some(value) = boolean_literal(&token) {
            return Ok(Expression::boolean(value));
        }

        let Some(name) = token.identifier() else {
            return Err(unexpected(&token, vec!["expression".to_string()]));
        };
        let name = name.to_string();

        let next = self.peek()?.clone();
        if next.kind != TokenKind::Punctuation(Punctuation::LeftParen) {
            return Ok(Expression::Identifier { name });
        }

        self.enter(&next)?;
        self.advance()?;
        let args = self.parse_call_args()?;
        self.leave();
        Ok(Expression::FunctionCall { name, args })
    }

    /// Arguments after the opening parenthesis, through the closing one
    fn parse_call_args(&mut self) -> QueryResult<Vec<Expression>> {
        let mut args = Vec::new();
        if self.eat_punct(Punctuation::RightParen)? {
            return Ok(args);
        }

        loop {
            args.push(self.parse_argument()?);

            let token = self.advance()?;
            match token.kind {
                TokenKind::Punctuation(Punctuation::Comma) => continue,
                TokenKind::Punctuation(Punctuation::RightParen) => return Ok(args),
                _ => return Err(unexpected(&token, vec!["','".to_string(), "')'".to_string()])),
            }
        }
    }

    fn parse_argument(&mut self) -> QueryResult<Expression> {
        let token = self.peek()?.clone();
        match token.kind {
            TokenKind::Operator(Operator::Star) => {
                self.advance()?;
                Ok(Expression::Wildcard)
            }
            TokenKind::Punctuation(Punctuation::Comma | Punctuation::RightParen) => {
                Err(unexpected(&token, vec!["argument".to_string()]))
            }
            _ => self.parse_expression(),
        }
    }

    /// `( literal [, literal]* )` after IN
    fn parse_literal_list(&mut self) -> QueryResult<Vec<Literal>> {
        self.expect_punct(Punctuation::LeftParen)?;

        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);

            let token = self.advance()?;
            match token.kind {
                TokenKind::Punctuation(Punctuation::Comma) => continue,
                TokenKind::Punctuation(Punctuation::RightParen) => return Ok(values),
                _ => return Err(unexpected(&token, vec!["','".to_string(), "')'".to_string()])),
            }
        }
    }

    fn parse_literal(&mut self) -> QueryResult<Literal> {
        let token = self.advance()?;

        if let Some(s) = token.string() {
            return Ok(Literal::String(s.to_string()));
        }
        if let Some(n) = token.number() {
            return Ok(Literal::Number(n));
        }
        if let Some(b) = boolean_literal(&token) {
            return Ok(Literal::Boolean(b));
        }
        if token.kind == TokenKind::Operator(Operator::Minus) {
            let number = self.advance()?;
            if let Some(n) = number.number().and_then(|n| n.negate()) {
                return Ok(Literal::Number(n));
            }
            return Err(unexpected(&number, vec!["number".to_string()]));
        }

        Err(unexpected(&token, vec!["literal".to_string()]))
    }
}

fn comparison_operator(kind: TokenKind) -> Option<BinaryOperator> {
    match kind {
        TokenKind::Operator(Operator::Eq) => Some(BinaryOperator::Eq),
        TokenKind::Operator(Operator::NotEq) => Some(BinaryOperator::NotEq),
        TokenKind::Operator(Operator::Lt) => Some(BinaryOperator::Lt),
        TokenKind::Operator(Operator::LtEq) => Some(BinaryOperator::LtEq),
        TokenKind::Operator(Operator::Gt) => Some(BinaryOperator::Gt),
        TokenKind::Operator(Operator::GtEq) => Some(BinaryOperator::GtEq),
        _ => None,
    }
}

fn arithmetic_operator(kind: TokenKind) -> Option<BinaryOperator> {
    match kind {
        TokenKind::Operator(Operator::Plus) => Some(BinaryOperator::Add),
        TokenKind::Operator(Operator::Minus) => Some(BinaryOperator::Sub),
        TokenKind::Operator(Operator::Star) => Some(BinaryOperator::Mul),
        TokenKind::Operator(Operator::Slash) => Some(BinaryOperator::Div),
        _ => None,
    }
}

/// `true` / `false`, unless written as a backtick identifier
fn boolean_literal(token: &Token<'_>) -> Option<bool> {
    if token.kind != TokenKind::Identifier || token.text.starts_with('`') {
        return None;
    }
    if token.text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if token.text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// IN and LIKE apply to a bare attribute only
fn membership_subject(start: &Token<'_>, left: Expression, keyword: &str) -> QueryResult<String> {
    match left {
        Expression::Identifier { name } => Ok(name),
        _ => Err(unexpected(start, vec![format!("attribute name before {}", keyword)])),
    }
}

/// Operands of AND/OR/NOT in a WHERE body must be conditions
fn check_operand(ctx: Context, start: &Token<'_>, expr: &Expression) -> QueryResult<()> {
    if ctx == Context::Value || expr.is_condition() {
        return Ok(());
    }
    Err(not_a_condition(start, expr))
}

fn not_a_condition(start: &Token<'_>, expr: &Expression) -> QueryError {
    let found = match expr {
        Expression::Literal { .. } => format!("literal {}", expr),
        Expression::Wildcard => "'*'".to_string(),
        Expression::UnaryOp {
            op: UnaryOperator::Negate,
            ..
        } => format!("arithmetic expression {}", expr),
        Expression::BinaryOp { op, .. } if op.is_arithmetic() => {
            format!("arithmetic expression {}", expr)
        }
        _ => format!("expression {}", expr),
    };
    QueryError::Parse {
        line: start.line,
        column: start.column,
        expected: vec!["condition".to_string()],
        found,
    }
}

#[cfg(test)]
mod tests {
    use crate::query::ast::*;
    use crate::query::{parse_query, QueryError};

    fn where_of(condition: &str) -> Expression {
        let query = parse_query(&format!("SELECT count(*) FROM E WHERE {}", condition)).unwrap();
        query.where_clause.unwrap()
    }

    fn where_error(condition: &str) -> QueryError {
        parse_query(&format!("SELECT count(*) FROM E WHERE {}", condition)).unwrap_err()
    }

    fn id(name: &str) -> Expression {
        Expression::identifier(name)
    }

    fn eq(name: &str, value: Expression) -> Expression {
        Expression::binary(BinaryOperator::Eq, id(name), value)
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(
            where_of("a = 1 OR b = 2 AND c = 3"),
            Expression::binary(
                BinaryOperator::Or,
                eq("a", Expression::integer(1)),
                Expression::binary(
                    BinaryOperator::And,
                    eq("b", Expression::integer(2)),
                    eq("c", Expression::integer(3)),
                ),
            )
        );
    }

    #[test]
    fn test_left_associative_and() {
        assert_eq!(
            where_of("a = 1 AND b = 2 AND c = 3"),
            Expression::binary(
                BinaryOperator::And,
                Expression::binary(
                    BinaryOperator::And,
                    eq("a", Expression::integer(1)),
                    eq("b", Expression::integer(2)),
                ),
                eq("c", Expression::integer(3)),
            )
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(
            where_of("(a = 1 OR b = 2) AND c = 3"),
            Expression::binary(
                BinaryOperator::And,
                Expression::binary(
                    BinaryOperator::Or,
                    eq("a", Expression::integer(1)),
                    eq("b", Expression::integer(2)),
                ),
                eq("c", Expression::integer(3)),
            )
        );
    }

    #[test]
    fn test_not_prefix() {
        assert_eq!(
            where_of("NOT a = 1"),
            Expression::unary(UnaryOperator::Not, eq("a", Expression::integer(1)))
        );
        assert_eq!(
            where_of("NOT NOT a = 1"),
            Expression::unary(
                UnaryOperator::Not,
                Expression::unary(UnaryOperator::Not, eq("a", Expression::integer(1)))
            )
        );
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(
            where_of("duration > 1 + 2 * 3"),
            Expression::binary(
                BinaryOperator::Gt,
                id("duration"),
                Expression::binary(
                    BinaryOperator::Add,
                    Expression::integer(1),
                    Expression::binary(
                        BinaryOperator::Mul,
                        Expression::integer(2),
                        Expression::integer(3)
                    ),
                ),
            )
        );
        assert_eq!(
            where_of("a - b - c > 0"),
            Expression::binary(
                BinaryOperator::Gt,
                Expression::binary(
                    BinaryOperator::Sub,
                    Expression::binary(BinaryOperator::Sub, id("a"), id("b")),
                    id("c"),
                ),
                Expression::integer(0),
            )
        );
    }

    #[test]
    fn test_negative_literal_folds() {
        assert_eq!(where_of("delta > -5"), Expression::binary(
            BinaryOperator::Gt,
            id("delta"),
            Expression::integer(-5),
        ));
        assert_eq!(
            where_of("-delta < 0"),
            Expression::binary(
                BinaryOperator::Lt,
                Expression::unary(UnaryOperator::Negate, id("delta")),
                Expression::integer(0),
            )
        );
    }

    #[test]
    fn test_in_list() {
        assert_eq!(
            where_of("countryCode IN ('CA', 'US')"),
            Expression::InList {
                identifier: "countryCode".to_string(),
                values: vec![
                    Literal::String("CA".to_string()),
                    Literal::String("US".to_string())
                ],
                negated: false,
            }
        );
        assert_eq!(
            where_of("code NOT IN (1, -2, 3.5)"),
            Expression::InList {
                identifier: "code".to_string(),
                values: vec![
                    Literal::Number(Number::Integer(1)),
                    Literal::Number(Number::Integer(-2)),
                    Literal::Number(Number::Float(3.5)),
                ],
                negated: true,
            }
        );
    }

    #[test]
    fn test_empty_in_list() {
        let err = where_error("code IN ()");
        assert_eq!((err.line(), err.column()), (1, 39));
        assert_eq!(err.message(), "expected literal, found ')'");
    }

    #[test]
    fn test_like() {
        assert_eq!(
            where_of("name LIKE '%checkout%'"),
            Expression::LikePattern {
                identifier: "name".to_string(),
                pattern: "%checkout%".to_string(),
                negated: false,
            }
        );
        assert_eq!(
            where_of("a = 1 OR b NOT LIKE \"1\""),
            Expression::binary(
                BinaryOperator::Or,
                eq("a", Expression::integer(1)),
                Expression::LikePattern {
                    identifier: "b".to_string(),
                    pattern: "1".to_string(),
                    negated: true,
                },
            )
        );
    }

    #[test]
    fn test_like_requires_string() {
        let err = where_error("name LIKE 5");
        assert_eq!(err.message(), "expected string pattern, found number 5");
    }

    #[test]
    fn test_not_without_in_or_like() {
        let err = where_error("name NOT = 'x'");
        assert_eq!(err.message(), "expected one of IN or LIKE, found '='");
    }

    #[test]
    fn test_function_call_in_where() {
        assert_eq!(
            where_of("lower(name) = 'x'"),
            Expression::binary(
                BinaryOperator::Eq,
                Expression::function("lower", vec![id("name")]),
                Expression::string("x"),
            )
        );
    }

    #[test]
    fn test_booleans_and_contextual_keywords() {
        assert_eq!(where_of("isMobile = TRUE"), eq("isMobile", Expression::boolean(true)));
        assert_eq!(where_of("day = 3"), eq("day", Expression::integer(3)));
        assert_eq!(where_of("`from` = 'x'"), eq("from", Expression::string("x")));
    }

    #[test]
    fn test_bare_literal_rejected() {
        let err = where_error("5");
        assert!(matches!(err, QueryError::Parse { .. }));
        assert_eq!((err.line(), err.column()), (1, 30));
        assert_eq!(err.message(), "expected condition, found literal 5");
    }

    #[test]
    fn test_literal_operand_rejected() {
        let err = where_error("a = 1 AND 'x'");
        assert_eq!((err.line(), err.column()), (1, 40));
    }

    #[test]
    fn test_arithmetic_body_rejected() {
        let err = where_error("duration + 1");
        assert_eq!(err.message(), "expected condition, found arithmetic expression duration + 1");
    }

    #[test]
    fn test_grouped_operand_rejected_in_place() {
        let err = where_error("(a = 1 AND 5)");
        assert_eq!((err.line(), err.column()), (1, 41));
        assert_eq!(err.message(), "expected condition, found literal 5");

        let err = where_error("(5 OR a = 1)");
        assert_eq!((err.line(), err.column()), (1, 31));

        let err = where_error("NOT (a = 1 AND b - 1)");
        assert_eq!((err.line(), err.column()), (1, 45));
        assert_eq!(err.message(), "expected condition, found arithmetic expression b - 1");
    }

    #[test]
    fn test_grouped_values_still_allowed() {
        assert_eq!(
            where_of("(a + 1) > 3"),
            Expression::binary(
                BinaryOperator::Gt,
                Expression::binary(BinaryOperator::Add, id("a"), Expression::integer(1)),
                Expression::integer(3),
            )
        );

        let err = where_error("(a + 1)");
        assert_eq!((err.line(), err.column()), (1, 30));
        assert_eq!(err.message(), "expected condition, found arithmetic expression a + 1");
    }

    #[test]
    fn test_missing_operand() {
        let err = where_error("a =");
        assert_eq!(err.message(), "expected expression, found end of input");
        assert_eq!((err.line(), err.column()), (1, 33));
    }

    #[test]
    fn test_missing_close_paren() {
        let err = where_error("(a = 1 OR b = 2");
        assert_eq!(err.message(), "expected ')', found end of input");
    }

    #[test]
    fn test_empty_argument() {
        let err = parse_query("SELECT percentile(duration, , 95) FROM E").unwrap_err();
        assert_eq!((err.line(), err.column()), (1, 29));
        assert_eq!(err.message(), "expected argument, found ','");
    }

    #[test]
    fn test_comparison_does_not_chain() {
        let err = where_error("a = b = c");
        assert_eq!((err.line(), err.column()), (1, 36));
    }
}
