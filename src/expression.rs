// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Boolean assertion expressions evaluated against a single query result.
//!
//! Expressions look like `> 5`, `== "Running"`, `>= 2 && < 10` or
//! `.ready == true or value =~ "^ok"`. When a comparison has no left
//! operand it compares the value itself; `value` and `.` also name it.
//! Operands reuse the query language, so paths, literals and arithmetic
//! are all available.

use serde_json::Value;

use crate::error::{EvalError, SyntaxError};
use crate::query::eval::eval;
use crate::query::lexer::Token;
use crate::query::parser::{BinOp, Filter, Parser};
use crate::query::value::type_name;

/// Evaluate `expression` against `value`
pub fn evaluate(value: &Value, expression: &str) -> Result<bool, EvalError> {
    let filter = parse(expression)?;
    let result = eval(&filter, value.clone()).next();
    match result {
        Some(Ok(Value::Bool(b))) => Ok(b),
        Some(Ok(other)) => Err(EvalError::TypeMismatch {
            found: type_name(&other),
        }),
        Some(Err(e)) => Err(EvalError::Evaluation(e)),
        None => Err(EvalError::TypeMismatch { found: "no value" }),
    }
}

fn parse(expression: &str) -> Result<Filter, SyntaxError> {
    let mut parser = Parser::new(expression)?.with_identity_alias("value");
    if *parser.peek() == Token::Eof {
        return Err(SyntaxError::new(0, "empty expression"));
    }
    let filter = parse_or(&mut parser)?;
    parser.expect_end()?;
    Ok(filter)
}

fn parse_or(p: &mut Parser) -> Result<Filter, SyntaxError> {
    let mut lhs = parse_and(p)?;
    while *p.peek() == Token::OrOr || p.at_keyword("or") {
        p.advance();
        let rhs = parse_and(p)?;
        lhs = Filter::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(p: &mut Parser) -> Result<Filter, SyntaxError> {
    let mut lhs = parse_not(p)?;
    while *p.peek() == Token::AndAnd || p.at_keyword("and") {
        p.advance();
        let rhs = parse_not(p)?;
        lhs = Filter::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_not(p: &mut Parser) -> Result<Filter, SyntaxError> {
    if *p.peek() == Token::Bang || p.at_keyword("not") {
        p.advance();
        return Ok(Filter::Not(Box::new(p.nested(parse_not)?)));
    }
    parse_comparison(p)
}

fn comparison_op(p: &Parser) -> Option<BinOp> {
    p.comparison_op()
        .or_else(|| (*p.peek() == Token::Matches).then_some(BinOp::Matches))
}

fn parse_comparison(p: &mut Parser) -> Result<Filter, SyntaxError> {
    let lhs = match comparison_op(p) {
        // Implicit left operand
        Some(_) => Filter::Identity,
        None if *p.peek() == Token::LParen => {
            p.advance();
            let inner = p.nested(parse_or)?;
            p.expect(Token::RParen)?;
            inner
        }
        None => p.parse_additive()?,
    };

    let Some(op) = comparison_op(p) else {
        return Ok(lhs);
    };
    p.advance();
    let rhs = p.parse_additive()?;
    if comparison_op(p).is_some() {
        return Err(SyntaxError::new(
            p.offset(),
            "comparisons cannot be chained; combine them with && or ||",
        ));
    }
    Ok(Filter::Binary(op, Box::new(lhs), Box::new(rhs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_implicit_left_operand() {
        assert!(evaluate(&json!(7), "> 5").unwrap());
        assert!(!evaluate(&json!(3), "> 5").unwrap());
        assert!(evaluate(&json!(5), ">= 5").unwrap());
        assert!(evaluate(&json!("Running"), r#"== "Running""#).unwrap());
        assert!(evaluate(&json!("Pending"), r#"!= "Running""#).unwrap());
    }

    #[test]
    fn test_value_alias_and_identity() {
        assert!(evaluate(&json!(4), "value < 5").unwrap());
        assert!(evaluate(&json!(4), ". < 5").unwrap());
        assert!(evaluate(&json!(4), "value * 2 == 8").unwrap());
    }

    #[test]
    fn test_boolean_logic() {
        assert!(evaluate(&json!(7), ">= 2 && < 10").unwrap());
        assert!(!evaluate(&json!(12), ">= 2 and < 10").unwrap());
        assert!(evaluate(&json!(0), "== 0 || > 100").unwrap());
        assert!(evaluate(&json!(3), "!(> 5)").unwrap());
        assert!(evaluate(&json!(3), "not > 5").unwrap());
        assert!(evaluate(&json!(50), "(> 1 && < 5) || == 50").unwrap());
    }

    #[test]
    fn test_paths_into_value() {
        let doc = json!({"status": {"readyReplicas": 3, "replicas": 3}});
        assert!(evaluate(&doc, ".status.readyReplicas == .status.replicas").unwrap());
        assert!(evaluate(&doc, "value.status.replicas > 2").unwrap());
    }

    #[test]
    fn test_regex_match() {
        assert!(evaluate(&json!("web-12"), r#"=~ "^web-[0-9]+$""#).unwrap());
        assert!(!evaluate(&json!("db-1"), r#"=~ "^web-""#).unwrap());
        assert!(matches!(
            evaluate(&json!(3), r#"=~ "3""#),
            Err(EvalError::Evaluation(_))
        ));
    }

    #[test]
    fn test_mixed_types_use_total_order() {
        // numbers sort before strings
        assert!(evaluate(&json!(100), r#"< "a""#).unwrap());
        assert!(!evaluate(&json!("5"), "== 5").unwrap());
    }

    #[test]
    fn test_non_boolean_is_type_mismatch() {
        assert_eq!(
            evaluate(&json!(3), "value + 1"),
            Err(EvalError::TypeMismatch { found: "number" })
        );
        assert_eq!(
            evaluate(&json!({"a": 1}), ".a"),
            Err(EvalError::TypeMismatch { found: "number" })
        );
        assert!(evaluate(&json!(true), "value").unwrap());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(evaluate(&json!(1), ""), Err(EvalError::Syntax(_))));
        assert!(matches!(evaluate(&json!(1), "> "), Err(EvalError::Syntax(_))));
        assert!(matches!(evaluate(&json!(1), "1 < 2 < 3"), Err(EvalError::Syntax(_))));
        assert!(matches!(evaluate(&json!(1), "> 1 &&"), Err(EvalError::Syntax(_))));
        assert!(matches!(evaluate(&json!(1), "(> 1"), Err(EvalError::Syntax(_))));
    }

    #[test]
    fn test_arithmetic_overflow_is_an_evaluation_error() {
        assert!(matches!(
            evaluate(&json!(-1e19), "value % -1 == 0"),
            Err(EvalError::Evaluation(_))
        ));
        assert!(matches!(
            evaluate(&json!("ab"), "value * 1e19 == \"\""),
            Err(EvalError::Evaluation(_))
        ));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let big = json!(9007199254740993u64);
        assert!(!evaluate(&big, "== 9007199254740992").unwrap());
        assert!(evaluate(&big, "== 9007199254740993").unwrap());
        assert!(evaluate(&big, "> 9007199254740992").unwrap());
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let negations = format!("{}> 1", "!".repeat(5000));
        assert!(matches!(evaluate(&json!(1), &negations), Err(EvalError::Syntax(_))));
        let groups = format!("{}> 1{}", "(".repeat(5000), ")".repeat(5000));
        assert!(matches!(evaluate(&json!(1), &groups), Err(EvalError::Syntax(_))));
        assert!(evaluate(&json!(1), "!!(((== 1)))").unwrap());
    }

    #[test]
    fn test_evaluation_error() {
        let err = evaluate(&json!("text"), ".a > 1").unwrap_err();
        assert!(matches!(err, EvalError::Evaluation(_)));
    }
}
