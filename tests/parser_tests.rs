// tests/parser_tests.rs

use jtx::ast::{BinOp, Expr, UnaryOp};
use jtx::error::{ErrorKind, TransformError};
use jtx::parser::{parse_directive, parse_expression};
use jtx::value::Value;

fn parse(input: &str) -> Expr {
    parse_expression(input).unwrap_or_else(|e| panic!("Failed to parse '{}': {}", input, e))
}

fn ident(name: &str) -> Expr {
    Expr::Identifier(name.to_string())
}

fn int(n: i64) -> Expr {
    Expr::Literal(Value::Integer(n))
}

fn bin(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    assert_eq!(
        parse("100 + Salary * Months"),
        bin(
            BinOp::Add,
            int(100),
            bin(BinOp::Multiply, ident("Salary"), ident("Months"))
        )
    );
}

#[test]
fn test_signed_literals_in_arithmetic() {
    assert_eq!(
        parse("-14 * .53 + 3.5"),
        bin(
            BinOp::Add,
            bin(
                BinOp::Multiply,
                int(-14),
                Expr::Literal(Value::Float(0.53))
            ),
            Expr::Literal(Value::Float(3.5))
        )
    );
}

#[test]
fn test_left_associative_subtraction() {
    assert_eq!(
        parse("10 - 4 - 3"),
        bin(BinOp::Subtract, bin(BinOp::Subtract, int(10), int(4)), int(3))
    );
}

#[test]
fn test_and_binds_tighter_than_or() {
    assert_eq!(
        parse("a || b && c"),
        bin(BinOp::Or, ident("a"), bin(BinOp::And, ident("b"), ident("c")))
    );
    assert_eq!(
        parse("a or b and c"),
        bin(BinOp::Or, ident("a"), bin(BinOp::And, ident("b"), ident("c")))
    );
}

#[test]
fn test_comparison_below_arithmetic() {
    assert_eq!(
        parse("a + 1 > b == true"),
        bin(
            BinOp::Equal,
            bin(BinOp::GreaterThan, bin(BinOp::Add, ident("a"), int(1)), ident("b")),
            Expr::Literal(Value::Boolean(true))
        )
    );
}

#[test]
fn test_coalesce_below_or() {
    let expr = parse("a ?? b || c");
    assert!(matches!(
        expr,
        Expr::NullCoalesce { ref right, .. } if matches!(**right, Expr::BinaryOp { op: BinOp::Or, .. })
    ));
}

#[test]
fn test_ternary_is_lowest_and_right_associative() {
    let expr = parse("a ? b : c ? d : e");
    let Expr::Ternary { else_branch, .. } = expr else {
        panic!("expected ternary");
    };
    assert!(matches!(*else_branch, Expr::Ternary { .. }));

    let expr = parse("x ?? y ? 1 : 2");
    let Expr::Ternary { condition, .. } = expr else {
        panic!("expected ternary");
    };
    assert!(matches!(*condition, Expr::NullCoalesce { .. }));
}

#[test]
fn test_parentheses_override_precedence() {
    assert_eq!(
        parse("(1 + 2) * 3"),
        bin(BinOp::Multiply, bin(BinOp::Add, int(1), int(2)), int(3))
    );
}

#[test]
fn test_unary_not_and_negate() {
    assert_eq!(
        parse("!Active"),
        Expr::UnaryOp {
            op: UnaryOp::Not,
            operand: Box::new(ident("Active")),
        }
    );
    assert_eq!(
        parse("-(Price)"),
        Expr::UnaryOp {
            op: UnaryOp::Negate,
            operand: Box::new(ident("Price")),
        }
    );
}

// ============================================================================
// Postfix
// ============================================================================

#[test]
fn test_member_access_chain() {
    assert_eq!(
        parse("Customer.Address.City"),
        Expr::MemberAccess {
            object: Box::new(Expr::MemberAccess {
                object: Box::new(ident("Customer")),
                name: "Address".to_string(),
            }),
            name: "City".to_string(),
        }
    );
}

#[test]
fn test_filter_is_postfix() {
    assert_eq!(
        parse("Cars[Make == 'Chevy']"),
        Expr::IndexFilter {
            object: Box::new(ident("Cars")),
            predicate: Box::new(bin(
                BinOp::Equal,
                ident("Make"),
                Expr::Literal(Value::String("Chevy".into()))
            )),
        }
    );
}

#[test]
fn test_filter_then_member() {
    let expr = parse("Cars[Year > 2010].Model");
    assert!(matches!(
        expr,
        Expr::MemberAccess { ref object, .. } if matches!(**object, Expr::IndexFilter { .. })
    ));
}

#[test]
fn test_function_call_arguments() {
    assert_eq!(
        parse("substring(Name, 0, 3)"),
        Expr::FunctionCall {
            name: "substring".to_string(),
            args: vec![ident("Name"), int(0), int(3)],
        }
    );
}

#[test]
fn test_method_call_sugar() {
    assert_eq!(
        parse("Name.upper()"),
        Expr::FunctionCall {
            name: "upper".to_string(),
            args: vec![ident("Name")],
        }
    );
}

#[test]
fn test_array_literal_and_keywords() {
    assert_eq!(
        parse("[1, 'a', null, false]"),
        Expr::ArrayLiteral(vec![
            int(1),
            Expr::Literal(Value::String("a".into())),
            Expr::Literal(Value::Null),
            Expr::Literal(Value::Boolean(false)),
        ])
    );
    assert_eq!(parse("[]"), Expr::ArrayLiteral(vec![]));
}

#[test]
fn test_scope_and_variables() {
    assert_eq!(parse("@"), Expr::CurrentScope);
    assert_eq!(parse("$model"), Expr::VariableRef("model".to_string()));
}

// ============================================================================
// Directives
// ============================================================================

#[test]
fn test_directive_headers() {
    let directive = parse_directive("#foreach(Customers[Active], Names)").unwrap();
    assert_eq!(directive.name, "foreach");
    assert_eq!(directive.args.len(), 2);
    assert!(directive.has_args);

    let directive = parse_directive("#noobject").unwrap();
    assert_eq!(directive.name, "noobject");
    assert!(!directive.has_args);

    let directive = parse_directive("#(Price * 2)").unwrap();
    assert_eq!(directive.name, "");
    assert_eq!(directive.args.len(), 1);
}

#[test]
fn test_directive_with_trailing_text_is_error() {
    assert!(parse_directive("#(Name) extra").is_err());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_syntax_errors() {
    let cases = vec!["", "1 +", "(1 + 2", "Cars[Make", "Cars[]", "a ? b", "* 2", "1 2", "()"];

    for input in cases {
        let err = parse_expression(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax, "Expected syntax error for: {:?}", input);
    }
}

#[test]
fn test_syntax_error_carries_line() {
    let err = parse_expression("a +\n  )").unwrap_err();
    assert!(matches!(err, TransformError::Syntax { line: Some(2), .. }));
}

#[test]
fn test_directive_inside_expression_is_error() {
    assert!(parse_expression("1 + #(2)").is_err());
}
