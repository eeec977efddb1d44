//! Expression evaluation.
//!
//! [`evaluate`] reduces an [`Expr`] to a [`Value`] against a [`Context`].
//! [`iterate`] does the same for sequence sources (`#foreach`, joins) but
//! yields elements lazily, so filters and joins are only computed as far as
//! the consumer pulls.
//!
//! Missing properties and unbound variables evaluate to `null` rather than
//! failing; `??` and ternary defaults rely on that.

use std::cmp::Ordering;

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{
    ast::{BinOp, Expr, UnaryOp},
    context::{Context, Scope},
    error::{Result, TransformError},
    functions, join,
    value::{Value, compare_values, values_equal},
};

/// Lazily produced sequence elements.
pub type ValueIter<'c> = Box<dyn Iterator<Item = Result<Value>> + 'c>;

/// Evaluates an expression in the given context.
///
/// # Examples
///
/// ```
/// use jtx::{Transformer, Value};
/// use jtx::parser::parse_expression;
///
/// let expr = parse_expression("FirstName ?? 'anonymous'").unwrap();
/// let data = Value::parse(r#"{"LastName": "Smith"}"#).unwrap();
/// let result = Transformer::evaluate_expression(&expr, &data).unwrap();
/// assert_eq!(result, Value::String("anonymous".into()));
/// ```
pub fn evaluate(expr: &Expr, ctx: &Context) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Identifier(name) => Ok(resolve_identifier(ctx, name)),
        Expr::CurrentScope => Ok(ctx.current()),
        Expr::VariableRef(name) => Ok(ctx.variable(name).unwrap_or(Value::Null)),
        Expr::MemberAccess { object, name } => {
            let object = evaluate(object, ctx)?;
            Ok(member(&object, name))
        }
        Expr::IndexFilter { object, predicate } => bracket(evaluate(object, ctx)?, predicate, ctx),
        Expr::BinaryOp { op: BinOp::And, left, right } => {
            if !evaluate(left, ctx)?.is_truthy() {
                return Ok(Value::Boolean(false));
            }
            Ok(Value::Boolean(evaluate(right, ctx)?.is_truthy()))
        }
        Expr::BinaryOp { op: BinOp::Or, left, right } => {
            if evaluate(left, ctx)?.is_truthy() {
                return Ok(Value::Boolean(true));
            }
            Ok(Value::Boolean(evaluate(right, ctx)?.is_truthy()))
        }
        Expr::BinaryOp { op, left, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            apply_binop(*op, &left, &right)
        }
        Expr::UnaryOp { op, operand } => {
            let value = evaluate(operand, ctx)?;
            match op {
                UnaryOp::Not => Ok(Value::Boolean(!value.is_truthy())),
                UnaryOp::Negate => arithmetic(BinOp::Subtract, &Value::Integer(0), &value),
            }
        }
        Expr::Ternary {
            condition,
            then_branch,
            else_branch,
        } => {
            if evaluate(condition, ctx)?.is_truthy() {
                evaluate(then_branch, ctx)
            } else {
                evaluate(else_branch, ctx)
            }
        }
        Expr::NullCoalesce { left, right } => {
            let left = evaluate(left, ctx)?;
            if left.is_null() { evaluate(right, ctx) } else { Ok(left) }
        }
        Expr::FunctionCall { name, args } => functions::call(name, args, ctx),
        Expr::ArrayLiteral(items) => {
            let mut arr = Vec::with_capacity(items.len());
            for item in items {
                arr.push(evaluate(item, ctx)?);
            }
            Ok(Value::Array(arr))
        }
    }
}

/// Evaluates a sequence source element by element.
///
/// Filters and joins are applied lazily; any other expression is evaluated
/// once and its array elements yielded (`null` is empty, a scalar or object is
/// a one-element sequence).
pub fn iterate<'c>(expr: &'c Expr, ctx: &'c Context<'c>) -> Result<ValueIter<'c>> {
    match expr {
        Expr::IndexFilter { object, predicate } if literal_index(predicate).is_none() => {
            match evaluate(object, ctx)? {
                source @ Value::Array(_) => Ok(Box::new(filter(source, predicate, ctx))),
                other => sequence(bracket(other, predicate, ctx)?),
            }
        }
        Expr::FunctionCall { name, args } if functions::is_join(name) => {
            let rows = functions::join_rows(name, args, ctx)?;
            Ok(Box::new(rows.map(|row| row.map(join::JoinPair::into_value))))
        }
        _ => sequence(evaluate(expr, ctx)?),
    }
}

/// `source[predicate]` on an already evaluated operand: literal index, string key
/// on an object, or filter.
fn bracket(source: Value, predicate: &Expr, ctx: &Context) -> Result<Value> {
    if let Some(index) = literal_index(predicate) {
        return Ok(index_value(&source, index));
    }
    if let (Expr::Literal(Value::String(key)), Value::Object(_)) = (predicate, &source) {
        return Ok(member(&source, key));
    }
    match source {
        Value::Array(_) => {
            let matches = filter(source, predicate, ctx).collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(matches))
        }
        Value::Null => Ok(Value::Null),
        single => {
            let keep = evaluate(predicate, &ctx.with_scope(&single, 0))?.is_truthy();
            Ok(if keep { single } else { Value::Null })
        }
    }
}

fn sequence<'c>(value: Value) -> Result<ValueIter<'c>> {
    Ok(match value {
        Value::Array(items) => Box::new(items.into_iter().map(Ok)),
        Value::Null => Box::new(std::iter::empty()),
        single => Box::new(std::iter::once(Ok(single))),
    })
}

/// Elements of `source` for which `predicate` is truthy, each evaluated as the current scope.
fn filter<'c>(source: Value, predicate: &'c Expr, ctx: &'c Context<'c>) -> impl Iterator<Item = Result<Value>> + 'c {
    let items = match source {
        Value::Array(items) => items,
        other => vec![other],
    };
    items.into_iter().enumerate().filter_map(move |(i, item)| {
        match evaluate(predicate, &ctx.with_scope(&item, i)) {
            Ok(keep) if keep.is_truthy() => Some(Ok(item)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    })
}

fn resolve_identifier(ctx: &Context, name: &str) -> Value {
    match ctx.scope() {
        Scope::Node(value) => member(value, name),
        Scope::Row(left, right) => match name {
            "left" => left.clone(),
            "right" => right.cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        },
    }
}

/// Property lookup; over an array it collects every element's property,
/// flattening nested arrays one level and dropping nulls.
pub(crate) fn member(value: &Value, name: &str) -> Value {
    match value {
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                match member(item, name) {
                    Value::Null => {}
                    Value::Array(inner) => out.extend(inner),
                    other => out.push(other),
                }
            }
            Value::Array(out)
        }
        _ => Value::Null,
    }
}

/// `[3]` or `[-1]` written as a literal is an index rather than a filter.
fn literal_index(predicate: &Expr) -> Option<i64> {
    match predicate {
        Expr::Literal(Value::Integer(n)) => Some(*n),
        Expr::UnaryOp {
            op: UnaryOp::Negate,
            operand,
        } => match operand.as_ref() {
            Expr::Literal(Value::Integer(n)) => n.checked_neg(),
            _ => None,
        },
        _ => None,
    }
}

fn index_value(value: &Value, index: i64) -> Value {
    let Value::Array(arr) = value else {
        return Value::Null;
    };
    let index = if index < 0 {
        // Negative index: count from end (-1 = last)
        let back = index.unsigned_abs() as usize;
        if back > arr.len() {
            return Value::Null;
        }
        arr.len() - back
    } else {
        index as usize
    };
    arr.get(index).cloned().unwrap_or(Value::Null)
}

pub(crate) fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinOp::Equal => Ok(Value::Boolean(values_equal(left, right))),
        BinOp::NotEqual => Ok(Value::Boolean(!values_equal(left, right))),
        BinOp::LessThan => Ok(Value::Boolean(relate(left, right) == Some(Ordering::Less))),
        BinOp::GreaterThan => Ok(Value::Boolean(relate(left, right) == Some(Ordering::Greater))),
        BinOp::LessEqual => Ok(Value::Boolean(matches!(
            relate(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ))),
        BinOp::GreaterEqual => Ok(Value::Boolean(matches!(
            relate(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        BinOp::Add if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) => {
            Ok(Value::String(format!("{}{}", left.to_text(), right.to_text())))
        }
        BinOp::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinOp::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
        _ => arithmetic(op, left, right),
    }
}

/// Ordering for relational operators; numeric strings compare with numbers.
fn relate(left: &Value, right: &Value) -> Option<Ordering> {
    compare_values(left, right).or_else(|| match (coerce_number(left), coerce_number(right)) {
        (Some(a), Some(b)) => compare_values(&a, &b),
        _ => None,
    })
}

/// Numeric view of a value; numeric strings coerce, everything else does not.
pub(crate) fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(_) | Value::Float(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                Some(Value::Integer(n))
            } else {
                s.parse::<f64>().ok().filter(|n| n.is_finite()).map(Value::Float)
            }
        }
        _ => None,
    }
}

/// Arithmetic with integer preservation.
///
/// Integer pairs stay integral (division only when exact). Pairs involving a
/// float go through `Decimal` so that `0.1 + 0.2` is `0.3`; a whole result of
/// mixed integer/float operands comes back as an integer.
pub(crate) fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value> {
    let (Some(a), Some(b)) = (coerce_number(left), coerce_number(right)) else {
        return Err(TransformError::TypeMismatch(format!(
            "Cannot apply '{}' to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )));
    };

    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => integer_op(op, x, y),
        (a, b) => {
            let keep_float = matches!((&a, &b), (Value::Float(_), Value::Float(_)));
            decimal_op(op, &a, &b, keep_float)
        }
    }
}

fn integer_op(op: BinOp, x: i64, y: i64) -> Result<Value> {
    let exact = match op {
        BinOp::Add => x.checked_add(y),
        BinOp::Subtract => x.checked_sub(y),
        BinOp::Multiply => x.checked_mul(y),
        BinOp::Divide => {
            if y == 0 {
                return Err(TransformError::DivisionByZero);
            }
            // Check if division is exact; if not, return Float
            if x % y != 0 {
                return decimal_op(op, &Value::Integer(x), &Value::Integer(y), true);
            }
            x.checked_div(y)
        }
        BinOp::Modulo => {
            if y == 0 {
                return Err(TransformError::DivisionByZero);
            }
            x.checked_rem(y)
        }
        _ => None,
    };
    match exact {
        Some(n) => Ok(Value::Integer(n)),
        None => float_op(op, x as f64, y as f64),
    }
}

fn decimal_op(op: BinOp, a: &Value, b: &Value, keep_float: bool) -> Result<Value> {
    let (fa, fb) = (a.as_float().unwrap_or(0.0), b.as_float().unwrap_or(0.0));
    if matches!(op, BinOp::Divide | BinOp::Modulo) && fb == 0.0 {
        return Err(TransformError::DivisionByZero);
    }

    if let (Some(da), Some(db)) = (to_decimal(a), to_decimal(b)) {
        let rd = match op {
            BinOp::Add => da.checked_add(db),
            BinOp::Subtract => da.checked_sub(db),
            BinOp::Multiply => da.checked_mul(db),
            BinOp::Divide => da.checked_div(db),
            BinOp::Modulo => da.checked_rem(db),
            _ => None,
        };
        if let Some(rd) = rd {
            if !keep_float
                && rd.is_integer()
                && let Some(r) = rd.to_i64()
            {
                return Ok(Value::Integer(r));
            } else if let Some(r) = rd.to_f64() {
                return Ok(Value::Float(r));
            }
        }
    }
    float_op(op, fa, fb)
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Integer(n) => Some(Decimal::from(*n)),
        Value::Float(n) => Decimal::from_f64(*n),
        _ => None,
    }
}

fn float_op(op: BinOp, a: f64, b: f64) -> Result<Value> {
    let r = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => a / b,
        BinOp::Modulo => a % b,
        other => {
            return Err(TransformError::TypeMismatch(format!(
                "'{}' is not an arithmetic operator",
                other.symbol()
            )));
        }
    };
    Ok(Value::Float(r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_arithmetic_collapses_to_integer() {
        let result = arithmetic(BinOp::Multiply, &Value::Integer(100), &Value::Float(1.1)).unwrap();
        assert_eq!(result, Value::Integer(110));
    }

    #[test]
    fn test_float_addition_is_decimal_exact() {
        let result = arithmetic(BinOp::Add, &Value::Float(0.1), &Value::Float(0.2)).unwrap();
        assert_eq!(result, Value::Float(0.3));
    }

    #[test]
    fn test_inexact_integer_division_returns_float() {
        let result = arithmetic(BinOp::Divide, &Value::Integer(7), &Value::Integer(2)).unwrap();
        assert_eq!(result, Value::Float(3.5));
    }

    #[test]
    fn test_division_by_zero() {
        let err = arithmetic(BinOp::Divide, &Value::Integer(1), &Value::Integer(0)).unwrap_err();
        assert!(matches!(err, TransformError::DivisionByZero));
    }

    #[test]
    fn test_arithmetic_on_boolean_is_type_mismatch() {
        let err = arithmetic(BinOp::Multiply, &Value::Boolean(true), &Value::Integer(2)).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch(_)));
    }

    #[test]
    fn test_numeric_string_coerces() {
        let result = arithmetic(BinOp::Multiply, &Value::String("4".into()), &Value::Integer(2)).unwrap();
        assert_eq!(result, Value::Integer(8));
    }

    #[test]
    fn test_member_over_array_flattens() {
        let value = Value::parse(r#"[{"a": [1, 2]}, {"a": 3}, {"b": 4}]"#).unwrap();
        assert_eq!(
            member(&value, "a"),
            Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
        );
    }

    #[test]
    fn test_negative_index() {
        let value = Value::parse("[1, 2, 3]").unwrap();
        assert_eq!(index_value(&value, -1), Value::Integer(3));
        assert_eq!(index_value(&value, -4), Value::Null);
        assert_eq!(index_value(&value, 7), Value::Null);
    }
}
