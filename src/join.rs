//! Predicate joins between two sequences.
//!
//! Rows are produced lazily in left-major order: for each left element the
//! predicate is tried against every right element in order. Inside the
//! predicate `left` and `right` name the two candidates:
//!
//! ```text
//! #innerjoin(Drivers, Cars, left.CarId == right.Id)
//! ```
//!
//! Nothing is materialized beyond the right-hand sequence itself; the
//! number of predicate evaluations is |left| × |right|.

use crate::{
    ast::Expr,
    context::Context,
    error::Result,
    evaluator::evaluate,
    value::{Map, Value},
};

/// Whether unmatched left elements are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Only matched pairs
    Inner,
    /// Matched pairs plus `(left, null)` for each left element with no match
    Outer,
}

/// One joined row.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPair {
    pub left: Value,
    pub right: Option<Value>,
}

impl JoinPair {
    /// The row as `{"left": .., "right": ..}` (`right` is `null` when unmatched).
    pub fn into_value(self) -> Value {
        row_value(self.left, self.right)
    }
}

pub(crate) fn row_value(left: Value, right: Option<Value>) -> Value {
    let mut row = Map::new();
    row.insert("left".to_string(), left);
    row.insert("right".to_string(), right.unwrap_or(Value::Null));
    Value::Object(row)
}

/// Lazy join iterator. Stops after the first predicate error.
pub struct JoinIter<'c> {
    kind: JoinKind,
    left: std::vec::IntoIter<Value>,
    right: Vec<Value>,
    predicate: &'c Expr,
    ctx: &'c Context<'c>,
    /// Left element being scanned, the next right index, and whether it matched yet
    current: Option<(Value, usize, bool)>,
    failed: bool,
}

impl<'c> JoinIter<'c> {
    pub fn new(kind: JoinKind, left: Value, right: Value, predicate: &'c Expr, ctx: &'c Context<'c>) -> Self {
        JoinIter {
            kind,
            left: into_items(left).into_iter(),
            right: into_items(right),
            predicate,
            ctx,
            current: None,
            failed: false,
        }
    }
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

impl Iterator for JoinIter<'_> {
    type Item = Result<JoinPair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let (left, mut index, mut matched) = match self.current.take() {
                Some(state) => state,
                None => (self.left.next()?, 0, false),
            };

            while index < self.right.len() {
                let right = &self.right[index];
                index += 1;
                let hit = evaluate(self.predicate, &self.ctx.with_row(&left, Some(right)));
                match hit {
                    Ok(v) if v.is_truthy() => {
                        matched = true;
                        let pair = JoinPair {
                            left: left.clone(),
                            right: Some(right.clone()),
                        };
                        self.current = Some((left, index, matched));
                        return Some(Ok(pair));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
            }

            if !matched && self.kind == JoinKind::Outer {
                return Some(Ok(JoinPair { left, right: None }));
            }
        }
    }
}

/// Collect a join into an array of row objects.
pub fn join_values(kind: JoinKind, left: Value, right: Value, predicate: &Expr, ctx: &Context) -> Result<Value> {
    let rows = JoinIter::new(kind, left, right, predicate, ctx)
        .map(|row| row.map(JoinPair::into_value))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(rows))
}
