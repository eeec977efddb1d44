//! Built-in functions and the extension-function registry.
//!
//! Calls dispatch to a built-in first and to a registered extension second;
//! anything else is [`TransformError::FunctionNotFound`].
//!
//! `innerjoin`, `outerjoin` and `coalesce` are special forms: their arguments
//! are not all evaluated up front (the join predicate runs per candidate row,
//! `coalesce` stops at the first non-null).

use std::{collections::HashMap, fmt, sync::Arc};

use regex::Regex;

use crate::{
    ast::{BinOp, Expr},
    context::Context,
    error::{Result, TransformError},
    evaluator::{arithmetic, coerce_number, evaluate},
    join::{JoinIter, JoinKind},
    value::{Value, compare_values, values_equal},
};

/// A host-supplied function callable from expressions.
///
/// Implementations that keep internal state must synchronise it themselves:
/// one instance is shared by every invocation of the transformer it is
/// registered with.
pub trait ExtensionFunction: Send + Sync {
    fn call(&self, args: &[Value]) -> std::result::Result<Value, String>;
}

impl<F> ExtensionFunction for F
where
    F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync,
{
    fn call(&self, args: &[Value]) -> std::result::Result<Value, String> {
        self(args)
    }
}

/// Named extension functions, owned by one transformer.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn ExtensionFunction>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, function: impl ExtensionFunction + 'static) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn register_shared(&mut self, name: impl Into<String>, function: Arc<dyn ExtensionFunction>) {
        self.functions.insert(name.into(), function);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ExtensionFunction>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

pub(crate) fn is_join(name: &str) -> bool {
    matches!(name, "innerjoin" | "outerjoin")
}

/// Lazy rows of an `innerjoin(l, r, pred)` / `outerjoin(l, r, pred)` call.
pub(crate) fn join_rows<'c>(name: &str, args: &'c [Expr], ctx: &'c Context<'c>) -> Result<JoinIter<'c>> {
    let [left, right, predicate] = args else {
        return Err(arity(name, "3"));
    };
    let kind = if name == "outerjoin" { JoinKind::Outer } else { JoinKind::Inner };
    let left = evaluate(left, ctx)?;
    let right = evaluate(right, ctx)?;
    Ok(JoinIter::new(kind, left, right, predicate, ctx))
}

fn arity(name: &str, expected: &str) -> TransformError {
    TransformError::ArgumentCount {
        function: name.to_string(),
        expected: expected.to_string(),
    }
}

fn requires(name: &str, what: &str, got: &Value) -> TransformError {
    TransformError::TypeMismatch(format!("{}() requires {}, got {}", name, what, got.type_name()))
}

/// Dispatch a call expression.
pub(crate) fn call(name: &str, args: &[Expr], ctx: &Context) -> Result<Value> {
    match name {
        "innerjoin" | "outerjoin" => {
            let rows = join_rows(name, args, ctx)?
                .map(|row| row.map(|pair| pair.into_value()))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Value::Array(rows));
        }
        "coalesce" => {
            for arg in args {
                let value = evaluate(arg, ctx)?;
                if !value.is_null() {
                    return Ok(value);
                }
            }
            return Ok(Value::Null);
        }
        "position" => {
            if !args.is_empty() {
                return Err(arity(name, "no"));
            }
            return Ok(Value::Integer(ctx.position() as i64));
        }
        _ => {}
    }

    let values = args.iter().map(|arg| evaluate(arg, ctx)).collect::<Result<Vec<_>>>()?;

    if let Some(result) = builtin(name, &values, ctx)? {
        return Ok(result);
    }

    match ctx.env.functions.get(name) {
        Some(function) => function.call(&values).map_err(|message| TransformError::Extension {
            name: name.to_string(),
            message,
        }),
        None => Err(TransformError::FunctionNotFound(name.to_string())),
    }
}

fn one<'v>(name: &str, args: &'v [Value]) -> Result<&'v Value> {
    match args {
        [value] => Ok(value),
        _ => Err(arity(name, "1")),
    }
}

fn two<'v>(name: &str, args: &'v [Value]) -> Result<(&'v Value, &'v Value)> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(arity(name, "2")),
    }
}

fn string_arg<'v>(name: &str, value: &'v Value) -> Result<&'v str> {
    value.as_str().ok_or_else(|| requires(name, "string", value))
}

fn items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        single => vec![single.clone()],
    }
}

fn number_arg(name: &str, value: &Value) -> Result<Value> {
    coerce_number(value).ok_or_else(|| requires(name, "number", value))
}

/// Built-in functions; `Ok(None)` when `name` is not one of them.
fn builtin(name: &str, args: &[Value], ctx: &Context) -> Result<Option<Value>> {
    let result = match name {
        // ========================================
        // Sequence functions
        // ========================================
        "count" => Value::Integer(match one(name, args)? {
            Value::Array(items) => items.len() as i64,
            Value::Null => 0,
            _ => 1,
        }),
        "sum" => {
            let mut total = Value::Integer(0);
            for item in items(one(name, args)?) {
                if !item.is_null() {
                    total = arithmetic(BinOp::Add, &total, &item)?;
                }
            }
            total
        }
        "avg" => {
            let numbers: Vec<Value> = items(one(name, args)?).iter().filter_map(coerce_number).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                let mut total = Value::Integer(0);
                for n in &numbers {
                    total = arithmetic(BinOp::Add, &total, n)?;
                }
                arithmetic(BinOp::Divide, &total, &Value::Integer(numbers.len() as i64))?
            }
        }
        "min" | "max" => {
            let want = if name == "min" {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            };
            let mut best: Option<Value> = None;
            for item in items(one(name, args)?) {
                if item.is_null() {
                    continue;
                }
                best = match best {
                    Some(current) if compare_values(&item, &current) != Some(want) => Some(current),
                    _ => Some(item),
                };
            }
            best.unwrap_or(Value::Null)
        }
        "first" => items(one(name, args)?).into_iter().next().unwrap_or(Value::Null),
        "last" => items(one(name, args)?).pop().unwrap_or(Value::Null),
        "reverse" => {
            let mut reversed = items(one(name, args)?);
            reversed.reverse();
            Value::Array(reversed)
        }
        "sort" => {
            let mut sorted = items(one(name, args)?);
            sorted.sort_by(|a, b| compare_values(a, b).unwrap_or(std::cmp::Ordering::Equal));
            Value::Array(sorted)
        }
        "distinct" => {
            let mut unique: Vec<Value> = Vec::new();
            for item in items(one(name, args)?) {
                if !unique.iter().any(|seen| values_equal(seen, &item)) {
                    unique.push(item);
                }
            }
            Value::Array(unique)
        }
        "join" => {
            let (list, separator) = two(name, args)?;
            let separator = string_arg(name, separator)?;
            let parts: Vec<String> = items(list).iter().map(Value::to_text).collect();
            Value::String(parts.join(separator))
        }

        // ========================================
        // Conversion functions
        // ========================================
        "string" => Value::String(one(name, args)?.to_text()),
        "number" => number_arg(name, one(name, args)?)?,
        "boolean" => Value::Boolean(one(name, args)?.is_truthy()),
        "not" => Value::Boolean(!one(name, args)?.is_truthy()),
        "isnull" => Value::Boolean(one(name, args)?.is_null()),
        "type" => Value::String(
            match one(name, args)? {
                Value::Integer(_) | Value::Float(_) => "number",
                other => other.type_name(),
            }
            .to_string(),
        ),

        // ========================================
        // String functions
        // ========================================
        "length" => Value::Integer(match one(name, args)? {
            Value::String(s) => s.chars().count() as i64,
            Value::Array(items) => items.len() as i64,
            Value::Object(map) => map.len() as i64,
            Value::Null => 0,
            other => return Err(requires(name, "string or array", other)),
        }),
        "upper" => Value::String(string_arg(name, one(name, args)?)?.to_uppercase()),
        "lower" => Value::String(string_arg(name, one(name, args)?)?.to_lowercase()),
        "trim" => Value::String(string_arg(name, one(name, args)?)?.trim().to_string()),
        "normalizespace" => {
            let s = string_arg(name, one(name, args)?)?;
            Value::String(s.split_whitespace().collect::<Vec<_>>().join(" "))
        }
        "contains" => {
            let (haystack, needle) = two(name, args)?;
            match haystack {
                Value::String(s) => Value::Boolean(s.contains(string_arg(name, needle)?)),
                Value::Array(items) => Value::Boolean(items.iter().any(|item| values_equal(item, needle))),
                Value::Null => Value::Boolean(false),
                other => return Err(requires(name, "string or array", other)),
            }
        }
        "startswith" => {
            let (s, prefix) = two(name, args)?;
            Value::Boolean(string_arg(name, s)?.starts_with(string_arg(name, prefix)?))
        }
        "endswith" => {
            let (s, suffix) = two(name, args)?;
            Value::Boolean(string_arg(name, s)?.ends_with(string_arg(name, suffix)?))
        }
        "indexof" => {
            let (s, needle) = two(name, args)?;
            let s = string_arg(name, s)?;
            let index = s
                .find(string_arg(name, needle)?)
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Value::Integer(index)
        }
        "substring" => {
            let (s, start, len) = match args {
                [s, start] => (s, start, None),
                [s, start, len] => (s, start, Some(len)),
                _ => return Err(arity(name, "2 or 3")),
            };
            let s = string_arg(name, s)?;
            let start = number_arg(name, start)?.as_int().unwrap_or(0).max(0) as usize;
            let chars = s.chars().skip(start);
            let sub: String = match len {
                Some(len) => {
                    let len = number_arg(name, len)?.as_int().unwrap_or(0).max(0) as usize;
                    chars.take(len).collect()
                }
                None => chars.collect(),
            };
            Value::String(sub)
        }
        "substringbefore" => {
            let (s, needle) = two(name, args)?;
            let s = string_arg(name, s)?;
            let needle = string_arg(name, needle)?;
            Value::String(s.find(needle).map(|i| s[..i].to_string()).unwrap_or_default())
        }
        "substringafter" => {
            let (s, needle) = two(name, args)?;
            let s = string_arg(name, s)?;
            let needle = string_arg(name, needle)?;
            Value::String(
                s.find(needle)
                    .map(|i| s[i + needle.len()..].to_string())
                    .unwrap_or_default(),
            )
        }
        "replace" => {
            let [s, from, to] = args else {
                return Err(arity(name, "3"));
            };
            let s = string_arg(name, s)?;
            Value::String(s.replace(string_arg(name, from)?, string_arg(name, to)?))
        }
        "matches" => {
            let (s, pattern) = two(name, args)?;
            let re = Regex::new(string_arg(name, pattern)?)
                .map_err(|e| TransformError::TypeMismatch(format!("invalid regex: {e}")))?;
            match s {
                Value::String(s) => Value::Boolean(re.is_match(s)),
                _ => Value::Boolean(false),
            }
        }
        "split" => {
            let (s, delimiter) = two(name, args)?;
            let s = string_arg(name, s)?;
            let d = string_arg(name, delimiter)?;
            let parts: Vec<Value> = if d.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(d).map(|p| Value::String(p.to_string())).collect()
            };
            Value::Array(parts)
        }

        // ========================================
        // Numeric functions
        // ========================================
        "floor" | "ceiling" | "abs" => {
            let n = number_arg(name, one(name, args)?)?;
            match n {
                Value::Integer(i) if name == "abs" => match i.checked_abs() {
                    Some(abs) => Value::Integer(abs),
                    None => Value::Float((i as f64).abs()),
                },
                Value::Integer(i) => Value::Integer(i),
                other => {
                    let f = other.as_float().unwrap_or(0.0);
                    match name {
                        "floor" => Value::Integer(f.floor() as i64),
                        "ceiling" => Value::Integer(f.ceil() as i64),
                        _ => Value::Float(f.abs()),
                    }
                }
            }
        }
        "round" => {
            let (n, places) = match args {
                [n] => (n, None),
                [n, places] => (n, Some(places)),
                _ => return Err(arity(name, "1 or 2")),
            };
            match number_arg(name, n)? {
                Value::Integer(i) => Value::Integer(i),
                other => {
                    let f = other.as_float().unwrap_or(0.0);
                    match places {
                        None => Value::Integer(f.round() as i64),
                        Some(places) => {
                            let places = number_arg(name, places)?.as_int().unwrap_or(0).clamp(0, 15);
                            let scale = 10f64.powi(places as i32);
                            Value::Float((f * scale).round() / scale)
                        }
                    }
                }
            }
        }

        // ========================================
        // Object functions
        // ========================================
        "keys" => match one(name, args)? {
            Value::Object(map) => Value::Array(map.keys().map(|k| Value::String(k.clone())).collect()),
            other => return Err(requires(name, "object", other)),
        },
        "values" => match one(name, args)? {
            Value::Object(map) => Value::Array(map.values().cloned().collect()),
            other => return Err(requires(name, "object", other)),
        },

        // ========================================
        // Documents
        // ========================================
        "document" => {
            let (repository, document) = two(name, args)?;
            let repository = string_arg(name, repository)?;
            let document = string_arg(name, document)?;
            let repo = ctx.env.host.documents(repository).ok_or_else(|| TransformError::DocumentNotFound {
                repository: repository.to_string(),
                name: document.to_string(),
            })?;
            let reader = repo.get_stream(document)?;
            let json: serde_json::Value = serde_json::from_reader(reader)?;
            Value::from(json)
        }

        _ => return Ok(None),
    };
    Ok(Some(result))
}
