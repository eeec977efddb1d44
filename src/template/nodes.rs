//! Compiled template nodes.
//!
//! A node appears either in value position (a property value, an array
//! element, the document root) or in member position (one entry of an
//! object). Value nodes implement [`TNode::write`] and [`TNode::evaluate`];
//! member nodes are driven by the enclosing object and reject both.

use std::borrow::Cow;

use crate::{
    ast::Expr,
    context::Context,
    error::{Result, TransformError},
    evaluator::{self, iterate},
    join::{JoinKind, join_values},
    output::{JsonWriter, ValueBuilder},
    value::Value,
};

/// Output name of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyName {
    Fixed(String),
    /// `"#(expr)": value`
    Computed(Expr),
}

/// Where a `#foreach` puts its per-element output.
#[derive(Debug, Clone, PartialEq)]
pub enum ForEachTarget {
    /// `#foreach(src, name)`: a property holding an array
    Property(String),
    /// `#foreach(src)`: body members merged into the enclosing object
    Merge,
    /// `{"#foreach(src, [])": body}`: the enclosing object becomes a bare array
    Array,
}

/// Whether `#include` keeps or `#exclude` drops the named properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TNode {
    PropertyValue {
        name: PropertyName,
        value: Box<TNode>,
    },
    ObjectNode(Vec<TNode>),
    ArrayNode(Vec<TNode>),
    ForEach {
        source: Expr,
        target: ForEachTarget,
        body: Box<TNode>,
    },
    /// `#if` / `#elseif` branches in order, then the optional `#else`
    Conditional {
        branches: Vec<(Expr, TNode)>,
        otherwise: Option<Box<TNode>>,
    },
    /// Bound for the members that follow it in the same object
    VariableBinding {
        name: String,
        value: Box<TNode>,
    },
    IncludeExclude {
        source: Expr,
        names: Vec<String>,
        selection: Selection,
    },
    InnerJoin {
        left: Expr,
        right: Expr,
        predicate: Expr,
    },
    OuterJoin {
        left: Expr,
        right: Expr,
        predicate: Expr,
    },
    Assert {
        condition: Expr,
        message: Box<TNode>,
    },
    TemplateCall {
        name: String,
        args: Vec<(String, TNode)>,
    },
    CopyOf(Expr),
    RawValue(Value),
    Expression(Expr),
    NoObject(Box<TNode>),
}

impl TNode {
    fn describe(&self) -> &'static str {
        match self {
            TNode::PropertyValue { .. } => "property",
            TNode::ObjectNode(_) => "object",
            TNode::ArrayNode(_) => "array",
            TNode::ForEach { .. } => "#foreach",
            TNode::Conditional { .. } => "#if",
            TNode::VariableBinding { .. } => "#variable",
            TNode::IncludeExclude {
                selection: Selection::Include,
                ..
            } => "#include",
            TNode::IncludeExclude { .. } => "#exclude",
            TNode::InnerJoin { .. } => "#innerjoin",
            TNode::OuterJoin { .. } => "#outerjoin",
            TNode::Assert { .. } => "#assert",
            TNode::TemplateCall { .. } => "#calltemplate",
            TNode::CopyOf(_) => "#copyof",
            TNode::RawValue(_) => "literal",
            TNode::Expression(_) => "expression",
            TNode::NoObject(_) => "#noobject",
        }
    }

    fn member_only(&self) -> TransformError {
        TransformError::NotSupported(format!("{} can only appear as an object member", self.describe()))
    }

    /// Drive `writer` with this node's output.
    ///
    /// Joins and `#include`/`#exclude` produce values only and fail here with
    /// [`TransformError::NotSupported`]; use [`evaluate`](Self::evaluate).
    pub fn write(&self, ctx: &Context, writer: &mut dyn JsonWriter) -> Result<()> {
        match self {
            TNode::ObjectNode(members) => {
                writer.start_object()?;
                write_members(members, ctx, writer)?;
                writer.end_object()?;
            }
            TNode::ArrayNode(items) => {
                writer.start_array()?;
                for item in items {
                    item.emit(ctx, writer)?;
                }
                writer.end_array()?;
            }
            TNode::ForEach {
                source,
                target: ForEachTarget::Array,
                body,
            } => {
                writer.start_array()?;
                for_each(source, ctx, |child| body.emit(child, writer))?;
                writer.end_array()?;
            }
            TNode::NoObject(inner) => inner.emit(ctx, writer)?,
            TNode::Expression(_) | TNode::CopyOf(_) | TNode::RawValue(_) => {
                let value = self.evaluate(ctx)?;
                writer.write_value(&value)?;
            }
            TNode::IncludeExclude { .. } | TNode::InnerJoin { .. } | TNode::OuterJoin { .. } => {
                return Err(TransformError::NotSupported(format!(
                    "{} produces a value and cannot be written as structure",
                    self.describe()
                )));
            }
            _ => return Err(self.member_only()),
        }
        Ok(())
    }

    /// This node's output as a value.
    pub fn evaluate(&self, ctx: &Context) -> Result<Value> {
        match self {
            TNode::RawValue(value) => Ok(value.clone()),
            TNode::Expression(expr) | TNode::CopyOf(expr) => evaluator::evaluate(expr, ctx),
            TNode::IncludeExclude {
                source,
                names,
                selection,
            } => select(evaluator::evaluate(source, ctx)?, names, *selection),
            TNode::InnerJoin { left, right, predicate } => join(JoinKind::Inner, left, right, predicate, ctx),
            TNode::OuterJoin { left, right, predicate } => join(JoinKind::Outer, left, right, predicate, ctx),
            TNode::ObjectNode(_)
            | TNode::ArrayNode(_)
            | TNode::NoObject(_)
            | TNode::ForEach {
                target: ForEachTarget::Array,
                ..
            } => {
                let mut builder = ValueBuilder::new();
                self.write(ctx, &mut builder)?;
                Ok(builder.finish())
            }
            _ => Err(self.member_only()),
        }
    }

    /// Value-position output: structure is written incrementally, value
    /// producers are evaluated and written whole.
    pub(crate) fn emit(&self, ctx: &Context, writer: &mut dyn JsonWriter) -> Result<()> {
        match self {
            TNode::IncludeExclude { .. } | TNode::InnerJoin { .. } | TNode::OuterJoin { .. } => {
                let value = self.evaluate(ctx)?;
                writer.write_value(&value)?;
                Ok(())
            }
            _ => self.write(ctx, writer),
        }
    }

    fn write_member(&self, ctx: &Context, writer: &mut dyn JsonWriter) -> Result<()> {
        match self {
            TNode::PropertyValue { name, value } => {
                let name = match name {
                    PropertyName::Fixed(name) => Cow::Borrowed(name.as_str()),
                    PropertyName::Computed(expr) => Cow::Owned(evaluator::evaluate(expr, ctx)?.to_text()),
                };
                writer.write_property_name(&name)?;
                value.emit(ctx, writer)
            }
            TNode::ForEach { source, target, body } => match target {
                ForEachTarget::Property(name) => {
                    writer.write_property_name(name)?;
                    writer.start_array()?;
                    for_each(source, ctx, |child| body.emit(child, writer))?;
                    writer.end_array()?;
                    Ok(())
                }
                ForEachTarget::Merge => for_each(source, ctx, |child| body.write_body(child, writer)),
                ForEachTarget::Array => Err(TransformError::NotSupported(
                    "#foreach producing a bare array must be the only member of its object".to_string(),
                )),
            },
            TNode::Conditional { branches, otherwise } => {
                for (condition, body) in branches {
                    if evaluator::evaluate(condition, ctx)?.is_truthy() {
                        return body.write_body(ctx, writer);
                    }
                }
                match otherwise {
                    Some(body) => body.write_body(ctx, writer),
                    None => Ok(()),
                }
            }
            TNode::Assert { condition, message } => {
                if evaluator::evaluate(condition, ctx)?.is_truthy() {
                    return Ok(());
                }
                let message = message.evaluate(ctx)?.to_text();
                Err(TransformError::AssertFailed(message))
            }
            TNode::TemplateCall { name, args } => {
                let template = ctx.env.templates.get(name)?;
                tracing::debug!(template = %name, "calling template");

                let mut bindings: Vec<(String, Value)> =
                    template.params.iter().map(|p| (p.clone(), Value::Null)).collect();
                for (arg, node) in args {
                    let value = node.evaluate(ctx)?;
                    match bindings.iter_mut().find(|(param, _)| param == arg) {
                        Some(slot) => slot.1 = value,
                        None => bindings.push((arg.clone(), value)),
                    }
                }
                template.body.write_body(&ctx.with_variables(bindings), writer)
            }
            TNode::NoObject(inner) => inner.write_body(ctx, writer),
            // Bindings are applied by `write_members`
            TNode::VariableBinding { .. } => Ok(()),
            other => Err(TransformError::NotSupported(format!(
                "{} cannot appear as an object member",
                other.describe()
            ))),
        }
    }

    /// Write this node's properties into the object currently open on `writer`.
    fn write_body(&self, ctx: &Context, writer: &mut dyn JsonWriter) -> Result<()> {
        match self {
            TNode::ObjectNode(members) => write_members(members, ctx, writer),
            TNode::NoObject(inner) => inner.write_body(ctx, writer),
            other => match other.evaluate(ctx)? {
                Value::Object(map) => {
                    for (key, value) in &map {
                        writer.write_property(key, value)?;
                    }
                    Ok(())
                }
                Value::Null => Ok(()),
                value => Err(TransformError::NotSupported(format!(
                    "cannot merge {} into an object",
                    value.type_name()
                ))),
            },
        }
    }
}

/// Members of one object in order; a `#variable` scopes every member after it.
fn write_members(members: &[TNode], ctx: &Context, writer: &mut dyn JsonWriter) -> Result<()> {
    for (i, member) in members.iter().enumerate() {
        if let TNode::VariableBinding { name, value } = member {
            let value = value.evaluate(ctx)?;
            let child = ctx.with_variable(name, value);
            return write_members(&members[i + 1..], &child, writer);
        }
        member.write_member(ctx, writer)?;
    }
    Ok(())
}

fn for_each(source: &Expr, ctx: &Context, mut body: impl FnMut(&Context) -> Result<()>) -> Result<()> {
    for (position, item) in iterate(source, ctx)?.enumerate() {
        let item = item?;
        tracing::trace!(position, "foreach iteration");
        body(&ctx.with_scope(&item, position))?;
    }
    Ok(())
}

fn join(kind: JoinKind, left: &Expr, right: &Expr, predicate: &Expr, ctx: &Context) -> Result<Value> {
    let left = evaluator::evaluate(left, ctx)?;
    let right = evaluator::evaluate(right, ctx)?;
    join_values(kind, left, right, predicate, ctx)
}

/// Keep or drop named properties, preserving the source order.
fn select(value: Value, names: &[String], selection: Selection) -> Result<Value> {
    let keep = selection == Selection::Include;
    match value {
        Value::Object(map) => Ok(Value::Object(
            map.into_iter()
                .filter(|(key, _)| names.contains(key) == keep)
                .collect(),
        )),
        Value::Array(items) => items
            .into_iter()
            .map(|item| select(item, names, selection))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Null => Ok(Value::Null),
        other => Err(TransformError::TypeMismatch(format!(
            "#include/#exclude requires an object, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{Environment, TransformContext},
        functions::FunctionRegistry,
        output::BufferWriter,
        output::WriterOptions,
        parser::parse_expression,
        template::TemplateRepository,
    };

    fn with_context<R>(data: &Value, f: impl FnOnce(&Context) -> R) -> R {
        let templates = TemplateRepository::default();
        let functions = FunctionRegistry::default();
        let host = TransformContext::new();
        let env = Environment {
            templates: &templates,
            functions: &functions,
            host: &host,
        };
        f(&Context::new(data, &env))
    }

    #[test]
    fn test_join_node_rejects_write() {
        let node = TNode::InnerJoin {
            left: parse_expression("[1, 2]").unwrap(),
            right: parse_expression("[2]").unwrap(),
            predicate: parse_expression("left == right").unwrap(),
        };
        with_context(&Value::Null, |ctx| {
            let mut writer = BufferWriter::buffer(WriterOptions::compact());
            let err = node.write(ctx, &mut writer).unwrap_err();
            assert!(matches!(err, TransformError::NotSupported(_)));

            let rows = node.evaluate(ctx).unwrap();
            assert_eq!(rows.as_array().map(|r| r.len()), Some(1));
        });
    }

    #[test]
    fn test_member_node_rejects_evaluate() {
        let node = TNode::Assert {
            condition: Expr::Literal(Value::Boolean(true)),
            message: Box::new(TNode::RawValue(Value::Null)),
        };
        with_context(&Value::Null, |ctx| {
            assert!(matches!(node.evaluate(ctx), Err(TransformError::NotSupported(_))));
        });
    }

    #[test]
    fn test_select_preserves_source_order() {
        let value = Value::parse(r#"{"C": 3, "A": 1, "B": 2}"#).unwrap();
        let names = vec!["B".to_string(), "C".to_string()];
        let kept = select(value, &names, Selection::Include).unwrap();
        let keys: Vec<&String> = kept.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["C", "B"]);
    }
}
