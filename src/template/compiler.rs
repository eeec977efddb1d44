//! Transform document → node tree.
//!
//! Keys starting with `#` are directives; string values of the form
//! `#name(...)` or `#(expr)` are value directives. Any other string is a
//! literal. Every expression is parsed here, so a malformed transform fails
//! before a [`Transformer`](crate::Transformer) exists.

use crate::{
    ast::{Directive, Expr},
    context::IncludeRepository,
    error::{Result, TransformError},
    parser::parse_directive,
    template::{
        document::Doc,
        nodes::{ForEachTarget, PropertyName, Selection, TNode},
        repository::{Template, TemplateRepository},
    },
    value::Value,
};

pub(crate) struct Compiler<'a> {
    includes: Option<&'a dyn IncludeRepository>,
    templates: TemplateRepository,
    /// Fragments currently being expanded, outermost first
    active: Vec<String>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(includes: Option<&'a dyn IncludeRepository>) -> Self {
        Compiler {
            includes,
            templates: TemplateRepository::default(),
            active: Vec::new(),
        }
    }

    pub(crate) fn compile(mut self, source: &str) -> Result<(TNode, TemplateRepository)> {
        tracing::debug!(bytes = source.len(), "compiling transform");
        let doc = Doc::parse(source)?;
        let root = self.value(&doc, source)?;
        tracing::debug!(templates = self.templates.len(), "transform compiled");
        Ok((root, self.templates))
    }

    fn value(&mut self, doc: &Doc, source: &str) -> Result<TNode> {
        match doc {
            Doc::Object(entries) => self.object(entries, source),
            Doc::Array(items) => items
                .iter()
                .map(|item| self.value(item, source))
                .collect::<Result<Vec<_>>>()
                .map(TNode::ArrayNode),
            Doc::Scalar(Value::String(text)) if is_directive_value(text) => self.value_directive(text, source),
            Doc::Scalar(scalar) => Ok(TNode::RawValue(scalar.clone())),
        }
    }

    fn value_directive(&mut self, text: &str, source: &str) -> Result<TNode> {
        let mut header = Header::parse(text, source)?;
        let name = header.name.clone();
        match name.as_str() {
            "" => Ok(TNode::Expression(header.single()?)),
            "copyof" => Ok(TNode::CopyOf(header.single()?)),
            "include" | "exclude" => {
                header.arity(1, usize::MAX)?;
                let names = (1..header.args.len())
                    .map(|i| header.name_arg(i))
                    .collect::<Result<Vec<_>>>()?;
                let selection = if name == "include" {
                    Selection::Include
                } else {
                    Selection::Exclude
                };
                Ok(TNode::IncludeExclude {
                    source: header.args.swap_remove(0),
                    names,
                    selection,
                })
            }
            "innerjoin" | "outerjoin" => {
                let [left, right, predicate] = header.exactly::<3>()?;
                Ok(if name == "innerjoin" {
                    TNode::InnerJoin { left, right, predicate }
                } else {
                    TNode::OuterJoin { left, right, predicate }
                })
            }
            other => Err(header.error(format!("Unknown directive '#{}'", other))),
        }
    }

    fn object(&mut self, entries: &[(String, Doc)], source: &str) -> Result<TNode> {
        check_unique(entries, source)?;
        let sole = entries.len() == 1;
        let mut members = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if let Some(replacement) = self.member(key, value, source, sole, &mut members)? {
                return Ok(replacement);
            }
        }
        Ok(TNode::ObjectNode(members))
    }

    /// Compile one object member into `members`. Returns a node when the
    /// member replaces its whole object (`#noobject`, bare-array `#foreach`).
    fn member(
        &mut self,
        key: &str,
        value: &Doc,
        source: &str,
        sole: bool,
        members: &mut Vec<TNode>,
    ) -> Result<Option<TNode>> {
        if !key.starts_with('#') {
            members.push(TNode::PropertyValue {
                name: PropertyName::Fixed(key.to_string()),
                value: Box::new(self.value(value, source)?),
            });
            return Ok(None);
        }

        let mut header = Header::parse(key, source)?;
        let name = header.name.clone();
        let node = match name.as_str() {
            "" => TNode::PropertyValue {
                name: PropertyName::Computed(header.single()?),
                value: Box::new(self.value(value, source)?),
            },
            "variable" => {
                header.arity(1, 1)?;
                TNode::VariableBinding {
                    name: header.name_arg(0)?,
                    value: Box::new(self.value(value, source)?),
                }
            }
            "foreach" => {
                header.arity(1, 2)?;
                let target = match header.args.get(1) {
                    None => ForEachTarget::Merge,
                    Some(Expr::ArrayLiteral(items)) if items.is_empty() => ForEachTarget::Array,
                    Some(_) => ForEachTarget::Property(header.name_arg(1)?),
                };
                let bare_array = target == ForEachTarget::Array;
                if bare_array && !sole {
                    return Err(header.error("#foreach(source, []) must be the only member of its object"));
                }
                let node = TNode::ForEach {
                    source: header.args.swap_remove(0),
                    target,
                    body: Box::new(self.value(value, source)?),
                };
                if bare_array {
                    return Ok(Some(node));
                }
                node
            }
            "if" => TNode::Conditional {
                branches: vec![(header.single()?, self.value(value, source)?)],
                otherwise: None,
            },
            "elseif" => {
                let condition = header.single()?;
                let body = self.value(value, source)?;
                match members.last_mut() {
                    Some(TNode::Conditional {
                        branches,
                        otherwise: None,
                    }) => branches.push((condition, body)),
                    _ => return Err(header.error("#elseif without a preceding #if")),
                }
                return Ok(None);
            }
            "else" => {
                header.no_args()?;
                let body = self.value(value, source)?;
                match members.last_mut() {
                    Some(TNode::Conditional { otherwise: slot @ None, .. }) => *slot = Some(Box::new(body)),
                    _ => return Err(header.error("#else without a preceding #if")),
                }
                return Ok(None);
            }
            "assert" => TNode::Assert {
                condition: header.single()?,
                message: Box::new(self.value(value, source)?),
            },
            "noobject" => {
                header.no_args()?;
                let node = TNode::NoObject(Box::new(self.value(value, source)?));
                if sole {
                    return Ok(Some(node));
                }
                node
            }
            "template" => {
                header.arity(1, usize::MAX)?;
                let name = header.name_arg(0)?;
                let params = (1..header.args.len())
                    .map(|i| header.name_arg(i))
                    .collect::<Result<Vec<_>>>()?;
                let body = self.value(value, source)?;
                tracing::debug!(template = %name, params = params.len(), "registering template");
                if !self.templates.insert(name.clone(), Template { params, body }) {
                    return Err(header.error(format!("Template '{}' is defined more than once", name)));
                }
                return Ok(None);
            }
            "calltemplate" => {
                header.arity(1, 1)?;
                let name = header.name_arg(0)?;
                let args = match value {
                    Doc::Object(entries) => {
                        check_unique(entries, source)?;
                        entries
                            .iter()
                            .map(|(param, arg)| -> Result<(String, TNode)> {
                                Ok((param.clone(), self.value(arg, source)?))
                            })
                            .collect::<Result<Vec<_>>>()?
                    }
                    Doc::Scalar(Value::Null) => Vec::new(),
                    _ => return Err(header.error("#calltemplate arguments must be an object")),
                };
                TNode::TemplateCall { name, args }
            }
            "include" if !header.has_args => {
                self.fragment(value, &header, members)?;
                return Ok(None);
            }
            "copyof" | "include" | "exclude" | "innerjoin" | "outerjoin" => {
                return Err(header.error(format!("'#{}' is only valid as a value", name)));
            }
            other => return Err(header.error(format!("Unknown directive '#{}'", other))),
        };
        members.push(node);
        Ok(None)
    }

    /// Splice the members of an include fragment into the current object.
    fn fragment(&mut self, value: &Doc, header: &Header, members: &mut Vec<TNode>) -> Result<()> {
        let Some(name) = value.as_str() else {
            return Err(header.error("#include fragment name must be a string"));
        };
        let Some(repository) = self.includes else {
            return Err(header.error(format!("Cannot include '{}': no include repository", name)));
        };
        if self.active.iter().any(|active| active == name) {
            return Err(header.error(format!("Fragment '{}' includes itself", name)));
        }
        let text = repository
            .get(name)
            .ok_or_else(|| header.error(format!("Include fragment '{}' not found", name)))?;
        tracing::debug!(fragment = name, "including template fragment");

        let Doc::Object(entries) = Doc::parse(&text)? else {
            return Err(header.error(format!("Include fragment '{}' is not an object", name)));
        };

        check_unique(&entries, &text)?;
        self.active.push(name.to_string());
        let result = entries
            .iter()
            .try_for_each(|(key, value)| self.member(key, value, &text, false, members).map(drop));
        self.active.pop();
        result
    }
}

/// `#name(...)` or `#(...)` (possibly with trailing text, which the parser rejects).
fn is_directive_value(text: &str) -> bool {
    let Some(rest) = text.strip_prefix('#') else {
        return false;
    };
    let name_len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    rest[name_len..].starts_with('(')
}

/// Plain keys name output properties and may appear once per object.
/// Directive keys (`#if`, `#else`, `#calltemplate(X)`, ...) may repeat.
fn check_unique(entries: &[(String, Doc)], source: &str) -> Result<()> {
    for (index, (key, _)) in entries.iter().enumerate() {
        if key.starts_with('#') {
            continue;
        }
        let earlier = entries[..index].iter().filter(|(other, _)| other == key).count();
        if earlier > 0 {
            return Err(TransformError::Syntax {
                message: format!("Property '{}' appears more than once in the same object", key),
                line: line_of_nth(source, key, earlier),
            });
        }
    }
    Ok(())
}

/// 1-based line of the first occurrence of `text` as a JSON string in `source`.
fn line_of(source: &str, text: &str) -> Option<usize> {
    line_of_nth(source, text, 0)
}

/// 1-based line of the `n`th (0-based) occurrence of `text` as a JSON string.
fn line_of_nth(source: &str, text: &str, n: usize) -> Option<usize> {
    let quoted = serde_json::to_string(text).ok()?;
    source
        .match_indices(&quoted)
        .nth(n)
        .map(|(offset, _)| source[..offset].matches('\n').count() + 1)
}

/// A parsed directive plus where it came from, for error reporting.
struct Header<'k> {
    name: String,
    args: Vec<Expr>,
    has_args: bool,
    text: &'k str,
    source: &'k str,
}

impl<'k> Header<'k> {
    fn parse(text: &'k str, source: &'k str) -> Result<Self> {
        let Directive { name, args, has_args } = parse_directive(text).map_err(|e| match e {
            TransformError::Syntax { message, line } => TransformError::Syntax {
                message: format!("{} in '{}'", message, text),
                line: line_of(source, text).or(line),
            },
            other => other,
        })?;
        Ok(Header {
            name,
            args,
            has_args,
            text,
            source,
        })
    }

    fn error(&self, message: impl Into<String>) -> TransformError {
        TransformError::Syntax {
            message: message.into(),
            line: line_of(self.source, self.text),
        }
    }

    fn label(&self) -> String {
        if self.name.is_empty() {
            "#(...)".to_string()
        } else {
            format!("#{}", self.name)
        }
    }

    fn arity(&self, min: usize, max: usize) -> Result<()> {
        let got = self.args.len();
        if got >= min && got <= max {
            return Ok(());
        }
        let expected = match (min, max) {
            (min, max) if min == max => min.to_string(),
            (min, usize::MAX) => format!("at least {}", min),
            (min, max) => format!("{} to {}", min, max),
        };
        Err(self.error(format!(
            "{} expects {} argument(s), got {}",
            self.label(),
            expected,
            got
        )))
    }

    fn no_args(&self) -> Result<()> {
        if self.has_args {
            return Err(self.error(format!("{} takes no arguments", self.label())));
        }
        Ok(())
    }

    fn single(&mut self) -> Result<Expr> {
        let [expr] = self.exactly::<1>()?;
        Ok(expr)
    }

    fn exactly<const N: usize>(&mut self) -> Result<[Expr; N]> {
        self.arity(N, N)?;
        std::mem::take(&mut self.args)
            .try_into()
            .map_err(|_| self.error(format!("{} expects {} argument(s)", self.label(), N)))
    }

    fn name_arg(&self, index: usize) -> Result<String> {
        self.args
            .get(index)
            .and_then(Expr::as_name)
            .map(str::to_string)
            .ok_or_else(|| {
                self.error(format!(
                    "{} argument {} must be a name",
                    self.label(),
                    index + 1
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_value_detection() {
        assert!(is_directive_value("#(Name)"));
        assert!(is_directive_value("#copyof(Customer)"));
        assert!(!is_directive_value("#hashtag"));
        assert!(!is_directive_value("plain"));
    }

    #[test]
    fn test_line_of_key() {
        let source = "{\n  \"a\": 1,\n  \"#if(\": 2\n}";
        assert_eq!(line_of(source, "#if("), Some(3));
        assert_eq!(line_of(source, "missing"), None);
    }

    #[test]
    fn test_line_of_repeat() {
        let source = "{\n  \"a\": 1,\n  \"a\": 2\n}";
        assert_eq!(line_of_nth(source, "a", 1), Some(3));
        assert_eq!(line_of_nth(source, "a", 2), None);
    }

    #[test]
    fn test_unknown_directive_reports_line() {
        let source = "{\n  \"Name\": \"x\",\n  \"#bogus(1)\": {}\n}";
        let err = Compiler::new(None).compile(source).unwrap_err();
        assert!(matches!(err, TransformError::Syntax { .. }));
        assert_eq!(err.line(), Some(3));
    }
}
