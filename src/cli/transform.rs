//! Compile and run transforms against JSON input

use std::collections::HashMap;

use super::CliError;
use crate::{TransformContext, Transformer, Value, WriterOptions};

/// Options for the transform command
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Transform document text
    pub transform: String,
    /// JSON input string
    pub input: Option<String>,
    /// Spaces per indentation level; 0 for compact output
    pub indent: usize,
    /// Host arguments visible as `$name`
    pub args: Vec<(String, Value)>,
}

/// Result of a check operation
#[derive(Debug, PartialEq, Eq)]
pub enum CheckResult {
    /// The transform compiled; carries the number of named templates
    Valid { templates: usize },
}

/// Split `name=value`; the value is JSON when it parses as JSON, else a string.
pub fn parse_arg(arg: &str) -> Result<(String, Value), CliError> {
    let (name, raw) = arg
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| CliError::BadArgument(arg.to_string()))?;
    let value = Value::parse(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

/// Compile a transform without running it
pub fn execute_check(transform: &str) -> Result<CheckResult, CliError> {
    let transformer = Transformer::compile(transform)?;
    Ok(CheckResult::Valid {
        templates: transformer.templates().len(),
    })
}

/// Compile and run a transform, returning the output text
pub fn execute_transform(options: &TransformOptions) -> Result<String, CliError> {
    let transformer = Transformer::compile(&options.transform)?;
    let input = options.input.as_ref().ok_or(CliError::NoInput)?;

    let args: HashMap<String, Value> = options.args.iter().cloned().collect();
    let host = TransformContext::new().with_arguments(&args);

    let output = transformer.transform_str_with(input, &host, WriterOptions { indent: options.indent })?;
    Ok(output)
}
