//! Compiled transforms.
//!
//! ```
//! use jtx::{TransformContext, Transformer};
//!
//! let transformer = Transformer::compile(r##"
//!     { "#foreach(Drivers, Names)": "#(FirstName + ' ' + LastName)" }
//! "##).unwrap();
//!
//! let output = transformer
//!     .transform_str(r#"{"Drivers": [{"FirstName": "Jo", "LastName": "Ng"}]}"#, &TransformContext::new())
//!     .unwrap();
//! assert_eq!(output, r#"{"Names":["Jo Ng"]}"#);
//! ```

use std::{fmt, io::Write, sync::Arc};

use crate::{
    ast::Expr,
    context::{Context, Environment, IncludeRepository, TransformContext},
    error::Result,
    evaluator,
    functions::{ExtensionFunction, FunctionRegistry},
    output::{BufferWriter, ChunkedWriter, JsonTextWriter, JsonWriter, StreamFactory, ValueBuilder, WriterOptions},
    template::{TNode, TemplateRepository, compiler::Compiler},
    value::Value,
};

/// Compile-time collaborators.
#[derive(Default)]
pub struct CompileOptions<'a> {
    includes: Option<&'a dyn IncludeRepository>,
    functions: FunctionRegistry,
}

impl fmt::Debug for CompileOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("includes", &self.includes.is_some())
            .field("functions", &self.functions)
            .finish()
    }
}

impl<'a> CompileOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository resolving `"#include": "fragment"` members.
    pub fn with_includes(mut self, repository: &'a dyn IncludeRepository) -> Self {
        self.includes = Some(repository);
        self
    }

    pub fn with_function(mut self, name: impl Into<String>, function: impl ExtensionFunction + 'static) -> Self {
        self.functions.register(name, function);
        self
    }

    /// Share one extension instance (and its internal state) with other transformers.
    pub fn with_shared_function(mut self, name: impl Into<String>, function: Arc<dyn ExtensionFunction>) -> Self {
        self.functions.register_shared(name, function);
        self
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }
}

/// An immutable compiled transform; reusable across calls and threads.
#[derive(Debug, Clone)]
pub struct Transformer {
    root: TNode,
    templates: TemplateRepository,
    functions: FunctionRegistry,
}

impl Transformer {
    pub fn compile(source: &str) -> Result<Self> {
        Self::compile_with(source, CompileOptions::default())
    }

    pub fn compile_with(source: &str, options: CompileOptions) -> Result<Self> {
        let (root, templates) = Compiler::new(options.includes).compile(source)?;
        Ok(Transformer {
            root,
            templates,
            functions: options.functions,
        })
    }

    pub fn root(&self) -> &TNode {
        &self.root
    }

    pub fn templates(&self) -> &TemplateRepository {
        &self.templates
    }

    /// Run the transform against `data`, driving `writer`.
    pub fn transform(&self, data: &Value, host: &TransformContext, writer: &mut dyn JsonWriter) -> Result<()> {
        let env = Environment {
            templates: &self.templates,
            functions: &self.functions,
            host,
        };
        let ctx = Context::new(data, &env);
        self.root.emit(&ctx, writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse `input` as JSON and return the compact output text.
    pub fn transform_str(&self, input: &str, host: &TransformContext) -> Result<String> {
        self.transform_str_with(input, host, WriterOptions::compact())
    }

    pub fn transform_str_with(&self, input: &str, host: &TransformContext, options: WriterOptions) -> Result<String> {
        let data = Value::parse(input)?;
        let mut writer = BufferWriter::buffer(options);
        self.transform(&data, host, &mut writer)?;
        Ok(writer.into_string())
    }

    pub fn transform_value(&self, data: &Value, host: &TransformContext) -> Result<Value> {
        let mut builder = ValueBuilder::new();
        self.transform(data, host, &mut builder)?;
        Ok(builder.finish())
    }

    /// Stream the output into `out` as it is produced.
    pub fn transform_to<W: Write>(
        &self,
        data: &Value,
        host: &TransformContext,
        out: W,
        options: WriterOptions,
    ) -> Result<W> {
        let mut writer = JsonTextWriter::new(out, options);
        self.transform(data, host, &mut writer)?;
        Ok(writer.into_inner())
    }

    /// Write each element of a top-level array result to its own sink.
    /// Returns the number of chunks written.
    pub fn transform_chunked(
        &self,
        data: &Value,
        host: &TransformContext,
        factory: &mut dyn StreamFactory,
        options: WriterOptions,
    ) -> Result<usize> {
        let mut writer = ChunkedWriter::new(factory, options);
        self.transform(data, host, &mut writer)?;
        Ok(writer.chunks())
    }

    /// Evaluate a standalone expression against `data` with built-in functions only.
    pub fn evaluate_expression(expr: &Expr, data: &Value) -> Result<Value> {
        let templates = TemplateRepository::default();
        let functions = FunctionRegistry::default();
        let host = TransformContext::new();
        let env = Environment {
            templates: &templates,
            functions: &functions,
            host: &host,
        };
        evaluator::evaluate(expr, &Context::new(data, &env))
    }
}
