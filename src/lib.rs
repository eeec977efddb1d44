//! jtx: declarative JSON-to-JSON transforms.
//!
//! A transform is a JSON document whose `#`-prefixed keys and `#(...)` values
//! are directives and expressions. [`Transformer::compile`] turns it into an
//! immutable node tree once; each `transform*` call then walks the tree
//! against an input document and streams the result through a
//! [`JsonWriter`](output::JsonWriter).

pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod join;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod template;
pub mod transformer;
pub mod value;

pub use ast::{BinOp, Expr, Position, Token, TokenKind, UnaryOp};
pub use context::{ArgumentProvider, DocumentRepository, IncludeRepository, MemoryRepository, TransformContext};
pub use error::{ErrorKind, Result, TransformError};
pub use functions::{ExtensionFunction, FunctionRegistry};
pub use join::{JoinKind, JoinPair};
pub use lexer::Lexer;
pub use output::{JsonWriter, StreamFactory, WriterOptions, to_json, to_json_pretty};
pub use parser::{Parser, parse_expression};
pub use template::{TNode, Template, TemplateRepository};
pub use transformer::{CompileOptions, Transformer};
pub use value::{Map, Value};
