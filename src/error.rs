//! Errors raised while compiling or running a transform.
//!
//! Compile-time failures (`Syntax`, `JsonParse` of the transform itself) never
//! produce a [`Transformer`](crate::Transformer). Runtime failures abort the
//! whole transform; output already flushed to a streaming sink is not rolled
//! back.

use std::io;

use thiserror::Error;

use crate::output::WriterMisuse;

/// Errors that can occur while compiling or evaluating a transform.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Malformed expression or directive
    #[error("Syntax error{}: {message}", line_suffix(.line))]
    Syntax {
        message: String,
        line: Option<usize>,
    },

    /// Malformed JSON in the transform or the input document
    #[error("Invalid JSON at line {line}: {message}")]
    JsonParse { message: String, line: usize },

    /// Call to a function that is neither built in nor registered
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    /// Built-in function called with the wrong number of arguments
    #[error("{function}() expects {expected} argument(s)")]
    ArgumentCount { function: String, expected: String },

    /// `#calltemplate` of a name the repository does not hold
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Operand that cannot be coerced for the requested operation
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// `#assert` whose condition evaluated falsy; carries the evaluated message
    #[error("Assertion failed: {0}")]
    AssertFailed(String),

    /// Value-only node used as structure, or structure used as a value
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Document lookup through a repository failed
    #[error("Document '{name}' not found in repository '{repository}'")]
    DocumentNotFound { repository: String, name: String },

    /// A registered extension function reported a failure
    #[error("Extension function {name}() failed: {message}")]
    Extension { name: String, message: String },

    /// Failure writing output
    #[error("IO error: {0}")]
    Io(io::Error),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" at line {}", n),
        None => String::new(),
    }
}

/// Discriminant of a [`TransformError`], for hosts that branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    JsonParse,
    FunctionNotFound,
    ArgumentCount,
    TemplateNotFound,
    TypeMismatch,
    DivisionByZero,
    AssertFailed,
    NotSupported,
    DocumentNotFound,
    Extension,
    Io,
}

impl TransformError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        TransformError::Syntax {
            message: message.into(),
            line: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransformError::Syntax { .. } => ErrorKind::Syntax,
            TransformError::JsonParse { .. } => ErrorKind::JsonParse,
            TransformError::FunctionNotFound(_) => ErrorKind::FunctionNotFound,
            TransformError::ArgumentCount { .. } => ErrorKind::ArgumentCount,
            TransformError::TemplateNotFound(_) => ErrorKind::TemplateNotFound,
            TransformError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            TransformError::DivisionByZero => ErrorKind::DivisionByZero,
            TransformError::AssertFailed(_) => ErrorKind::AssertFailed,
            TransformError::NotSupported(_) => ErrorKind::NotSupported,
            TransformError::DocumentNotFound { .. } => ErrorKind::DocumentNotFound,
            TransformError::Extension { .. } => ErrorKind::Extension,
            TransformError::Io(_) => ErrorKind::Io,
        }
    }

    /// Source line of the failure, when known.
    pub fn line(&self) -> Option<usize> {
        match self {
            TransformError::Syntax { line, .. } => *line,
            TransformError::JsonParse { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Attach a line number to a syntax error that does not have one yet.
    pub(crate) fn at_line(self, at: Option<usize>) -> Self {
        match self {
            TransformError::Syntax { message, line: None } => TransformError::Syntax { message, line: at },
            other => other,
        }
    }
}

/// Writer misuse (e.g. a repeated property name) surfaces as `NotSupported`;
/// any other I/O failure is `Io`.
impl From<io::Error> for TransformError {
    fn from(e: io::Error) -> Self {
        match e.get_ref().and_then(|inner| inner.downcast_ref::<WriterMisuse>()) {
            Some(misuse) => TransformError::NotSupported(misuse.to_string()),
            None => TransformError::Io(e),
        }
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            return TransformError::Io(e.into());
        }
        TransformError::JsonParse {
            message: e.to_string(),
            line: e.line(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
