//! CLI support for jtx
//!
//! Provides programmatic access to the `jtx` commands for embedding in other
//! tools.

mod transform;

pub use transform::{CheckResult, TransformOptions, execute_check, execute_transform, parse_arg};

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Compile or runtime failure of the transform
    Transform(crate::TransformError),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
    /// `--arg` not of the form `name=value`
    BadArgument(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Transform(e) => write!(f, "{}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => write!(f, "No input provided. Use --input or pipe JSON to stdin."),
            CliError::BadArgument(arg) => write!(f, "Invalid argument '{}': expected name=value", arg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Transform(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<crate::TransformError> for CliError {
    fn from(e: crate::TransformError) -> Self {
        CliError::Transform(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
