//! # Expression Abstract Syntax Tree
//!
//! Expressions are the micro-language embedded in transform documents, either
//! as values (`"#(Customer.Name)"`) or inside directive headers
//! (`"#foreach(Orders[Total > 100], Orders)"`).
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes
//! - **[operators]** - Binary and unary operators
//!
//! ## Quick Start
//!
//! ```text
//! FirstName + ' ' + Surname
//! Cars[Make == 'Chevy' && Year < 1970]
//! $discount ?? 0
//! count(Orders) > 0 ? 'customer' : 'prospect'
//! ```
//!
//! ## References
//!
//! - `Name` - property of the current scope (missing properties are `null`)
//! - `@` - the current scope itself
//! - `$name` - variable, searched from the innermost scope outwards
//! - `left` / `right` - the two sides of a row inside a join predicate
//!
//! ## Postfix Operators
//!
//! - `a.b` - member access; over an array it maps to every element's member
//! - `a[0]` - index (negative counts from the end)
//! - `a[pred]` - filter, with each element as the current scope
//! - `name(args)` - function call, built-ins first, then extensions
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{Directive, Expr};
pub use operators::{BinOp, UnaryOp};
pub use tokens::{Position, Token, TokenKind};
