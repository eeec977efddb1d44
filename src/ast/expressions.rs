use crate::{
    ast::{BinOp, UnaryOp},
    value::Value,
};

/// Abstract Syntax Tree node representing a parsed expression.
///
/// Built once at compile time and never mutated; evaluation only borrows it,
/// so one tree can be evaluated concurrently against many contexts.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value: number, string, boolean or null
    ///
    /// # Example
    /// ```text
    /// 42
    /// 'Fred'
    /// null
    /// ```
    Literal(Value),

    /// Property of the current scope
    ///
    /// # Example
    /// ```text
    /// Name
    /// ```
    Identifier(String),

    /// The current scope itself (`@`)
    CurrentScope,

    /// Variable reference
    ///
    /// # Example
    /// ```text
    /// $model
    /// ```
    VariableRef(String),

    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary prefix operation
    ///
    /// # Example
    /// ```text
    /// -Salary
    /// !Active
    /// ```
    UnaryOp { op: UnaryOp, operand: Box<Expr> },

    /// Conditional expression; only the selected branch is evaluated
    ///
    /// # Example
    /// ```text
    /// FirstName ? FirstName : LastName
    /// ```
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    /// Null-coalescing (`??`)
    ///
    /// # Example
    /// ```text
    /// Nickname ?? FirstName
    /// ```
    NullCoalesce { left: Box<Expr>, right: Box<Expr> },

    /// Function call
    ///
    /// # Examples
    /// ```text
    /// position()
    /// sum(Orders.Total)
    /// ```
    FunctionCall { name: String, args: Vec<Expr> },

    /// Member access
    ///
    /// # Example
    /// ```text
    /// Customer.Name
    /// ```
    MemberAccess { object: Box<Expr>, name: String },

    /// Index or filter
    ///
    /// # Examples
    /// ```text
    /// Cars[0]
    /// Cars[Make == 'Chevy']
    /// ```
    IndexFilter {
        object: Box<Expr>,
        predicate: Box<Expr>,
    },

    /// Array literal
    ///
    /// # Example
    /// ```text
    /// [Name, Age]
    /// []
    /// ```
    ArrayLiteral(Vec<Expr>),
}

impl Expr {
    /// Name carried by a bare identifier or string literal.
    ///
    /// Directive arguments that name things (variables, output properties,
    /// templates, included properties) accept either form.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Identifier(name) => Some(name),
            Expr::Literal(Value::String(name)) => Some(name),
            _ => None,
        }
    }
}

/// Parsed directive header: `#name(arg, ...)`, `#name` or `#(expr)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Directive name without `#`; empty for `#(expr)`
    pub name: String,
    pub args: Vec<Expr>,
    /// Whether the header had a parenthesized argument list
    pub has_args: bool,
}
