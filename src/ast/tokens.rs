use std::fmt;

/// Location of a token in the expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Character offset from the start of the expression
    pub offset: usize,
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier, keyword or the current-scope marker `@`
    ///
    /// # Examples
    /// ```text
    /// Name
    /// true
    /// @
    /// ```
    Text,

    /// Variable reference; the token text excludes the `$`
    ///
    /// # Examples
    /// ```text
    /// $model
    /// $_count
    /// ```
    Variable,

    /// Operator, symbolic or word form
    ///
    /// # Examples
    /// ```text
    /// ==  &&  and  ??  ?  :
    /// ```
    Operator,

    /// String literal; the token text is the unquoted, unescaped content
    ///
    /// # Examples
    /// ```text
    /// 'Fred'
    /// "it's"
    /// ''
    /// ```
    Literal,

    /// Numeric literal, including a leading sign when it is not subtraction
    ///
    /// # Examples
    /// ```text
    /// 42
    /// .53
    /// -14
    /// ```
    Number,

    /// One of `. [ ] ( ) ,`
    Punctuation,

    /// Directive marker; the token text is the name without `#` (empty for `#(`)
    ///
    /// # Examples
    /// ```text
    /// #foreach
    /// #(
    /// ```
    Directive,
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    /// True for a punctuation or operator token with exactly this text.
    pub fn is(&self, symbol: &str) -> bool {
        matches!(self.kind, TokenKind::Punctuation | TokenKind::Operator) && self.text == symbol
    }
}
