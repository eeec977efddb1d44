use crate::{
    ast::{BinOp, Directive, Expr, Token, TokenKind, UnaryOp},
    error::{Result, TransformError},
    lexer::Lexer,
    value::Value,
};

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

/// Parse a complete expression.
///
/// ```
/// use jtx::parser::parse_expression;
/// use jtx::ast::{BinOp, Expr};
///
/// let expr = parse_expression("100 + Salary * Months").unwrap();
/// assert!(matches!(expr, Expr::BinaryOp { op: BinOp::Add, .. }));
/// ```
pub fn parse_expression(text: &str) -> Result<Expr> {
    Parser::new(Lexer::new(text))?.parse()
}

/// Parse a directive header such as `#foreach(Customers, Customers)`.
pub fn parse_directive(text: &str) -> Result<Directive> {
    Parser::new(Lexer::new(text))?.parse_directive()
}

impl Parser {
    pub fn new(lexer: Lexer) -> Result<Self> {
        Ok(Parser {
            tokens: lexer.tokenize()?,
            index: 0,
        })
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn check(&self, symbol: &str) -> bool {
        self.current().is_some_and(|t| t.is(symbol))
    }

    /// Consume the token if it matches any of the given symbols.
    fn match_any(&mut self, symbols: &[&str]) -> Option<String> {
        let token = self.current()?;
        let found = symbols.iter().find(|s| token.is(s))?;
        let text = found.to_string();
        self.index += 1;
        Some(text)
    }

    fn error(&self, message: impl Into<String>) -> TransformError {
        let message = message.into();
        match self.current() {
            Some(token) => TransformError::Syntax {
                message: format!("{} at {}", message, token.position),
                line: Some(token.position.line),
            },
            None => TransformError::syntax(message),
        }
    }

    fn describe_current(&self) -> String {
        match self.current() {
            Some(token) => format!("'{}'", token.text),
            None => "end of expression".to_string(),
        }
    }

    fn expect(&mut self, symbol: &str) -> Result<()> {
        if self.check(symbol) {
            self.index += 1;
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}', found {}", symbol, self.describe_current())))
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.current() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("Unexpected '{}' after end of expression", token.text))),
        }
    }

    /// Parse the whole token stream as one expression.
    pub fn parse(&mut self) -> Result<Expr> {
        if self.tokens.is_empty() {
            return Err(TransformError::syntax("Expected an expression, found nothing"));
        }
        let expr = self.parse_expression()?;
        self.expect_end()?;
        Ok(expr)
    }

    /// Parse `#name`, `#name(args)` or `#(expr)`.
    pub fn parse_directive(&mut self) -> Result<Directive> {
        let name = match self.current() {
            Some(token) if token.kind == TokenKind::Directive => token.text.clone(),
            _ => return Err(self.error("Expected directive")),
        };
        self.index += 1;

        let has_args = self.check("(");
        let args = if has_args {
            self.index += 1;
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        self.expect_end()?;

        Ok(Directive { name, args, has_args })
    }

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let condition = self.parse_coalesce()?;

        if self.match_any(&["?"]).is_none() {
            return Ok(condition);
        }
        let then_branch = self.parse_ternary()?;
        self.expect(":")?;
        let else_branch = self.parse_ternary()?;

        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_coalesce(&mut self) -> Result<Expr> {
        let mut left = self.parse_or()?;

        while self.match_any(&["??"]).is_some() {
            let right = self.parse_or()?;
            left = Expr::NullCoalesce {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;

        while self.match_any(&["||", "or"]).is_some() {
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;

        while self.match_any(&["&&", "and"]).is_some() {
            let right = self.parse_equality()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;

        while let Some(op) = self.match_any(&["==", "!="]) {
            let op = if op == "==" { BinOp::Equal } else { BinOp::NotEqual };
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;

        while let Some(op) = self.match_any(&["<=", ">=", "<", ">"]) {
            let op = match op.as_str() {
                "<=" => BinOp::LessEqual,
                ">=" => BinOp::GreaterEqual,
                "<" => BinOp::LessThan,
                _ => BinOp::GreaterThan,
            };
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;

        while let Some(op) = self.match_any(&["+", "-"]) {
            let op = if op == "+" { BinOp::Add } else { BinOp::Subtract };
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.match_any(&["*", "/", "%"]) {
            let op = match op.as_str() {
                "*" => BinOp::Multiply,
                "/" => BinOp::Divide,
                _ => BinOp::Modulo,
            };
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if let Some(op) = self.match_any(&["-", "!"]) {
            let op = if op == "-" { UnaryOp::Negate } else { UnaryOp::Not };
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_any(&["."]).is_some() {
                let name = match self.current() {
                    Some(token) if token.kind == TokenKind::Text && token.text != "@" => token.text.clone(),
                    _ => {
                        return Err(self.error(format!(
                            "Expected property name after '.', found {}",
                            self.describe_current()
                        )));
                    }
                };
                self.index += 1;

                // `Name.upper()` is sugar for `upper(Name)`
                if self.match_any(&["("]).is_some() {
                    let mut args = vec![expr];
                    args.extend(self.parse_arguments()?);
                    expr = Expr::FunctionCall { name, args };
                } else {
                    expr = Expr::MemberAccess {
                        object: Box::new(expr),
                        name,
                    };
                }
            } else if self.match_any(&["["]).is_some() {
                if self.check("]") {
                    return Err(self.error("Expected index or filter expression inside '[]'"));
                }
                let predicate = self.parse_expression()?;
                self.expect("]")?;
                expr = Expr::IndexFilter {
                    object: Box::new(expr),
                    predicate: Box::new(predicate),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parse primary expressions (atoms): literals, references, calls, groups, arrays
    fn parse_primary(&mut self) -> Result<Expr> {
        let Some(token) = self.current().cloned() else {
            return Err(TransformError::syntax("Unexpected end of expression: missing operand"));
        };

        match token.kind {
            TokenKind::Number => {
                self.index += 1;
                parse_number(&token.text).ok_or_else(|| {
                    TransformError::syntax(format!("Invalid number '{}' at {}", token.text, token.position))
                })
            }
            TokenKind::Literal => {
                self.index += 1;
                Ok(Expr::Literal(Value::String(token.text)))
            }
            TokenKind::Variable => {
                self.index += 1;
                Ok(Expr::VariableRef(token.text))
            }
            TokenKind::Text => {
                self.index += 1;
                match token.text.as_str() {
                    "@" => Ok(Expr::CurrentScope),
                    "true" => Ok(Expr::Literal(Value::Boolean(true))),
                    "false" => Ok(Expr::Literal(Value::Boolean(false))),
                    "null" => Ok(Expr::Literal(Value::Null)),
                    _ if self.check("(") => {
                        self.index += 1;
                        let args = self.parse_arguments()?;
                        Ok(Expr::FunctionCall { name: token.text, args })
                    }
                    _ => Ok(Expr::Identifier(token.text)),
                }
            }
            TokenKind::Punctuation if token.text == "(" => {
                self.index += 1;
                if self.check(")") {
                    return Err(self.error("Expected expression inside '()'"));
                }
                let expr = self.parse_expression()?;
                self.expect(")")?;
                Ok(expr)
            }
            TokenKind::Punctuation if token.text == "[" => {
                self.index += 1;
                self.parse_array_literal()
            }
            TokenKind::Directive => Err(self.error("Directives cannot appear inside an expression")),
            _ => Err(self.error(format!("Missing operand before '{}'", token.text))),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr> {
        let mut elements = vec![];

        while !self.check("]") {
            elements.push(self.parse_expression()?);

            if !self.check("]") {
                self.expect(",")?;
            }
        }

        self.expect("]")?;
        Ok(Expr::ArrayLiteral(elements))
    }

    /// Parse `arg, arg, ...)`; the opening parenthesis is already consumed.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = vec![];

        if self.match_any(&[")"]).is_some() {
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression()?);
            if self.match_any(&[","]).is_some() {
                continue;
            }
            self.expect(")")?;
            return Ok(args);
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn parse_number(text: &str) -> Option<Expr> {
    if !text.contains('.')
        && let Ok(n) = text.parse::<i64>()
    {
        return Some(Expr::Literal(Value::Integer(n)));
    }
    text.parse::<f64>().ok().map(|n| Expr::Literal(Value::Float(n)))
}
