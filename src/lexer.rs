use crate::{
    ast::{Position, Token, TokenKind},
    error::{Result, TransformError},
};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    /// Whether the previous token can end an operand; decides if `-5` is a sign or subtraction
    after_operand: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            after_operand: false,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if self.current_char() == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.position += 1;
    }

    fn here(&self) -> Position {
        Position {
            offset: self.position,
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, message: String) -> TransformError {
        TransformError::syntax(format!("{} at {}", message, self.here()))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String> {
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(ch) => return Err(self.error(format!("Invalid escape sequence '\\{}'", ch))),
                        None => return Err(self.error("Unterminated string".to_string())),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(self.error(format!("Unterminated string: missing closing {}", quote)))
    }

    fn read_number(&mut self) -> String {
        let mut number = String::new();
        let mut seen_dot = false;

        if self.current_char() == Some('-') {
            number.push('-');
            self.advance();
        }

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && !seen_dot && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                seen_dot = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        number
    }

    /// True when the character at `offset` starts a number (`5`, `.5`).
    fn number_starts_at(&self, offset: usize) -> bool {
        match self.peek_char(offset) {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => self.peek_char(offset + 1).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn symbol(&mut self, kind: TokenKind, text: &str) -> Token {
        let start = self.here();
        for _ in text.chars() {
            self.advance();
        }
        Token::new(kind, text, start)
    }

    /// Returns the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();

        let start = self.here();
        let Some(ch) = self.current_char() else {
            return Ok(None);
        };

        let token = match ch {
            '-' if !self.after_operand && self.number_starts_at(1) => {
                Token::new(TokenKind::Number, self.read_number(), start)
            }
            '.' if !self.after_operand && self.number_starts_at(0) => {
                Token::new(TokenKind::Number, self.read_number(), start)
            }
            c if c.is_ascii_digit() => Token::new(TokenKind::Number, self.read_number(), start),
            '"' | '\'' => Token::new(TokenKind::Literal, self.read_string(ch)?, start),
            '$' => {
                self.advance();
                let name = self.read_identifier();
                if name.is_empty() {
                    return Err(self.error("Expected variable name after '$'".to_string()));
                }
                Token::new(TokenKind::Variable, name, start)
            }
            '#' => {
                self.advance();
                let name = self.read_identifier();
                if name.is_empty() && self.current_char() != Some('(') {
                    return Err(self.error("Expected directive name or '(' after '#'".to_string()));
                }
                Token::new(TokenKind::Directive, name, start)
            }
            '@' => self.symbol(TokenKind::Text, "@"),
            '.' | '[' | ']' | '(' | ')' | ',' => self.symbol(TokenKind::Punctuation, &ch.to_string()),
            '+' | '-' | '*' | '/' | '%' | ':' => self.symbol(TokenKind::Operator, &ch.to_string()),
            '=' => {
                if self.peek_char(1) == Some('=') {
                    self.symbol(TokenKind::Operator, "==")
                } else {
                    return Err(self.error("Unexpected '=' (did you mean '=='?)".to_string()));
                }
            }
            '!' => {
                if self.peek_char(1) == Some('=') {
                    self.symbol(TokenKind::Operator, "!=")
                } else {
                    self.symbol(TokenKind::Operator, "!")
                }
            }
            '>' | '<' => {
                if self.peek_char(1) == Some('=') {
                    self.symbol(TokenKind::Operator, &format!("{}=", ch))
                } else {
                    self.symbol(TokenKind::Operator, &ch.to_string())
                }
            }
            '?' => {
                if self.peek_char(1) == Some('?') {
                    self.symbol(TokenKind::Operator, "??")
                } else {
                    self.symbol(TokenKind::Operator, "?")
                }
            }
            '&' | '|' => {
                if self.peek_char(1) == Some(ch) {
                    self.symbol(TokenKind::Operator, &format!("{}{}", ch, ch))
                } else {
                    return Err(self.error(format!("Unexpected '{}' (did you mean '{}{}'?)", ch, ch, ch)));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "and" | "or" => Token::new(TokenKind::Operator, ident, start),
                    _ => Token::new(TokenKind::Text, ident, start),
                }
            }
            c => return Err(self.error(format!("Unexpected character '{}'", c))),
        };

        self.after_operand = match token.kind {
            TokenKind::Text | TokenKind::Variable | TokenKind::Literal | TokenKind::Number => true,
            TokenKind::Punctuation => token.text == ")" || token.text == "]",
            TokenKind::Operator | TokenKind::Directive => false,
        };

        Ok(Some(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_word_operators() {
        let tokens = kinds("a and b or c");
        assert_eq!(tokens[1], (TokenKind::Operator, "and".to_string()));
        assert_eq!(tokens[3], (TokenKind::Operator, "or".to_string()));
    }

    #[test]
    fn test_minus_after_operand_is_subtraction() {
        let tokens = kinds("Total -5");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], (TokenKind::Operator, "-".to_string()));
        assert_eq!(tokens[2], (TokenKind::Number, "5".to_string()));
    }

    #[test]
    fn test_minus_after_paren_is_sign() {
        let tokens = kinds("(-5)");
        assert_eq!(tokens[1], (TokenKind::Number, "-5".to_string()));
    }

    #[test]
    fn test_positions_track_lines() {
        let tokens = Lexer::new("a\n  + b").tokenize().unwrap();
        assert_eq!(tokens[1].position.line, 2);
        assert_eq!(tokens[1].position.column, 3);
    }
}
