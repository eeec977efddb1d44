// tests/lexer_tests.rs

use jtx::ast::TokenKind;
use jtx::error::TransformError;
use jtx::lexer::Lexer;

fn tokens(input: &str) -> Vec<(TokenKind, String)> {
    Lexer::new(input)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| (t.kind, t.text))
        .collect()
}

fn tok(kind: TokenKind, text: &str) -> (TokenKind, String) {
    (kind, text.to_string())
}

// ============================================================================
// Basic Token Streams
// ============================================================================

#[test]
fn test_comparison_with_string_literal() {
    assert_eq!(
        tokens("Name == 'Fred'"),
        vec![
            tok(TokenKind::Text, "Name"),
            tok(TokenKind::Operator, "=="),
            tok(TokenKind::Literal, "Fred"),
        ]
    );
}

#[test]
fn test_filter_brackets_are_punctuation() {
    let result = tokens("Cars[Make == 'Chevy']");
    assert_eq!(result.len(), 6);
    assert_eq!(result[1], tok(TokenKind::Punctuation, "["));
    assert_eq!(result[5], tok(TokenKind::Punctuation, "]"));
}

#[test]
fn test_member_path() {
    assert_eq!(
        tokens("Customer.Name"),
        vec![
            tok(TokenKind::Text, "Customer"),
            tok(TokenKind::Punctuation, "."),
            tok(TokenKind::Text, "Name"),
        ]
    );
}

#[test]
fn test_variable_and_scope_marker() {
    assert_eq!(
        tokens("$model == @"),
        vec![
            tok(TokenKind::Variable, "model"),
            tok(TokenKind::Operator, "=="),
            tok(TokenKind::Text, "@"),
        ]
    );
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_all_operators() {
    let test_cases = vec![
        "==", "!=", ">=", "<=", ">", "<", "+", "-", "*", "/", "%", "&&", "||", "??", "?", ":", "!",
    ];

    for op in test_cases {
        let input = format!("a {} b", op);
        let result = tokens(&input);
        assert_eq!(result.len(), 3, "Failed for operator: {}", op);
        assert_eq!(result[1], tok(TokenKind::Operator, op), "Failed for operator: {}", op);
    }
}

#[test]
fn test_word_operators() {
    let result = tokens("a and b or c");
    assert_eq!(result[1], tok(TokenKind::Operator, "and"));
    assert_eq!(result[3], tok(TokenKind::Operator, "or"));
}

#[test]
fn test_single_equals_is_error() {
    let err = Lexer::new("a = b").tokenize().unwrap_err();
    assert!(matches!(err, TransformError::Syntax { .. }));
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_number_forms() {
    assert_eq!(tokens("42"), vec![tok(TokenKind::Number, "42")]);
    assert_eq!(tokens("3.25"), vec![tok(TokenKind::Number, "3.25")]);
    assert_eq!(tokens(".53"), vec![tok(TokenKind::Number, ".53")]);
    assert_eq!(tokens("-14"), vec![tok(TokenKind::Number, "-14")]);
}

#[test]
fn test_signed_number_versus_subtraction() {
    assert_eq!(
        tokens("-14 * .53 + 3.5"),
        vec![
            tok(TokenKind::Number, "-14"),
            tok(TokenKind::Operator, "*"),
            tok(TokenKind::Number, ".53"),
            tok(TokenKind::Operator, "+"),
            tok(TokenKind::Number, "3.5"),
        ]
    );
    assert_eq!(
        tokens("Total-3"),
        vec![
            tok(TokenKind::Text, "Total"),
            tok(TokenKind::Operator, "-"),
            tok(TokenKind::Number, "3"),
        ]
    );
}

#[test]
fn test_sign_after_operator_and_comma() {
    let result = tokens("max(1, -2) * -3");
    assert!(result.contains(&tok(TokenKind::Number, "-2")));
    assert!(result.contains(&tok(TokenKind::Number, "-3")));
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_empty_string_literal_is_kept() {
    assert_eq!(tokens("''"), vec![tok(TokenKind::Literal, "")]);
    assert_eq!(
        tokens("Name == \"\""),
        vec![
            tok(TokenKind::Text, "Name"),
            tok(TokenKind::Operator, "=="),
            tok(TokenKind::Literal, ""),
        ]
    );
}

#[test]
fn test_quote_style_selects_terminator() {
    assert_eq!(tokens("\"it's\""), vec![tok(TokenKind::Literal, "it's")]);
    assert_eq!(tokens("'say \"hi\"'"), vec![tok(TokenKind::Literal, "say \"hi\"")]);
}

#[test]
fn test_string_escapes() {
    assert_eq!(tokens(r"'a\nb\\c\''"), vec![tok(TokenKind::Literal, "a\nb\\c'")]);
}

#[test]
fn test_unterminated_string() {
    let err = Lexer::new("'abc").tokenize().unwrap_err();
    assert!(err.to_string().contains("Unterminated string"));
}

// ============================================================================
// Directives
// ============================================================================

#[test]
fn test_directive_markers() {
    assert_eq!(
        tokens("#foreach(Cars, Vehicles)"),
        vec![
            tok(TokenKind::Directive, "foreach"),
            tok(TokenKind::Punctuation, "("),
            tok(TokenKind::Text, "Cars"),
            tok(TokenKind::Punctuation, ","),
            tok(TokenKind::Text, "Vehicles"),
            tok(TokenKind::Punctuation, ")"),
        ]
    );
    assert_eq!(tokens("#(x)")[0], tok(TokenKind::Directive, ""));
}

#[test]
fn test_bare_hash_is_error() {
    assert!(Lexer::new("# x").tokenize().is_err());
}

#[test]
fn test_stray_character() {
    let err = Lexer::new("a ^ b").tokenize().unwrap_err();
    assert!(err.to_string().contains("'^'"));
}
