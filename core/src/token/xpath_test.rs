use super::xpath::XPathLexer;
use super::{Bracket, Token, TokenError, TokenKind};

fn lex(text: &str) -> Vec<Token> {
    XPathLexer::tokenize_expression(text, 0, 0)
}

fn kinds(text: &str) -> Vec<TokenKind> {
    lex(text).iter().map(|t| t.kind).collect()
}

#[test]
fn arithmetic_and_variables() {
    assert_eq!(
        kinds("$a + 1.5"),
        vec![TokenKind::ExprVariable, TokenKind::ExprOperator, TokenKind::ExprNumber]
    );
    let tokens = lex("$ns:long-name");
    assert_eq!(tokens[0].kind, TokenKind::ExprVariable);
    assert_eq!(tokens[0].value, "$ns:long-name");
    assert_eq!(tokens[0].variable_name(), "ns:long-name");
}

#[test]
fn string_literals_and_doubled_quote_escape() {
    let tokens = lex("'don''t'");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::ExprString);
    assert_eq!(tokens[0].value, "'don''t'");
    assert_eq!(tokens[0].error, None);

    let tokens = lex("\"a\" = 'b'");
    assert_eq!(
        tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![TokenKind::ExprString, TokenKind::ExprOperator, TokenKind::ExprString]
    );
}

#[test]
fn unclosed_string_is_tagged() {
    let tokens = lex("'oops");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].error, Some(TokenError::UnclosedString));
}

#[test]
fn nested_comments_are_one_token() {
    let tokens = lex("1 (: a (: b :) c :) 2");
    assert_eq!(
        tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![TokenKind::ExprNumber, TokenKind::ExprComment, TokenKind::ExprNumber]
    );
    assert_eq!(tokens[1].value, "(: a (: b :) c :)");

    let unclosed = lex("(: runs off");
    assert_eq!(unclosed[0].error, Some(TokenError::UnclosedComment));
}

#[test]
fn function_calls_vs_node_tests() {
    assert_eq!(
        kinds("my:f(1, 2)"),
        vec![
            TokenKind::ExprFunction,
            TokenKind::ExprOpen(Bracket::Paren),
            TokenKind::ExprNumber,
            TokenKind::ExprComma,
            TokenKind::ExprNumber,
            TokenKind::ExprClose(Bracket::Paren),
        ]
    );
    // Kind tests look like calls but are not.
    assert_eq!(kinds("text()")[0], TokenKind::ExprNodeTest);
    assert_eq!(kinds("element(foo)")[0], TokenKind::ExprNodeTest);
    // A bare name with no paren is a path step.
    assert_eq!(kinds("text")[0], TokenKind::ExprName);
}

#[test]
fn named_function_reference_carries_arity() {
    let tokens = lex("fn:concat#3");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::ExprFunctionRef);
    assert_eq!(tokens[0].function_ref_name(), "fn:concat");
    assert_eq!(tokens[0].function_ref_arity(), Some(3));
}

#[test]
fn reserved_words_are_keywords_even_before_paren() {
    assert_eq!(
        kinds("if ($a) then 1 else 2"),
        vec![
            TokenKind::ExprKeyword,
            TokenKind::ExprOpen(Bracket::Paren),
            TokenKind::ExprVariable,
            TokenKind::ExprClose(Bracket::Paren),
            TokenKind::ExprKeyword,
            TokenKind::ExprNumber,
            TokenKind::ExprKeyword,
            TokenKind::ExprNumber,
        ]
    );
}

#[test]
fn word_operators_need_a_left_operand() {
    // `div` after an operand is an operator.
    let tokens = lex("$a div 2");
    assert_eq!(tokens[1].kind, TokenKind::ExprOperator);
    // At expression start it is a name (a path step to a <div>).
    let tokens = lex("div");
    assert_eq!(tokens[0].kind, TokenKind::ExprName);
    let tokens = lex("div div div");
    assert_eq!(
        tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![TokenKind::ExprName, TokenKind::ExprOperator, TokenKind::ExprName]
    );
}

#[test]
fn two_word_operators_collapse() {
    let tokens = lex("$x instance  of item()");
    assert_eq!(tokens[1].kind, TokenKind::ExprOperator);
    // Raw interior whitespace is preserved in the value.
    assert_eq!(tokens[1].value, "instance  of");
    assert_eq!(tokens[2].kind, TokenKind::ExprNodeTest);

    // `instance` without `of` stays a name.
    let tokens = lex("$x instance");
    assert_eq!(tokens[1].kind, TokenKind::ExprName);
}

#[test]
fn axes_and_multichar_operators() {
    assert_eq!(
        kinds("child::item//self::node()"),
        vec![
            TokenKind::ExprName,
            TokenKind::ExprAxis,
            TokenKind::ExprName,
            TokenKind::ExprOperator,
            TokenKind::ExprName,
            TokenKind::ExprAxis,
            TokenKind::ExprNodeTest,
            TokenKind::ExprOpen(Bracket::Paren),
            TokenKind::ExprClose(Bracket::Paren),
        ]
    );
    let ops = lex("$a != $b => f() , $c || 'x'");
    let two_char: Vec<&str> = ops
        .iter()
        .filter(|t| t.kind == TokenKind::ExprOperator)
        .map(|t| t.value.as_str())
        .collect();
    assert_eq!(two_char, vec!["!=", "=>", "||"]);
}

#[test]
fn numbers() {
    let tokens = lex("1 2.5 .5 1e3 1E-2");
    assert!(tokens.iter().all(|t| t.kind == TokenKind::ExprNumber));
    assert!(tokens.iter().all(|t| t.error.is_none()));
    assert_eq!(tokens[2].value, ".5");

    // `1..5` keeps the dots out of the number.
    let tokens = lex("1..5");
    assert_eq!(
        tokens.iter().map(|t| t.value.as_str()).collect::<Vec<_>>(),
        vec!["1", "..", "5"]
    );

    let bad = lex("1e+");
    assert_eq!(bad[0].error, Some(TokenError::InvalidNumber));
}

#[test]
fn wildcard_qname() {
    let tokens = lex("ns:*");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].value, "ns:*");
    assert_eq!(tokens[0].kind, TokenKind::ExprName);
}

#[test]
fn positions_continue_across_lines() {
    let tokens = XPathLexer::tokenize_expression("$a +\n  $b", 4, 10);
    assert_eq!(tokens[0].line, 4);
    assert_eq!(tokens[0].start_col, 10);
    assert_eq!(tokens[2].line, 5);
    assert_eq!(tokens[2].start_col, 2);
}

#[test]
fn map_constructor_shape() {
    assert_eq!(
        kinds("map { 'k' : 1 }"),
        vec![
            TokenKind::ExprName,
            TokenKind::ExprOpen(Bracket::Curly),
            TokenKind::ExprString,
            TokenKind::ExprOperator,
            TokenKind::ExprNumber,
            TokenKind::ExprClose(Bracket::Curly),
        ]
    );
}
