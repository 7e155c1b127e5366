use super::{Token, TokenError, TokenKind, tokenize};
use crate::config::DialectConfig;

fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
    tokens.iter().map(|t| t.kind).collect()
}

fn values(tokens: &[Token]) -> Vec<&str> {
    tokens.iter().map(|t| t.value.as_str()).collect()
}

#[test]
fn plain_element_with_attribute() {
    let config = DialectConfig::default();
    let tokens = tokenize("<a href=\"x\">hi</a>", &config);
    assert_eq!(
        kinds(&tokens),
        vec![
            TokenKind::TagStart,
            TokenKind::ElementName,
            TokenKind::AttributeName,
            TokenKind::AttributeEquals,
            TokenKind::AttributeValue,
            TokenKind::TagEnd,
            TokenKind::Text,
            TokenKind::CloseTagStart,
            TokenKind::CloseElementName,
            TokenKind::TagEnd,
        ]
    );
    assert_eq!(
        values(&tokens),
        vec!["<", "a", "href", "=", "\"x\"", ">", "hi", "</", "a", ">"]
    );
    assert!(tokens.iter().all(|t| t.error.is_none()));
}

#[test]
fn self_closing_tag() {
    let config = DialectConfig::default();
    let tokens = tokenize("<br/>", &config);
    assert_eq!(
        kinds(&tokens),
        vec![TokenKind::TagStart, TokenKind::ElementName, TokenKind::SelfCloseTagEnd]
    );
    assert_eq!(tokens[2].value, "/>");
}

#[test]
fn expression_attribute_delegates() {
    let config = DialectConfig::default();
    let tokens = tokenize("<x select=\"$a + 1\"/>", &config);
    assert_eq!(
        kinds(&tokens),
        vec![
            TokenKind::TagStart,
            TokenKind::ElementName,
            TokenKind::AttributeName,
            TokenKind::AttributeEquals,
            TokenKind::AttributeQuote,
            TokenKind::ExprVariable,
            TokenKind::ExprOperator,
            TokenKind::ExprNumber,
            TokenKind::AttributeQuote,
            TokenKind::SelfCloseTagEnd,
        ]
    );
    assert_eq!(tokens[5].value, "$a");
    // Absolute document positions inside the delegated region.
    assert_eq!(tokens[5].line, 0);
    assert_eq!(tokens[5].start_col, 11);
    assert_eq!(tokens[7].start_col, 16);
}

#[test]
fn ordinary_attribute_is_not_delegated() {
    let config = DialectConfig::default();
    let tokens = tokenize("<x name=\"$a + 1\"/>", &config);
    assert_eq!(tokens[4].kind, TokenKind::AttributeValue);
    assert_eq!(tokens[4].value, "\"$a + 1\"");
}

#[test]
fn value_template_hole_in_text() {
    let config = DialectConfig::default();
    let tokens = tokenize("<p>{$x}</p>", &config);
    assert_eq!(
        kinds(&tokens),
        vec![
            TokenKind::TagStart,
            TokenKind::ElementName,
            TokenKind::TagEnd,
            TokenKind::HoleOpen,
            TokenKind::ExprVariable,
            TokenKind::HoleClose,
            TokenKind::CloseTagStart,
            TokenKind::CloseElementName,
            TokenKind::TagEnd,
        ]
    );
}

#[test]
fn value_template_hole_in_literal_attribute() {
    let config = DialectConfig::default();
    let tokens = tokenize("<x a=\"pre{$v}post\"/>", &config);
    let expr: Vec<_> = tokens
        .iter()
        .map(|t| (t.kind, t.value.as_str()))
        .collect();
    assert!(expr.contains(&(TokenKind::AttributeValue, "\"pre")));
    assert!(expr.contains(&(TokenKind::HoleOpen, "{")));
    assert!(expr.contains(&(TokenKind::ExprVariable, "$v")));
    assert!(expr.contains(&(TokenKind::HoleClose, "}")));
    assert!(expr.contains(&(TokenKind::AttributeValue, "post\"")));
}

#[test]
fn doubled_braces_are_literal() {
    let config = DialectConfig::default();
    let tokens = tokenize("<x a=\"{{not-an-expr}}\"/>", &config);
    assert_eq!(tokens[4].kind, TokenKind::AttributeValue);
    assert_eq!(tokens[4].value, "\"{{not-an-expr}}\"");
    assert!(!tokens.iter().any(|t| t.kind == TokenKind::HoleOpen));
}

#[test]
fn entities_in_text() {
    let config = DialectConfig::default();
    let tokens = tokenize("<p>hi &amp; bye</p>", &config);
    let texty: Vec<_> = tokens
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::Text | TokenKind::EntityRef))
        .map(|t| (t.kind, t.value.as_str()))
        .collect();
    assert_eq!(
        texty,
        vec![
            (TokenKind::Text, "hi"),
            (TokenKind::EntityRef, "&amp;"),
            (TokenKind::Text, "bye"),
        ]
    );
}

#[test]
fn unterminated_entity_is_tagged_not_fatal() {
    let config = DialectConfig::default();
    let tokens = tokenize("<p>&amp oops</p>", &config);
    let entity = tokens.iter().find(|t| t.kind == TokenKind::EntityRef).unwrap();
    assert_eq!(entity.value, "&amp");
    assert_eq!(entity.error, Some(TokenError::UnclosedEntity));
}

#[test]
fn raw_regions_are_single_tokens() {
    let config = DialectConfig::default();
    let tokens = tokenize(
        "<!-- note --><![CDATA[<raw>]]><?xml version=\"1.0\"?><!DOCTYPE r>",
        &config,
    );
    assert_eq!(
        kinds(&tokens),
        vec![
            TokenKind::Comment,
            TokenKind::Cdata,
            TokenKind::ProcessingInstruction,
            TokenKind::Dtd,
        ]
    );
    assert_eq!(tokens[0].value, "<!-- note -->");
    assert_eq!(tokens[1].value, "<![CDATA[<raw>]]>");
    assert_eq!(tokens[3].value, "<!DOCTYPE r>");
}

#[test]
fn multiline_comment_is_one_token() {
    let config = DialectConfig::default();
    let tokens = tokenize("<!--\nline two\n-->", &config);
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Comment);
    let span = tokens[0].span();
    assert_eq!(span.start.line, 0);
    assert_eq!(span.end.line, 2);
    assert_eq!(span.end.column, 3);
}

#[test]
fn unclosed_comment_at_eof() {
    let config = DialectConfig::default();
    let tokens = tokenize("<!-- dangling", &config);
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Comment);
    assert_eq!(tokens[0].error, Some(TokenError::UnclosedComment));
}

#[test]
fn unclosed_attribute_value_at_eof() {
    let config = DialectConfig::default();
    let tokens = tokenize("<a href=\"x", &config);
    let value = tokens.last().unwrap();
    assert_eq!(value.kind, TokenKind::AttributeValue);
    assert_eq!(value.error, Some(TokenError::UnclosedRegion));
}

#[test]
fn unclosed_hole_at_eof() {
    let config = DialectConfig::default();
    let tokens = tokenize("<p>{$x", &config);
    let open = tokens.iter().find(|t| t.kind == TokenKind::HoleOpen).unwrap();
    assert_eq!(open.error, Some(TokenError::UnclosedRegion));
    assert!(tokens.iter().any(|t| t.kind == TokenKind::ExprVariable));
}

#[test]
fn hole_interrupted_by_tag_recovers() {
    let config = DialectConfig::default();
    let tokens = tokenize("<p>{$x <b/></p>", &config);
    let open = tokens.iter().find(|t| t.kind == TokenKind::HoleOpen).unwrap();
    assert_eq!(open.error, Some(TokenError::UnclosedRegion));
    // Lexing resumes with the interrupting tag.
    assert!(tokens.iter().any(|t| t.kind == TokenKind::ElementName && t.value == "b"));
}

#[test]
fn pure_whitespace_produces_no_text_token() {
    let config = DialectConfig::default();
    let tokens = tokenize("<a>   \n\t </a>", &config);
    assert!(!tokens.iter().any(|t| t.kind == TokenKind::Text));
}

#[test]
fn utf16_columns_for_astral_chars() {
    let config = DialectConfig::default();
    // 𐐷 occupies two UTF-16 code units.
    let tokens = tokenize("<p>𐐷{$x}</p>", &config);
    let hole = tokens.iter().find(|t| t.kind == TokenKind::HoleOpen).unwrap();
    assert_eq!(hole.start_col, 5);
    let var = tokens.iter().find(|t| t.kind == TokenKind::ExprVariable).unwrap();
    assert_eq!(var.start_col, 6);
}

/// Every non-whitespace character is covered by exactly one token, and
/// each token's value is the exact source slice it claims.
#[test]
fn tokens_cover_the_document() {
    let config = DialectConfig::default();
    let doc = "<x select=\"$a + f(1)\" id=\"v\">t &lt; u {$b}</x>";
    let chars: Vec<char> = doc.chars().collect();
    let tokens = tokenize(doc, &config);

    let mut coverage = vec![0u8; chars.len()];
    for token in &tokens {
        assert_eq!(token.line, 0);
        let start = token.start_col as usize;
        let end = start + token.length as usize;
        let slice: String = chars[start..end].iter().collect();
        assert_eq!(slice, token.value, "value must equal its source slice");
        for cell in &mut coverage[start..end] {
            *cell += 1;
        }
    }
    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            assert!(coverage[i] <= 1, "char {i} covered twice");
        } else {
            assert_eq!(coverage[i], 1, "char {i} ({c:?}) not covered exactly once");
        }
    }
}
