use xsa_core::{
    DeclKind, DiagnosticCode, DialectConfig, ReferenceTarget, TokenKind,
    collect_global_declarations, find_references, resolve, tokenize,
};

const STYLESHEET: &str = r#"<?xml version="1.0"?>
<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" xmlns:f="urn:f" version="3.0">
  <xsl:variable name="threshold" select="10"/>
  <xsl:function name="f:scale">
    <xsl:param name="n"/>
    <xsl:sequence select="$n * 2"/>
  </xsl:function>
  <xsl:template name="main">
    <xsl:variable name="items" select="//item[number(@price) gt $threshold]"/>
    <ul>
      <xsl:for-each select="$items">
        <li id="{position()}">
          <xsl:value-of select="f:scale(number(@price))"/>
        </li>
      </xsl:for-each>
    </ul>
  </xsl:template>
</xsl:stylesheet>"#;

#[test]
fn clean_stylesheet_has_no_diagnostics() {
    let config = DialectConfig::default();
    let locals = collect_global_declarations(STYLESHEET, &config);
    let mut tokens = tokenize(STYLESHEET, &config);
    let analysis = resolve(&mut tokens, &locals, &[], &config);
    assert!(analysis.diagnostics.is_empty(), "{:#?}", analysis.diagnostics);
    assert!(analysis.unresolved_references.is_empty());
}

#[test]
fn declarations_of_a_full_stylesheet() {
    let config = DialectConfig::default();
    let decls = collect_global_declarations(STYLESHEET, &config);
    assert!(decls.iter().any(|d| d.kind == DeclKind::NamespaceBinding && d.name == "xsl"));
    assert!(decls.iter().any(|d| d.kind == DeclKind::NamespaceBinding && d.name == "f"));
    assert!(decls.iter().any(|d| d.kind == DeclKind::Variable && d.name == "threshold"));
    assert!(decls.iter().any(|d| d.kind == DeclKind::Template && d.name == "main"));
    let function = decls.iter().find(|d| d.kind == DeclKind::Function).unwrap();
    assert_eq!(function.name, "f:scale");
    assert_eq!(function.arity, Some(1));
    assert_eq!(function.member_names, vec!["n"]);
}

#[test]
fn outline_of_a_full_stylesheet() {
    let config = DialectConfig::default();
    let mut tokens = tokenize(STYLESHEET, &config);
    let analysis = resolve(&mut tokens, &[], &[], &config);
    // The PI is not an element; one root.
    assert_eq!(analysis.symbols.len(), 1);
    let root = &analysis.symbols[0];
    assert_eq!(root.name, "xsl:stylesheet");
    let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["xsl:variable", "xsl:function", "xsl:template"]);
    let template = &root.children[2];
    assert_eq!(template.display_name(), "xsl:template \u{25B8} main");
}

#[test]
fn references_of_a_global_variable() {
    let config = DialectConfig::default();
    let tokens = tokenize(STYLESHEET, &config);
    let defining = tokens
        .iter()
        .position(|t| t.kind == TokenKind::AttributeValue && t.value == "\"threshold\"")
        .unwrap();
    let target = ReferenceTarget::Variable { defining_token: defining };
    let hits = find_references(&tokens, &target, &[], &[], &config);
    // Definition site plus the predicate reference.
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0], defining);
    assert_eq!(tokens[hits[1]].value, "$threshold");
}

#[test]
fn custom_dialect_configuration_end_to_end() {
    let config = DialectConfig::from_toml_str(
        r#"
        binding_elements = ["var"]
        "#,
    )
    .unwrap();
    let doc = "<outer><var name=\"x\" select=\"1\"/><ref>{$x}</ref></outer>";
    let mut tokens = tokenize(doc, &config);
    let analysis = resolve(&mut tokens, &[], &[], &config);
    assert!(analysis.diagnostics.is_empty(), "{:#?}", analysis.diagnostics);

    // With the default tables the same document fails: <var> binds nothing.
    let default_config = DialectConfig::default();
    let mut tokens = tokenize(doc, &default_config);
    let analysis = resolve(&mut tokens, &[], &[], &default_config);
    assert_eq!(analysis.diagnostics.len(), 1);
    assert_eq!(analysis.diagnostics[0].code, DiagnosticCode::UnresolvedVariable);
}

#[test]
fn broken_document_degrades_without_panicking() {
    let config = DialectConfig::default();
    let doc = "<a><b select=\"let $x := (1, 2\"><!-- unclosed\n<c></a>";
    let mut tokens = tokenize(doc, &config);
    let analysis = resolve(&mut tokens, &[], &[], &config);
    assert!(!analysis.diagnostics.is_empty());
    // Diagnostics come out sorted by position.
    let positions: Vec<_> = analysis
        .diagnostics
        .iter()
        .map(|d| (d.range.start.line, d.range.start.column))
        .collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted);
}

/// The flat token stream reproduces every non-whitespace character of
/// the input exactly once, in order.
#[test]
fn token_stream_covers_the_source() {
    let config = DialectConfig::default();
    let tokens = tokenize(STYLESHEET, &config);
    let lines: Vec<Vec<char>> = STYLESHEET.lines().map(|l| l.chars().collect()).collect();

    let mut last = (0u32, 0u32);
    for token in &tokens {
        let start = (token.line, token.start_col);
        assert!(start >= last, "tokens must be ordered: {token:?}");
        last = start;
        if token.value.contains('\n') {
            continue;
        }
        let line = &lines[token.line as usize];
        let s = token.start_col as usize;
        let e = s + token.length as usize;
        let slice: String = line[s..e].iter().collect();
        assert_eq!(slice, token.value);
    }
}
