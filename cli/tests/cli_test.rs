use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

fn xsa() -> Command {
    Command::cargo_bin("xsa").expect("binary")
}

#[test]
fn check_clean_document_succeeds_quietly() {
    let doc = write_temp("<t><xsl:variable name=\"v\" select=\"1\"/><y select=\"$v\"/></t>");
    xsa()
        .arg("check")
        .arg(doc.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn check_reports_unresolved_variable_and_fails() {
    let doc = write_temp("<x select=\"$nope\"/>");
    xsa()
        .arg("check")
        .arg(doc.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("variable '$nope' is not defined").not())
        .stdout(predicate::str::contains("variable 'nope' is not defined"));
}

#[test]
fn check_softens_with_imported_documents() {
    let lib = write_temp("<s><xsl:variable name=\"shared\" select=\"1\"/></s>");
    let doc = write_temp(
        "<s><xsl:import href=\"lib.xsl\"/><x select=\"$shared\"/><y select=\"$other\"/></s>",
    );
    xsa()
        .arg("check")
        .arg(doc.path())
        .arg("--with")
        .arg(lib.path())
        .assert()
        // Only a warning remains, so the run passes.
        .success()
        .stdout(predicate::str::contains("'other'"))
        .stdout(predicate::str::contains("'shared'").not());
}

#[test]
fn check_json_output_is_parseable() {
    let doc = write_temp("<x select=\"$nope\"/>");
    let output = xsa()
        .arg("check")
        .arg(doc.path())
        .arg("--json")
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let diags: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(diags.as_array().map(|a| a.len()), Some(1));
    assert_eq!(diags[0]["code"], "UnresolvedVariable");
}

#[test]
fn outline_prints_nested_symbols() {
    let doc = write_temp(
        "<xsl:stylesheet><xsl:template name=\"main\"><p>hi</p></xsl:template></xsl:stylesheet>",
    );
    xsa()
        .arg("outline")
        .arg(doc.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("xsl:stylesheet"))
        .stdout(predicate::str::contains("xsl:template \u{25B8} main"))
        .stdout(predicate::str::contains("    p  ["));
}

#[test]
fn tokens_dump_includes_expression_tokens() {
    let doc = write_temp("<x select=\"$a + 1\"/>");
    xsa()
        .arg("tokens")
        .arg(doc.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ExprVariable\t$a"))
        .stdout(predicate::str::contains("ExprNumber\t1"));
}

#[test]
fn decls_lists_globals_with_arity() {
    let doc = write_temp(
        "<s><xsl:function name=\"f:go\"><xsl:param name=\"a\"/></xsl:function></s>",
    );
    xsa()
        .arg("decls")
        .arg(doc.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Function\tf:go/1"));
}

#[test]
fn custom_config_changes_the_dialect() {
    let config = write_temp("binding_elements = [\"var\"]\n");
    let doc = write_temp("<outer><var name=\"x\" select=\"1\"/><ref>{$x}</ref></outer>");
    xsa()
        .arg("check")
        .arg(doc.path())
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    // Without the override the reference does not resolve.
    xsa().arg("check").arg(doc.path()).assert().failure();
}

#[test]
fn missing_file_is_a_usage_error() {
    xsa()
        .arg("check")
        .arg("/no/such/file.xsl")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}
