pub mod chars;
pub mod lexer;
pub mod span;
pub mod xpath;

#[cfg(test)]
mod lexer_test;
#[cfg(test)]
mod xpath_test;

pub use chars::{BraceContext, CharState, classify};
pub use lexer::StructuralLexer;
pub use span::{Position, Span};

use serde::Serialize;

use crate::config::DialectConfig;

/// The three bracket families of the expression language, tracked
/// independently so a `}` can never be paired with a `(`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bracket {
    Paren,
    Square,
    Curly,
}

impl Bracket {
    pub fn open_char(self) -> char {
        match self {
            Bracket::Paren => '(',
            Bracket::Square => '[',
            Bracket::Curly => '{',
        }
    }

    pub fn close_char(self) -> char {
        match self {
            Bracket::Paren => ')',
            Bracket::Square => ']',
            Bracket::Curly => '}',
        }
    }
}

/// Coarse token category. Markup kinds come from the structural lexer,
/// `Expr*` kinds from the embedded expression lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    // Markup
    TagStart,         // `<` of a start tag
    CloseTagStart,    // `</`
    TagEnd,           // `>`
    SelfCloseTagEnd,  // `/>`
    ElementName,
    CloseElementName,
    AttributeName,
    AttributeEquals,  // `=`
    AttributeValue,   // quoted literal value, quotes included
    AttributeQuote,   // delimiter of an expression-bearing value
    Text,
    EntityRef,
    Comment,
    Cdata,
    ProcessingInstruction,
    Dtd,
    HoleOpen,         // `{` opening an attribute/text value template hole
    HoleClose,        // `}` closing one
    // Expression
    ExprString,
    ExprNumber,
    ExprVariable,     // `$name`
    ExprFunction,     // name lexically followed by `(`
    ExprFunctionRef,  // `name#arity`
    ExprNodeTest,     // node()/text()/element(...) style tests
    ExprName,         // bare QName / axis name
    ExprKeyword,      // for/let/some/every/if/then/else/return/satisfies/in
    ExprAxis,         // `::`
    ExprOperator,
    ExprComma,
    ExprComment,      // `(: ... :)`
    ExprOpen(Bracket),
    ExprClose(Bracket),
}

/// Lexical-level defect attached to a token; never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenError {
    UnclosedString,
    UnclosedEntity,
    UnclosedComment,
    UnclosedRegion,
    InvalidNumber,
}

/// One token of the flat document stream. Immutable once emitted except
/// for the `error` tag and the `referenced` mark set during resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub line: u32,
    pub start_col: u32,
    /// Length in UTF-16 code units (single-line tokens) or total code
    /// units covered (multi-line raw regions).
    pub length: u32,
    pub value: String,
    pub char_state: CharState,
    pub kind: TokenKind,
    pub error: Option<TokenError>,
    pub referenced: bool,
}

impl Token {
    pub fn span(&self) -> Span {
        let end_col = if self.value.contains('\n') {
            let last = self.value.rsplit('\n').next().unwrap_or("");
            last.encode_utf16().count() as u32
        } else {
            self.start_col + self.length
        };
        let end_line = self.line + self.value.matches('\n').count() as u32;
        Span::new(
            Position::new(self.line, self.start_col),
            Position::new(end_line, end_col),
        )
    }

    /// Variable name without the `$` sigil, or the raw value for
    /// non-variable tokens.
    pub fn variable_name(&self) -> &str {
        self.value.strip_prefix('$').unwrap_or(&self.value)
    }

    /// Local part of a possibly prefixed name (`xsl:template` -> `template`).
    pub fn local_name(&self) -> &str {
        local_name(&self.value)
    }

    /// Function name for `ExprFunctionRef` tokens (`f#2` -> `f`).
    pub fn function_ref_name(&self) -> &str {
        self.value.split('#').next().unwrap_or(&self.value)
    }

    /// Arity for `ExprFunctionRef` tokens (`f#2` -> Some(2)).
    pub fn function_ref_arity(&self) -> Option<usize> {
        self.value.split('#').nth(1)?.parse().ok()
    }
}

/// Local part of a possibly prefixed QName.
pub fn local_name(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

/// Namespace prefix of a QName, if any.
pub fn name_prefix(name: &str) -> Option<&str> {
    name.rsplit_once(':').map(|(p, _)| p)
}

/// Full structural + expression tokenization of one document.
/// Never fails; malformed input yields tokens with `error` tags.
pub fn tokenize(text: &str, config: &DialectConfig) -> Vec<Token> {
    StructuralLexer::new(text, config).run()
}
