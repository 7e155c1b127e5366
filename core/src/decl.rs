use serde::Serialize;
use tracing::debug;

use crate::config::DialectConfig;
use crate::token::chars::{BraceContext, CharState, classify};
use crate::token::span::{Position, utf16_width};
use crate::token::{Span, local_name};

/// Named construct visible outside its immediate lexical container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeclKind {
    Variable,
    Parameter,
    Function,
    Template,
    Mode,
    Key,
    Accumulator,
    AttributeSet,
    Import,
    Include,
    UsePackage,
    NamespaceBinding,
}

/// Position and text of the token that defines a declaration, detached
/// from any token stream so declaration sets can be threaded across
/// documents as read-only input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenSummary {
    pub line: u32,
    pub start_col: u32,
    pub length: u32,
    pub value: String,
}

impl TokenSummary {
    pub fn span(&self) -> Span {
        Span::new(
            Position::new(self.line, self.start_col),
            Position::new(self.line, self.start_col + self.length),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalDeclaration {
    pub kind: DeclKind,
    pub name: String,
    pub defining_token: TokenSummary,
    /// Declared parameter count, for functions and named templates.
    pub arity: Option<usize>,
    /// Parameter names for functions/templates, attribute names for
    /// attribute sets.
    pub member_names: Vec<String>,
}

impl GlobalDeclaration {
    /// Local part of the declared name (prefix stripped).
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }
}

/// Lightweight pre-pass: walks the same character loop as the full
/// lexer but records only declaration-shaped facts. Usable standalone,
/// without resolution or diagnostics.
pub fn collect_global_declarations(text: &str, config: &DialectConfig) -> Vec<GlobalDeclaration> {
    let scanner = DeclScanner::new(text, config);
    let decls = scanner.run();
    debug!(count = decls.len(), "global declaration scan complete");
    decls
}

/// One attribute captured while its start tag is still open.
#[derive(Debug, Clone)]
struct RawAttr {
    name: String,
    value: String,
    value_pos: Position,
}

struct DeclScanner<'a> {
    chars: Vec<char>,
    len: usize,
    idx: usize,
    line: u32,
    col: u32,
    state: CharState,
    config: &'a DialectConfig,
    /// Count of structurally open elements around the cursor.
    depth: usize,
    element_name: String,
    /// Pending attribute-name buffer; cleared on every `=` transition
    /// and every tag-open.
    attr_name: String,
    attr_value: String,
    attr_value_pos: Position,
    attrs: Vec<RawAttr>,
    in_close_tag: bool,
    /// Declaration currently open at depth 1, accumulating members.
    current: Option<GlobalDeclaration>,
    decls: Vec<GlobalDeclaration>,
}

impl<'a> DeclScanner<'a> {
    fn new(text: &str, config: &'a DialectConfig) -> Self {
        let chars: Vec<char> = text.chars().collect();
        Self {
            len: chars.len(),
            chars,
            idx: 0,
            line: 0,
            col: 0,
            state: CharState::Init,
            config,
            depth: 0,
            element_name: String::new(),
            attr_name: String::new(),
            attr_value: String::new(),
            attr_value_pos: Position::start(),
            attrs: Vec::new(),
            in_close_tag: false,
            current: None,
            decls: Vec::new(),
        }
    }

    fn advance(&mut self) {
        if self.chars[self.idx] == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += utf16_width(self.chars[self.idx]);
        }
        self.idx += 1;
    }

    fn run(mut self) -> Vec<GlobalDeclaration> {
        use CharState::*;
        while self.idx < self.len {
            let c = self.chars[self.idx];
            let next = self.chars.get(self.idx + 1).copied();
            let prev = self.state;
            let new = classify(prev, c, next);

            match (prev, new) {
                (TagOpen, ElementName) => {
                    self.element_name.clear();
                    self.element_name.push(c);
                    self.attrs.clear();
                    self.attr_name.clear();
                    self.in_close_tag = false;
                }
                (ElementName, ElementName) => self.element_name.push(c),
                (TagOpen, CloseTagSlash) => {
                    self.element_name.clear();
                    self.in_close_tag = true;
                }
                (CloseTagSlash, CloseTagName) | (CloseTagName, CloseTagName) => {
                    self.element_name.push(c);
                }
                (InTag, AttributeName) | (AfterAttributeName, AttributeName) => {
                    self.attr_name.clear();
                    self.attr_name.push(c);
                }
                (AttributeName, AttributeName) => self.attr_name.push(c),
                (AttributeName, AfterEquals)
                | (AfterAttributeName, AfterEquals)
                | (InTag, AfterEquals) => {
                    self.attr_value.clear();
                }
                (AfterEquals, AttributeDouble) | (AfterEquals, AttributeSingle) => {
                    self.attr_value.clear();
                    // Value text starts after the quote.
                    self.attr_value_pos = Position::new(self.line, self.col + 1);
                }
                (AttributeDouble, AttributeDouble)
                | (AttributeSingle, AttributeSingle)
                | (AttributeDouble, Entity(BraceContext::Double))
                | (AttributeSingle, Entity(BraceContext::Single))
                | (Entity(BraceContext::Double), AttributeDouble)
                | (Entity(BraceContext::Single), AttributeSingle)
                | (Entity(BraceContext::Double), Entity(BraceContext::Double))
                | (Entity(BraceContext::Single), Entity(BraceContext::Single))
                | (AttributeDouble, AvtHole(BraceContext::Double))
                | (AttributeSingle, AvtHole(BraceContext::Single))
                | (AvtHole(BraceContext::Double), AvtHole(BraceContext::Double))
                | (AvtHole(BraceContext::Single), AvtHole(BraceContext::Single))
                | (AvtHole(BraceContext::Double), AttributeDouble)
                | (AvtHole(BraceContext::Single), AttributeSingle)
                | (AttributeDouble, BraceEscape(BraceContext::Double))
                | (AttributeSingle, BraceEscape(BraceContext::Single))
                | (BraceEscape(BraceContext::Double), AttributeDouble)
                | (BraceEscape(BraceContext::Single), AttributeSingle) => {
                    self.attr_value.push(c);
                }
                (AttributeDouble, InTag) | (AttributeSingle, InTag) => {
                    self.attrs.push(RawAttr {
                        name: std::mem::take(&mut self.attr_name),
                        value: std::mem::take(&mut self.attr_value),
                        value_pos: self.attr_value_pos,
                    });
                }
                (ElementName, Init)
                | (InTag, Init)
                | (AttributeName, Init)
                | (AfterAttributeName, Init)
                | (AfterEquals, Init) => {
                    if self.in_close_tag {
                        self.element_closed();
                    } else {
                        self.tag_finished(false);
                    }
                }
                (CloseTagName, Init) | (CloseTagSlash, Init) => {
                    self.element_closed();
                }
                (SelfClosePending, Init) => {
                    self.tag_finished(true);
                }
                _ => {}
            }

            self.state = new;
            self.advance();
        }
        if let Some(decl) = self.current.take() {
            self.decls.push(decl);
        }
        self.decls
    }

    fn attr(&self, local: &str) -> Option<&RawAttr> {
        self.attrs.iter().find(|a| local_name(&a.name) == local)
    }

    /// A start tag just closed with `>` or `/>`. Depth is still the
    /// pre-open depth when this fires.
    fn tag_finished(&mut self, self_close: bool) {
        let element = std::mem::take(&mut self.element_name);
        let local = local_name(&element).to_string();

        if self.depth == 0 {
            // Namespace-prefix bindings live on the outermost element.
            for attr in &self.attrs {
                if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                    self.decls.push(GlobalDeclaration {
                        kind: DeclKind::NamespaceBinding,
                        name: prefix.to_string(),
                        defining_token: summary(&attr.value, attr.value_pos),
                        arity: None,
                        member_names: Vec::new(),
                    });
                }
            }
        } else if self.depth == 1 {
            if let Some(decl) = self.current.take() {
                self.decls.push(decl);
            }
            if let Some(kind) = self.config.declaration_kind(&local) {
                if let Some(decl) = self.build_declaration(kind) {
                    if self_close {
                        self.decls.push(decl);
                    } else {
                        self.current = Some(decl);
                    }
                }
            }
        } else if self.depth == 2 {
            // Depth-2 params belong to the enclosing function/template,
            // never to the global set.
            if local == "param" {
                if let Some(current) = self.current.as_mut() {
                    if matches!(current.kind, DeclKind::Function | DeclKind::Template) {
                        if let Some(name_attr) =
                            self.attrs.iter().find(|a| local_name(&a.name) == "name")
                        {
                            current.member_names.push(name_attr.value.clone());
                            current.arity = Some(current.member_names.len());
                        }
                    }
                }
            }
        }

        if !self_close {
            self.depth += 1;
        }
        self.attrs.clear();
    }

    fn element_closed(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth <= 1 {
            if let Some(decl) = self.current.take() {
                self.decls.push(decl);
            }
        }
        self.element_name.clear();
    }

    fn build_declaration(&self, kind: DeclKind) -> Option<GlobalDeclaration> {
        let name_attr = match kind {
            DeclKind::Import | DeclKind::Include => self.attr("href")?,
            DeclKind::Template => {
                // Match-only templates are not named declarations, but a
                // mode-carrying one still surfaces under its mode name.
                match self.attr("name") {
                    Some(a) => a,
                    None => self.attr("mode")?,
                }
            }
            _ => self.attr("name")?,
        };
        let arity = match kind {
            DeclKind::Function => Some(0),
            _ => None,
        };
        Some(GlobalDeclaration {
            kind,
            name: name_attr.value.clone(),
            defining_token: summary(&name_attr.value, name_attr.value_pos),
            arity,
            member_names: Vec::new(),
        })
    }
}

fn summary(value: &str, pos: Position) -> TokenSummary {
    TokenSummary {
        line: pos.line,
        start_col: pos.column,
        length: value.encode_utf16().count() as u32,
        value: value.to_string(),
    }
}
