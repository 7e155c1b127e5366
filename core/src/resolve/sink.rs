use crate::decl::GlobalDeclaration;
use crate::diagnostics::Diagnostic;
use crate::symbols::{SymbolBuilder, SymbolNode};
use crate::token::Position;

/// What a reference token resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A lexically visible binding; the index of its defining token.
    Local { binding_token: usize },
    /// An entry in the local or imported global-declaration set.
    Global { decl_index: usize, imported: bool },
    /// The built-in function library.
    Builtin,
    Unresolved,
}

/// An element open event, as seen by symbol-producing sinks.
#[derive(Debug)]
pub struct ElementEvent<'a> {
    pub name: &'a str,
    pub local: &'a str,
    pub detail: Option<String>,
    pub start: Position,
}

/// Observer capability for the single resolver walk. Every external
/// feature (diagnostics, outlines, reference search) is a thin sink
/// over the same pass rather than its own re-implementation of the
/// scope stack.
pub trait ResolveSink {
    fn binding_declared(&mut self, _token_index: usize, _name: &str) {}
    fn reference(&mut self, _token_index: usize, _resolution: Resolution) {}
    fn diagnostic(&mut self, _diagnostic: Diagnostic) {}
    fn element_opened(&mut self, _event: &ElementEvent) {}
    fn element_closed(&mut self, _end: Position) {}
    fn element_leaf(&mut self, _event: &ElementEvent, _end: Position) {}
}

/// Everything `resolve` returns for one document pass.
#[derive(Debug)]
pub struct Analysis {
    pub symbols: Vec<SymbolNode>,
    pub diagnostics: Vec<Diagnostic>,
    /// Indices of reference tokens that resolved to nothing.
    pub unresolved_references: Vec<usize>,
}

/// The diagnostics + outline sink behind `resolve`.
#[derive(Default)]
pub struct AnalysisSink {
    builder: SymbolBuilder,
    diagnostics: Vec<Diagnostic>,
    unresolved: Vec<usize>,
}

impl AnalysisSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(mut self, end: Position) -> Analysis {
        let symbols = self.builder.finish(end);
        self.diagnostics
            .sort_by_key(|d| (d.range.start.line, d.range.start.column));
        Analysis {
            symbols,
            diagnostics: self.diagnostics,
            unresolved_references: self.unresolved,
        }
    }
}

impl ResolveSink for AnalysisSink {
    fn reference(&mut self, token_index: usize, resolution: Resolution) {
        if resolution == Resolution::Unresolved {
            self.unresolved.push(token_index);
        }
    }

    fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn element_opened(&mut self, event: &ElementEvent) {
        self.builder
            .open(event.name, event.local, event.detail.clone(), event.start);
    }

    fn element_closed(&mut self, end: Position) {
        self.builder.close(end);
    }

    fn element_leaf(&mut self, event: &ElementEvent, end: Position) {
        self.builder
            .leaf(event.name, event.local, event.detail.clone(), event.start, end);
    }
}

/// What `find_references` is looking for.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceTarget {
    /// A local variable, identified by its exact definition-site token.
    Variable { defining_token: usize },
    /// A global declaration, matched by name (and arity for functions).
    Declaration(GlobalDeclaration),
}

/// Sink that records tokens matching one target declaration.
pub struct ReferenceSink<'a> {
    target: &'a ReferenceTarget,
    locals: &'a [GlobalDeclaration],
    imported: &'a [GlobalDeclaration],
    pub hits: Vec<usize>,
}

impl<'a> ReferenceSink<'a> {
    pub fn new(
        target: &'a ReferenceTarget,
        locals: &'a [GlobalDeclaration],
        imported: &'a [GlobalDeclaration],
    ) -> Self {
        Self {
            target,
            locals,
            imported,
            hits: Vec::new(),
        }
    }

    fn declaration_matches(&self, resolved: &GlobalDeclaration) -> bool {
        match self.target {
            ReferenceTarget::Declaration(want) => {
                want.kind == resolved.kind
                    && want.local_name() == resolved.local_name()
                    && want.arity == resolved.arity
            }
            ReferenceTarget::Variable { .. } => false,
        }
    }
}

impl ResolveSink for ReferenceSink<'_> {
    fn binding_declared(&mut self, token_index: usize, _name: &str) {
        if let ReferenceTarget::Variable { defining_token } = self.target {
            if *defining_token == token_index {
                self.hits.push(token_index);
            }
        }
    }

    fn reference(&mut self, token_index: usize, resolution: Resolution) {
        match resolution {
            Resolution::Local { binding_token } => {
                if let ReferenceTarget::Variable { defining_token } = self.target {
                    if *defining_token == binding_token {
                        self.hits.push(token_index);
                    }
                }
            }
            Resolution::Global { decl_index, imported } => {
                let set = if imported { self.imported } else { self.locals };
                if let Some(decl) = set.get(decl_index) {
                    if self.declaration_matches(decl) {
                        self.hits.push(token_index);
                    }
                }
            }
            Resolution::Builtin | Resolution::Unresolved => {}
        }
    }
}
