pub mod config;
pub mod decl;
pub mod diagnostics;
pub mod resolve;
pub mod symbols;
pub mod token;
pub mod util;

pub use config::DialectConfig;
pub use decl::{DeclKind, GlobalDeclaration, collect_global_declarations};
pub use diagnostics::{Diagnostic, DiagnosticCode, Range, Severity};
pub use resolve::{Analysis, ReferenceTarget, find_references, resolve};
pub use symbols::SymbolNode;
pub use token::{Token, TokenKind, tokenize};
