pub mod frames;
pub mod sink;
pub mod walker;


pub use sink::{Analysis, ReferenceTarget, Resolution, ResolveSink};

use sink::{AnalysisSink, ReferenceSink};
use walker::walk;

use crate::config::DialectConfig;
use crate::decl::GlobalDeclaration;
use crate::token::Token;

/// Full scope resolution over one tokenized document: marks reference
/// tokens resolved, and produces the outline plus all structural and
/// semantic diagnostics. One pass, no retries.
pub fn resolve(
    tokens: &mut [Token],
    locals: &[GlobalDeclaration],
    imported: &[GlobalDeclaration],
    config: &DialectConfig,
) -> Analysis {
    let mut sink = AnalysisSink::new();
    let end = walk(tokens, locals, imported, config, &mut sink);
    sink.finish(end)
}

/// Indices of every token that refers to `target`, including the
/// definition site for local variables. Runs the same pass as `resolve`
/// over a private copy so the caller's tokens stay untouched.
pub fn find_references(
    tokens: &[Token],
    target: &ReferenceTarget,
    locals: &[GlobalDeclaration],
    imported: &[GlobalDeclaration],
    config: &DialectConfig,
) -> Vec<usize> {
    let mut copy = tokens.to_vec();
    let mut sink = ReferenceSink::new(target, locals, imported);
    walk(&mut copy, locals, imported, config, &mut sink);
    sink.hits
}
