use std::fmt;

use serde::Serialize;

use crate::token::{Position, Span, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Hint,
    Warning,
    Error,
}

/// Closed diagnostic taxonomy. Nothing in the core is fatal; every
/// failure becomes one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticCode {
    UnmatchedElement,
    MismatchedTag,
    UnmatchedBracket,
    UnresolvedVariable,
    UnresolvedFunction,
    UnusedVariable,
    MalformedMapEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl From<Span> for Range {
    fn from(span: Span) -> Self {
        Self { start: span.start, end: span.end }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub range: Range,
    pub message: String,
    pub severity: Severity,
    pub code: DiagnosticCode,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Hint => "hint",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{} [{}] {}", self.range, severity, self.message)
    }
}

/// Constructors for each reportable condition, so severities and
/// messages stay in one place.
impl Diagnostic {
    pub fn unresolved_variable(token: &Token, softened: bool) -> Self {
        Self {
            range: token.span().into(),
            message: format!("variable '{}' is not defined", token.variable_name()),
            severity: if softened { Severity::Warning } else { Severity::Error },
            code: DiagnosticCode::UnresolvedVariable,
        }
    }

    pub fn unresolved_function(token: &Token, arity: usize, softened: bool) -> Self {
        Self {
            range: token.span().into(),
            message: format!(
                "no function named '{}' taking {} argument{}",
                token.value,
                arity,
                if arity == 1 { "" } else { "s" }
            ),
            severity: if softened { Severity::Warning } else { Severity::Error },
            code: DiagnosticCode::UnresolvedFunction,
        }
    }

    pub fn unused_variable(token: &Token) -> Self {
        Self {
            range: token.span().into(),
            message: format!("variable '{}' is declared but never used", token.value.trim_matches(['"', '\'', '$'])),
            severity: Severity::Hint,
            code: DiagnosticCode::UnusedVariable,
        }
    }

    pub fn unmatched_open_bracket(token: &Token, expected: char) -> Self {
        Self {
            range: token.span().into(),
            message: format!("'{}' is never closed; expected '{}'", token.value, expected),
            severity: Severity::Error,
            code: DiagnosticCode::UnmatchedBracket,
        }
    }

    pub fn unmatched_close_bracket(token: &Token) -> Self {
        Self {
            range: token.span().into(),
            message: format!("'{}' has no matching opening bracket", token.value),
            severity: Severity::Error,
            code: DiagnosticCode::UnmatchedBracket,
        }
    }

    pub fn unmatched_open_element(name: &str, span: Span) -> Self {
        Self {
            range: span.into(),
            message: format!("element '{}' is never closed; expected '</{}>'", name, name),
            severity: Severity::Error,
            code: DiagnosticCode::UnmatchedElement,
        }
    }

    pub fn unmatched_close_element(name: &str, span: Span) -> Self {
        Self {
            range: span.into(),
            message: format!("close tag '</{}>' has no matching open tag", name),
            severity: Severity::Error,
            code: DiagnosticCode::UnmatchedElement,
        }
    }

    pub fn mismatched_tag(open_name: &str, close_name: &str, span: Span) -> Self {
        Self {
            range: span.into(),
            message: format!("close tag '</{}>' does not match open tag '<{}>'", close_name, open_name),
            severity: Severity::Error,
            code: DiagnosticCode::MismatchedTag,
        }
    }

    pub fn malformed_map_entry(span: Span) -> Self {
        Self {
            range: span.into(),
            message: "map entry is missing a ':' between key and value".to_string(),
            severity: Severity::Error,
            code: DiagnosticCode::MalformedMapEntry,
        }
    }
}
