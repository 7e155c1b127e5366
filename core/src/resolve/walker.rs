use tracing::debug;

use super::frames::{CallInfo, ExpressionFrame, FrameKind, ScopeFrame, VariableBinding};
use super::sink::{ElementEvent, Resolution, ResolveSink};
use crate::config::{DialectConfig, builtin_accepts};
use crate::decl::{DeclKind, GlobalDeclaration};
use crate::diagnostics::Diagnostic;
use crate::token::{Bracket, Position, Token, TokenKind, local_name, name_prefix};
use crate::util::fast_map::{FastHashSet, fast_hash_set_new};

/// Start-tag context accumulated between `<name` and `>` / `/>`.
#[derive(Debug, Default)]
struct PendingTag {
    name: String,
    is_close: bool,
    start: Position,
    last_attr: String,
    /// Captured from the name attribute of a binding element; enters no
    /// visible set until the element closes.
    pending_binding: Option<VariableBinding>,
    detail: Option<String>,
    prefixes: Vec<String>,
}

/// One forward pass over the token stream. All features observe it
/// through a `ResolveSink`; the walk itself is identical for
/// diagnostics, outlines, and reference search.
pub fn walk<S: ResolveSink>(
    tokens: &mut [Token],
    locals: &[GlobalDeclaration],
    imported: &[GlobalDeclaration],
    config: &DialectConfig,
    sink: &mut S,
) -> Position {
    let mut walker = Walker {
        locals,
        imported,
        config,
        softened: !imported.is_empty()
            || locals.iter().any(|d| {
                matches!(d.kind, DeclKind::Import | DeclKind::Include | DeclKind::UsePackage)
            }),
        element_stack: Vec::new(),
        expr_stack: Vec::new(),
        bindings: Vec::new(),
        resolved_decl_positions: fast_hash_set_new(),
        tag: None,
        in_expr_attr: false,
        recovered_close: None,
        last_expr: [None, None],
    };
    walker.run(tokens, sink)
}

struct Walker<'a> {
    locals: &'a [GlobalDeclaration],
    imported: &'a [GlobalDeclaration],
    config: &'a DialectConfig,
    /// Unresolved references soften to warnings when external modules
    /// could define the name.
    softened: bool,
    element_stack: Vec<ScopeFrame>,
    expr_stack: Vec<ExpressionFrame>,
    /// Every binding created during the pass, for the unused check.
    bindings: Vec<VariableBinding>,
    /// Defining-token positions of global declarations that resolved a
    /// reference, so their in-document binding tokens count as used.
    resolved_decl_positions: FastHashSet<(u32, u32)>,
    tag: Option<PendingTag>,
    /// Inside an expression-bearing attribute value; the next
    /// `AttributeQuote` closes the region.
    in_expr_attr: bool,
    /// Close-tag name consumed by one-level mismatch recovery; its own
    /// stray close tag is swallowed without a second report.
    recovered_close: Option<String>,
    /// The two most recent expression token indices, for function-call
    /// and fat-arrow lookback.
    last_expr: [Option<usize>; 2],
}

impl<'a> Walker<'a> {
    fn run<S: ResolveSink>(&mut self, tokens: &mut [Token], sink: &mut S) -> Position {
        let end = tokens.last().map(|t| t.span().end).unwrap_or_else(Position::start);
        for i in 0..tokens.len() {
            match tokens[i].kind {
                TokenKind::TagStart | TokenKind::CloseTagStart => {
                    self.clear_expressions(tokens, sink);
                    self.tag = Some(PendingTag {
                        is_close: tokens[i].kind == TokenKind::CloseTagStart,
                        start: tokens[i].span().start,
                        ..PendingTag::default()
                    });
                }
                TokenKind::ElementName | TokenKind::CloseElementName => {
                    if let Some(tag) = self.tag.as_mut() {
                        tag.name = tokens[i].value.trim().to_string();
                    }
                }
                TokenKind::AttributeName => {
                    if let Some(tag) = self.tag.as_mut() {
                        tag.last_attr = tokens[i].value.clone();
                    }
                }
                TokenKind::AttributeValue => self.attribute_value(tokens, i, sink),
                TokenKind::TagEnd => {
                    let end_pos = tokens[i].span().end;
                    if let Some(tag) = self.tag.take() {
                        if tag.is_close {
                            self.close_element(&tag, end_pos, sink);
                        } else {
                            self.open_element(tag, sink);
                        }
                    }
                }
                TokenKind::SelfCloseTagEnd => {
                    let end_pos = tokens[i].span().end;
                    if let Some(tag) = self.tag.take() {
                        self.leaf_element(tag, end_pos, sink);
                    }
                }
                TokenKind::AttributeQuote => {
                    if self.in_expr_attr {
                        self.in_expr_attr = false;
                        self.close_region(tokens, sink);
                    } else {
                        self.in_expr_attr = true;
                        self.expr_stack.push(ExpressionFrame::region());
                    }
                }
                TokenKind::HoleOpen => self.expr_stack.push(ExpressionFrame::region()),
                TokenKind::HoleClose => self.close_region(tokens, sink),

                TokenKind::ExprVariable => {
                    self.ensure_region();
                    let top = self.expr_stack.last_mut().unwrap();
                    if top.awaiting_binder {
                        let binding = VariableBinding {
                            token_index: i,
                            name: tokens[i].variable_name().to_string(),
                        };
                        top.vars.push(binding.clone());
                        top.defining = Some(top.vars.len() - 1);
                        top.awaiting_binder = false;
                        sink.binding_declared(i, &binding.name);
                        self.bindings.push(binding);
                    } else {
                        self.resolve_variable(tokens, i, sink);
                    }
                    self.mark_argument();
                }
                TokenKind::ExprKeyword => {
                    self.ensure_region();
                    self.mark_argument();
                    match tokens[i].value.as_str() {
                        "for" | "let" | "some" | "every" => {
                            self.expr_stack.push(ExpressionFrame::binder());
                        }
                        "then" => self.expr_stack.push(ExpressionFrame::branch()),
                        "else" => self.pop_branch(),
                        "return" | "satisfies" => self.pop_binder(),
                        // `if` opens nothing until `then`; `in` keeps the
                        // binder mid-definition through its sequence.
                        _ => {}
                    }
                }
                TokenKind::ExprOpen(bracket) => {
                    self.ensure_region();
                    self.mark_argument();
                    let call = self.call_lookback(tokens, bracket);
                    let map = bracket == Bracket::Curly && self.map_lookback(tokens);
                    self.expr_stack.push(ExpressionFrame::bracket(bracket, i, call, map));
                }
                TokenKind::ExprClose(bracket) => {
                    self.ensure_region();
                    self.close_bracket(tokens, i, bracket, sink);
                }
                TokenKind::ExprComma => {
                    self.ensure_region();
                    self.comma(tokens, i, sink);
                }
                TokenKind::ExprOperator => {
                    self.ensure_region();
                    self.mark_argument();
                    if tokens[i].value == ":" {
                        if let Some(ExpressionFrame {
                            kind: FrameKind::Bracket { map: true, seen_colon, .. },
                            ..
                        }) = self.expr_stack.last_mut()
                        {
                            *seen_colon = true;
                        }
                    }
                }
                TokenKind::ExprFunctionRef => {
                    self.ensure_region();
                    self.mark_argument();
                    let arity = tokens[i].function_ref_arity().unwrap_or(0);
                    let name = tokens[i].function_ref_name().to_string();
                    self.resolve_function(tokens, i, &name, arity, sink);
                }
                TokenKind::ExprString
                | TokenKind::ExprNumber
                | TokenKind::ExprFunction
                | TokenKind::ExprNodeTest
                | TokenKind::ExprName
                | TokenKind::ExprAxis => {
                    self.ensure_region();
                    self.mark_argument();
                }
                TokenKind::ExprComment
                | TokenKind::Text
                | TokenKind::EntityRef
                | TokenKind::Comment
                | TokenKind::Cdata
                | TokenKind::ProcessingInstruction
                | TokenKind::Dtd
                | TokenKind::AttributeEquals => {}
            }
            if is_expression_kind(tokens[i].kind) {
                self.last_expr = [Some(i), self.last_expr[0]];
            }
        }

        self.clear_expressions(tokens, sink);
        for frame in std::mem::take(&mut self.element_stack).into_iter().rev() {
            sink.diagnostic(Diagnostic::unmatched_open_element(
                &frame.name,
                crate::token::Span::single(frame.open_pos),
            ));
        }
        self.report_unused(tokens, sink);
        debug!(bindings = self.bindings.len(), "resolution pass complete");
        end
    }

    // --- structural handling ---

    fn attribute_value<S: ResolveSink>(&mut self, tokens: &mut [Token], i: usize, _sink: &mut S) {
        let Some(tag) = self.tag.as_mut() else { return };
        let raw = tokens[i].value.trim_matches(['"', '\'']).to_string();
        if let Some(prefix) = tag.last_attr.strip_prefix("xmlns:") {
            tag.prefixes.push(prefix.to_string());
            return;
        }
        if local_name(&tag.last_attr) == self.config.name_attribute {
            tag.detail = Some(raw.clone());
            if self.config.is_binding_element(local_name(&tag.name)) {
                tag.pending_binding = Some(VariableBinding {
                    token_index: i,
                    name: raw,
                });
            }
        }
    }

    fn open_element<S: ResolveSink>(&mut self, tag: PendingTag, sink: &mut S) {
        sink.element_opened(&ElementEvent {
            name: &tag.name,
            local: local_name(&tag.name),
            detail: tag.detail.clone(),
            start: tag.start,
        });
        if let Some(binding) = &tag.pending_binding {
            self.bindings.push(binding.clone());
            sink.binding_declared(binding.token_index, &binding.name);
        }
        self.element_stack.push(ScopeFrame {
            name: tag.name,
            open_pos: tag.start,
            vars: Vec::new(),
            own_binding: tag.pending_binding,
            prefixes: tag.prefixes,
        });
    }

    fn leaf_element<S: ResolveSink>(&mut self, tag: PendingTag, end: Position, sink: &mut S) {
        sink.element_leaf(
            &ElementEvent {
                name: &tag.name,
                local: local_name(&tag.name),
                detail: tag.detail.clone(),
                start: tag.start,
            },
            end,
        );
        if let Some(binding) = tag.pending_binding {
            self.bindings.push(binding.clone());
            sink.binding_declared(binding.token_index, &binding.name);
            if let Some(parent) = self.element_stack.last_mut() {
                parent.vars.push(binding);
            }
        }
    }

    fn close_element<S: ResolveSink>(&mut self, tag: &PendingTag, end: Position, sink: &mut S) {
        let close_name = tag.name.as_str();
        let top_matches = self
            .element_stack
            .last()
            .is_some_and(|f| f.name == close_name);
        if top_matches {
            self.pop_element(end, sink);
            return;
        }
        // One level of recovery: if the frame below matches, the
        // innermost element was left unclosed by a mismatched pair.
        let below_matches = self.element_stack.len() >= 2
            && self.element_stack[self.element_stack.len() - 2].name == close_name;
        if below_matches {
            let open_name = self.element_stack.last().unwrap().name.clone();
            sink.diagnostic(Diagnostic::mismatched_tag(
                &open_name,
                close_name,
                crate::token::Span::new(tag.start, end),
            ));
            self.recovered_close = Some(open_name);
            self.pop_element(end, sink);
            self.pop_element(end, sink);
            return;
        }
        if self.recovered_close.as_deref() == Some(close_name) {
            // The stray half of an already-reported mismatched pair.
            self.recovered_close = None;
            return;
        }
        sink.diagnostic(Diagnostic::unmatched_close_element(
            close_name,
            crate::token::Span::new(tag.start, end),
        ));
    }

    fn pop_element<S: ResolveSink>(&mut self, end: Position, sink: &mut S) {
        if let Some(frame) = self.element_stack.pop() {
            sink.element_closed(end);
            if let Some(binding) = frame.own_binding {
                if let Some(parent) = self.element_stack.last_mut() {
                    parent.vars.push(binding);
                }
            }
        }
    }

    // --- expression frames ---

    /// A region frame underpins every expression run; malformed input
    /// can deliver expression tokens without an opener.
    fn ensure_region(&mut self) {
        if self.expr_stack.is_empty() {
            self.expr_stack.push(ExpressionFrame::region());
        }
    }

    fn mark_argument(&mut self) {
        if let Some(ExpressionFrame {
            kind: FrameKind::Bracket { saw_argument, .. },
            ..
        }) = self.expr_stack.last_mut()
        {
            *saw_argument = true;
        }
    }

    fn call_lookback(&self, tokens: &[Token], bracket: Bracket) -> Option<CallInfo> {
        if bracket != Bracket::Paren {
            return None;
        }
        let name_token = self.last_expr[0]?;
        if tokens[name_token].kind != TokenKind::ExprFunction {
            return None;
        }
        let injected = self.last_expr[1].is_some_and(|j| {
            tokens[j].kind == TokenKind::ExprOperator && tokens[j].value == "=>"
        });
        Some(CallInfo {
            name_token,
            commas: 0,
            injected,
        })
    }

    fn map_lookback(&self, tokens: &[Token]) -> bool {
        self.last_expr[0].is_some_and(|j| {
            tokens[j].kind == TokenKind::ExprName && tokens[j].value == "map"
        })
    }

    fn pop_branch(&mut self) {
        if matches!(
            self.expr_stack.last(),
            Some(ExpressionFrame { kind: FrameKind::Branch, .. })
        ) {
            // Branch bindings do not leak into the other branch.
            self.expr_stack.pop();
        }
    }

    /// `return` / `satisfies`: the binder's bindings become fully
    /// defined and visible in the body, which belongs to the enclosing
    /// frame; the enclosing bracket close restores the outer set.
    fn pop_binder(&mut self) {
        if matches!(
            self.expr_stack.last(),
            Some(ExpressionFrame { kind: FrameKind::Binder, .. })
        ) {
            let frame = self.expr_stack.pop().unwrap();
            if let Some(parent) = self.expr_stack.last_mut() {
                parent.vars.extend(frame.vars);
            }
        }
    }

    fn comma<S: ResolveSink>(&mut self, tokens: &[Token], i: usize, sink: &mut S) {
        match self.expr_stack.last_mut() {
            Some(frame @ ExpressionFrame { kind: FrameKind::Binder, .. }) => {
                // `let $a := 1, $b := 2`: the next variable is a binder.
                frame.defining = None;
                frame.awaiting_binder = true;
            }
            Some(ExpressionFrame {
                kind: FrameKind::Bracket { call, map, seen_colon, saw_argument, .. },
                ..
            }) => {
                if let Some(call) = call {
                    call.commas += 1;
                }
                if *map {
                    if !*seen_colon && *saw_argument {
                        sink.diagnostic(Diagnostic::malformed_map_entry(tokens[i].span()));
                    }
                    *seen_colon = false;
                }
            }
            _ => {}
        }
    }

    fn close_bracket<S: ResolveSink>(
        &mut self,
        tokens: &mut [Token],
        i: usize,
        bracket: Bracket,
        sink: &mut S,
    ) {
        loop {
            match self.expr_stack.last() {
                Some(ExpressionFrame { kind: FrameKind::Bracket { bracket: b, .. }, .. })
                    if *b == bracket =>
                {
                    let frame = self.expr_stack.pop().unwrap();
                    if let FrameKind::Bracket { call: Some(call), saw_argument, .. } = frame.kind {
                        let arity = call.commas
                            + usize::from(saw_argument)
                            + usize::from(call.injected);
                        let name = tokens[call.name_token].value.clone();
                        self.resolve_function(tokens, call.name_token, &name, arity, sink);
                    }
                    return;
                }
                Some(ExpressionFrame {
                    kind: FrameKind::Binder | FrameKind::Branch,
                    ..
                }) => {
                    // Closing keywords already ran for well-formed input;
                    // fold leftover binder vars outward and keep looking.
                    let frame = self.expr_stack.pop().unwrap();
                    if let Some(parent) = self.expr_stack.last_mut() {
                        parent.vars.extend(frame.vars);
                    }
                }
                // A different bracket kind or the region boundary: this
                // closer matches nothing.
                _ => {
                    sink.diagnostic(Diagnostic::unmatched_close_bracket(&tokens[i]));
                    return;
                }
            }
        }
    }

    /// End of a delegated region: everything above the region frame is
    /// unclosed, reported here at the region boundary.
    fn close_region<S: ResolveSink>(&mut self, tokens: &[Token], sink: &mut S) {
        while let Some(frame) = self.expr_stack.pop() {
            match frame.kind {
                FrameKind::Bracket { bracket, open_token, .. } => {
                    sink.diagnostic(Diagnostic::unmatched_open_bracket(
                        &tokens[open_token],
                        bracket.close_char(),
                    ));
                }
                FrameKind::Region => return,
                FrameKind::Binder | FrameKind::Branch => {}
            }
        }
    }

    /// Element boundaries end every expression context: expressions
    /// never span elements.
    fn clear_expressions<S: ResolveSink>(&mut self, tokens: &[Token], sink: &mut S) {
        while !self.expr_stack.is_empty() {
            self.close_region(tokens, sink);
        }
        self.in_expr_attr = false;
        self.last_expr = [None, None];
    }

    // --- resolution ---

    /// Resolution order: expression frames inward-out, then structural
    /// frames, then local globals, then imported globals. First match
    /// wins.
    fn resolve_variable<S: ResolveSink>(&mut self, tokens: &mut [Token], i: usize, sink: &mut S) {
        let name = tokens[i].variable_name().to_string();

        for frame in self.expr_stack.iter().rev() {
            if let Some(binding) = frame.visible().find(|b| b.name == name) {
                let target = binding.token_index;
                tokens[target].referenced = true;
                sink.reference(i, Resolution::Local { binding_token: target });
                return;
            }
        }
        for frame in self.element_stack.iter().rev() {
            if let Some(binding) = frame.vars.iter().rev().find(|b| b.name == name) {
                let target = binding.token_index;
                tokens[target].referenced = true;
                sink.reference(i, Resolution::Local { binding_token: target });
                return;
            }
        }
        for (imported, set) in [(false, self.locals), (true, self.imported)] {
            if let Some(idx) = set.iter().position(|d| {
                matches!(d.kind, DeclKind::Variable | DeclKind::Parameter)
                    && d.local_name() == local_name(&name)
            }) {
                let decl = &set[idx];
                if !imported {
                    self.resolved_decl_positions
                        .insert((decl.defining_token.line, decl.defining_token.start_col));
                }
                sink.reference(i, Resolution::Global { decl_index: idx, imported });
                return;
            }
        }
        sink.reference(i, Resolution::Unresolved);
        sink.diagnostic(Diagnostic::unresolved_variable(&tokens[i], self.softened));
    }

    fn resolve_function<S: ResolveSink>(
        &mut self,
        tokens: &[Token],
        name_token: usize,
        name: &str,
        arity: usize,
        sink: &mut S,
    ) {
        let local = local_name(name);
        for (imported, set) in [(false, self.locals), (true, self.imported)] {
            if let Some(idx) = set.iter().position(|d| {
                d.kind == DeclKind::Function
                    && d.local_name() == local
                    && d.arity == Some(arity)
            }) {
                let decl = &set[idx];
                if !imported {
                    self.resolved_decl_positions
                        .insert((decl.defining_token.line, decl.defining_token.start_col));
                }
                sink.reference(name_token, Resolution::Global { decl_index: idx, imported });
                return;
            }
        }
        // The builtin table answers only for the default function
        // namespace; a prefixed call lives in its own namespace.
        let prefix = name_prefix(name);
        if prefix.is_none_or(|p| p == "fn") && builtin_accepts(local, arity) {
            sink.reference(name_token, Resolution::Builtin);
            return;
        }
        // A call whose prefix the document declares may name an
        // extension function the analyzer cannot see.
        let softened = self.softened
            || prefix.is_some_and(|p| p != "fn" && self.prefix_bound(p));
        sink.reference(name_token, Resolution::Unresolved);
        sink.diagnostic(Diagnostic::unresolved_function(
            &tokens[name_token],
            arity,
            softened,
        ));
    }

    /// Whether an `xmlns:` binding on the pending tag or any open
    /// element declares the prefix.
    fn prefix_bound(&self, prefix: &str) -> bool {
        self.tag
            .as_ref()
            .is_some_and(|t| t.prefixes.iter().any(|p| p == prefix))
            || self
                .element_stack
                .iter()
                .any(|f| f.prefixes.iter().any(|p| p == prefix))
    }

    fn report_unused<S: ResolveSink>(&mut self, tokens: &[Token], sink: &mut S) {
        for binding in &self.bindings {
            let token = &tokens[binding.token_index];
            if token.referenced {
                continue;
            }
            // An attribute-value binding whose global declaration was
            // referenced counts as used; the summary position starts
            // one column in, past the quote.
            if self
                .resolved_decl_positions
                .contains(&(token.line, token.start_col + 1))
            {
                continue;
            }
            sink.diagnostic(Diagnostic::unused_variable(token));
        }
    }
}

fn is_expression_kind(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::ExprString
            | TokenKind::ExprNumber
            | TokenKind::ExprVariable
            | TokenKind::ExprFunction
            | TokenKind::ExprFunctionRef
            | TokenKind::ExprNodeTest
            | TokenKind::ExprName
            | TokenKind::ExprKeyword
            | TokenKind::ExprAxis
            | TokenKind::ExprOperator
            | TokenKind::ExprComma
            | TokenKind::ExprOpen(_)
            | TokenKind::ExprClose(_)
    )
}
