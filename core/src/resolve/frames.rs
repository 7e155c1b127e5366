use crate::token::{Bracket, Position};

/// A variable introduced by a binding element's name attribute or by a
/// range-variable binder keyword. `token_index` points at the defining
/// token in the pass's token slice; the `referenced` mark lives on the
/// token itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub token_index: usize,
    pub name: String,
}

/// Structural scope frame, one per open element. Popping restores the
/// visibility that existed before the element opened, since visibility
/// is computed by walking the live stack.
#[derive(Debug)]
pub struct ScopeFrame {
    /// Element name as written, for close-tag matching.
    pub name: String,
    pub open_pos: Position,
    /// Bindings visible inside this element: contributed by child
    /// binding elements that have already closed.
    pub vars: Vec<VariableBinding>,
    /// Binding this element itself defines. Not visible to its own
    /// descendants; unioned into the parent frame when it closes so
    /// later siblings can see it.
    pub own_binding: Option<VariableBinding>,
    /// Namespace prefixes introduced on this element; dropped with it.
    pub prefixes: Vec<String>,
}

/// State for a function call attached to an open paren.
#[derive(Debug)]
pub struct CallInfo {
    pub name_token: usize,
    /// Top-level commas seen so far.
    pub commas: usize,
    /// A fat-arrow pipe injects the left operand as a leading argument.
    pub injected: bool,
}

/// What pushed an expression frame.
#[derive(Debug)]
pub enum FrameKind {
    /// A whole delegated region: expression attribute or template hole.
    Region,
    /// `for` / `let` / `some` / `every`.
    Binder,
    /// `then`; popped by `else` so branch bindings do not leak.
    Branch,
    /// An explicit bracket pair.
    Bracket {
        bracket: Bracket,
        open_token: usize,
        call: Option<CallInfo>,
        /// Set for map-constructor braces: alternating key/value
        /// bookkeeping across top-level commas and colons.
        map: bool,
        seen_colon: bool,
        saw_argument: bool,
    },
}

#[derive(Debug)]
pub struct ExpressionFrame {
    pub kind: FrameKind,
    pub vars: Vec<VariableBinding>,
    /// Index into `vars` of a binding still mid-definition; skipped
    /// during resolution so `let $x := $x` cannot see itself.
    pub defining: Option<usize>,
    /// The next variable token is a new binding, not a reference.
    pub awaiting_binder: bool,
}

impl ExpressionFrame {
    pub fn region() -> Self {
        Self {
            kind: FrameKind::Region,
            vars: Vec::new(),
            defining: None,
            awaiting_binder: false,
        }
    }

    pub fn binder() -> Self {
        Self {
            kind: FrameKind::Binder,
            vars: Vec::new(),
            defining: None,
            awaiting_binder: true,
        }
    }

    pub fn branch() -> Self {
        Self {
            kind: FrameKind::Branch,
            vars: Vec::new(),
            defining: None,
            awaiting_binder: false,
        }
    }

    pub fn bracket(bracket: Bracket, open_token: usize, call: Option<CallInfo>, map: bool) -> Self {
        Self {
            kind: FrameKind::Bracket {
                bracket,
                open_token,
                call,
                map,
                seen_colon: false,
                saw_argument: false,
            },
            vars: Vec::new(),
            defining: None,
            awaiting_binder: false,
        }
    }

    /// Bindings fully defined in this frame, visible to a reference.
    pub fn visible(&self) -> impl Iterator<Item = &VariableBinding> {
        self.vars
            .iter()
            .enumerate()
            .rev()
            .filter(|(i, _)| Some(*i) != self.defining)
            .map(|(_, b)| b)
    }
}
