use serde::Serialize;

use crate::diagnostics::Range;
use crate::token::Position;

/// One node of the hierarchical document outline, spanning from the
/// opening `<` through the matching close tag's final character.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolNode {
    /// Element name as written.
    pub name: String,
    /// Identifier attribute value, when the element carries one.
    pub detail: Option<String>,
    /// Presentation classification derived from the element name.
    pub tag: SymbolTag,
    pub range: Range,
    pub children: Vec<SymbolNode>,
}

impl SymbolNode {
    /// Outline label: `name ▸ id` when an identifier is present.
    pub fn display_name(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{} \u{25B8} {}", self.name, detail),
            None => self.name.clone(),
        }
    }
}

/// Presentation-only classification; carries no semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolTag {
    Template,
    Function,
    Variable,
    Parameter,
    Mode,
    Key,
    Accumulator,
    AttributeSet,
    Module,
    Element,
}

impl SymbolTag {
    pub fn from_element(local: &str) -> Self {
        match local {
            "template" => SymbolTag::Template,
            "function" => SymbolTag::Function,
            "variable" => SymbolTag::Variable,
            "param" | "with-param" => SymbolTag::Parameter,
            "mode" => SymbolTag::Mode,
            "key" => SymbolTag::Key,
            "accumulator" => SymbolTag::Accumulator,
            "attribute-set" => SymbolTag::AttributeSet,
            "stylesheet" | "transform" | "package" => SymbolTag::Module,
            _ => SymbolTag::Element,
        }
    }
}

#[derive(Debug)]
struct PartialSymbol {
    name: String,
    detail: Option<String>,
    tag: SymbolTag,
    start: Position,
    children: Vec<SymbolNode>,
}

/// Assembles matched element open/close events into an outline tree,
/// recovering from malformed nesting without ever failing.
#[derive(Debug, Default)]
pub struct SymbolBuilder {
    stack: Vec<PartialSymbol>,
    roots: Vec<SymbolNode>,
}

impl SymbolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn open(&mut self, name: &str, local: &str, detail: Option<String>, start: Position) {
        self.stack.push(PartialSymbol {
            name: name.to_string(),
            detail,
            tag: SymbolTag::from_element(local),
            start,
            children: Vec::new(),
        });
    }

    /// Close the innermost open element at `end`. Returns false when
    /// nothing was open.
    pub fn close(&mut self, end: Position) -> bool {
        let Some(partial) = self.stack.pop() else {
            return false;
        };
        let node = SymbolNode {
            name: partial.name,
            detail: partial.detail,
            tag: partial.tag,
            range: Range {
                start: partial.start,
                end,
            },
            children: partial.children,
        };
        self.attach(node);
        true
    }

    /// A leaf produced by a self-closing tag.
    pub fn leaf(&mut self, name: &str, local: &str, detail: Option<String>, start: Position, end: Position) {
        let node = SymbolNode {
            name: name.to_string(),
            detail,
            tag: SymbolTag::from_element(local),
            range: Range { start, end },
            children: Vec::new(),
        };
        self.attach(node);
    }

    fn attach(&mut self, node: SymbolNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    /// Name of the innermost open element, for mismatch recovery.
    pub fn open_name(&self, levels_up: usize) -> Option<&str> {
        let len = self.stack.len();
        if levels_up < len {
            Some(&self.stack[len - 1 - levels_up].name)
        } else {
            None
        }
    }

    /// End of document: close every still-open element. Each remaining
    /// level closes one column earlier than the one below it so the
    /// recovered ranges stay strictly nested; the exact positions are a
    /// best effort, not a contract.
    pub fn finish(mut self, end: Position) -> Vec<SymbolNode> {
        let mut shrink = self.stack.len() as u32;
        while !self.stack.is_empty() {
            shrink -= 1;
            let col = end.column.saturating_sub(shrink);
            self.close(Position::new(end.line, col));
        }
        self.roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, col: u32) -> Position {
        Position::new(line, col)
    }

    #[test]
    fn builds_nested_outline() {
        let mut b = SymbolBuilder::new();
        b.open("xsl:template", "template", Some("main".into()), pos(0, 0));
        b.open("p", "p", None, pos(1, 2));
        assert!(b.close(pos(1, 10)));
        assert!(b.close(pos(2, 15)));
        let roots = b.finish(pos(2, 15));
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "xsl:template");
        assert_eq!(roots[0].tag, SymbolTag::Template);
        assert_eq!(roots[0].display_name(), "xsl:template \u{25B8} main");
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].name, "p");
    }

    #[test]
    fn finish_closes_unclosed_elements_nested() {
        let mut b = SymbolBuilder::new();
        b.open("a", "a", None, pos(0, 0));
        b.open("b", "b", None, pos(0, 3));
        let roots = b.finish(pos(0, 20));
        assert_eq!(roots.len(), 1);
        let a = &roots[0];
        let b_node = &a.children[0];
        assert!(b_node.range.end.column < a.range.end.column);
    }

    #[test]
    fn close_on_empty_stack_is_harmless() {
        let mut b = SymbolBuilder::new();
        assert!(!b.close(pos(0, 0)));
        assert!(b.finish(pos(0, 0)).is_empty());
    }
}
