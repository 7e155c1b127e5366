use super::chars::CharState;
use super::span::utf16_width;
use super::{Bracket, Token, TokenError, TokenKind};

/// Where an embedded expression region ends. Each delegated region is
/// lexed by one independent `XPathLexer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// Stop before the attribute-value delimiter quote.
    Quote(char),
    /// Stop before the `}` closing a value-template hole (at zero curly
    /// nesting, outside string literals and comments).
    CloseBrace,
    /// Lex to end of input (standalone use).
    EndOfInput,
}

/// Outcome of lexing one expression-bearing region.
#[derive(Debug)]
pub struct ExprRegion {
    pub tokens: Vec<Token>,
    /// Chars consumed from the region start, not counting the terminator.
    pub consumed: usize,
    pub end_line: u32,
    pub end_col: u32,
    /// False when the region ran out of input before its terminator.
    pub terminated: bool,
}

const COMPLEX_KEYWORDS: &[&str] = &[
    "for", "let", "some", "every", "if", "then", "else", "return", "satisfies", "in",
];

const WORD_OPERATORS: &[&str] = &[
    "and", "or", "div", "idiv", "mod", "eq", "ne", "lt", "le", "gt", "ge", "is", "to",
    "union", "intersect", "except",
];

/// First word of the two-word operators (`instance of`, `cast as`, ...).
const TWO_WORD_OPERATORS: &[(&str, &str)] = &[
    ("instance", "of"),
    ("cast", "as"),
    ("castable", "as"),
    ("treat", "as"),
];

/// Names that introduce node tests rather than function calls when
/// followed by `(`.
const NODE_TEST_NAMES: &[&str] = &[
    "node", "text", "comment", "element", "attribute", "document-node",
    "namespace-node", "processing-instruction", "schema-element", "schema-attribute",
    "item", "empty-sequence", "function", "map", "array",
];

#[inline]
fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

#[inline]
fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[inline]
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Tokenizer for one embedded XPath-style region. Positions are absolute
/// document positions; the caller hands in the region's start.
pub struct XPathLexer<'a> {
    chars: &'a [char],
    idx: usize,
    line: u32,
    col: u32,
    char_state: CharState,
    terminator: Terminator,
    curly_depth: i32,
    tokens: Vec<Token>,
}

impl<'a> XPathLexer<'a> {
    pub fn new(
        chars: &'a [char],
        line: u32,
        col: u32,
        char_state: CharState,
        terminator: Terminator,
    ) -> Self {
        Self {
            chars,
            idx: 0,
            line,
            col,
            char_state,
            terminator,
            curly_depth: 0,
            tokens: Vec::new(),
        }
    }

    /// Convenience entry point: lex a standalone expression string.
    pub fn tokenize_expression(text: &str, line: u32, col: u32) -> Vec<Token> {
        let chars: Vec<char> = text.chars().collect();
        let lexer = XPathLexer::new(&chars, line, col, CharState::Init, Terminator::EndOfInput);
        lexer.run().tokens
    }

    pub fn run(mut self) -> ExprRegion {
        let mut terminated = matches!(self.terminator, Terminator::EndOfInput);
        loop {
            self.skip_ws();
            if self.eof() {
                break;
            }
            let c = self.chars[self.idx];
            if self.at_terminator(c) {
                terminated = true;
                break;
            }
            match c {
                '\'' | '"' => self.lex_string(c),
                '(' if self.peek(1) == Some(':') => self.lex_comment(),
                '(' => self.lex_bracket(TokenKind::ExprOpen(Bracket::Paren)),
                ')' => self.lex_bracket(TokenKind::ExprClose(Bracket::Paren)),
                '[' => self.lex_bracket(TokenKind::ExprOpen(Bracket::Square)),
                ']' => self.lex_bracket(TokenKind::ExprClose(Bracket::Square)),
                '{' => {
                    self.curly_depth += 1;
                    self.lex_bracket(TokenKind::ExprOpen(Bracket::Curly));
                }
                '}' => {
                    self.curly_depth -= 1;
                    self.lex_bracket(TokenKind::ExprClose(Bracket::Curly));
                }
                '$' => self.lex_variable(),
                ',' => self.lex_single(TokenKind::ExprComma),
                c if c.is_ascii_digit() => self.lex_number(),
                '.' if self.peek(1).is_some_and(|n| n.is_ascii_digit()) => self.lex_number(),
                c if is_name_start(c) => self.lex_name(),
                _ => self.lex_operator(),
            }
        }
        ExprRegion {
            tokens: self.tokens,
            consumed: self.idx,
            end_line: self.line,
            end_col: self.col,
            terminated,
        }
    }

    fn at_terminator(&self, c: char) -> bool {
        match self.terminator {
            Terminator::Quote(q) => c == q,
            Terminator::CloseBrace => {
                (c == '}' && self.curly_depth == 0) || c == '<'
            }
            Terminator::EndOfInput => false,
        }
    }

    fn eof(&self) -> bool {
        self.idx >= self.chars.len()
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
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

    fn skip_ws(&mut self) {
        while !self.eof() && is_ws(self.chars[self.idx]) {
            self.advance();
        }
    }

    fn push(&mut self, kind: TokenKind, start: (usize, u32, u32), error: Option<TokenError>) {
        let (start_idx, line, col) = start;
        let value: String = self.chars[start_idx..self.idx].iter().collect();
        let length = value.encode_utf16().count() as u32;
        self.tokens.push(Token {
            line,
            start_col: col,
            length,
            value,
            char_state: self.char_state,
            kind,
            error,
            referenced: false,
        });
    }

    fn mark(&self) -> (usize, u32, u32) {
        (self.idx, self.line, self.col)
    }

    fn lex_single(&mut self, kind: TokenKind) {
        let start = self.mark();
        self.advance();
        self.push(kind, start, None);
    }

    fn lex_bracket(&mut self, kind: TokenKind) {
        self.lex_single(kind);
    }

    /// String literal; the delimiter doubled inside is an escape
    /// (`'don''t'`). An attribute delimiter quote always terminates,
    /// since it cannot legally appear in the value.
    fn lex_string(&mut self, quote: char) {
        let start = self.mark();
        self.advance(); // opening quote
        let mut error = Some(TokenError::UnclosedString);
        while !self.eof() {
            let c = self.chars[self.idx];
            if let Terminator::Quote(q) = self.terminator {
                if c == q {
                    break;
                }
            }
            if c == quote {
                if self.peek(1) == Some(quote) {
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance(); // closing quote
                error = None;
                break;
            }
            self.advance();
        }
        self.push(TokenKind::ExprString, start, error);
    }

    /// `(: ... :)`, nestable, one token even across lines.
    fn lex_comment(&mut self) {
        let start = self.mark();
        self.advance(); // (
        self.advance(); // :
        let mut depth = 1;
        let mut error = Some(TokenError::UnclosedComment);
        while !self.eof() {
            let c = self.chars[self.idx];
            if c == '(' && self.peek(1) == Some(':') {
                depth += 1;
                self.advance();
                self.advance();
            } else if c == ':' && self.peek(1) == Some(')') {
                depth -= 1;
                self.advance();
                self.advance();
                if depth == 0 {
                    error = None;
                    break;
                }
            } else {
                self.advance();
            }
        }
        self.push(TokenKind::ExprComment, start, error);
    }

    fn lex_variable(&mut self) {
        let start = self.mark();
        self.advance(); // $
        self.consume_qname();
        self.push(TokenKind::ExprVariable, start, None);
    }

    fn lex_number(&mut self) {
        let start = self.mark();
        let mut seen_dot = false;
        let mut seen_exp = false;
        let mut error = None;
        while !self.eof() {
            let c = self.chars[self.idx];
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !seen_dot && !seen_exp {
                // `1..5` range-ish sequences stay out of the number.
                if self.peek(1) == Some('.') {
                    break;
                }
                seen_dot = true;
                self.advance();
            } else if (c == 'e' || c == 'E') && !seen_exp {
                seen_exp = true;
                self.advance();
                if matches!(self.peek(0), Some('+') | Some('-')) {
                    self.advance();
                }
                if !self.peek(0).is_some_and(|d| d.is_ascii_digit()) {
                    error = Some(TokenError::InvalidNumber);
                }
            } else {
                break;
            }
        }
        self.push(TokenKind::ExprNumber, start, error);
    }

    fn consume_qname(&mut self) {
        while !self.eof() {
            let c = self.chars[self.idx];
            if is_name_char(c) {
                self.advance();
            } else if c == ':'
                && self.peek(1).is_some_and(|n| is_name_start(n) || n == '*')
                && self.peek(1) != Some(':')
            {
                // Single colon joining prefix and local part; `::` is an
                // axis separator and stays out of the name.
                self.advance();
            } else if c == '*' && self.prev_char_was(':') {
                // Wildcard local part `p:*`.
                self.advance();
                break;
            } else {
                break;
            }
        }
    }

    fn prev_char_was(&self, c: char) -> bool {
        self.idx > 0 && self.chars[self.idx - 1] == c
    }

    /// True when the previous token can end an operand, which decides
    /// whether a word like `div` is an operator or a name.
    fn after_operand(&self) -> bool {
        match self.tokens.iter().rev().find(|t| t.kind != TokenKind::ExprComment) {
            Some(t) => matches!(
                t.kind,
                TokenKind::ExprString
                    | TokenKind::ExprNumber
                    | TokenKind::ExprVariable
                    | TokenKind::ExprName
                    | TokenKind::ExprNodeTest
                    | TokenKind::ExprFunctionRef
                    | TokenKind::ExprClose(_)
            ),
            None => false,
        }
    }

    fn lex_name(&mut self) {
        let start = self.mark();
        self.consume_qname();
        let word: String = self.chars[start.0..self.idx].iter().collect();

        // `name#arity` named function reference.
        if self.peek(0) == Some('#') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance(); // #
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            self.push(TokenKind::ExprFunctionRef, start, None);
            return;
        }

        // Two-word operators collapse into one logical token, raw
        // whitespace included.
        if let Some((_, second)) = TWO_WORD_OPERATORS.iter().find(|(f, _)| *f == word) {
            if self.after_operand() && self.try_consume_second_word(second) {
                self.push(TokenKind::ExprOperator, start, None);
                return;
            }
        }

        // Reserved words stay keywords even before `(`: `if (...)` is a
        // conditional, never a function call.
        if COMPLEX_KEYWORDS.contains(&word.as_str()) {
            self.push(TokenKind::ExprKeyword, start, None);
            return;
        }

        if WORD_OPERATORS.contains(&word.as_str()) && self.after_operand() && !self.followed_by('(')
        {
            self.push(TokenKind::ExprOperator, start, None);
            return;
        }

        if self.followed_by('(') {
            let kind = if NODE_TEST_NAMES.contains(&word.as_str()) {
                TokenKind::ExprNodeTest
            } else {
                TokenKind::ExprFunction
            };
            self.push(kind, start, None);
            return;
        }

        self.push(TokenKind::ExprName, start, None);
    }

    /// Peek across whitespace for a marker character.
    fn followed_by(&self, marker: char) -> bool {
        let mut i = self.idx;
        while i < self.chars.len() && is_ws(self.chars[i]) {
            i += 1;
        }
        self.chars.get(i) == Some(&marker)
    }

    fn try_consume_second_word(&mut self, second: &str) -> bool {
        let save = (self.idx, self.line, self.col);
        let mut saw_ws = false;
        while !self.eof() && is_ws(self.chars[self.idx]) {
            saw_ws = true;
            self.advance();
        }
        if !saw_ws {
            return false;
        }
        let word_start = self.idx;
        while !self.eof() && is_name_char(self.chars[self.idx]) {
            self.advance();
        }
        let word: String = self.chars[word_start..self.idx].iter().collect();
        if word == second {
            true
        } else {
            (self.idx, self.line, self.col) = save;
            false
        }
    }

    fn lex_operator(&mut self) {
        let start = self.mark();
        let c = self.chars[self.idx];
        let two: Option<[char; 2]> = self.peek(1).map(|n| [c, n]);
        let double = |a: char, b: char| two == Some([a, b]);

        if double(':', ':') {
            self.advance();
            self.advance();
            self.push(TokenKind::ExprAxis, start, None);
            return;
        }
        let len = if double('/', '/')
            || double('.', '.')
            || double('!', '=')
            || double('<', '=')
            || double('>', '=')
            || double('<', '<')
            || double('>', '>')
            || double(':', '=')
            || double('=', '>')
            || double('|', '|')
        {
            2
        } else {
            1
        };
        for _ in 0..len {
            self.advance();
        }
        self.push(TokenKind::ExprOperator, start, None);
    }
}
