use tracing::debug;

use super::chars::{BraceContext, CharState, classify};
use super::span::utf16_width;
use super::xpath::{Terminator, XPathLexer};
use super::{Token, TokenError, TokenKind};
use crate::config::DialectConfig;

/// Start of a pending token region: char index, line, column.
type Mark = (usize, u32, u32);

/// Drives the character loop once per document: classifies every
/// character, emits markup tokens on state transitions, and delegates
/// expression-bearing runs to the `XPathLexer`.
pub struct StructuralLexer<'a> {
    chars: Vec<char>,
    len: usize,
    idx: usize,
    line: u32,
    col: u32,
    state: CharState,
    tokens: Vec<Token>,
    config: &'a DialectConfig,
    /// Position of the `<` that opened the markup currently being lexed.
    markup_start: Mark,
    /// Position of a pending `/` inside a start tag.
    slash_start: Mark,
    /// Start of the region being accumulated (text, names, values).
    pending: Option<Mark>,
    /// Most recently completed attribute name, for delegation decisions
    /// made at the `=` transition.
    last_attribute_name: String,
    /// Set at the `=` transition when the attribute is expression-bearing.
    delegate_next_value: bool,
    /// Accumulating a raw `<!...>` / `<?...>` region of this kind.
    raw_kind: Option<TokenKind>,
}

impl<'a> StructuralLexer<'a> {
    pub fn new(text: &str, config: &'a DialectConfig) -> Self {
        let chars: Vec<char> = text.chars().collect();
        Self {
            len: chars.len(),
            chars,
            idx: 0,
            line: 0,
            col: 0,
            state: CharState::Init,
            tokens: Vec::with_capacity(text.len() / 8),
            config,
            markup_start: (0, 0, 0),
            slash_start: (0, 0, 0),
            pending: None,
            last_attribute_name: String::new(),
            delegate_next_value: false,
            raw_kind: None,
        }
    }

    pub fn run(mut self) -> Vec<Token> {
        while self.idx < self.len {
            let c = self.chars[self.idx];
            let next = self.chars.get(self.idx + 1).copied();
            let prev = self.state;
            let new = classify(prev, c, next);
            if self.raw_kind.is_some() {
                self.step_raw(new);
                continue;
            }
            self.step(prev, new, c);
        }
        self.finish();
        debug!(tokens = self.tokens.len(), "structural lex complete");
        self.tokens
    }

    fn mark(&self) -> Mark {
        (self.idx, self.line, self.col)
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

    fn emit(
        &mut self,
        kind: TokenKind,
        start: Mark,
        end_idx: usize,
        char_state: CharState,
        error: Option<TokenError>,
    ) {
        if end_idx <= start.0 {
            return;
        }
        let value: String = self.chars[start.0..end_idx].iter().collect();
        let length = value.encode_utf16().count() as u32;
        self.tokens.push(Token {
            line: start.1,
            start_col: start.2,
            length,
            value,
            char_state,
            kind,
            error,
            referenced: false,
        });
    }

    /// Emit the pending region, if any, through the current index.
    fn flush_pending(&mut self, kind: TokenKind, char_state: CharState) {
        if let Some(start) = self.pending.take() {
            self.emit(kind, start, self.idx, char_state, None);
        }
    }

    /// Text regions are trimmed to their non-whitespace core; pure
    /// whitespace runs produce no token.
    fn flush_text(&mut self) {
        let Some((start_idx, mut line, mut col)) = self.pending.take() else {
            return;
        };
        let mut first = start_idx;
        while first < self.idx && self.chars[first].is_whitespace() {
            if self.chars[first] == '\n' {
                line += 1;
                col = 0;
            } else {
                col += utf16_width(self.chars[first]);
            }
            first += 1;
        }
        let mut last = self.idx;
        while last > first && self.chars[last - 1].is_whitespace() {
            last -= 1;
        }
        if first < last {
            self.emit(TokenKind::Text, (first, line, col), last, CharState::Init, None);
        }
    }

    fn ensure_pending(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.mark());
        }
    }

    /// One raw-region character: comments, CDATA, PIs, DTD declarations
    /// become a single token from `<` through the closing `>`.
    fn step_raw(&mut self, new: CharState) {
        use CharState::*;
        self.raw_kind = Some(match new {
            CommentDash | Comment | CommentEnding | CommentEnded => TokenKind::Comment,
            CdataOpening | Cdata | CdataEnding | CdataEnded => TokenKind::Cdata,
            Pi | PiEnding => TokenKind::ProcessingInstruction,
            Dtd | DtdSubset => TokenKind::Dtd,
            _ => self.raw_kind.unwrap(),
        });
        self.advance();
        self.state = new;
        if new == Init {
            let kind = self.raw_kind.take().unwrap();
            let char_state = match kind {
                TokenKind::Comment => Comment,
                TokenKind::Cdata => Cdata,
                TokenKind::ProcessingInstruction => Pi,
                _ => Dtd,
            };
            self.emit(kind, self.markup_start, self.idx, char_state, None);
        }
    }

    fn step(&mut self, prev: CharState, new: CharState, c: char) {
        use CharState::*;
        match (prev, new) {
            // --- text content ---
            (Init, Init)
            | (Init, BraceEscape(BraceContext::Text))
            | (BraceEscape(BraceContext::Text), Init) => {
                self.ensure_pending();
                self.advance();
            }
            (Init, TagOpen) => {
                self.flush_text();
                self.markup_start = self.mark();
                self.advance();
            }
            (Init, Entity(BraceContext::Text)) => {
                self.flush_text();
                self.pending = Some(self.mark());
                self.advance();
            }
            (Init, AvtHole(BraceContext::Text)) => {
                self.flush_text();
                self.delegate_hole(BraceContext::Text);
                return;
            }

            // --- entities in text ---
            (Entity(BraceContext::Text), Entity(BraceContext::Text)) => {
                self.advance();
            }
            (Entity(BraceContext::Text), Init) => {
                if c == ';' {
                    self.advance();
                    self.flush_pending(TokenKind::EntityRef, Entity(BraceContext::Text));
                } else {
                    // Whitespace ended the entity without `;`.
                    let start = self.pending.take();
                    if let Some(start) = start {
                        self.emit(
                            TokenKind::EntityRef,
                            start,
                            self.idx,
                            Entity(BraceContext::Text),
                            Some(TokenError::UnclosedEntity),
                        );
                    }
                    self.advance();
                }
            }
            (Entity(BraceContext::Text), TagOpen) => {
                let start = self.pending.take();
                if let Some(start) = start {
                    self.emit(
                        TokenKind::EntityRef,
                        start,
                        self.idx,
                        Entity(BraceContext::Text),
                        Some(TokenError::UnclosedEntity),
                    );
                }
                self.markup_start = self.mark();
                self.advance();
            }

            // --- tag opening ---
            (TagOpen, ElementName) => {
                self.emit(TokenKind::TagStart, self.markup_start, self.markup_start.0 + 1, TagOpen, None);
                self.pending = Some(self.mark());
                self.advance();
            }
            (TagOpen, CloseTagSlash) => {
                self.advance();
            }
            (TagOpen, Exclam) => {
                self.raw_kind = Some(TokenKind::Dtd);
                self.advance();
            }
            (TagOpen, Pi) => {
                self.raw_kind = Some(TokenKind::ProcessingInstruction);
                self.advance();
            }
            (TagOpen, Init) => {
                // Stray `<` not opening a tag.
                self.emit(TokenKind::TagStart, self.markup_start, self.markup_start.0 + 1, TagOpen, None);
                self.ensure_pending();
                self.advance();
            }
            (CloseTagSlash, CloseTagName) => {
                self.emit(
                    TokenKind::CloseTagStart,
                    self.markup_start,
                    self.markup_start.0 + 2,
                    TagOpen,
                    None,
                );
                self.pending = Some(self.mark());
                self.advance();
            }
            (CloseTagSlash, Init) => {
                self.emit(
                    TokenKind::CloseTagStart,
                    self.markup_start,
                    self.markup_start.0 + 2,
                    TagOpen,
                    None,
                );
                self.emit_tag_end();
            }

            // --- element names ---
            (ElementName, ElementName) | (CloseTagName, CloseTagName) => {
                self.advance();
            }
            (ElementName, InTag) => {
                self.flush_pending(TokenKind::ElementName, ElementName);
                self.advance();
            }
            (ElementName, Init) => {
                self.flush_pending(TokenKind::ElementName, ElementName);
                self.emit_tag_end();
            }
            (ElementName, SelfClosePending) => {
                self.flush_pending(TokenKind::ElementName, ElementName);
                self.slash_start = self.mark();
                self.advance();
            }
            (CloseTagName, Init) => {
                self.flush_pending(TokenKind::CloseElementName, CloseTagName);
                self.emit_tag_end();
            }

            // --- attributes ---
            (InTag, InTag) | (AfterAttributeName, AfterAttributeName) | (AfterEquals, AfterEquals) => {
                self.advance();
            }
            (InTag, AttributeName) | (AfterAttributeName, AttributeName) => {
                self.pending = Some(self.mark());
                self.advance();
            }
            (AttributeName, AttributeName) => {
                self.advance();
            }
            (AttributeName, AfterAttributeName) => {
                self.finish_attribute_name();
                self.advance();
            }
            (AttributeName, AfterEquals) | (AfterAttributeName, AfterEquals) | (InTag, AfterEquals) => {
                if prev == AttributeName {
                    self.finish_attribute_name();
                }
                let start = self.mark();
                self.advance();
                self.emit(TokenKind::AttributeEquals, start, self.idx, AfterEquals, None);
                // The delegation decision happens here, before the quote
                // is seen, to match value-template lookahead.
                self.delegate_next_value = self
                    .config
                    .is_expression_attribute(super::local_name(&self.last_attribute_name));
            }
            (AttributeName, Init) => {
                self.finish_attribute_name();
                self.emit_tag_end();
            }
            (AttributeName, SelfClosePending) | (AfterAttributeName, SelfClosePending) => {
                if prev == AttributeName {
                    self.finish_attribute_name();
                }
                self.slash_start = self.mark();
                self.advance();
            }
            (AfterAttributeName, Init) | (AfterEquals, Init) | (InTag, Init) => {
                self.emit_tag_end();
            }
            (InTag, SelfClosePending) => {
                self.slash_start = self.mark();
                self.advance();
            }

            // --- attribute values ---
            (AfterEquals, AttributeDouble) | (AfterEquals, AttributeSingle) => {
                let quote = c;
                let attr_state = new;
                if self.delegate_next_value {
                    self.delegate_next_value = false;
                    let start = self.mark();
                    self.advance();
                    self.emit(TokenKind::AttributeQuote, start, self.idx, attr_state, None);
                    let open_idx = self.tokens.len() - 1;
                    self.delegate_region(Terminator::Quote(quote), attr_state);
                    if self.idx < self.len && self.chars[self.idx] == quote {
                        let qstart = self.mark();
                        self.advance();
                        self.emit(TokenKind::AttributeQuote, qstart, self.idx, attr_state, None);
                        self.state = InTag;
                    } else {
                        self.tokens[open_idx].error = Some(TokenError::UnclosedRegion);
                        self.state = attr_state;
                    }
                    return;
                }
                self.pending = Some(self.mark());
                self.advance();
            }
            (AttributeDouble, AttributeDouble)
            | (AttributeSingle, AttributeSingle)
            | (AttributeDouble, Entity(BraceContext::Double))
            | (AttributeSingle, Entity(BraceContext::Single))
            | (Entity(BraceContext::Double), AttributeDouble)
            | (Entity(BraceContext::Single), AttributeSingle)
            | (Entity(BraceContext::Double), Entity(BraceContext::Double))
            | (Entity(BraceContext::Single), Entity(BraceContext::Single))
            | (AttributeDouble, BraceEscape(BraceContext::Double))
            | (AttributeSingle, BraceEscape(BraceContext::Single))
            | (BraceEscape(BraceContext::Double), AttributeDouble)
            | (BraceEscape(BraceContext::Single), AttributeSingle) => {
                self.ensure_pending();
                self.advance();
            }
            (AttributeDouble, AvtHole(BraceContext::Double)) => {
                self.flush_pending(TokenKind::AttributeValue, AttributeDouble);
                self.delegate_hole(BraceContext::Double);
                return;
            }
            (AttributeSingle, AvtHole(BraceContext::Single)) => {
                self.flush_pending(TokenKind::AttributeValue, AttributeSingle);
                self.delegate_hole(BraceContext::Single);
                return;
            }
            (AttributeDouble, InTag) | (AttributeSingle, InTag) => {
                // Closing quote belongs to the value token.
                self.ensure_pending();
                self.advance();
                self.flush_pending(TokenKind::AttributeValue, prev);
            }
            (Entity(BraceContext::Double), TagOpen) | (Entity(BraceContext::Single), TagOpen) => {
                // Malformed entity in a value ran into a tag.
                self.flush_pending(TokenKind::AttributeValue, prev);
                self.markup_start = self.mark();
                self.advance();
            }

            // --- tag close punctuation ---
            (SelfClosePending, Init) => {
                self.emit(
                    TokenKind::SelfCloseTagEnd,
                    self.slash_start,
                    self.slash_start.0 + 2,
                    SelfClosePending,
                    None,
                );
                self.advance();
            }
            (SelfClosePending, InTag) => {
                // Stray slash inside a tag; no token.
                self.advance();
            }

            // Anything else: keep the cursor moving. The classifier is
            // total, so this covers malformed-input transitions only.
            _ => {
                self.advance();
            }
        }
        self.state = new;
    }

    /// `>` at the current position.
    fn emit_tag_end(&mut self) {
        let start = self.mark();
        self.advance();
        self.emit(TokenKind::TagEnd, start, self.idx, CharState::Init, None);
    }

    fn finish_attribute_name(&mut self) {
        if let Some(start) = self.pending {
            self.last_attribute_name = self.chars[start.0..self.idx].iter().collect();
        }
        self.flush_pending(TokenKind::AttributeName, CharState::AttributeName);
    }

    /// `{` at the current position opens a value-template hole: emit the
    /// brace, delegate the contents, and consume the closing `}`.
    fn delegate_hole(&mut self, ctx: BraceContext) {
        let start = self.mark();
        self.advance();
        self.emit(TokenKind::HoleOpen, start, self.idx, CharState::AvtHole(ctx), None);
        let open_idx = self.tokens.len() - 1;
        self.delegate_region(Terminator::CloseBrace, CharState::AvtHole(ctx));
        if self.idx < self.len && self.chars[self.idx] == '}' {
            let cstart = self.mark();
            self.advance();
            self.emit(TokenKind::HoleClose, cstart, self.idx, CharState::AvtHole(ctx), None);
        } else {
            self.tokens[open_idx].error = Some(TokenError::UnclosedRegion);
        }
        self.state = match ctx {
            BraceContext::Text => CharState::Init,
            BraceContext::Single => CharState::AttributeSingle,
            BraceContext::Double => CharState::AttributeDouble,
        };
    }

    fn delegate_region(&mut self, terminator: Terminator, char_state: CharState) {
        let lexer = XPathLexer::new(&self.chars[self.idx..], self.line, self.col, char_state, terminator);
        let region = lexer.run();
        self.idx += region.consumed;
        self.line = region.end_line;
        self.col = region.end_col;
        self.tokens.extend(region.tokens);
    }

    /// End of document: flush whatever region is still open.
    fn finish(&mut self) {
        use CharState::*;
        if let Some(kind) = self.raw_kind.take() {
            let error = match kind {
                TokenKind::Comment => Some(TokenError::UnclosedComment),
                _ => Some(TokenError::UnclosedRegion),
            };
            let char_state = match kind {
                TokenKind::Comment => Comment,
                TokenKind::Cdata => Cdata,
                TokenKind::ProcessingInstruction => Pi,
                _ => Dtd,
            };
            self.emit(kind, self.markup_start, self.idx, char_state, error);
            return;
        }
        match self.state {
            Init => self.flush_text(),
            ElementName => self.flush_pending(TokenKind::ElementName, ElementName),
            CloseTagName => self.flush_pending(TokenKind::CloseElementName, CloseTagName),
            AttributeName => self.finish_attribute_name(),
            AttributeDouble | AttributeSingle => {
                if let Some(start) = self.pending.take() {
                    self.emit(
                        TokenKind::AttributeValue,
                        start,
                        self.idx,
                        self.state,
                        Some(TokenError::UnclosedRegion),
                    );
                }
            }
            Entity(BraceContext::Text) => {
                if let Some(start) = self.pending.take() {
                    self.emit(
                        TokenKind::EntityRef,
                        start,
                        self.idx,
                        Entity(BraceContext::Text),
                        Some(TokenError::UnclosedEntity),
                    );
                }
            }
            _ => {}
        }
    }
}
