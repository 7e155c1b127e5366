use serde::Serialize;

/// Where an entity reference or brace escape was entered from. The exit
/// state of those regions depends on this context, so it rides along in
/// the state value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BraceContext {
    Text,
    Single,
    Double,
}

impl BraceContext {
    fn resume(self) -> CharState {
        match self {
            BraceContext::Text => CharState::Init,
            BraceContext::Single => CharState::AttributeSingle,
            BraceContext::Double => CharState::AttributeDouble,
        }
    }
}

/// Fine-grained markup character classification. One value per input
/// character; the classifier below is a pure function of
/// (state, char, lookahead).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CharState {
    /// Text content between tags.
    Init,
    /// `<` seen, nothing after it yet.
    TagOpen,
    ElementName,
    /// `</` seen.
    CloseTagSlash,
    CloseTagName,
    /// Inside a start tag, between attributes.
    InTag,
    AttributeName,
    /// Whitespace after an attribute name, `=` not yet seen.
    AfterAttributeName,
    /// `=` seen, opening quote not yet seen.
    AfterEquals,
    AttributeSingle,
    AttributeDouble,
    /// Inside a `{...}` value-template hole; the context names the
    /// region the hole was opened from.
    AvtHole(BraceContext),
    /// First brace of a doubled `{{` / `}}` literal escape.
    BraceEscape(BraceContext),
    /// Inside `&...;`; exit state depends on the entered-from context.
    Entity(BraceContext),
    /// `/` seen inside a start tag.
    SelfClosePending,
    /// `<!` seen.
    Exclam,
    /// `<!-` seen.
    CommentDash,
    Comment,
    /// First `-` of a possible `-->` consumed.
    CommentEnding,
    /// `--` consumed, `>` pending.
    CommentEnded,
    /// `<![` seen, consuming `CDATA[`.
    CdataOpening,
    Cdata,
    /// First `]` of a possible `]]>` consumed.
    CdataEnding,
    /// `]]` consumed, `>` pending.
    CdataEnded,
    /// `<!X...` declaration (DOCTYPE and friends).
    Dtd,
    /// `[...]` internal subset inside a DTD declaration.
    DtdSubset,
    /// `<?...` processing instruction.
    Pi,
    /// `?` with `>` lookahead inside a PI.
    PiEnding,
}

#[inline]
fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[inline]
fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Classify one character. `next` is one-character lookahead, needed to
/// tell `<!--` from `<![CDATA[` from `<!DOCTYPE` from `<?`, and to spot
/// doubled-brace escapes and `-->` / `]]>` terminators.
pub fn classify(state: CharState, c: char, next: Option<char>) -> CharState {
    use CharState::*;
    match state {
        Init => match c {
            '<' => TagOpen,
            '&' => Entity(BraceContext::Text),
            '{' if next == Some('{') => BraceEscape(BraceContext::Text),
            '{' => AvtHole(BraceContext::Text),
            '}' if next == Some('}') => BraceEscape(BraceContext::Text),
            _ => Init,
        },
        TagOpen => match c {
            '/' => CloseTagSlash,
            '!' => Exclam,
            '?' => Pi,
            c if is_name_start(c) => ElementName,
            // A stray `<` followed by something that cannot start a tag.
            _ => Init,
        },
        ElementName => match c {
            '>' => Init,
            '/' => SelfClosePending,
            c if is_ws(c) => InTag,
            _ => ElementName,
        },
        CloseTagSlash => match c {
            '>' => Init,
            _ => CloseTagName,
        },
        CloseTagName => match c {
            '>' => Init,
            _ => CloseTagName,
        },
        InTag => match c {
            '>' => Init,
            '/' => SelfClosePending,
            '=' => AfterEquals,
            c if is_ws(c) => InTag,
            _ => AttributeName,
        },
        AttributeName => match c {
            '=' => AfterEquals,
            '>' => Init,
            '/' => SelfClosePending,
            c if is_ws(c) => AfterAttributeName,
            _ => AttributeName,
        },
        AfterAttributeName => match c {
            '=' => AfterEquals,
            '>' => Init,
            '/' => SelfClosePending,
            c if is_ws(c) => AfterAttributeName,
            // Lenient: a new attribute starts without `=` on the last one.
            _ => AttributeName,
        },
        AfterEquals => match c {
            '"' => AttributeDouble,
            '\'' => AttributeSingle,
            '>' => Init,
            _ => AfterEquals,
        },
        AttributeSingle => match c {
            '\'' => InTag,
            '&' => Entity(BraceContext::Single),
            '{' if next == Some('{') => BraceEscape(BraceContext::Single),
            '{' => AvtHole(BraceContext::Single),
            '}' if next == Some('}') => BraceEscape(BraceContext::Single),
            _ => AttributeSingle,
        },
        AttributeDouble => match c {
            '"' => InTag,
            '&' => Entity(BraceContext::Double),
            '{' if next == Some('{') => BraceEscape(BraceContext::Double),
            '{' => AvtHole(BraceContext::Double),
            '}' if next == Some('}') => BraceEscape(BraceContext::Double),
            _ => AttributeDouble,
        },
        AvtHole(ctx) => match (ctx, c) {
            (_, '}') => ctx.resume(),
            (BraceContext::Single, '\'') => InTag,
            (BraceContext::Double, '"') => InTag,
            (BraceContext::Text, '<') => TagOpen,
            _ => AvtHole(ctx),
        },
        // The second character of the doubled pair.
        BraceEscape(ctx) => ctx.resume(),
        Entity(ctx) => match c {
            ';' => ctx.resume(),
            '<' => TagOpen,
            c if is_ws(c) => ctx.resume(),
            _ => Entity(ctx),
        },
        SelfClosePending => match c {
            '>' => Init,
            _ => InTag,
        },
        Exclam => match c {
            '-' => CommentDash,
            '[' => CdataOpening,
            _ => Dtd,
        },
        CommentDash => match c {
            '-' => Comment,
            _ => Dtd,
        },
        Comment => match c {
            '-' if next == Some('-') => CommentEnding,
            _ => Comment,
        },
        CommentEnding => match c {
            '-' => CommentEnded,
            _ => Comment,
        },
        CommentEnded => match c {
            '>' => Init,
            '-' => CommentEnded,
            _ => Comment,
        },
        CdataOpening => match c {
            '[' => Cdata,
            '>' => Init,
            _ => CdataOpening,
        },
        Cdata => match c {
            ']' if next == Some(']') => CdataEnding,
            _ => Cdata,
        },
        CdataEnding => match c {
            ']' => CdataEnded,
            _ => Cdata,
        },
        CdataEnded => match c {
            '>' => Init,
            ']' => CdataEnded,
            _ => Cdata,
        },
        Dtd => match c {
            '[' => DtdSubset,
            '>' => Init,
            _ => Dtd,
        },
        DtdSubset => match c {
            ']' => Dtd,
            _ => DtdSubset,
        },
        Pi => match c {
            '?' if next == Some('>') => PiEnding,
            _ => Pi,
        },
        PiEnding => match c {
            '>' => Init,
            _ => Pi,
        },
    }
}
