use std::fmt;

use crate::lexer;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token { kind, span }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

/// A line and column pair, both starting at 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub const START: Pos = Pos { line: 1, col: 1 };
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A region of the source. The byte bounds are used to slice the source text
/// and the line/column bounds are used for diagnostics.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub lo: usize,
    pub len: u32,
    pub from: Pos,
    pub to: Pos,
}

impl Span {
    pub fn new(lo: usize, hi: usize, from: Pos, to: Pos) -> Span {
        debug_assert!(hi >= lo);
        Span {
            lo,
            len: u32::try_from(hi - lo).expect("token too long"),
            from,
            to,
        }
    }

    /// An empty span at the start of the input, used by nodes that have no
    /// source of their own.
    pub fn dummy() -> Span {
        Span::new(0, 0, Pos::START, Pos::START)
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns a new span which spans from the start of `self` to the end of
    /// `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.lo, other.hi().max(self.lo), self.from, other.to)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }

    /// Shrinks the byte bounds of the span. Positions are left untouched.
    pub fn offset(self, lo: usize, hi: isize) -> Span {
        let new_hi = self.hi().saturating_add_signed(hi);
        Span::new(self.lo + lo, new_hi, self.from, self.to)
    }

    /// The `l:c-l:c` representation, used by rendered diagnostics.
    pub fn range(self) -> impl fmt::Display {
        struct Range(Pos, Pos);

        impl fmt::Display for Range {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", self.0, self.1)
            }
        }

        Range(self.from, self.to)
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, {})", self.range())
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

// This is not the most efficient way of representing a token kind, but it
// suffices for this simple compiler implementation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Let,
    Mut,
    In,
    Loop,
    Break,
    Continue,
    Return,
    Catch,

    True,
    False,
    Null,

    Plus,
    Minus,
    Star,
    /// `**`
    StarStar,
    Slash,
    Bang,
    BangEq,
    /// `=`
    Eq,
    /// `==`
    EqEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `|>`
    Pipe,
    /// `->`
    SlimArrow,
    /// `=>`
    FatArrow,
    Question,
    Colon,
    Semicolon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Identifier,
    Number,
    String,
    /// A string literal which contains at least one escape sequence.
    EscapedString,

    Eof,
    Invalid(lexer::Error),
}

impl TokenKind {
    /// Keywords which are lexed but have no meaning in the language yet.
    pub fn is_reserved(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Let | In | Loop | Break | Continue | Return | Catch
        )
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, TokenKind::Invalid(_))
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "let" => TokenKind::Let,
    "mut" => TokenKind::Mut,
    "in" => TokenKind::In,
    "loop" => TokenKind::Loop,
    "break" => TokenKind::Break,
    "continue" => TokenKind::Continue,
    "return" => TokenKind::Return,
    "catch" => TokenKind::Catch,
    "null" => TokenKind::Null,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
};
