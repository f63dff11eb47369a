use std::{iter::Peekable, num::ParseFloatError};

use crate::token::{Pos, Span, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the whole input at once. The parser doesn't use this (it pulls from
/// a [`Lexer`] through the token stream), but it's handy for tooling.
pub fn lex(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    let mut lexer = Lexer::new(src);
    loop {
        let token = lexer.lex_next();
        tokens.push(token);
        if token.is_eof() {
            break tokens;
        }
    }
}

/// Lexing failures. They are never thrown; the lexer produces a
/// [`TokenKind::Invalid`] token instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedChar,
    UnclosedString,
    UnknownEscape,
}

/// The queso lexer. Tokens are produced on demand through
/// [`Lexer::lex_next`].
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    pos: Pos,
    current_lo: usize,
    current_from: Pos,
}

impl<'src> Lexer<'src> {
    /// Constructs a new lexer with the default state.
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            pos: Pos::START,
            current_lo: 0,
            current_from: Pos::START,
        }
    }

    pub fn src(&self) -> &'src str {
        self.src
    }

    /// Scans the next token. Once the input is exhausted, every call returns
    /// an [`TokenKind::Eof`] token.
    pub fn lex_next(&mut self) -> Token {
        loop {
            if let Some(kind) = self.scan_token_kind() {
                return self.produce(kind);
            }
        }
    }

    /// Tries to scan the current character. Returns `None` for trivia
    /// (whitespace and comments), which never reaches the token stream.
    fn scan_token_kind(&mut self) -> Option<TokenKind> {
        use TokenKind::*;
        if self.is_at_end() {
            self.mark_advance();
            return Some(Eof);
        }
        let kind = match self.mark_advance() {
            '+' => Plus,
            '-' => match self.peek() {
                '>' => self.advance_with(SlimArrow),
                _ => Minus,
            },
            '*' => match self.peek() {
                '*' => self.advance_with(StarStar),
                _ => Star,
            },
            '/' => match self.peek() {
                '/' => return self.inline_comment(),
                _ => Slash,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(BangEq),
                _ => Bang,
            },
            '=' => match self.peek() {
                '=' => self.advance_with(EqEq),
                '>' => self.advance_with(FatArrow),
                _ => Eq,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '&' => match self.peek() {
                '&' => self.advance_with(AndAnd),
                _ => Invalid(Error::UnexpectedChar),
            },
            '|' => match self.peek() {
                '|' => self.advance_with(OrOr),
                '>' => self.advance_with(Pipe),
                _ => Invalid(Error::UnexpectedChar),
            },
            '?' => Question,
            ':' => Colon,
            ';' => Semicolon,
            ',' => Comma,
            '.' => Dot,
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            '{' => LBrace,
            '}' => RBrace,
            '"' => self.string(),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_whitespace() => return self.whitespace(),
            _ => Invalid(Error::UnexpectedChar),
        };
        Some(kind)
    }

    /// Lexes a string token. Escapes are only validated here; the actual
    /// unescaping happens in [`extract::escaped_string`], and only for the
    /// strings that need it.
    fn string(&mut self) -> TokenKind {
        // Whether any escaping did happen inside this string token
        let mut has_escaped = false;
        // Whether the current character is being escaped
        let mut is_escaping = false;
        let mut error = None;
        loop {
            if self.is_at_end() {
                return TokenKind::Invalid(Error::UnclosedString);
            }
            match (is_escaping, self.advance()) {
                (false, '"') => break,
                (false, '\\') => {
                    has_escaped = true;
                    is_escaping = true;
                }
                (true, c) => {
                    if !matches!(c, 'n' | 't' | 'r' | '0' | '\\' | '"') {
                        error.get_or_insert(Error::UnknownEscape);
                    }
                    is_escaping = false;
                }
                (false, _) => (),
            }
        }
        match (error, has_escaped) {
            (Some(error), _) => TokenKind::Invalid(error),
            (None, true) => TokenKind::EscapedString,
            (None, false) => TokenKind::String,
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while matches!(self.peek(), 'a'..='z' | 'A'..='Z' | '_') {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        self.digits();
        // A dot is only part of the number if a digit follows it.
        if self.peek() == '.' && self.peek_second().is_ascii_digit() {
            self.advance();
            self.digits();
        }
        TokenKind::Number
    }

    fn digits(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
    }

    fn whitespace(&mut self) -> Option<TokenKind> {
        while self.peek().is_whitespace() {
            self.advance();
        }
        None
    }

    fn inline_comment(&mut self) -> Option<TokenKind> {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
        None
    }
}

impl Lexer<'_> {
    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.current_from = self.pos;
        self.advance()
    }

    /// Returns the next char and advances the iterator, keeping track of the
    /// line and column.
    fn advance(&mut self) -> char {
        let Some(c) = self.iter.next() else {
            return '\0';
        };
        self.cursor += c.len_utf8();
        if c == '\n' {
            self.pos.line += 1;
            self.pos.col = 1;
        } else {
            self.pos.col += 1;
        }
        c
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Whether the whole source has been consumed. A NUL char in the source is
    /// not the end.
    fn is_at_end(&mut self) -> bool {
        self.iter.peek().is_none()
    }

    /// Returns the next char without advancing the iterator. Yields `'\0'`
    /// past the end.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the char after the next one, without advancing.
    fn peek_second(&self) -> char {
        self.src[self.cursor..].chars().nth(1).unwrap_or('\0')
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new(self.current_lo, self.cursor, self.current_from, self.pos)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    fn produce(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.span())
    }
}

pub mod extract {
    use super::*;

    pub fn number(token: Token, src: &str) -> Result<f64, ParseFloatError> {
        debug_assert_eq!(token.kind, TokenKind::Number);
        token.span().substr(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.span().substr(src)
    }

    pub fn string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::String);
        let s = token.span().offset(1, -1).substr(src);
        s.to_string().into_boxed_str()
    }

    pub fn escaped_string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::EscapedString);
        let s = token.span().offset(1, -1).substr(src);
        perform_escape(s).into_boxed_str()
    }
}

fn perform_escape(raw: &str) -> String {
    let mut buf = String::with_capacity(raw.len());
    let mut escaped = false;
    for char in raw.chars() {
        let char = match (escaped, char) {
            (true, 'n') => '\n',
            (true, 't') => '\t',
            (true, 'r') => '\r',
            (true, '0') => '\0',
            (false, '\\') => {
                escaped = true;
                continue;
            }
            (_, char) => char,
        };
        escaped = false;
        buf.push(char);
    }
    // This function is only called if the string token contains at least one
    // escape sequence
    debug_assert!(buf.len() < raw.len(), "original string MUST be greater");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds_and_ranges(src: &str) -> Vec<(TokenKind, std::ops::Range<usize>)> {
        lex(src)
            .into_iter()
            .map(|t| (t.kind, t.span().lo..t.span().hi()))
            .collect()
    }

    #[test]
    fn test_demos_have_no_invalid_tokens() {
        let input = include_str!("../demos/closures.queso");
        let has_invalid = lex(input).into_iter().any(|t| t.kind.is_invalid());
        assert!(!has_invalid);
    }

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+-*/" => [
                (Plus, 0..1),
                (Minus, 1..2),
                (Star, 2..3),
                (Slash, 3..4),
                (Eof, 4..4),
            ],
            "-> => ** == != <= >= && || |>" => [
                (SlimArrow, 0..2),
                (FatArrow, 3..5),
                (StarStar, 6..8),
                (EqEq, 9..11),
                (BangEq, 12..14),
                (LessEq, 15..17),
                (GreaterEq, 18..20),
                (AndAnd, 21..23),
                (OrOr, 24..26),
                (Pipe, 27..29),
                (Eof, 29..29),
            ],
            "a-->b" => [
                (Identifier, 0..1),
                (Minus, 1..2),
                (SlimArrow, 2..4),
                (Identifier, 4..5),
                (Eof, 5..5),
            ],
            "mut let null true false truth" => [
                (Mut, 0..3),
                (Let, 4..7),
                (Null, 8..12),
                (True, 13..17),
                (False, 18..23),
                (Identifier, 24..29),
                (Eof, 29..29),
            ],
            "f/foo_bar/_x/a1" => [
                (Identifier, 0..1),
                (Slash, 1..2),
                (Identifier, 2..9),
                (Slash, 9..10),
                (Identifier, 10..12),
                (Slash, 12..13),
                (Identifier, 13..14),
                (Number, 14..15),
                (Eof, 15..15),
            ],
            "1 12.5 3. 4.x" => [
                (Number, 0..1),
                (Number, 2..6),
                (Number, 7..8),
                (Dot, 8..9),
                (Number, 10..11),
                (Dot, 11..12),
                (Identifier, 12..13),
                (Eof, 13..13),
            ],
            r#""" "abc" "a\nb" "oops"# => [
                (String, 0..2),
                (String, 3..8),
                (EscapedString, 9..15),
                (Invalid(Error::UnclosedString), 16..21),
                (Eof, 21..21),
            ],
            r#""\q" 1"# => [
                (Invalid(Error::UnknownEscape), 0..4),
                (Number, 5..6),
                (Eof, 6..6),
            ],
            "1 // a comment\n2 //" => [
                (Number, 0..1),
                (Number, 15..16),
                (Eof, 19..19),
            ],
            "@ & 1" => [
                (Invalid(Error::UnexpectedChar), 0..1),
                (Invalid(Error::UnexpectedChar), 2..3),
                (Number, 4..5),
                (Eof, 5..5),
            ],
            "1\0 2 \"a\0" => [
                (Number, 0..1),
                (Invalid(Error::UnexpectedChar), 1..2),
                (Number, 3..4),
                (Invalid(Error::UnclosedString), 5..8),
                (Eof, 8..8),
            ],
        });

        for (input, tokens) in cases {
            assert_eq!(kinds_and_ranges(input), *tokens, "input: {input:?}");
        }
    }

    #[test]
    fn test_positions() {
        let mut lexer = Lexer::new("mut x\n  = 1");
        let spans: Vec<_> = std::iter::from_fn(|| {
            let token = lexer.lex_next();
            (!token.is_eof()).then(|| token.span().range().to_string())
        })
        .collect();
        assert_eq!(spans, ["1:1-1:4", "1:5-1:6", "2:3-2:4", "2:5-2:6"]);
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.lex_next().kind, TokenKind::Identifier);
        assert!(lexer.lex_next().is_eof());
        assert!(lexer.lex_next().is_eof());
    }

    #[test]
    fn test_extract() {
        let src = r#"12.25 "a\tb\\" "plain""#;
        let tokens = lex(src);
        assert_eq!(extract::number(tokens[0], src), Ok(12.25));
        assert_eq!(&*extract::escaped_string(tokens[1], src), "a\tb\\");
        assert_eq!(&*extract::string(tokens[2], src), "plain");
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![$(($kind, $range)),*],
            )),*]
        }};
    }
    use cases;
}
