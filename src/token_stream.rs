//! Buffered token stream with lookahead and backtracking.

use crate::{
    lexer::Lexer,
    token::{Token, TokenKind},
};

/// Buffered stream of tokens that allows arbitrary look ahead.
///
/// Tokens are lazily lexed: the internal lexer only runs when the cursor
/// moves past the last buffered token. Every token ever produced stays in the
/// buffer, so restoring a [`Checkpoint`] never re-lexes.
pub struct TokenStream<'src> {
    lexer: Lexer<'src>,
    buf: Vec<Token>,
    cursor: usize,
}

/// A saved stream position, created by [`TokenStream::backtrack_point`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Checkpoint(usize);

impl<'src> TokenStream<'src> {
    pub fn new(lexer: Lexer<'src>) -> Self {
        TokenStream {
            lexer,
            buf: Vec::with_capacity(256),
            cursor: 0,
        }
    }

    pub fn src(&self) -> &'src str {
        self.lexer.src()
    }

    /// Number of tokens lexed so far.
    pub fn lexed(&self) -> usize {
        self.buf.len()
    }

    /// Returns the current token without advancing the cursor.
    pub fn peek(&mut self) -> Token {
        self.fill();
        self.buf[self.cursor]
    }

    /// Returns the current token and advances the cursor. The cursor never
    /// moves past the end of the input, so the EOF token repeats.
    pub fn next(&mut self) -> Token {
        let token = self.peek();
        if !token.is_eof() {
            self.cursor += 1;
        }
        token
    }

    /// Consumes the current token if it matches the given token kind.
    pub fn next_if(&mut self, kind: TokenKind) -> bool {
        let is_match = self.peek().kind == kind;
        if is_match {
            self.next();
        }
        is_match
    }

    /// Saves the current position. Any number of checkpoints may be in flight;
    /// they are independent of each other.
    pub fn backtrack_point(&self) -> Checkpoint {
        Checkpoint(self.cursor)
    }

    /// Resets the cursor to the position saved by `checkpoint`.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.0 <= self.buf.len());
        self.cursor = checkpoint.0;
    }

    /// Ensures the token under the cursor is buffered.
    fn fill(&mut self) {
        while self.cursor >= self.buf.len() {
            let token = self.lexer.lex_next();
            self.buf.push(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stream(src: &str) -> TokenStream<'_> {
        TokenStream::new(Lexer::new(src))
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut s = stream("a b");
        assert_eq!(s.peek().kind, TokenKind::Identifier);
        assert_eq!(s.peek().span().lo, 0);
        assert_eq!(s.next().span().lo, 0);
        assert_eq!(s.next().span().lo, 2);
        assert!(s.next().is_eof());
        assert!(s.next().is_eof());
    }

    #[test]
    fn test_next_if() {
        let mut s = stream("( )");
        assert!(!s.next_if(TokenKind::RParen));
        assert!(s.next_if(TokenKind::LParen));
        assert!(s.next_if(TokenKind::RParen));
        assert!(s.next_if(TokenKind::Eof));
        assert!(s.peek().is_eof());
    }

    #[test]
    fn test_restore_does_not_relex() {
        let mut s = stream("a , b , c");
        s.next();
        let point = s.backtrack_point();
        let scanned: Vec<_> = (0..4).map(|_| s.next().span().lo).collect();
        assert_eq!(scanned, [2, 4, 6, 8]);
        let lexed = s.lexed();

        s.restore(point);
        assert_eq!(s.peek().span().lo, 2);
        assert_eq!(s.lexed(), lexed);
    }

    #[test]
    fn test_nested_checkpoints_are_independent() {
        let mut s = stream("1 2 3 4");
        let outer = s.backtrack_point();
        s.next();
        let inner = s.backtrack_point();
        s.next();
        s.next();
        s.restore(inner);
        assert_eq!(s.next().span().lo, 2);
        s.restore(outer);
        assert_eq!(s.next().span().lo, 0);
    }
}
