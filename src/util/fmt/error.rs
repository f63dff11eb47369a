#![allow(clippy::items_after_statements)]

use std::fmt;

use crate::{
    lexer, parser, resolver,
    token::{Spanned, TokenKind},
    util::fmt::Show,
};

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut fmt::Formatter<'_>, _: &super::Context<'_>) -> fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use parser::Error::*;
        match error {
            Unexpected { actual, expected } => {
                write!(f, "expected {}, but got {}", name(*expected), name(*actual))
            }
            ExpectedExpression { actual } => {
                write!(f, "expected an expression, but got {}", name(*actual))
            }
            ExpectedSemicolon { actual } => write!(f, "expected `;`, but got {}", name(*actual)),
            ExpectedParameter { actual } => {
                write!(f, "expected a parameter name, but got {}", name(*actual))
            }
            MissingMutName { actual } => {
                write!(f, "expected a name after `mut`, but got {}", name(*actual))
            }
            UnclosedDelimiter { open, actual } => write!(
                f,
                "expected `)` to close the `(` at {open}, but got {}",
                name(*actual)
            ),
            ReservedKeyword(kind) => write!(f, "{} is a reserved keyword", name(*kind)),
            TrailingSemicolon => write!(f, "the last statement must not end in `;`"),
            SemicolonBeforeEnd => write!(f, "unexpected `;` before `)`"),
            ParseNumber => write!(f, "number literal out of range"),
            Lexer(error) => write!(f, "{}", lexer_message(*error)),
        }
    }
}

impl Show for Spanned<resolver::Error> {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &super::Context<'_>) -> fmt::Result {
        let i = ctx.ident_interner;
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use resolver::Error::*;
        match error {
            UndefinedVariable(name) => {
                let name = i.get(name);
                write!(f, "usage of an undefined variable `{name}`")
            }
            Redeclaration { name, previous } => {
                let name = i.get(name);
                write!(f, "`{name}` is already declared in this scope at {previous}")
            }
        }
    }
}

fn lexer_message(error: lexer::Error) -> &'static str {
    match error {
        lexer::Error::UnexpectedChar => "unexpected character",
        lexer::Error::UnclosedString => "unclosed string",
        lexer::Error::UnknownEscape => "unknown escape sequence",
    }
}

/// How a token kind is referred to in error messages.
fn name(kind: TokenKind) -> &'static str {
    use TokenKind::*;
    match kind {
        Let => "`let`",
        Mut => "`mut`",
        In => "`in`",
        Loop => "`loop`",
        Break => "`break`",
        Continue => "`continue`",
        Return => "`return`",
        Catch => "`catch`",
        True => "`true`",
        False => "`false`",
        Null => "`null`",
        Plus => "`+`",
        Minus => "`-`",
        Star => "`*`",
        StarStar => "`**`",
        Slash => "`/`",
        Bang => "`!`",
        BangEq => "`!=`",
        Eq => "`=`",
        EqEq => "`==`",
        Less => "`<`",
        LessEq => "`<=`",
        Greater => "`>`",
        GreaterEq => "`>=`",
        AndAnd => "`&&`",
        OrOr => "`||`",
        Pipe => "`|>`",
        SlimArrow => "`->`",
        FatArrow => "`=>`",
        Question => "`?`",
        Colon => "`:`",
        Semicolon => "`;`",
        Comma => "`,`",
        Dot => "`.`",
        LParen => "`(`",
        RParen => "`)`",
        LBracket => "`[`",
        RBracket => "`]`",
        LBrace => "`{`",
        RBrace => "`}`",
        Identifier => "identifier",
        Number => "number",
        String | EscapedString => "string",
        Eof => "end of input",
        Invalid(_) => "invalid token",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        token::Span,
        util::{fmt::Context, intern::Interner},
    };

    #[test]
    fn test_alternate_prefixes_span() {
        let interner = Interner::with_capacity(1);
        let ctx = Context {
            ident_interner: &interner,
        };
        let error = Span::dummy().wrap(parser::Error::TrailingSemicolon);
        assert_eq!(
            format!("{:#}", error.display(&ctx)),
            "0..0: the last statement must not end in `;`"
        );
        assert_eq!(
            error.display(&ctx).to_string(),
            "the last statement must not end in `;`"
        );
    }

    #[test]
    fn test_resolver_messages_use_names() {
        let mut interner = Interner::with_capacity(1);
        let x = interner.intern("x");
        let ctx = Context {
            ident_interner: &interner,
        };
        let error = Span::dummy().wrap(resolver::Error::UndefinedVariable(x));
        assert_eq!(
            error.display(&ctx).to_string(),
            "usage of an undefined variable `x`"
        );
    }
}
