use crate::{
    ast::{
        BinaryOperator, Constant, Expr, ExprKind, Ident, Program, Stmt, StmtKind, UnaryOperator,
        Unresolved,
    },
    diagnostic::{Diagnostic, Reporter},
    lexer::{self, extract, Lexer},
    token::{Span, Token, TokenKind},
    token_stream::TokenStream,
    util::{
        fmt::{Context, Show},
        intern::Interner,
    },
};

type U = Unresolved;

/// Parses a whole program. Errors are sent to `reporter`; the returned tree
/// is always complete, with [`ExprKind::Error`] and [`StmtKind::Error`]
/// placeholders where parsing failed.
pub fn parse_program(
    src: &str,
    ident_interner: &mut Interner<str>,
    reporter: &mut dyn Reporter,
) -> Program<Unresolved> {
    let mut p = Parser::new(src, ident_interner, reporter);
    let program = p.parse_program();
    log::debug!(
        "parsed {} statements from {} tokens",
        program.body.len(),
        p.stream.lexed()
    );
    program
}

struct Parser<'src, 'ident, 'rep> {
    src: &'src str,
    stream: TokenStream<'src>,
    ident_interner: &'ident mut Interner<str>,
    reporter: &'rep mut dyn Reporter,
    /// Set once an error is reported. Further errors are dropped until the
    /// parser resynchronizes at a statement boundary.
    panic: bool,
}

/// Binding power tiers, from the loosest to the tightest. Each tier leaves
/// room for a `+1`, used to encode associativity.
mod bp {
    pub const ASSIGNMENT: u8 = 2;
    pub const TERNARY: u8 = 4;
    pub const OR: u8 = 6;
    pub const AND: u8 = 8;
    pub const EQUALITY: u8 = 10;
    pub const COMPARISON: u8 = 12;
    pub const ADDITIVE: u8 = 14;
    pub const MULTIPLICATIVE: u8 = 16;
    pub const EXPONENTIATION: u8 = 18;
    pub const UNARY: u8 = 20;
    pub const CALL: u8 = 22;
}

impl Parser<'_, '_, '_> {
    fn parse_program(&mut self) -> Program<U> {
        let mut body = Vec::with_capacity(16);
        if !self.is(TokenKind::Eof) {
            body.push(self.parse_stmt());
            self.parse_sequence(TokenKind::Eof, &mut body);
        }
        Program { body, info: () }
    }

    /// Parses `(';' stmt)*` after a first statement, stopping before `end`
    /// (which is not consumed) or EOF.
    fn parse_sequence(&mut self, end: TokenKind, body: &mut Vec<Stmt<U>>) {
        loop {
            let token = self.stream.peek();
            match token.kind {
                TokenKind::Semicolon => {
                    self.stream.next();
                    self.panic = false;
                    let next = self.stream.peek();
                    if next.kind == end {
                        let error = if end == TokenKind::Eof {
                            Error::TrailingSemicolon
                        } else {
                            Error::SemicolonBeforeEnd
                        };
                        self.error(token.span(), error);
                        break;
                    }
                    if next.is_eof() {
                        // Unclosed block; the caller reports it.
                        break;
                    }
                    body.push(self.parse_stmt());
                }
                kind if kind == end || kind == TokenKind::Eof => break,
                actual => {
                    self.error(token.span(), Error::ExpectedSemicolon { actual });
                    self.synchronize(end);
                }
            }
        }
    }

    fn parse_stmt(&mut self) -> Stmt<U> {
        let token = self.stream.peek();
        if token.kind == TokenKind::Mut {
            self.stream.next();
            return self.parse_mut_decl(token);
        }
        let expr = self.parse_expr();
        Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        }
    }

    /// Parses `mut name [= expr]`, after the `mut` keyword.
    fn parse_mut_decl(&mut self, mut_token: Token) -> Stmt<U> {
        let name = self.parse_ident(|actual| Error::MissingMutName { actual });
        let value = if self.stream.next_if(TokenKind::Eq) {
            self.parse_expr()
        } else {
            let span = name.map_or(mut_token.span(), |name| name.span);
            Expr::new(ExprKind::Null, span)
        };
        let span = mut_token.span().to(value.span);
        let kind = match name {
            Some(name) => StmtKind::MutDecl {
                name,
                value,
                info: (),
            },
            None => StmtKind::Error,
        };
        Stmt { kind, span }
    }

    fn parse_ident(&mut self, error: impl FnOnce(TokenKind) -> Error) -> Option<Ident> {
        let token = self.stream.peek();
        if token.kind == TokenKind::Identifier {
            self.stream.next();
            Some(self.ident(token))
        } else {
            self.error(token.span(), error(token.kind));
            None
        }
    }

    fn ident(&mut self, token: Token) -> Ident {
        Ident {
            name: self.ident_interner.intern(extract::ident(token, self.src)),
            span: token.span(),
        }
    }

    fn parse_expr(&mut self) -> Expr<U> {
        self.parse_expr_bp(bp::ASSIGNMENT)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Expr<U> {
        let mut lhs = self.parse_nud();

        loop {
            let op_token = self.stream.peek();

            if let Some((lbp, rbp)) = Self::infix_binding_power(op_token.kind) {
                if lbp < min_bp {
                    // Operator binds less tightly than the minimum required
                    break;
                }

                self.stream.next(); // Operator
                lhs = self.parse_led(op_token, lhs, rbp);
            } else {
                // Not an infix operator or binds too loosely
                break;
            }
        }

        lhs
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, lambdas, grouping)
    fn parse_nud(&mut self) -> Expr<U> {
        let token = self.stream.peek();
        // Closing tokens are left in place so that the enclosing construct
        // can still match them.
        if let TokenKind::RParen
        | TokenKind::Semicolon
        | TokenKind::Comma
        | TokenKind::Colon
        | TokenKind::Eof = token.kind
        {
            self.error(token.span(), Error::ExpectedExpression { actual: token.kind });
            return Expr::error(token.span());
        }
        self.stream.next();

        let span = token.span();
        let kind = match token.kind {
            TokenKind::Identifier => {
                let ident = self.ident(token);
                // Single parameter lambda: x -> expr
                if self.stream.next_if(TokenKind::SlimArrow) {
                    return self.parse_lambda_body(span, vec![ident]);
                }
                ExprKind::Access(ident, ())
            }
            TokenKind::Number => match extract::number(token, self.src) {
                Ok(number) => ExprKind::Constant(Constant::Number(number)),
                Err(_) => {
                    self.error(span, Error::ParseNumber);
                    ExprKind::Error
                }
            },
            TokenKind::String => ExprKind::Constant(Constant::String(extract::string(token, self.src))),
            TokenKind::EscapedString => {
                ExprKind::Constant(Constant::String(extract::escaped_string(token, self.src)))
            }
            TokenKind::True => ExprKind::True,
            TokenKind::False => ExprKind::False,
            TokenKind::Null => ExprKind::Null,

            // Zero parameter lambda: -> expr
            TokenKind::SlimArrow => return self.parse_lambda_body(span, Vec::new()),

            TokenKind::LParen => return self.parse_paren(token),

            // Prefix operators: -, +, !
            kind @ (TokenKind::Minus | TokenKind::Plus | TokenKind::Bang) => {
                let op = match kind {
                    TokenKind::Minus => UnaryOperator::Neg,
                    TokenKind::Plus => UnaryOperator::Plus,
                    TokenKind::Bang => UnaryOperator::Not,
                    _ => unreachable!(),
                };
                let expr = self.parse_expr_bp(bp::UNARY);
                let span = span.to(expr.span);
                let unary = ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                };
                return Expr::new(unary, span);
            }

            TokenKind::Invalid(error) => {
                self.error(span, Error::Lexer(error));
                ExprKind::Error
            }
            kind if kind.is_reserved() => {
                self.error(span, Error::ReservedKeyword(kind));
                ExprKind::Error
            }
            actual => {
                self.error(span, Error::ExpectedExpression { actual });
                ExprKind::Error
            }
        };

        Expr::new(kind, span)
    }

    /// led: Parses tokens that follow a left-hand-side expression
    /// (infix/postfix operators)
    fn parse_led(&mut self, op_token: Token, lhs: Expr<U>, rbp: u8) -> Expr<U> {
        let (kind, span) = match op_token.kind {
            // Call: expr ( [expr [, expr]*] )
            TokenKind::LParen => {
                let mut args = Vec::new();
                let rparen = self.stream.peek();
                let end = if self.stream.next_if(TokenKind::RParen) {
                    Some(rparen.span())
                } else {
                    loop {
                        args.push(self.parse_expr());
                        if !self.stream.next_if(TokenKind::Comma) {
                            break self.close_paren(op_token);
                        }
                    }
                };
                let last = args.last().map_or(op_token.span(), |arg| arg.span);
                let span = lhs.span.to(end.unwrap_or(last));
                let call = ExprKind::Call {
                    callee: Box::new(lhs),
                    args,
                };
                (call, span)
            }

            // Conditional: expr ? expr [: expr]
            TokenKind::Question => {
                let then_arm = self.parse_expr();
                let else_arm = if self.stream.next_if(TokenKind::Colon) {
                    self.parse_expr_bp(rbp)
                } else {
                    Expr::new(ExprKind::Null, op_token.span())
                };
                let span = lhs.span.to(else_arm.span.max_hi(then_arm.span));
                let if_else = ExprKind::IfElse {
                    predicate: Box::new(lhs),
                    then_arm: Box::new(then_arm),
                    else_arm: Box::new(else_arm),
                };
                (if_else, span)
            }

            kind => {
                let op = match kind {
                    TokenKind::OrOr => BinaryOperator::Or,
                    TokenKind::AndAnd => BinaryOperator::And,
                    TokenKind::EqEq => BinaryOperator::Eq,
                    TokenKind::BangEq => BinaryOperator::NotEq,
                    TokenKind::Less => BinaryOperator::Lt,
                    TokenKind::LessEq => BinaryOperator::LtEq,
                    TokenKind::Greater => BinaryOperator::Gt,
                    TokenKind::GreaterEq => BinaryOperator::GtEq,
                    TokenKind::Plus => BinaryOperator::Add,
                    TokenKind::Minus => BinaryOperator::Sub,
                    TokenKind::Star => BinaryOperator::Mul,
                    TokenKind::Slash => BinaryOperator::Div,
                    TokenKind::StarStar => BinaryOperator::Pow,
                    _ => unreachable!("no infix rule for {kind:?}"),
                };
                // Parse right operand with correct precedence
                let rhs = self.parse_expr_bp(rbp);

                let span = lhs.span.to(rhs.span);
                let binary = ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                (binary, span)
            }
        };

        Expr::new(kind, span)
    }

    /// Parses what follows a `(` in prefix position: a lambda parameter list,
    /// a grouping or a block.
    fn parse_paren(&mut self, lparen: Token) -> Expr<U> {
        if self.scan_lambda_params() {
            let params = self.parse_params();
            self.consume(TokenKind::SlimArrow);
            return self.parse_lambda_body(lparen.span(), params);
        }

        let first = self.parse_stmt();
        if !self.is(TokenKind::Semicolon) {
            let end = self.close_paren(lparen).unwrap_or(first.span);
            let span = lparen.span().to(end);
            return match first.kind {
                // Grouping: ( expr )
                StmtKind::Expr(expr) => Expr::new(expr.kind, span),
                kind => {
                    let stmt = Stmt {
                        kind,
                        span: first.span,
                    };
                    Expr::new(ExprKind::Block { body: vec![stmt] }, span)
                }
            };
        }

        // Block: ( stmt [; stmt]* )
        let mut body = vec![first];
        self.parse_sequence(TokenKind::RParen, &mut body);
        let last = body.last().map_or(lparen.span(), |stmt| stmt.span);
        let end = self.close_paren(lparen).unwrap_or(last);
        Expr::new(ExprKind::Block { body }, lparen.span().to(end))
    }

    /// Looks ahead (from just after a `(`) for a `)` immediately followed by
    /// `->`. Gives up on `;`, EOF or a nested `(`. The stream position is
    /// always restored.
    fn scan_lambda_params(&mut self) -> bool {
        let point = self.stream.backtrack_point();
        let is_lambda = loop {
            match self.stream.next().kind {
                TokenKind::RParen => break self.is(TokenKind::SlimArrow),
                TokenKind::Semicolon | TokenKind::Eof | TokenKind::LParen => break false,
                _ => (),
            }
        };
        self.stream.restore(point);
        is_lambda
    }

    /// Parses `[ID (',' ID)*] ')'`. Only called once [`Self::scan_lambda_params`]
    /// has found the closing parenthesis.
    fn parse_params(&mut self) -> Vec<Ident> {
        let mut params = Vec::new();
        if self.stream.next_if(TokenKind::RParen) {
            return params;
        }
        loop {
            let token = self.stream.next();
            match token.kind {
                TokenKind::Identifier => params.push(self.ident(token)),
                actual @ (TokenKind::RParen | TokenKind::Eof) => {
                    self.error(token.span(), Error::ExpectedParameter { actual });
                    return params;
                }
                actual => self.error(token.span(), Error::ExpectedParameter { actual }),
            }
            let token = self.stream.next();
            match token.kind {
                TokenKind::Comma => (),
                TokenKind::RParen | TokenKind::Eof => return params,
                actual => self.error(
                    token.span(),
                    Error::Unexpected {
                        actual,
                        expected: TokenKind::Comma,
                    },
                ),
            }
        }
    }

    fn parse_lambda_body(&mut self, start: Span, params: Vec<Ident>) -> Expr<U> {
        let body = self.parse_expr();
        let span = start.to(body.span);
        let lambda = ExprKind::Fn {
            params,
            body: Box::new(body),
            info: (),
        };
        Expr::new(lambda, span)
    }

    fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
        let bp = match kind {
            // Conditional (right-associative)
            TokenKind::Question => (bp::TERNARY + 1, bp::TERNARY),

            TokenKind::OrOr => (bp::OR, bp::OR + 1),
            TokenKind::AndAnd => (bp::AND, bp::AND + 1),

            TokenKind::EqEq | TokenKind::BangEq => (bp::EQUALITY, bp::EQUALITY + 1),

            TokenKind::Less | TokenKind::LessEq | TokenKind::Greater | TokenKind::GreaterEq => {
                (bp::COMPARISON, bp::COMPARISON + 1)
            }

            TokenKind::Plus | TokenKind::Minus => (bp::ADDITIVE, bp::ADDITIVE + 1),
            TokenKind::Star | TokenKind::Slash => (bp::MULTIPLICATIVE, bp::MULTIPLICATIVE + 1),

            // Exponentiation (right-associative)
            TokenKind::StarStar => (bp::EXPONENTIATION + 1, bp::EXPONENTIATION),

            // Call, a postfix rule. The right binding power is unused.
            TokenKind::LParen => (bp::CALL, bp::CALL + 1),

            _ => return None,
        };
        Some(bp)
    }
}

impl<'src, 'ident, 'rep> Parser<'src, 'ident, 'rep> {
    fn new(
        src: &'src str,
        ident_interner: &'ident mut Interner<str>,
        reporter: &'rep mut dyn Reporter,
    ) -> Parser<'src, 'ident, 'rep> {
        Parser {
            src,
            stream: TokenStream::new(Lexer::new(src)),
            ident_interner,
            reporter,
            panic: false,
        }
    }
}

impl Parser<'_, '_, '_> {
    /// Reports an error, unless the parser is already panicking.
    fn error(&mut self, span: Span, error: Error) {
        if self.panic {
            return;
        }
        self.panic = true;
        let ctx = Context {
            ident_interner: self.ident_interner,
        };
        let message = span.wrap(error).display(&ctx).to_string();
        self.reporter.report(Diagnostic::new(message, span));
    }

    /// Checks whether the current token matches the given one.
    fn is(&mut self, expect: TokenKind) -> bool {
        self.stream.peek().kind == expect
    }

    /// Advances if the current token matches the provided one. If not,
    /// records an error.
    fn consume(&mut self, expect: TokenKind) -> Option<Token> {
        let c = self.stream.peek();
        if c.kind == expect {
            self.stream.next();
            Some(c)
        } else {
            self.error(
                c.span(),
                Error::Unexpected {
                    actual: c.kind,
                    expected: expect,
                },
            );
            None
        }
    }

    /// Consumes the `)` matching `open`, returning its span. If it's missing,
    /// reports the unclosed delimiter.
    fn close_paren(&mut self, open: Token) -> Option<Span> {
        let c = self.stream.peek();
        if self.stream.next_if(TokenKind::RParen) {
            return Some(c.span());
        }
        let error = Error::UnclosedDelimiter {
            open: open.span(),
            actual: c.kind,
        };
        self.error(c.span(), error);
        None
    }

    /// Skips tokens up to the next statement boundary: a `;` or `end` at the
    /// current nesting level, or EOF. Neither is consumed.
    fn synchronize(&mut self, end: TokenKind) {
        let mut depth = 0_usize;
        loop {
            let c = self.stream.peek().kind;
            match c {
                TokenKind::Eof => break,
                TokenKind::Semicolon if depth == 0 => break,
                kind if kind == end && depth == 0 => break,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth = depth.saturating_sub(1),
                _ => (),
            }
            self.stream.next();
        }
    }
}

trait SpanExt {
    fn max_hi(self, other: Span) -> Span;
}

impl SpanExt for Span {
    /// Picks whichever of the two spans ends last.
    fn max_hi(self, other: Span) -> Span {
        if other.hi() > self.hi() {
            other
        } else {
            self
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    ExpectedExpression {
        actual: TokenKind,
    },
    ExpectedSemicolon {
        actual: TokenKind,
    },
    ExpectedParameter {
        actual: TokenKind,
    },
    MissingMutName {
        actual: TokenKind,
    },
    UnclosedDelimiter {
        open: Span,
        actual: TokenKind,
    },
    ReservedKeyword(TokenKind),
    /// A `;` right before the end of the program.
    TrailingSemicolon,
    /// A `;` right before the `)` that closes a block.
    SemicolonBeforeEnd,
    ParseNumber,
    Lexer(lexer::Error),
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_simple_expression() {
            let program = "(1 * 2 + 3) - (1 + 2 * 3)";
            let tree_ok = "
                binary Sub (0..25)
                  binary Add (0..11)
                    binary Mul (1..6)
                      number 1 (1..2)
                      number 2 (5..6)
                    number 3 (9..10)
                  binary Add (14..25)
                    number 1 (15..16)
                    binary Mul (19..24)
                      number 2 (19..20)
                      number 3 (23..24)
            ";
        }

        fn test_identifier() {
            let program = "my_var";
            let tree_ok = "ident my_var (0..6)";
        }

        fn test_literals() {
            let program = r#"12.5; "hi\n"; true; false; null"#;
            let tree_ok = r#"
                number 12.5 (0..4)
                string "hi\n" (6..12)
                true (14..18)
                false (20..25)
                null (27..31)
            "#;
        }

        fn test_empty_program() {
            let program = "  // nothing here\n";
            let tree_ok = "";
        }

        fn test_precedence_tiers() {
            let program = "a || b && c == d < e + f * g ** h";
            let tree_ok = "
                binary Or (0..33)
                  ident a (0..1)
                  binary And (5..33)
                    ident b (5..6)
                    binary Eq (10..33)
                      ident c (10..11)
                      binary Lt (15..33)
                        ident d (15..16)
                        binary Add (19..33)
                          ident e (19..20)
                          binary Mul (23..33)
                            ident f (23..24)
                            binary Pow (27..33)
                              ident g (27..28)
                              ident h (32..33)
            ";
        }

        fn test_left_associativity() {
            let program = "a - b - c";
            let tree_ok = "
                binary Sub (0..9)
                  binary Sub (0..5)
                    ident a (0..1)
                    ident b (4..5)
                  ident c (8..9)
            ";
        }

        fn test_exponent_is_right_associative() {
            let program = "a ** b ** c";
            let tree_ok = "
                binary Pow (0..11)
                  ident a (0..1)
                  binary Pow (5..11)
                    ident b (5..6)
                    ident c (10..11)
            ";
        }

        fn test_unary_binds_tighter_than_binary() {
            let program = "-a * !b";
            let tree_ok = "
                binary Mul (0..7)
                  unary Neg (0..2)
                    ident a (1..2)
                  unary Not (5..7)
                    ident b (6..7)
            ";
        }

        fn test_unary_applies_to_call() {
            let program = "-f(x)";
            let tree_ok = "
                unary Neg (0..5)
                  call (1..5)
                    ident f (1..2)
                    arguments
                      ident x (3..4)
            ";
        }

        fn test_grouping() {
            let program = "(a + b)";
            let tree_ok = "
                binary Add (0..7)
                  ident a (1..2)
                  ident b (5..6)
            ";
        }

        fn test_lambda_two_params() {
            let program = "(a, b) -> a + b";
            let tree_ok = "
                fn(a, b) (0..15)
                  binary Add (10..15)
                    ident a (10..11)
                    ident b (14..15)
            ";
        }

        fn test_lambda_one_param_in_parens() {
            let program = "(a) -> a";
            let tree_ok = "
                fn(a) (0..8)
                  ident a (7..8)
            ";
        }

        fn test_lambda_bare_param() {
            let program = "x -> y -> x";
            let tree_ok = "
                fn(x) (0..11)
                  fn(y) (5..11)
                    ident x (10..11)
            ";
        }

        fn test_lambda_no_params() {
            let program = "() -> 1; -> 2";
            let tree_ok = "
                fn() (0..7)
                  number 1 (6..7)
                fn() (9..13)
                  number 2 (12..13)
            ";
        }

        fn test_lambda_inside_grouping() {
            let program = "((a) -> a)(1)";
            let tree_ok = "
                call (0..13)
                  fn(a) (0..10)
                    ident a (8..9)
                  arguments
                    number 1 (11..12)
            ";
        }

        fn test_grouping_then_call_is_not_lambda() {
            let program = "(f)(x)";
            let tree_ok = "
                call (0..6)
                  ident f (0..3)
                  arguments
                    ident x (4..5)
            ";
        }

        fn test_call_args() {
            let program = "f(1, x -> x, (a, b) -> a)()";
            let tree_ok = "
                call (0..27)
                  call (0..25)
                    ident f (0..1)
                    arguments
                      number 1 (2..3)
                      fn(x) (5..11)
                        ident x (10..11)
                      fn(a, b) (13..24)
                        ident a (23..24)
            ";
        }

        fn test_ternary() {
            let program = "a ? b : c ? d : e";
            let tree_ok = "
                if_else (0..17)
                  ident a (0..1)
                  ident b (4..5)
                  if_else (8..17)
                    ident c (8..9)
                    ident d (12..13)
                    ident e (16..17)
            ";
        }

        fn test_ternary_without_else_defaults_to_null() {
            let program = "a ? b";
            let tree_ok = "
                if_else (0..5)
                  ident a (0..1)
                  ident b (4..5)
                  null (2..3)
            ";
        }

        fn test_ternary_binds_looser_than_or() {
            let program = "a || b ? c : d";
            let tree_ok = "
                if_else (0..14)
                  binary Or (0..6)
                    ident a (0..1)
                    ident b (5..6)
                  ident c (9..10)
                  ident d (13..14)
            ";
        }

        fn test_mut_decl() {
            let program = "mut x = 1; mut y; x";
            let tree_ok = "
                mut x (0..9)
                  number 1 (8..9)
                mut y (11..16)
                  null (15..16)
                ident x (18..19)
            ";
        }

        fn test_block() {
            let program = "(mut x = 1; x)";
            let tree_ok = "
                block (0..14)
                  mut x (1..10)
                    number 1 (9..10)
                  ident x (12..13)
            ";
        }

        fn test_single_mut_block() {
            let program = "(mut x)";
            let tree_ok = "
                block (0..7)
                  mut x (1..6)
                    null (5..6)
            ";
        }

        fn test_error_trailing_semicolon() {
            let program = "1; 2;";
            let expected_errors = &["4..5: the last statement must not end in `;`"];
        }

        fn test_error_semicolon_before_rparen() {
            let program = "(1; 2;)";
            let expected_errors = &["5..6: unexpected `;` before `)`"];
        }

        fn test_error_missing_semicolon() {
            let program = "1 2; 3";
            let expected_errors = &["2..3: expected `;`, but got number"];
            let tree_error = "
                number 1 (0..1)
                number 3 (5..6)
            ";
        }

        fn test_error_unclosed_paren() {
            let program = "(1 + 2";
            let expected_errors = &["6..6: expected `)` to close the `(` at 0..1, but got end of input"];
        }

        fn test_error_missing_mut_name() {
            let program = "mut = 5; 1";
            let expected_errors = &["4..5: expected a name after `mut`, but got `=`"];
            let tree_error = "
                error (0..7)
                number 1 (9..10)
            ";
        }

        fn test_error_missing_operand() {
            let program = "1 +";
            let expected_errors = &["3..3: expected an expression, but got end of input"];
            let tree_error = "
                binary Add (0..3)
                  number 1 (0..1)
                  error (3..3)
            ";
        }

        fn test_error_reserved_keyword() {
            let program = "loop";
            let expected_errors = &["0..4: `loop` is a reserved keyword"];
        }

        fn test_error_invalid_char() {
            let program = "1 + @";
            let expected_errors = &["4..5: unexpected character"];
        }

        fn test_error_reported_once_per_statement() {
            let program = "1 + ; * 2; 3 +";
            let expected_errors = &[
                "4..5: expected an expression, but got `;`",
                "6..7: expected an expression, but got `*`",
                "14..14: expected an expression, but got end of input",
            ];
        }

        fn test_error_recovers_after_unclosed_group() {
            let program = "(a b (c) d); e";
            let expected_errors = &["3..4: expected `)` to close the `(` at 0..1, but got identifier"];
            let tree_error = "
                ident a (0..2)
                ident e (13..14)
            ";
        }

        fn test_error_recovers_inside_block() {
            let program = "(a; b c (d) e; f); g";
            let expected_errors = &["6..7: expected `;`, but got identifier"];
            let tree_error = "
                block (0..17)
                  ident a (1..2)
                  ident b (4..5)
                  ident f (15..16)
                ident g (19..20)
            ";
        }

        fn test_error_bad_lambda_param() {
            let program = "(a, 1) -> a";
            let expected_errors = &["4..5: expected a parameter name, but got number"];
            let tree_error = "
                fn(a) (0..11)
                  ident a (10..11)
            ";
        }
    );
}
