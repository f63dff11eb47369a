// program ::= [stmt (';' stmt)*]
// stmt ::= 'mut' ID ['=' expr]
//        | expr
// expr ::= ID '->' expr
//        | '(' [ID (',' ID)*] ')' '->' expr
//        | '->' expr
//        | expr '?' expr [':' expr]
//        | expr '(' [expr (',' expr)*] ')'
//        | '(' stmt (';' stmt)* ')'
//        | expr op expr
//        | ('-' | '+' | '!') expr
//        | ID
//        | number
//        | string
//        | true | false | null

// Precedence
//
// ( (call)
// - + ! (prefix)
// ** (right)
// * /
// + -
// < <= > >=
// == !=
// &&
// ||
// ? : (right)
// -> (lambda body)

use std::fmt;

use crate::{token::Span, util::intern::Interned};

/// Per-phase node information. The parser produces [`Unresolved`] trees and
/// the resolver maps them into [`Resolved`] ones.
pub trait Info {
    /// Attached to every variable access.
    type Access: fmt::Debug + Clone + PartialEq;
    /// Attached to every `mut` declaration.
    type Decl: fmt::Debug + Clone + PartialEq;
    /// Attached to every function literal (and to the program itself).
    type Fn: fmt::Debug + Clone + PartialEq + Default;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unresolved;

impl Info for Unresolved {
    type Access = ();
    type Decl = ();
    type Fn = ();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved;

impl Info for Resolved {
    type Access = Resolution;
    type Decl = LocalId;
    type Fn = FnInfo;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program<I: Info> {
    pub body: Vec<Stmt<I>>,
    pub info: I::Fn,
}

impl<I: Info> Default for Program<I> {
    fn default() -> Self {
        Program {
            body: Vec::new(),
            info: I::Fn::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt<I: Info> {
    pub kind: StmtKind<I>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind<I: Info> {
    Expr(Expr<I>),
    MutDecl {
        name: Ident,
        /// Declarations without an initializer get a `null` literal.
        value: Expr<I>,
        info: I::Decl,
    },
    /// Placeholder for a statement which failed to parse.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr<I: Info> {
    pub kind: ExprKind<I>,
    pub span: Span,
}

impl<I: Info> Expr<I> {
    pub fn new(kind: ExprKind<I>, span: Span) -> Expr<I> {
        Expr { kind, span }
    }

    /// Placeholder for an expression which failed to parse.
    pub fn error(span: Span) -> Expr<I> {
        Expr::new(ExprKind::Error, span)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind<I: Info> {
    Constant(Constant),
    True,
    False,
    Null,
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr<I>>,
        rhs: Box<Expr<I>>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr<I>>,
    },
    /// A parenthesized sequence of statements. Evaluates to its last one.
    Block {
        body: Vec<Stmt<I>>,
    },
    Call {
        callee: Box<Expr<I>>,
        args: Vec<Expr<I>>,
    },
    IfElse {
        predicate: Box<Expr<I>>,
        then_arm: Box<Expr<I>>,
        else_arm: Box<Expr<I>>,
    },
    Access(Ident, I::Access),
    Fn {
        params: Vec<Ident>,
        body: Box<Expr<I>>,
        info: I::Fn,
    },
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Number(f64),
    String(Box<str>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Plus,
    Not,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Interned<str>,
    pub span: Span,
}

impl From<Ident> for Interned<str> {
    fn from(value: Ident) -> Self {
        value.name
    }
}

impl From<&Ident> for Interned<str> {
    fn from(value: &Ident) -> Self {
        value.name
    }
}

/// A slot in a function's local frame. Parameters come first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

/// Where a variable access reads from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// A slot of the current function's frame.
    Local(LocalId),
    /// An index into the current function's upvalue list.
    Upvalue(u32),
    /// The name wasn't found anywhere. Already reported as an error.
    Undefined,
}

/// One captured variable of a function literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Upvalue {
    /// A local of the enclosing function if `is_local`, otherwise an index
    /// into the enclosing function's own upvalue list.
    pub source: u32,
    pub is_local: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FnInfo {
    pub upvalues: Vec<Upvalue>,
    /// Locals of this function captured by some inner function literal.
    pub captured: Vec<LocalId>,
    /// Number of declared locals, parameters included.
    pub local_count: u32,
}
