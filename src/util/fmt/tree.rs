use std::{fmt, io::Write};

use crate::{ast::*, util::intern::Interner};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string<I: InfoWriter>(idents: &Interner<str>, program: &Program<I>) -> String {
    let mut buf = Vec::with_capacity(1024);
    // Writing into a `Vec` never fails.
    _ = print_program(&mut buf, idents, program);
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn print_program<I: InfoWriter>(
    w: &mut impl Write,
    idents: &Interner<str>,
    program: &Program<I>,
) -> std::io::Result<()> {
    for stmt in &program.body {
        print_stmt(w, idents, 0, stmt)?;
    }
    Ok(())
}

fn print_stmt<I: InfoWriter>(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    stmt: &Stmt<I>,
) -> std::io::Result<()> {
    let span = stmt.span;
    match &stmt.kind {
        StmtKind::Expr(expr) => print_expr(w, idents, i, expr)?,
        StmtKind::MutDecl { name, value, info } => {
            sp(w, i)?;
            let info = info.write_resolved();
            writeln!(w, "mut {} ({span}{info})", idents.get(name))?;
            print_expr(w, idents, i + 1, value)?;
        }
        StmtKind::Error => {
            sp(w, i)?;
            writeln!(w, "error ({span})")?;
        }
    }
    Ok(())
}

pub fn print_expr<I: InfoWriter>(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    expr: &Expr<I>,
) -> std::io::Result<()> {
    sp(w, i)?;
    let span = expr.span;
    match &expr.kind {
        ExprKind::Constant(Constant::Number(val)) => {
            writeln!(w, "number {val} ({span})")?;
        }
        ExprKind::Constant(Constant::String(val)) => {
            writeln!(w, "string {val:?} ({span})")?;
        }
        ExprKind::True => writeln!(w, "true ({span})")?,
        ExprKind::False => writeln!(w, "false ({span})")?,
        ExprKind::Null => writeln!(w, "null ({span})")?,
        ExprKind::Error => writeln!(w, "error ({span})")?,
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} ({span})")?;
            print_expr(w, idents, i + 1, lhs)?;
            print_expr(w, idents, i + 1, rhs)?;
        }
        ExprKind::Unary {
            op,
            expr: inner_expr,
        } => {
            writeln!(w, "unary {op:?} ({span})")?;
            print_expr(w, idents, i + 1, inner_expr)?;
        }
        ExprKind::Block { body } => {
            writeln!(w, "block ({span})")?;
            for stmt in body {
                print_stmt(w, idents, i + 1, stmt)?;
            }
        }
        ExprKind::Call { callee, args } => {
            writeln!(w, "call ({span})")?;
            print_expr(w, idents, i + 1, callee)?;
            if !args.is_empty() {
                sp(w, i + 1)?;
                writeln!(w, "arguments")?;
                for arg in args {
                    print_expr(w, idents, i + 2, arg)?;
                }
            }
        }
        ExprKind::IfElse {
            predicate,
            then_arm,
            else_arm,
        } => {
            writeln!(w, "if_else ({span})")?;
            print_expr(w, idents, i + 1, predicate)?;
            print_expr(w, idents, i + 1, then_arm)?;
            print_expr(w, idents, i + 1, else_arm)?;
        }
        ExprKind::Access(ident, info) => {
            let info = info.write_resolved();
            writeln!(w, "ident {} ({span}{info})", idents.get(ident))?;
        }
        ExprKind::Fn { params, body, info } => {
            write!(w, "fn(")?;
            for (idx, param) in params.iter().enumerate() {
                if idx > 0 {
                    write!(w, ", ")?;
                }
                write!(w, "{}", idents.get(param))?;
            }
            let info = info.write_resolved();
            writeln!(w, ") ({span}{info})")?;
            print_expr(w, idents, i + 1, body)?;
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

pub trait InfoWriter: Info<Access: InfoDisplay, Decl: InfoDisplay, Fn: InfoDisplay> {}

impl<I> InfoWriter for I
where
    I: Info,
    I::Access: InfoDisplay,
    I::Decl: InfoDisplay,
    I::Fn: InfoDisplay,
{
}

/// Node information appended to a node's span, as in `(0..1 %: local 0)`.
/// Unresolved trees print nothing.
pub trait InfoDisplay {
    fn write_resolved(&self) -> impl fmt::Display + '_;
}

impl InfoDisplay for () {
    fn write_resolved(&self) -> impl fmt::Display + '_ {
        ""
    }
}

struct ResolvedInfo<T>(T);

impl InfoDisplay for Resolution {
    fn write_resolved(&self) -> impl fmt::Display + '_ {
        ResolvedInfo(self)
    }
}

impl fmt::Display for ResolvedInfo<&Resolution> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Resolution::Local(id) => write!(f, " %: local {}", id.0),
            Resolution::Upvalue(index) => write!(f, " %: upvalue {index}"),
            Resolution::Undefined => write!(f, " %: undefined"),
        }
    }
}

impl InfoDisplay for LocalId {
    fn write_resolved(&self) -> impl fmt::Display + '_ {
        ResolvedInfo(self)
    }
}

impl fmt::Display for ResolvedInfo<&LocalId> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " %: local {}", self.0 .0)
    }
}

impl InfoDisplay for FnInfo {
    fn write_resolved(&self) -> impl fmt::Display + '_ {
        ResolvedInfo(self)
    }
}

impl fmt::Display for ResolvedInfo<&FnInfo> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let FnInfo {
            upvalues,
            captured,
            local_count,
        } = self.0;
        write!(f, " %: locals {local_count}")?;

        if !upvalues.is_empty() {
            write!(f, ", upvalues [")?;
            for (idx, upvalue) in upvalues.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                let kind = if upvalue.is_local { "local" } else { "upvalue" };
                write!(f, "{kind} {}", upvalue.source)?;
            }
            write!(f, "]")?;
        }

        if !captured.is_empty() {
            write!(f, ", captured [")?;
            for (idx, id) in captured.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", id.0)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
