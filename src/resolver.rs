use crate::{
    ast::{
        Expr, ExprKind, FnInfo, Ident, Info, LocalId, Program, Resolution, Resolved, Stmt,
        StmtKind, Unresolved, Upvalue,
    },
    diagnostic::{Diagnostic, Reporter},
    token::{Span, Spanned},
    util::{
        fmt::{Context, Show},
        intern::{Interned, Interner},
    },
};

type U = Unresolved;
type R = Resolved;

/// Resolves every variable access of the program into a local slot or an
/// upvalue, and computes the frame layout of every function literal.
///
/// Errors are sent to `reporter`. Resolution never stops early: unknown names
/// get [`Resolution::Undefined`] and the walk goes on.
pub fn resolve(
    program: Program<Unresolved>,
    ident_interner: &Interner<str>,
    reporter: &mut dyn Reporter,
) -> Program<Resolved> {
    let resolver = Resolver {
        frames: Vec::with_capacity(8),
        ident_interner,
        reporter,
    };
    resolver.resolve_program(program)
}

struct Local {
    name: Interned<str>,
    span: Span,
    depth: usize,
}

/// The resolution state of one function (or of the program itself).
struct Env {
    locals: Vec<Local>,
    upvalues: Vec<Upvalue>,
    captured: Vec<LocalId>,
    /// Number of block scopes open inside the function. Locals outlive their
    /// block, so this is all a scope leaves behind.
    depth: usize,
}

impl Env {
    fn new() -> Env {
        Env {
            locals: Vec::with_capacity(8),
            upvalues: Vec::new(),
            captured: Vec::new(),
            depth: 0,
        }
    }

    fn open_scope(&mut self) {
        self.depth += 1;
    }

    fn close_scope(&mut self) {
        debug_assert!(self.depth > 0, "closed the function scope");
        self.depth -= 1;
    }

    /// Finds the most recently declared local with the given name. Depth is
    /// not taken into account.
    fn lookup(&self, name: Interned<str>) -> Option<LocalId> {
        let (i, _) = self
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.name == name)?;
        Some(local_id(i))
    }

    /// Returns the span of a local of the same name declared at the current
    /// depth anywhere in this function, if any. Sibling blocks share a depth.
    fn declared_at_depth(&self, name: Interned<str>) -> Option<Span> {
        self.locals
            .iter()
            .rev()
            .find(|local| local.depth == self.depth && local.name == name)
            .map(|local| local.span)
    }

    fn add_local(&mut self, ident: Ident) -> LocalId {
        self.locals.push(Local {
            name: ident.name,
            span: ident.span,
            depth: self.depth,
        });
        local_id(self.locals.len() - 1)
    }

    /// Returns the index of the given upvalue, adding it if needed.
    fn add_upvalue(&mut self, upvalue: Upvalue) -> u32 {
        let i = match self.upvalues.iter().position(|u| *u == upvalue) {
            Some(i) => i,
            None => {
                self.upvalues.push(upvalue);
                self.upvalues.len() - 1
            }
        };
        u32::try_from(i).expect("too many upvalues")
    }

    fn capture(&mut self, id: LocalId) {
        if !self.captured.contains(&id) {
            self.captured.push(id);
        }
    }

    fn into_info(self) -> FnInfo {
        FnInfo {
            upvalues: self.upvalues,
            captured: self.captured,
            local_count: u32::try_from(self.locals.len()).expect("too many locals"),
        }
    }
}

fn local_id(i: usize) -> LocalId {
    LocalId(u32::try_from(i).expect("too many locals"))
}

struct Resolver<'ident, 'rep> {
    /// The innermost function is the last one. A frame's parent is the one
    /// right before it.
    frames: Vec<Env>,
    ident_interner: &'ident Interner<str>,
    reporter: &'rep mut dyn Reporter,
}

impl Resolver<'_, '_> {
    fn resolve_program(mut self, program: Program<U>) -> Program<R> {
        self.frames.push(Env::new());
        let body = self.resolve_stmts(program.body);
        let env = self.frames.pop().expect("program frame");
        debug_assert!(self.frames.is_empty());
        let info = env.into_info();
        log::debug!("resolved program with {} top-level locals", info.local_count);
        Program { body, info }
    }

    fn resolve_stmts(&mut self, stmts: Vec<Stmt<U>>) -> Vec<Stmt<R>> {
        stmts
            .into_iter()
            .map(|stmt| self.resolve_stmt(stmt))
            .collect()
    }

    fn resolve_stmt(&mut self, stmt: Stmt<U>) -> Stmt<R> {
        let kind = match stmt.kind {
            StmtKind::Expr(expr) => StmtKind::Expr(self.resolve_expr(expr)),
            StmtKind::MutDecl {
                name,
                value,
                info: (),
            } => {
                // The initializer can't see the name being declared.
                let value = self.resolve_expr(value);
                let id = self.declare(name);
                StmtKind::MutDecl {
                    name,
                    value,
                    info: id,
                }
            }
            StmtKind::Error => StmtKind::Error,
        };
        Stmt {
            kind,
            span: stmt.span,
        }
    }

    fn resolve_expr(&mut self, expr: Expr<U>) -> Expr<R> {
        let kind = match expr.kind {
            ExprKind::Constant(constant) => ExprKind::Constant(constant),
            ExprKind::True => ExprKind::True,
            ExprKind::False => ExprKind::False,
            ExprKind::Null => ExprKind::Null,
            ExprKind::Error => ExprKind::Error,
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op,
                lhs: self.resolve_boxed(*lhs),
                rhs: self.resolve_boxed(*rhs),
            },
            ExprKind::Unary { op, expr } => ExprKind::Unary {
                op,
                expr: self.resolve_boxed(*expr),
            },
            ExprKind::Block { body } => {
                self.env().open_scope();
                let body = self.resolve_stmts(body);
                self.env().close_scope();
                ExprKind::Block { body }
            }
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: self.resolve_boxed(*callee),
                args: args.into_iter().map(|arg| self.resolve_expr(arg)).collect(),
            },
            ExprKind::IfElse {
                predicate,
                then_arm,
                else_arm,
            } => ExprKind::IfElse {
                predicate: self.resolve_boxed(*predicate),
                then_arm: self.resolve_boxed(*then_arm),
                else_arm: self.resolve_boxed(*else_arm),
            },
            ExprKind::Access(ident, ()) => ExprKind::Access(ident, self.access(ident)),
            ExprKind::Fn {
                params,
                body,
                info: (),
            } => {
                self.frames.push(Env::new());
                for param in &params {
                    self.declare(*param);
                }
                let body = self.resolve_boxed(*body);
                let env = self.frames.pop().expect("function frame");
                ExprKind::Fn {
                    params,
                    body,
                    info: env.into_info(),
                }
            }
        };
        Expr {
            kind,
            span: expr.span,
        }
    }

    fn resolve_boxed(&mut self, expr: Expr<U>) -> Box<Expr<R>> {
        Box::new(self.resolve_expr(expr))
    }

    /// Declares a new local in the current frame, reporting a redeclaration
    /// in the same scope. The local gets a fresh slot either way.
    fn declare(&mut self, ident: Ident) -> LocalId {
        if let Some(previous) = self.env().declared_at_depth(ident.name) {
            let error = Error::Redeclaration {
                name: ident.name,
                previous,
            };
            self.error(ident.span.wrap(error));
        }
        self.env().add_local(ident)
    }

    fn access(&mut self, ident: Ident) -> <R as Info>::Access {
        if let Some(id) = self.env().lookup(ident.name) {
            return Resolution::Local(id);
        }
        let current = self.frames.len() - 1;
        if let Some(index) = self.resolve_upvalue(current, ident.name) {
            return Resolution::Upvalue(index);
        }
        self.error(ident.span.wrap(Error::UndefinedVariable(ident.name)));
        Resolution::Undefined
    }

    /// Looks up `name` in the frames enclosing `frame`, threading an upvalue
    /// through every frame in between. Frames are only touched once the name
    /// is found.
    fn resolve_upvalue(&mut self, frame: usize, name: Interned<str>) -> Option<u32> {
        if frame == 0 {
            return None;
        }
        let enclosing = frame - 1;

        if let Some(id) = self.frames[enclosing].lookup(name) {
            self.frames[enclosing].capture(id);
            let upvalue = Upvalue {
                source: id.0,
                is_local: true,
            };
            return Some(self.frames[frame].add_upvalue(upvalue));
        }

        let index = self.resolve_upvalue(enclosing, name)?;
        let upvalue = Upvalue {
            source: index,
            is_local: false,
        };
        Some(self.frames[frame].add_upvalue(upvalue))
    }

    fn env(&mut self) -> &mut Env {
        self.frames.last_mut().expect("no frame")
    }

    fn error(&mut self, error: Spanned<Error>) {
        let ctx = Context {
            ident_interner: self.ident_interner,
        };
        let message = error.display(&ctx).to_string();
        self.reporter.report(Diagnostic::new(message, error.span));
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UndefinedVariable(Interned<str>),
    Redeclaration {
        name: Interned<str>,
        previous: Span,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser, util::test_utils::tree_tests};
    use pretty_assertions::assert_eq;

    fn resolve_ok(src: &str) -> Program<Resolved> {
        let mut interner = Interner::with_capacity(32);
        let mut diagnostics = Vec::new();
        let program = parser::parse_program(src, &mut interner, &mut diagnostics);
        let program = resolve(program, &interner, &mut diagnostics);
        assert_eq!(diagnostics, []);
        program
    }

    fn fn_infos(program: &Program<Resolved>) -> Vec<FnInfo> {
        fn walk(expr: &Expr<Resolved>, out: &mut Vec<FnInfo>) {
            match &expr.kind {
                ExprKind::Fn { body, info, .. } => {
                    out.push(info.clone());
                    walk(body, out);
                }
                ExprKind::Binary { lhs, rhs, .. } => {
                    walk(lhs, out);
                    walk(rhs, out);
                }
                ExprKind::Unary { expr, .. } => walk(expr, out),
                ExprKind::Block { body } => body.iter().for_each(|s| walk_stmt(s, out)),
                ExprKind::Call { callee, args } => {
                    walk(callee, out);
                    args.iter().for_each(|a| walk(a, out));
                }
                ExprKind::IfElse {
                    predicate,
                    then_arm,
                    else_arm,
                } => {
                    walk(predicate, out);
                    walk(then_arm, out);
                    walk(else_arm, out);
                }
                _ => (),
            }
        }
        fn walk_stmt(stmt: &Stmt<Resolved>, out: &mut Vec<FnInfo>) {
            match &stmt.kind {
                StmtKind::Expr(expr) | StmtKind::MutDecl { value: expr, .. } => walk(expr, out),
                StmtKind::Error => (),
            }
        }
        let mut out = Vec::new();
        program.body.iter().for_each(|s| walk_stmt(s, &mut out));
        out
    }

    #[test]
    fn test_upvalue_chain_through_intermediate_frame() {
        let program = resolve_ok("mut x = 1; a -> b -> x");
        assert_eq!(program.info.local_count, 1);
        assert_eq!(program.info.captured, [LocalId(0)]);

        let infos = fn_infos(&program);
        let outer = Upvalue {
            source: 0,
            is_local: true,
        };
        let inner = Upvalue {
            source: 0,
            is_local: false,
        };
        assert_eq!(infos[0].upvalues, [outer]);
        assert_eq!(infos[1].upvalues, [inner]);
        assert_eq!(infos[0].local_count, 1);
        assert_eq!(infos[1].local_count, 1);
    }

    #[test]
    fn test_upvalues_are_deduplicated() {
        let program = resolve_ok("mut x = 1; mut y = 2; () -> x + y + x + y");
        let infos = fn_infos(&program);
        assert_eq!(infos[0].upvalues.len(), 2);
        assert_eq!(program.info.captured, [LocalId(0), LocalId(1)]);
    }

    #[test]
    fn test_block_locals_share_the_function_frame() {
        let program = resolve_ok("(a) -> ((mut b = a; b); (mut c = 1; c))");
        let infos = fn_infos(&program);
        assert_eq!(infos[0].local_count, 3);
    }

    #[test]
    fn test_undefined_does_not_record_upvalues() {
        let mut interner = Interner::with_capacity(32);
        let mut diagnostics = Vec::new();
        let program = parser::parse_program("a -> b -> nope", &mut interner, &mut diagnostics);
        let program = resolve(program, &interner, &mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        for info in fn_infos(&program) {
            assert_eq!(info.upvalues, []);
        }
    }

    #[test]
    fn test_accesses_stay_within_their_frame() {
        fn check(expr: &Expr<Resolved>, info: &FnInfo) {
            match &expr.kind {
                ExprKind::Access(_, Resolution::Local(id)) => assert!(id.0 < info.local_count),
                ExprKind::Access(_, Resolution::Upvalue(i)) => {
                    assert!((*i as usize) < info.upvalues.len());
                }
                ExprKind::Access(_, Resolution::Undefined) => panic!("undefined access"),
                ExprKind::Fn { body, info, .. } => check(body, info),
                ExprKind::Binary { lhs, rhs, .. } => {
                    check(lhs, info);
                    check(rhs, info);
                }
                ExprKind::Unary { expr, .. } => check(expr, info),
                ExprKind::Block { body } => body.iter().for_each(|s| check_stmt(s, info)),
                ExprKind::Call { callee, args } => {
                    check(callee, info);
                    args.iter().for_each(|a| check(a, info));
                }
                ExprKind::IfElse {
                    predicate,
                    then_arm,
                    else_arm,
                } => {
                    check(predicate, info);
                    check(then_arm, info);
                    check(else_arm, info);
                }
                _ => (),
            }
        }
        fn check_stmt(stmt: &Stmt<Resolved>, info: &FnInfo) {
            match &stmt.kind {
                StmtKind::Expr(expr) => check(expr, info),
                StmtKind::MutDecl { value, info: id, .. } => {
                    assert!(id.0 < info.local_count);
                    check(value, info);
                }
                StmtKind::Error => (),
            }
        }

        for src in [
            include_str!("../demos/closures.queso"),
            include_str!("../demos/currying.queso"),
            include_str!("../demos/strings.queso"),
            include_str!("../demos/conditionals.queso"),
            "mut a = 1; (mut b = 2; c -> (mut d = a; e -> b + d + e)); a",
        ] {
            let program = resolve_ok(src);
            program
                .body
                .iter()
                .for_each(|s| check_stmt(s, &program.info));
        }
    }

    tree_tests!(
        use resolver;

        fn test_locals() {
            let program = "mut x = 1; mut y = x; y";
            let tree_ok = "
                mut x (0..9 %: local 0)
                  number 1 (8..9)
                mut y (11..20 %: local 1)
                  ident x (19..20 %: local 0)
                ident y (22..23 %: local 1)
            ";
        }

        fn test_params_are_first_locals() {
            let program = "(a, b) -> (mut c = a; b)";
            let tree_ok = "
                fn(a, b) (0..24 %: locals 3)
                  block (10..24)
                    mut c (11..20 %: local 2)
                      ident a (19..20 %: local 0)
                    ident b (22..23 %: local 1)
            ";
        }

        fn test_capture() {
            let program = "mut x = 1; f -> x";
            let tree_ok = "
                mut x (0..9 %: local 0)
                  number 1 (8..9)
                fn(f) (11..17 %: locals 1, upvalues [local 0])
                  ident x (16..17 %: upvalue 0)
            ";
        }

        fn test_upvalue_of_upvalue() {
            let program = "mut x = 1; a -> b -> c -> x";
            let tree_ok = "
                mut x (0..9 %: local 0)
                  number 1 (8..9)
                fn(a) (11..27 %: locals 1, upvalues [local 0])
                  fn(b) (16..27 %: locals 1, upvalues [upvalue 0])
                    fn(c) (21..27 %: locals 1, upvalues [upvalue 0])
                      ident x (26..27 %: upvalue 0)
            ";
        }

        fn test_capture_of_param_marks_it_captured() {
            let program = "a -> b -> a";
            let tree_ok = "
                fn(a) (0..11 %: locals 1, captured [0])
                  fn(b) (5..11 %: locals 1, upvalues [local 0])
                    ident a (10..11 %: upvalue 0)
            ";
        }

        fn test_shadowing_in_nested_block_resolves_by_recency() {
            let program = "mut x = 1; (mut x = 2; x)";
            let tree_ok = "
                mut x (0..9 %: local 0)
                  number 1 (8..9)
                block (11..25)
                  mut x (12..21 %: local 1)
                    number 2 (20..21)
                  ident x (23..24 %: local 1)
            ";
        }

        fn test_initializer_does_not_see_its_own_name() {
            let program = "mut x = 1; (mut x = x; x)";
            let tree_ok = "
                mut x (0..9 %: local 0)
                  number 1 (8..9)
                block (11..25)
                  mut x (12..21 %: local 1)
                    ident x (20..21 %: local 0)
                  ident x (23..24 %: local 1)
            ";
        }

        fn test_error_redeclaration_in_sibling_block() {
            let program = "(mut a = 1; a); (mut a = 2; a)";
            let expected_errors = &["21..22: `a` is already declared in this scope at 5..6"];
        }

        fn test_outer_declaration_after_block_is_allowed() {
            let program = "(mut a = 1; a); mut a = 2; a";
            let expected_errors = &[];
        }

        fn test_error_redeclaration() {
            let program = "mut x = 1; mut x = 2; x";
            let expected_errors = &["15..16: `x` is already declared in this scope at 4..5"];
            let tree_error = "
                mut x (0..9 %: local 0)
                  number 1 (8..9)
                mut x (11..20 %: local 1)
                  number 2 (19..20)
                ident x (22..23 %: local 1)
            ";
        }

        fn test_error_duplicate_param() {
            let program = "(a, a) -> a";
            let expected_errors = &["4..5: `a` is already declared in this scope at 1..2"];
        }

        fn test_error_undefined() {
            let program = "mut x = y; z -> w";
            let expected_errors = &[
                "8..9: usage of an undefined variable `y`",
                "16..17: usage of an undefined variable `w`",
            ];
            let tree_error = "
                mut x (0..9 %: local 0)
                  ident y (8..9 %: undefined)
                fn(z) (11..17 %: locals 1)
                  ident w (16..17 %: undefined)
            ";
        }
    );
}
