use std::borrow::Cow;

use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, ElementSection, Elements, EntityType,
    ExportKind, ExportSection, Function, FunctionSection, GlobalSection, GlobalType,
    ImportSection, Instruction as I, MemorySection, MemoryType, Module, NameMap, NameSection,
    RefType, TableSection, TableType, TypeSection, ValType,
};

use crate::{
    ast::{
        BinaryOperator, Constant, Expr, ExprKind, FnInfo, Ident, LocalId, Program, Resolution,
        Resolved, Stmt, StmtKind, UnaryOperator,
    },
    codegen::{
        layout::{self, offset, StringPool},
        runtime::{self, load, store, u32_const, Routine, FD_WRITE, HEAP_TOP},
        Error, Options,
    },
    util::intern::Interner,
};

/// A compiled function literal.
struct Lambda {
    type_index: u32,
    body: Function,
}

/// Code being generated for one function body.
///
/// Local 0 is the closure environment, followed by the parameters and the
/// remaining declared locals. Then comes the scratch slot used while filling
/// a new closure's upvalues, and any temporaries.
struct Frame {
    instructions: Vec<I<'static>>,
    param_count: u32,
    scratch: u32,
    next_local: u32,
}

impl Frame {
    fn new(param_count: u32, info: &FnInfo) -> Frame {
        Frame {
            instructions: Vec::with_capacity(64),
            param_count,
            scratch: info.local_count + 1,
            next_local: info.local_count + 2,
        }
    }

    fn emit(&mut self, instruction: I<'static>) {
        self.instructions.push(instruction);
    }

    fn temp(&mut self) -> u32 {
        let local = self.next_local;
        self.next_local += 1;
        local
    }

    fn finish(self) -> Function {
        let declared = self.next_local - (self.param_count + 1);
        let mut f = Function::new([(declared, ValType::I32)]);
        for instruction in &self.instructions {
            f.instruction(instruction);
        }
        f.instruction(&I::End);
        f
    }
}

pub struct Generator<'a> {
    options: &'a Options,
    ident_interner: &'a Interner<str>,
    types: Vec<(Vec<ValType>, Vec<ValType>)>,
    pool: StringPool,
    /// In table order. A slot is reserved before its body is compiled, so
    /// that nested literals come after their parent.
    lambdas: Vec<Option<Lambda>>,
}

impl<'a> Generator<'a> {
    pub fn new(options: &'a Options, ident_interner: &'a Interner<str>) -> Generator<'a> {
        Generator {
            options,
            ident_interner,
            types: Vec::with_capacity(16),
            pool: StringPool::default(),
            lambdas: Vec::new(),
        }
    }

    pub fn generate(mut self, program: &Program<Resolved>) -> Result<Vec<u8>, Error> {
        let mut frame = Frame::new(0, &program.info);
        self.g_body(&mut frame, &program.body)?;
        let program_type = self.closure_type(0);
        let program_fn = frame.finish();
        log::trace!("generated program body");

        self.assemble(program_type, program_fn)
    }
}

/// Lowering.
impl Generator<'_> {
    /// Evaluates the statements, keeping the value of the last one.
    fn g_body(&mut self, f: &mut Frame, body: &[Stmt<Resolved>]) -> Result<(), Error> {
        let Some((last, init)) = body.split_last() else {
            f.emit(I::Call(Routine::CreateNull.index()));
            return Ok(());
        };
        for stmt in init {
            self.g_stmt(f, stmt)?;
            f.emit(I::Drop);
        }
        self.g_stmt(f, last)
    }

    fn g_stmt(&mut self, f: &mut Frame, stmt: &Stmt<Resolved>) -> Result<(), Error> {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.g_expr(f, expr),
            StmtKind::MutDecl { value, info, .. } => {
                self.g_expr(f, value)?;
                f.emit(I::LocalTee(local(*info)));
                Ok(())
            }
            StmtKind::Error => Err(Error::UnexpectedError(stmt.span)),
        }
    }

    fn g_expr(&mut self, f: &mut Frame, expr: &Expr<Resolved>) -> Result<(), Error> {
        match &expr.kind {
            ExprKind::Constant(Constant::Number(val)) => {
                f.emit(I::I32Const(f32_bits(*val as f32)));
                f.emit(I::F32ReinterpretI32);
                f.emit(I::Call(Routine::CreateNumber.index()));
            }
            ExprKind::Constant(Constant::String(val)) => {
                let text = self.pool.intern(val);
                f.emit(u32_const(text.len));
                f.emit(u32_const(text.offset));
                f.emit(I::Call(Routine::CreateString.index()));
            }
            ExprKind::True => g_boolean_const(f, true),
            ExprKind::False => g_boolean_const(f, false),
            ExprKind::Null => f.emit(I::Call(Routine::CreateNull.index())),
            ExprKind::Binary { op, lhs, rhs } => self.g_binary(f, *op, lhs, rhs)?,
            ExprKind::Unary {
                op,
                expr: inner_expr,
            } => self.g_unary(f, *op, inner_expr)?,
            ExprKind::Block { body } => self.g_body(f, body)?,
            ExprKind::Call { callee, args } => self.g_call(f, callee, args)?,
            ExprKind::IfElse {
                predicate,
                then_arm,
                else_arm,
            } => {
                self.g_expr(f, predicate)?;
                f.emit(I::Call(Routine::Truthy.index()));
                f.emit(I::If(BlockType::Result(ValType::I32)));
                self.g_expr(f, then_arm)?;
                f.emit(I::Else);
                self.g_expr(f, else_arm)?;
                f.emit(I::End);
            }
            ExprKind::Access(ident, resolution) => self.g_access(f, ident, *resolution)?,
            ExprKind::Fn { params, body, info } => self.g_fn(f, params, body, info)?,
            ExprKind::Error => return Err(Error::UnexpectedError(expr.span)),
        }
        Ok(())
    }

    fn g_binary(
        &mut self,
        f: &mut Frame,
        op: BinaryOperator,
        lhs: &Expr<Resolved>,
        rhs: &Expr<Resolved>,
    ) -> Result<(), Error> {
        use BinaryOperator::*;

        if let And | Or = op {
            // Yields whichever operand decided the outcome.
            let tmp = f.temp();
            self.g_expr(f, lhs)?;
            f.emit(I::LocalTee(tmp));
            f.emit(I::Call(Routine::Truthy.index()));
            f.emit(I::If(BlockType::Result(ValType::I32)));
            if op == And {
                self.g_expr(f, rhs)?;
                f.emit(I::Else);
                f.emit(I::LocalGet(tmp));
            } else {
                f.emit(I::LocalGet(tmp));
                f.emit(I::Else);
                self.g_expr(f, rhs)?;
            }
            f.emit(I::End);
            return Ok(());
        }

        match op {
            Add | Pow => {
                self.g_expr(f, lhs)?;
                self.g_expr(f, rhs)?;
                let routine = if op == Add { Routine::Add } else { Routine::Pow };
                f.emit(I::Call(routine.index()));
            }
            Eq | NotEq => {
                self.g_expr(f, lhs)?;
                self.g_expr(f, rhs)?;
                f.emit(I::Call(Routine::Equals.index()));
                if op == NotEq {
                    f.emit(I::I32Eqz);
                }
                f.emit(I::Call(Routine::CreateBoolean.index()));
            }
            Sub | Mul | Div | Lt | LtEq | Gt | GtEq => {
                self.g_number(f, lhs)?;
                self.g_number(f, rhs)?;
                let (instruction, result) = match op {
                    Sub => (I::F32Sub, Routine::CreateNumber),
                    Mul => (I::F32Mul, Routine::CreateNumber),
                    Div => (I::F32Div, Routine::CreateNumber),
                    Lt => (I::F32Lt, Routine::CreateBoolean),
                    LtEq => (I::F32Le, Routine::CreateBoolean),
                    Gt => (I::F32Gt, Routine::CreateBoolean),
                    GtEq => (I::F32Ge, Routine::CreateBoolean),
                    _ => unreachable!(),
                };
                f.emit(instruction);
                f.emit(I::Call(result.index()));
            }
            And | Or => unreachable!(),
        }
        Ok(())
    }

    fn g_unary(
        &mut self,
        f: &mut Frame,
        op: UnaryOperator,
        expr: &Expr<Resolved>,
    ) -> Result<(), Error> {
        match op {
            UnaryOperator::Neg => {
                self.g_number(f, expr)?;
                f.emit(I::F32Neg);
                f.emit(I::Call(Routine::CreateNumber.index()));
            }
            UnaryOperator::Plus => {
                self.g_number(f, expr)?;
                f.emit(I::Call(Routine::CreateNumber.index()));
            }
            UnaryOperator::Not => {
                self.g_expr(f, expr)?;
                f.emit(I::Call(Routine::Truthy.index()));
                f.emit(I::I32Eqz);
                f.emit(I::Call(Routine::CreateBoolean.index()));
            }
        }
        Ok(())
    }

    /// Evaluates `expr` and unboxes it into an `f32`.
    fn g_number(&mut self, f: &mut Frame, expr: &Expr<Resolved>) -> Result<(), Error> {
        self.g_expr(f, expr)?;
        f.emit(I::Call(Routine::Number.index()));
        Ok(())
    }

    /// The callee itself is passed as the environment argument.
    fn g_call(
        &mut self,
        f: &mut Frame,
        callee: &Expr<Resolved>,
        args: &[Expr<Resolved>],
    ) -> Result<(), Error> {
        let closure = f.temp();
        self.g_expr(f, callee)?;
        f.emit(I::LocalTee(closure));
        for arg in args {
            self.g_expr(f, arg)?;
        }
        f.emit(I::LocalGet(closure));
        f.emit(I::Call(Routine::ClosureIndex.index()));
        let type_index = self.closure_type(args.len());
        f.emit(I::CallIndirect {
            type_index,
            table_index: 0,
        });
        Ok(())
    }

    fn g_access(
        &mut self,
        f: &mut Frame,
        ident: &Ident,
        resolution: Resolution,
    ) -> Result<(), Error> {
        match resolution {
            Resolution::Local(id) => f.emit(I::LocalGet(local(id))),
            Resolution::Upvalue(index) => {
                f.emit(I::LocalGet(0));
                f.emit(load(offset::upvalue_slot(index)));
            }
            Resolution::Undefined => {
                return Err(Error::UnresolvedAccess {
                    name: self.ident_interner.get(ident).to_owned(),
                    span: ident.span,
                });
            }
        }
        Ok(())
    }

    /// Compiles the literal into its own function, then builds the closure
    /// value in the current frame.
    fn g_fn(
        &mut self,
        f: &mut Frame,
        params: &[Ident],
        body: &Expr<Resolved>,
        info: &FnInfo,
    ) -> Result<(), Error> {
        let table_index = self.lambdas.len();
        self.lambdas.push(None);

        let arity = params.len();
        let mut inner = Frame::new(len_u32(arity), info);
        self.g_expr(&mut inner, body)?;
        let lambda = Lambda {
            type_index: self.closure_type(arity),
            body: inner.finish(),
        };
        self.lambdas[table_index] = Some(lambda);
        log::trace!("generated lambda #{table_index} with arity {arity}");

        f.emit(I::I32Const(index_i32(table_index)));
        f.emit(u32_const(len_u32(info.upvalues.len())));
        f.emit(I::Call(Routine::CreateClosure.index()));
        f.emit(I::LocalSet(f.scratch));
        for (slot, upvalue) in (0..).zip(&info.upvalues) {
            f.emit(I::LocalGet(f.scratch));
            if upvalue.is_local {
                f.emit(I::LocalGet(local(LocalId(upvalue.source))));
            } else {
                // Forwarded from the enclosing closure's own environment.
                f.emit(I::LocalGet(0));
                f.emit(load(offset::upvalue_slot(upvalue.source)));
            }
            f.emit(store(offset::upvalue_slot(slot)));
        }
        f.emit(I::LocalGet(f.scratch));
        Ok(())
    }

    /// Closures take their environment followed by their parameters.
    fn closure_type(&mut self, arity: usize) -> u32 {
        let params = vec![ValType::I32; arity + 1];
        self.type_index(&params, &[ValType::I32])
    }

    fn type_index(&mut self, params: &[ValType], results: &[ValType]) -> u32 {
        let index = match self
            .types
            .iter()
            .position(|(p, r)| p == params && r == results)
        {
            Some(index) => index,
            None => {
                self.types.push((params.to_vec(), results.to_vec()));
                self.types.len() - 1
            }
        };
        len_u32(index)
    }
}

/// Module assembly.
impl Generator<'_> {
    fn assemble(mut self, program_type: u32, program_fn: Function) -> Result<Vec<u8>, Error> {
        let lambda_count = len_u32(self.lambdas.len());
        let lambda_base = Routine::ALL.len() as u32 + 1;
        let program_index = lambda_base + lambda_count;
        let start_index = program_index + 1;

        let (fd_params, fd_results) = runtime::FD_WRITE_SIGNATURE;
        let fd_write_type = self.type_index(fd_params, fd_results);
        let routine_types: Vec<_> = Routine::ALL
            .iter()
            .map(|routine| {
                let (params, results) = routine.signature();
                self.type_index(params, results)
            })
            .collect();
        let start_type = self.type_index(&[], &[]);

        let heap_start = layout::heap_start(self.options.heap_base, self.pool.end());
        let memory = self.memory_type(heap_start)?;
        let lambdas: Vec<Lambda> = self.lambdas.drain(..).flatten().collect();
        debug_assert_eq!(lambdas.len() as u32, lambda_count);

        let mut module = Module::new();

        let mut types = TypeSection::new();
        for (params, results) in &self.types {
            types.ty().function(params.iter().copied(), results.iter().copied());
        }
        module.section(&types);

        let mut imports = ImportSection::new();
        imports.import(
            "wasi_snapshot_preview1",
            "fd_write",
            EntityType::Function(fd_write_type),
        );
        module.section(&imports);

        let mut functions = FunctionSection::new();
        for type_index in &routine_types {
            functions.function(*type_index);
        }
        for lambda in &lambdas {
            functions.function(lambda.type_index);
        }
        functions.function(program_type);
        functions.function(start_type);
        module.section(&functions);

        let mut tables = TableSection::new();
        tables.table(TableType {
            element_type: RefType::FUNCREF,
            minimum: u64::from(lambda_count),
            maximum: Some(u64::from(lambda_count)),
            table64: false,
            shared: false,
        });
        module.section(&tables);

        let mut memories = MemorySection::new();
        memories.memory(memory);
        module.section(&memories);

        let mut globals = GlobalSection::new();
        globals.global(
            GlobalType {
                val_type: ValType::I32,
                mutable: true,
                shared: false,
            },
            &ConstExpr::i32_const(heap_start as i32),
        );
        module.section(&globals);

        let mut exports = ExportSection::new();
        exports.export("_start", ExportKind::Func, start_index);
        exports.export("memory", ExportKind::Memory, 0);
        if self.options.export_runtime {
            for routine in Routine::ALL {
                exports.export(routine.name(), ExportKind::Func, routine.index());
            }
            exports.export(runtime::HEAP_TOP_NAME, ExportKind::Global, HEAP_TOP);
        }
        module.section(&exports);

        if lambda_count > 0 {
            let indices: Vec<u32> = (lambda_base..program_index).collect();
            let mut elements = ElementSection::new();
            elements.active(
                Some(0),
                &ConstExpr::i32_const(0),
                Elements::Functions(Cow::Borrowed(&indices)),
            );
            module.section(&elements);
        }

        let mut codes = CodeSection::new();
        for routine in Routine::ALL {
            codes.function(&routine.emit());
        }
        for lambda in &lambdas {
            codes.function(&lambda.body);
        }
        codes.function(&program_fn);
        codes.function(&start_fn(program_index));
        module.section(&codes);

        let mut data = DataSection::new();
        data.active(
            0,
            &ConstExpr::i32_const(layout::RUNTIME_TEXT_BASE as i32),
            layout::RUNTIME_TEXT.iter().copied(),
        );
        if !self.pool.bytes().is_empty() {
            data.active(
                0,
                &ConstExpr::i32_const(layout::POOL_BASE as i32),
                self.pool.bytes().iter().copied(),
            );
        }
        module.section(&data);

        module.section(&names(lambda_count, program_index, start_index));

        let bytes = module.finish();
        wasmparser::Validator::new()
            .validate_all(&bytes)
            .map_err(|error| Error::InvalidModule(error.to_string()))?;
        Ok(bytes)
    }

    /// The initial size always covers the static data and the heap base.
    fn memory_type(&self, heap_start: u32) -> Result<MemoryType, Error> {
        let required = layout::pages_for(heap_start);
        let minimum = self.options.initial_pages.max(required);
        if let Some(maximum) = self.options.maximum_pages {
            if maximum < minimum {
                return Err(Error::MemoryCeiling {
                    required: minimum,
                    maximum,
                });
            }
        }
        Ok(MemoryType {
            minimum: u64::from(minimum),
            maximum: self.options.maximum_pages.map(u64::from),
            memory64: false,
            shared: false,
            page_size_log2: None,
        })
    }
}

/// `_start` runs the program with a null environment and prints its result.
fn start_fn(program_index: u32) -> Function {
    let mut f = Function::new_with_locals_types(runtime::NO_LOCALS);
    runtime::emit(
        &mut f,
        &[
            I::I32Const(0),
            I::Call(program_index),
            I::Call(Routine::Print.index()),
            I::End,
        ],
    );
    f
}

fn names(lambda_count: u32, program_index: u32, start_index: u32) -> NameSection {
    let mut functions = NameMap::new();
    functions.append(FD_WRITE, "fd_write");
    for routine in Routine::ALL {
        functions.append(routine.index(), routine.name());
    }
    let lambda_base = program_index - lambda_count;
    for i in 0..lambda_count {
        functions.append(lambda_base + i, &format!("~lambda/{i}"));
    }
    functions.append(program_index, "~program");
    functions.append(start_index, "_start");

    let mut globals = NameMap::new();
    globals.append(HEAP_TOP, runtime::HEAP_TOP_NAME);

    let mut names = NameSection::new();
    names.functions(&functions);
    names.globals(&globals);
    names
}

fn g_boolean_const(f: &mut Frame, value: bool) {
    f.emit(I::I32Const(i32::from(value)));
    f.emit(I::Call(Routine::CreateBoolean.index()));
}

/// Declared locals come after the environment argument.
fn local(id: LocalId) -> u32 {
    id.0 + 1
}

fn f32_bits(x: f32) -> i32 {
    i32::from_ne_bytes(x.to_bits().to_ne_bytes())
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).expect("length exceeds u32")
}

fn index_i32(index: usize) -> i32 {
    i32::try_from(index).expect("too many function literals")
}
