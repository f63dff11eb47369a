//! Runtime routines emitted into every module.
//!
//! Every compiled expression evaluates to the address of a tagged value (see
//! [`layout`]). These routines create, inspect and combine such values. They
//! trap (`unreachable`) on operands of the wrong kind.

use wasm_encoder::{BlockType, Function, Instruction as I, MemArg, ValType};

use crate::codegen::layout::{self, offset, size, tag, Text};

/// Function index of the imported `fd_write`.
pub const FD_WRITE: u32 = 0;

/// Global index of the heap top pointer.
pub const HEAP_TOP: u32 = 0;
pub const HEAP_TOP_NAME: &str = "~rt/heap_top";

const STDOUT: i32 = 1;
pub(crate) const NO_LOCALS: [ValType; 0] = [];
const NUMBER_BUF_LEN: i32 = 32;
const FRACTION_DIGITS: i32 = 6;
/// From here on numbers print in exponent form, which keeps the scaled value
/// within `u64`.
const EXPONENT_FROM: i64 = 10_000_000_000_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Routine {
    Alloc,
    CreateNull,
    CreateNumber,
    CreateString,
    CreateClosure,
    CreateBoolean,
    Number,
    Truthy,
    Equals,
    Add,
    Concat,
    Pow,
    ClosureIndex,
    ToString,
    NumberToString,
    Write,
    Print,
}

impl Routine {
    /// In function index order.
    pub const ALL: &[Routine] = &[
        Routine::Alloc,
        Routine::CreateNull,
        Routine::CreateNumber,
        Routine::CreateString,
        Routine::CreateClosure,
        Routine::CreateBoolean,
        Routine::Number,
        Routine::Truthy,
        Routine::Equals,
        Routine::Add,
        Routine::Concat,
        Routine::Pow,
        Routine::ClosureIndex,
        Routine::ToString,
        Routine::NumberToString,
        Routine::Write,
        Routine::Print,
    ];

    /// Routines come right after the `fd_write` import.
    pub const fn index(self) -> u32 {
        FD_WRITE + 1 + self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Routine::Alloc => "~rt/alloc",
            Routine::CreateNull => "~rt/createValue/null",
            Routine::CreateNumber => "~rt/createValue/number",
            Routine::CreateString => "~rt/createValue/string",
            Routine::CreateClosure => "~rt/createValue/closure",
            Routine::CreateBoolean => "~rt/createValue/boolean",
            Routine::Number => "~rt/number",
            Routine::Truthy => "~rt/truthy",
            Routine::Equals => "~rt/equals",
            Routine::Add => "~rt/add",
            Routine::Concat => "~rt/concat",
            Routine::Pow => "~rt/pow",
            Routine::ClosureIndex => "~rt/closureIndex",
            Routine::ToString => "~rt/toString",
            Routine::NumberToString => "~rt/numberToString",
            Routine::Write => "~rt/write",
            Routine::Print => "~rt/print",
        }
    }

    /// Parameter and result types.
    pub fn signature(self) -> (&'static [ValType], &'static [ValType]) {
        use ValType::{F32, I32};
        match self {
            Routine::CreateNull => (&[], &[I32]),
            Routine::CreateNumber | Routine::NumberToString => (&[F32], &[I32]),
            Routine::Number => (&[I32], &[F32]),
            Routine::Alloc
            | Routine::CreateBoolean
            | Routine::Truthy
            | Routine::ClosureIndex
            | Routine::ToString => (&[I32], &[I32]),
            Routine::CreateString
            | Routine::CreateClosure
            | Routine::Equals
            | Routine::Add
            | Routine::Concat
            | Routine::Pow => (&[I32, I32], &[I32]),
            Routine::Write => (&[I32, I32], &[]),
            Routine::Print => (&[I32], &[]),
        }
    }

    pub fn emit(self) -> Function {
        match self {
            Routine::Alloc => emit_alloc(),
            Routine::CreateNull => emit_create_null(),
            Routine::CreateNumber => emit_create_number(),
            Routine::CreateString => emit_create_string(),
            Routine::CreateClosure => emit_create_closure(),
            Routine::CreateBoolean => emit_create_boolean(),
            Routine::Number => emit_number(),
            Routine::Truthy => emit_truthy(),
            Routine::Equals => emit_equals(),
            Routine::Add => emit_add(),
            Routine::Concat => emit_concat(),
            Routine::Pow => emit_pow(),
            Routine::ClosureIndex => emit_closure_index(),
            Routine::ToString => emit_to_string(),
            Routine::NumberToString => emit_number_to_string(),
            Routine::Write => emit_write(),
            Routine::Print => emit_print(),
        }
    }
}

/// The `fd_write(fd, iovs, iovs_len, nwritten) -> errno` import signature.
pub const FD_WRITE_SIGNATURE: (&[ValType], &[ValType]) = (
    &[ValType::I32, ValType::I32, ValType::I32, ValType::I32],
    &[ValType::I32],
);

/// `alloc(size) -> ptr`. Grows the memory when the new heap top doesn't fit,
/// trapping if it can't.
fn emit_alloc() -> Function {
    const SIZE: u32 = 0;
    const PTR: u32 = 1;
    const END: u32 = 2;
    let mut f = Function::new_with_locals_types([ValType::I32, ValType::I32]);
    emit(
        &mut f,
        &[
            I::GlobalGet(HEAP_TOP),
            I::LocalTee(PTR),
            I::LocalGet(SIZE),
            I::I32Add,
            I::LocalTee(END),
            I::GlobalSet(HEAP_TOP),
            I::LocalGet(END),
            I::MemorySize(0),
            I::I32Const(16),
            I::I32Shl,
            I::I32GtU,
            I::If(BlockType::Empty),
            // Pages needed in total, minus the current ones.
            I::LocalGet(END),
            u32_const(layout::PAGE_SIZE - 1),
            I::I32Add,
            I::I32Const(16),
            I::I32ShrU,
            I::MemorySize(0),
            I::I32Sub,
            I::MemoryGrow(0),
            I::I32Const(-1),
            I::I32Eq,
            I::If(BlockType::Empty),
            I::Unreachable,
            I::End,
            I::End,
            I::LocalGet(PTR),
            I::End,
        ],
    );
    f
}

fn emit_create_null() -> Function {
    const PTR: u32 = 0;
    let mut f = Function::new_with_locals_types([ValType::I32]);
    emit_new_value(&mut f, PTR, size::NULL, tag::NULL);
    emit(&mut f, &[I::LocalGet(PTR), I::End]);
    f
}

fn emit_create_number() -> Function {
    const X: u32 = 0;
    const PTR: u32 = 1;
    let mut f = Function::new_with_locals_types([ValType::I32]);
    emit_new_value(&mut f, PTR, size::NUMBER, tag::NUMBER);
    emit(
        &mut f,
        &[
            I::LocalGet(PTR),
            I::LocalGet(X),
            I::F32Store(memarg(offset::PAYLOAD, 2)),
            I::LocalGet(PTR),
            I::End,
        ],
    );
    f
}

/// `createValue/string(len, data) -> ptr`
fn emit_create_string() -> Function {
    const LEN: u32 = 0;
    const DATA: u32 = 1;
    const PTR: u32 = 2;
    let mut f = Function::new_with_locals_types([ValType::I32]);
    emit_new_value(&mut f, PTR, size::STRING, tag::STRING);
    emit(
        &mut f,
        &[
            I::LocalGet(PTR),
            I::LocalGet(LEN),
            store(offset::STRING_LEN),
            I::LocalGet(PTR),
            I::LocalGet(DATA),
            store(offset::STRING_DATA),
            I::LocalGet(PTR),
            I::End,
        ],
    );
    f
}

/// `createValue/closure(table_index, upvalue_count) -> ptr`. The caller
/// fills the upvalue slots.
fn emit_create_closure() -> Function {
    const INDEX: u32 = 0;
    const COUNT: u32 = 1;
    const PTR: u32 = 2;
    let mut f = Function::new_with_locals_types([ValType::I32]);
    emit(
        &mut f,
        &[
            I::LocalGet(COUNT),
            u32_const(size::SLOT),
            I::I32Mul,
            u32_const(size::CLOSURE_HEADER),
            I::I32Add,
            I::Call(Routine::Alloc.index()),
            I::LocalTee(PTR),
            I::I32Const(tag::CLOSURE),
            store(offset::TAG),
            I::LocalGet(PTR),
            I::LocalGet(INDEX),
            store(offset::CLOSURE_INDEX),
            I::LocalGet(PTR),
            I::LocalGet(COUNT),
            store(offset::CLOSURE_COUNT),
            I::LocalGet(PTR),
            I::End,
        ],
    );
    f
}

fn emit_create_boolean() -> Function {
    const B: u32 = 0;
    const PTR: u32 = 1;
    let mut f = Function::new_with_locals_types([ValType::I32]);
    emit_new_value(&mut f, PTR, size::BOOLEAN, tag::BOOLEAN);
    emit(
        &mut f,
        &[
            I::LocalGet(PTR),
            I::LocalGet(B),
            I::I32Const(0),
            I::I32Ne,
            store(offset::PAYLOAD),
            I::LocalGet(PTR),
            I::End,
        ],
    );
    f
}

/// `number(value) -> f32`
fn emit_number() -> Function {
    const V: u32 = 0;
    let mut f = Function::new_with_locals_types(NO_LOCALS);
    emit_expect_tag(&mut f, V, tag::NUMBER);
    emit(
        &mut f,
        &[
            I::LocalGet(V),
            I::F32Load(memarg(offset::PAYLOAD, 2)),
            I::End,
        ],
    );
    f
}

/// `truthy(value) -> 0 | 1`. Null, false, zero, NaN and the empty string are
/// falsy.
fn emit_truthy() -> Function {
    const V: u32 = 0;
    const TAG: u32 = 1;
    let mut f = Function::new_with_locals_types([ValType::I32]);
    emit(&mut f, &[I::LocalGet(V), load(offset::TAG), I::LocalSet(TAG)]);

    emit_if_tag(&mut f, TAG, tag::NULL, &[I::I32Const(0)]);
    emit_if_tag(
        &mut f,
        TAG,
        tag::BOOLEAN,
        &[I::LocalGet(V), load(offset::PAYLOAD)],
    );
    emit_if_tag(
        &mut f,
        TAG,
        tag::NUMBER,
        &[
            I::LocalGet(V),
            I::F32Load(memarg(offset::PAYLOAD, 2)),
            I::F32Abs,
            I::I32Const(0),
            I::F32ConvertI32S,
            I::F32Gt,
        ],
    );
    emit_if_tag(
        &mut f,
        TAG,
        tag::STRING,
        &[
            I::LocalGet(V),
            load(offset::STRING_LEN),
            I::I32Const(0),
            I::I32Ne,
        ],
    );
    emit(&mut f, &[I::I32Const(1), I::End]);
    f
}

/// `equals(a, b) -> 0 | 1`. Closures compare by identity, everything else
/// by value. Values of different kinds are never equal.
fn emit_equals() -> Function {
    const A: u32 = 0;
    const B: u32 = 1;
    const TAG: u32 = 2;
    const LEN: u32 = 3;
    const I_: u32 = 4;
    const PA: u32 = 5;
    const PB: u32 = 6;
    let mut f = Function::new_with_locals_types([ValType::I32; 5]);
    emit(
        &mut f,
        &[
            I::LocalGet(A),
            I::LocalGet(B),
            I::I32Eq,
            I::If(BlockType::Empty),
            I::I32Const(1),
            I::Return,
            I::End,
            I::LocalGet(A),
            load(offset::TAG),
            I::LocalTee(TAG),
            I::LocalGet(B),
            load(offset::TAG),
            I::I32Ne,
            I::If(BlockType::Empty),
            I::I32Const(0),
            I::Return,
            I::End,
        ],
    );
    emit_if_tag(&mut f, TAG, tag::NULL, &[I::I32Const(1)]);
    emit_if_tag(
        &mut f,
        TAG,
        tag::NUMBER,
        &[
            I::LocalGet(A),
            I::F32Load(memarg(offset::PAYLOAD, 2)),
            I::LocalGet(B),
            I::F32Load(memarg(offset::PAYLOAD, 2)),
            I::F32Eq,
        ],
    );
    emit_if_tag(
        &mut f,
        TAG,
        tag::BOOLEAN,
        &[
            I::LocalGet(A),
            load(offset::PAYLOAD),
            I::LocalGet(B),
            load(offset::PAYLOAD),
            I::I32Eq,
        ],
    );
    emit(
        &mut f,
        &[
            // Distinct closures.
            I::LocalGet(TAG),
            I::I32Const(tag::STRING),
            I::I32Ne,
            I::If(BlockType::Empty),
            I::I32Const(0),
            I::Return,
            I::End,
            // Strings: same length, then bytewise.
            I::LocalGet(A),
            load(offset::STRING_LEN),
            I::LocalTee(LEN),
            I::LocalGet(B),
            load(offset::STRING_LEN),
            I::I32Ne,
            I::If(BlockType::Empty),
            I::I32Const(0),
            I::Return,
            I::End,
            I::LocalGet(A),
            load(offset::STRING_DATA),
            I::LocalSet(PA),
            I::LocalGet(B),
            load(offset::STRING_DATA),
            I::LocalSet(PB),
            I::Block(BlockType::Empty),
            I::Loop(BlockType::Empty),
            I::LocalGet(I_),
            I::LocalGet(LEN),
            I::I32GeU,
            I::BrIf(1),
            I::LocalGet(PA),
            I::LocalGet(I_),
            I::I32Add,
            I::I32Load8U(memarg(0, 0)),
            I::LocalGet(PB),
            I::LocalGet(I_),
            I::I32Add,
            I::I32Load8U(memarg(0, 0)),
            I::I32Ne,
            I::If(BlockType::Empty),
            I::I32Const(0),
            I::Return,
            I::End,
            I::LocalGet(I_),
            I::I32Const(1),
            I::I32Add,
            I::LocalSet(I_),
            I::Br(0),
            I::End,
            I::End,
            I::I32Const(1),
            I::End,
        ],
    );
    f
}

/// `add(a, b) -> value`. Adds two numbers, or concatenates the text of both
/// operands when either one is a string.
fn emit_add() -> Function {
    const A: u32 = 0;
    const B: u32 = 1;
    let mut f = Function::new_with_locals_types(NO_LOCALS);
    emit(
        &mut f,
        &[
            I::LocalGet(A),
            load(offset::TAG),
            I::I32Const(tag::NUMBER),
            I::I32Eq,
            I::LocalGet(B),
            load(offset::TAG),
            I::I32Const(tag::NUMBER),
            I::I32Eq,
            I::I32And,
            I::If(BlockType::Result(ValType::I32)),
            I::LocalGet(A),
            I::Call(Routine::Number.index()),
            I::LocalGet(B),
            I::Call(Routine::Number.index()),
            I::F32Add,
            I::Call(Routine::CreateNumber.index()),
            I::Else,
            I::LocalGet(A),
            load(offset::TAG),
            I::I32Const(tag::STRING),
            I::I32Eq,
            I::LocalGet(B),
            load(offset::TAG),
            I::I32Const(tag::STRING),
            I::I32Eq,
            I::I32Or,
            I::I32Eqz,
            I::If(BlockType::Empty),
            I::Unreachable,
            I::End,
            I::LocalGet(A),
            I::Call(Routine::ToString.index()),
            I::LocalGet(B),
            I::Call(Routine::ToString.index()),
            I::Call(Routine::Concat.index()),
            I::End,
            I::End,
        ],
    );
    f
}

/// `concat(a, b) -> string`, both operands being strings.
fn emit_concat() -> Function {
    const A: u32 = 0;
    const B: u32 = 1;
    const LA: u32 = 2;
    const LB: u32 = 3;
    const DST: u32 = 4;
    let mut f = Function::new_with_locals_types([ValType::I32; 3]);
    emit(
        &mut f,
        &[
            I::LocalGet(A),
            load(offset::STRING_LEN),
            I::LocalSet(LA),
            I::LocalGet(B),
            load(offset::STRING_LEN),
            I::LocalSet(LB),
            I::LocalGet(LA),
            I::LocalGet(LB),
            I::I32Add,
            I::Call(Routine::Alloc.index()),
            I::LocalSet(DST),
            I::LocalGet(DST),
            I::LocalGet(A),
            load(offset::STRING_DATA),
            I::LocalGet(LA),
            memory_copy(),
            I::LocalGet(DST),
            I::LocalGet(LA),
            I::I32Add,
            I::LocalGet(B),
            load(offset::STRING_DATA),
            I::LocalGet(LB),
            memory_copy(),
            I::LocalGet(LA),
            I::LocalGet(LB),
            I::I32Add,
            I::LocalGet(DST),
            I::Call(Routine::CreateString.index()),
            I::End,
        ],
    );
    f
}

/// `pow(base, exponent) -> number`. Only the integer part of the exponent is
/// used.
fn emit_pow() -> Function {
    const A: u32 = 0;
    const B: u32 = 1;
    const BASE: u32 = 2;
    const N: u32 = 3;
    const NEG: u32 = 4;
    const ACC: u32 = 5;
    let mut f = Function::new_with_locals_types([
        ValType::F32,
        ValType::I32,
        ValType::I32,
        ValType::F32,
    ]);
    emit(
        &mut f,
        &[
            I::LocalGet(A),
            I::Call(Routine::Number.index()),
            I::LocalSet(BASE),
            I::LocalGet(B),
            I::Call(Routine::Number.index()),
            I::I32TruncSatF32S,
            I::LocalTee(N),
            I::I32Const(0),
            I::I32LtS,
            I::LocalTee(NEG),
            I::If(BlockType::Empty),
            I::I32Const(0),
            I::LocalGet(N),
            I::I32Sub,
            I::LocalSet(N),
            I::End,
            I::I32Const(1),
            I::F32ConvertI32S,
            I::LocalSet(ACC),
            I::Block(BlockType::Empty),
            I::Loop(BlockType::Empty),
            I::LocalGet(N),
            I::I32Eqz,
            I::BrIf(1),
            I::LocalGet(ACC),
            I::LocalGet(BASE),
            I::F32Mul,
            I::LocalSet(ACC),
            I::LocalGet(N),
            I::I32Const(1),
            I::I32Sub,
            I::LocalSet(N),
            I::Br(0),
            I::End,
            I::End,
            I::LocalGet(NEG),
            I::If(BlockType::Empty),
            I::I32Const(1),
            I::F32ConvertI32S,
            I::LocalGet(ACC),
            I::F32Div,
            I::LocalSet(ACC),
            I::End,
            I::LocalGet(ACC),
            I::Call(Routine::CreateNumber.index()),
            I::End,
        ],
    );
    f
}

/// `closureIndex(value) -> table index`
fn emit_closure_index() -> Function {
    const V: u32 = 0;
    let mut f = Function::new_with_locals_types(NO_LOCALS);
    emit_expect_tag(&mut f, V, tag::CLOSURE);
    emit(
        &mut f,
        &[I::LocalGet(V), load(offset::CLOSURE_INDEX), I::End],
    );
    f
}

/// `toString(value) -> string`
fn emit_to_string() -> Function {
    const V: u32 = 0;
    const TAG: u32 = 1;
    let mut f = Function::new_with_locals_types([ValType::I32]);
    emit(&mut f, &[I::LocalGet(V), load(offset::TAG), I::LocalSet(TAG)]);

    emit_if_tag(&mut f, TAG, tag::STRING, &[I::LocalGet(V)]);
    emit_if_tag(
        &mut f,
        TAG,
        tag::NUMBER,
        &[
            I::LocalGet(V),
            I::F32Load(memarg(offset::PAYLOAD, 2)),
            I::Call(Routine::NumberToString.index()),
        ],
    );
    emit_if_tag(&mut f, TAG, tag::NULL, &text(Text::NULL));

    let mut boolean = vec![
        I::LocalGet(V),
        load(offset::PAYLOAD),
        I::If(BlockType::Result(ValType::I32)),
    ];
    boolean.extend(text(Text::TRUE));
    boolean.push(I::Else);
    boolean.extend(text(Text::FALSE));
    boolean.push(I::End);
    emit_if_tag(&mut f, TAG, tag::BOOLEAN, &boolean);

    emit(&mut f, &text(Text::FN));
    f.instruction(&I::End);
    f
}

/// `numberToString(x) -> string`. Prints up to six fractional digits,
/// without trailing zeros. Magnitudes of `1e13` and above print as a
/// mantissa and a decimal exponent, as in `1.5e15`.
fn emit_number_to_string() -> Function {
    const X: u32 = 0;
    const BUF: u32 = 1;
    const POS: u32 = 2;
    const TOTAL: u32 = 3;
    const NEG: u32 = 4;
    const DIGITS: u32 = 5;
    const T: u32 = 6;
    const XD: u32 = 7;
    const EXP: u32 = 8;
    let mut f = Function::new_with_locals_types([
        ValType::I32,
        ValType::I32,
        ValType::I64,
        ValType::I32,
        ValType::I32,
        ValType::F32,
        ValType::F64,
        ValType::I32,
    ]);

    // NaN
    let mut nan = vec![
        I::LocalGet(X),
        I::LocalGet(X),
        I::F32Ne,
        I::If(BlockType::Empty),
    ];
    nan.extend(text(Text::NAN));
    nan.extend([I::Return, I::End]);
    emit(&mut f, &nan);

    emit(
        &mut f,
        &[
            I::LocalGet(X),
            I::I32Const(0),
            I::F32ConvertI32S,
            I::F32Lt,
            I::LocalTee(NEG),
            I::If(BlockType::Empty),
            I::LocalGet(X),
            I::F32Neg,
            I::LocalSet(X),
            I::End,
        ],
    );

    // `x - x` is NaN only for infinities.
    let mut inf = vec![
        I::LocalGet(X),
        I::LocalGet(X),
        I::F32Sub,
        I::LocalTee(T),
        I::LocalGet(T),
        I::F32Ne,
        I::If(BlockType::Empty),
        I::LocalGet(NEG),
        I::If(BlockType::Result(ValType::I32)),
    ];
    inf.extend(text(Text::NEG_INF));
    inf.push(I::Else);
    inf.extend(text(Text::INF));
    inf.extend([I::End, I::Return, I::End]);
    emit(&mut f, &inf);

    emit(
        &mut f,
        &[
            I::LocalGet(X),
            I::F64PromoteF32,
            I::LocalTee(XD),
            I::I64Const(EXPONENT_FROM),
            I::F64ConvertI64S,
            I::F64Ge,
            I::If(BlockType::Empty),
            // Scale into [1, 10).
            I::Block(BlockType::Empty),
            I::Loop(BlockType::Empty),
            I::LocalGet(XD),
            I::I32Const(10),
            I::F64ConvertI32S,
            I::F64Lt,
            I::BrIf(1),
            I::LocalGet(XD),
            I::I32Const(10),
            I::F64ConvertI32S,
            I::F64Div,
            I::LocalSet(XD),
            I::LocalGet(EXP),
            I::I32Const(1),
            I::I32Add,
            I::LocalSet(EXP),
            I::Br(0),
            I::End,
            I::End,
            // A mantissa that rounds up to 10 moves to the next exponent.
            I::LocalGet(XD),
            I::I32Const(10_i32.pow(FRACTION_DIGITS as u32)),
            I::F64ConvertI32S,
            I::F64Mul,
            I::F64Nearest,
            I::I32Const(10_i32.pow(FRACTION_DIGITS as u32 + 1)),
            I::F64ConvertI32S,
            I::F64Ge,
            I::If(BlockType::Empty),
            I::LocalGet(XD),
            I::I32Const(10),
            I::F64ConvertI32S,
            I::F64Div,
            I::LocalSet(XD),
            I::LocalGet(EXP),
            I::I32Const(1),
            I::I32Add,
            I::LocalSet(EXP),
            I::End,
            I::End,
            // Fixed point with six fractional digits.
            I::LocalGet(XD),
            I::I32Const(10_i32.pow(FRACTION_DIGITS as u32)),
            I::F64ConvertI32S,
            I::F64Mul,
            I::F64Nearest,
            I::I64TruncSatF64U,
            I::LocalTee(TOTAL),
            // No `-0`.
            I::I64Eqz,
            I::If(BlockType::Empty),
            I::I32Const(0),
            I::LocalSet(NEG),
            I::End,
            // Digits are written backwards from the end of the buffer.
            I::I32Const(NUMBER_BUF_LEN),
            I::Call(Routine::Alloc.index()),
            I::LocalTee(BUF),
            I::I32Const(NUMBER_BUF_LEN),
            I::I32Add,
            I::LocalSet(POS),
            // Exponent, written first since the text is built backwards.
            I::LocalGet(EXP),
            I::If(BlockType::Empty),
            I::Loop(BlockType::Empty),
            I::LocalGet(POS),
            I::I32Const(1),
            I::I32Sub,
            I::LocalTee(POS),
            I::LocalGet(EXP),
            I::I32Const(10),
            I::I32RemU,
            I::I32Const(i32::from(b'0')),
            I::I32Add,
            I::I32Store8(memarg(0, 0)),
            I::LocalGet(EXP),
            I::I32Const(10),
            I::I32DivU,
            I::LocalTee(EXP),
            I::BrIf(0),
            I::End,
        ],
    );
    emit_push_byte(&mut f, POS, b'e');
    emit(
        &mut f,
        &[
            I::End,
            I::I32Const(FRACTION_DIGITS),
            I::LocalSet(DIGITS),
            // Strip trailing fractional zeros.
            I::Block(BlockType::Empty),
            I::Loop(BlockType::Empty),
            I::LocalGet(DIGITS),
            I::I32Eqz,
            I::BrIf(1),
            I::LocalGet(TOTAL),
            I::I64Const(10),
            I::I64RemU,
            I::I64Const(0),
            I::I64Ne,
            I::BrIf(1),
            I::LocalGet(TOTAL),
            I::I64Const(10),
            I::I64DivU,
            I::LocalSet(TOTAL),
            I::LocalGet(DIGITS),
            I::I32Const(1),
            I::I32Sub,
            I::LocalSet(DIGITS),
            I::Br(0),
            I::End,
            I::End,
            // Fraction.
            I::LocalGet(DIGITS),
            I::If(BlockType::Empty),
            I::Loop(BlockType::Empty),
        ],
    );
    emit_push_digit(&mut f, POS, TOTAL);
    emit(
        &mut f,
        &[
            I::LocalGet(DIGITS),
            I::I32Const(1),
            I::I32Sub,
            I::LocalTee(DIGITS),
            I::BrIf(0),
            I::End,
        ],
    );
    emit_push_byte(&mut f, POS, b'.');
    emit(&mut f, &[I::End, I::Loop(BlockType::Empty)]);
    // Integer part, at least one digit.
    emit_push_digit(&mut f, POS, TOTAL);
    emit(
        &mut f,
        &[
            I::LocalGet(TOTAL),
            I::I64Const(0),
            I::I64Ne,
            I::BrIf(0),
            I::End,
            I::LocalGet(NEG),
            I::If(BlockType::Empty),
        ],
    );
    emit_push_byte(&mut f, POS, b'-');
    emit(
        &mut f,
        &[
            I::End,
            I::LocalGet(BUF),
            I::I32Const(NUMBER_BUF_LEN),
            I::I32Add,
            I::LocalGet(POS),
            I::I32Sub,
            I::LocalGet(POS),
            I::Call(Routine::CreateString.index()),
            I::End,
        ],
    );
    f
}

/// `write(ptr, len)`. Issues a single `fd_write` to stdout.
fn emit_write() -> Function {
    const PTR: u32 = 0;
    const LEN: u32 = 1;
    let mut f = Function::new_with_locals_types(NO_LOCALS);
    emit(
        &mut f,
        &[
            u32_const(layout::IOVEC_PTR),
            I::LocalGet(PTR),
            store(0),
            u32_const(layout::IOVEC_LEN),
            I::LocalGet(LEN),
            store(0),
            I::I32Const(STDOUT),
            u32_const(layout::IOVEC_PTR),
            I::I32Const(1),
            u32_const(layout::NWRITTEN),
            I::Call(FD_WRITE),
            I::Drop,
            I::End,
        ],
    );
    f
}

/// `print(value)`
fn emit_print() -> Function {
    const V: u32 = 0;
    const S: u32 = 1;
    let mut f = Function::new_with_locals_types([ValType::I32]);
    emit(
        &mut f,
        &[
            I::LocalGet(V),
            I::Call(Routine::ToString.index()),
            I::LocalTee(S),
            load(offset::STRING_DATA),
            I::LocalGet(S),
            load(offset::STRING_LEN),
            I::Call(Routine::Write.index()),
            I::End,
        ],
    );
    f
}

/// Allocates `size` bytes into `ptr` and writes the tag.
fn emit_new_value(f: &mut Function, ptr: u32, size: u32, tag: i32) {
    emit(
        f,
        &[
            u32_const(size),
            I::Call(Routine::Alloc.index()),
            I::LocalTee(ptr),
            I::I32Const(tag),
            store(offset::TAG),
        ],
    );
}

/// Traps unless the value in `local` has the given tag.
fn emit_expect_tag(f: &mut Function, local: u32, tag: i32) {
    emit(
        f,
        &[
            I::LocalGet(local),
            load(offset::TAG),
            I::I32Const(tag),
            I::I32Ne,
            I::If(BlockType::Empty),
            I::Unreachable,
            I::End,
        ],
    );
}

/// Returns the result of `then` if the tag held in `tag_local` matches.
fn emit_if_tag(f: &mut Function, tag_local: u32, tag: i32, then: &[I<'_>]) {
    emit(
        f,
        &[
            I::LocalGet(tag_local),
            I::I32Const(tag),
            I::I32Eq,
            I::If(BlockType::Empty),
        ],
    );
    emit(f, then);
    emit(f, &[I::Return, I::End]);
}

/// Writes the last decimal digit of `total` before `pos` and drops it from
/// `total`.
fn emit_push_digit(f: &mut Function, pos: u32, total: u32) {
    emit(
        f,
        &[
            I::LocalGet(pos),
            I::I32Const(1),
            I::I32Sub,
            I::LocalTee(pos),
            I::LocalGet(total),
            I::I64Const(10),
            I::I64RemU,
            I::I32WrapI64,
            I::I32Const(i32::from(b'0')),
            I::I32Add,
            I::I32Store8(memarg(0, 0)),
            I::LocalGet(total),
            I::I64Const(10),
            I::I64DivU,
            I::LocalSet(total),
        ],
    );
}

fn emit_push_byte(f: &mut Function, pos: u32, byte: u8) {
    emit(
        f,
        &[
            I::LocalGet(pos),
            I::I32Const(1),
            I::I32Sub,
            I::LocalTee(pos),
            I::I32Const(i32::from(byte)),
            I::I32Store8(memarg(0, 0)),
        ],
    );
}

/// Instructions creating a string value for one of the runtime texts.
fn text(text: Text) -> [I<'static>; 3] {
    [
        u32_const(text.len),
        u32_const(text.offset),
        I::Call(Routine::CreateString.index()),
    ]
}

pub(crate) fn emit(f: &mut Function, instructions: &[I<'_>]) {
    for instruction in instructions {
        f.instruction(instruction);
    }
}

fn memory_copy() -> I<'static> {
    I::MemoryCopy {
        src_mem: 0,
        dst_mem: 0,
    }
}

pub(crate) fn memarg(offset: u64, align: u32) -> MemArg {
    MemArg {
        offset,
        align,
        memory_index: 0,
    }
}

pub(crate) fn load(offset: u64) -> I<'static> {
    I::I32Load(memarg(offset, 2))
}

pub(crate) fn store(offset: u64) -> I<'static> {
    I::I32Store(memarg(offset, 2))
}

/// Addresses and sizes are well below `i32::MAX`.
pub(crate) fn u32_const(x: u32) -> I<'static> {
    I::I32Const(x as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_declaration_order() {
        for (i, routine) in Routine::ALL.iter().enumerate() {
            assert_eq!(routine.index() as usize, i + 1);
        }
        assert_eq!(Routine::Alloc.index(), 1);
        assert_eq!(Routine::Print.index(), Routine::ALL.len() as u32);
    }

    #[test]
    fn test_names_are_prefixed_and_unique() {
        let mut names: Vec<_> = Routine::ALL.iter().map(|r| r.name()).collect();
        assert!(names.iter().all(|name| name.starts_with("~rt/")));
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Routine::ALL.len());
    }
}
