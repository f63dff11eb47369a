use wasmtime::{Caller, Engine, Extern, Linker, Module, Store};

use crate::{
    codegen::Options,
    parser, pipeline,
    util::{fmt::tree, intern::Interner},
};

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ResolverProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    TreeError(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    match test {
        Test::ParserProgram(input) => {
            let interner = &mut Interner::with_capacity(128);
            let mut diagnostics = Vec::new();
            let program = parser::parse_program(input, interner, &mut diagnostics);
            let tree = tree::print_program_string(interner, &program);
            let errors = diagnostics.iter().map(ToString::to_string).collect();
            (tree, errors)
        }
        Test::ResolverProgram(input) => {
            let analysis = pipeline::analyze(input);
            let errors = analysis.diagnostics.iter().map(ToString::to_string).collect();
            (analysis.tree(), errors)
        }
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::TreeError(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let program = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tree_error, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeError(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(resolver), $source:expr) => {
        crate::util::test_utils::Test::ResolverProgram($source)
    };
}
pub(crate) use tree_tests;

/// What a module wrote through `fd_write`.
#[derive(Default)]
pub struct Output {
    pub stdout: Vec<u8>,
    pub writes: usize,
}

/// Compiles `src` with the default options, panicking on any error.
#[track_caller]
pub fn compile(src: &str) -> Vec<u8> {
    compile_with(src, &Options::default())
}

#[track_caller]
pub fn compile_with(src: &str, options: &Options) -> Vec<u8> {
    match pipeline::compile(src, options) {
        Ok(bytes) => bytes,
        Err(pipeline::Error::Diagnostics(diagnostics)) => {
            let messages: Vec<_> = diagnostics.iter().map(ToString::to_string).collect();
            panic!("failed to compile {src:?}: {messages:#?}")
        }
        Err(error) => panic!("failed to compile {src:?}: {error}"),
    }
}

/// Compiles and runs `src`, returning what it printed.
#[track_caller]
pub fn run(src: &str) -> String {
    let bytes = compile(src);
    let output = execute(&bytes).unwrap_or_else(|error| panic!("{src:?} trapped: {error:?}"));
    assert_eq!(output.writes, 1, "expected exactly one write");
    String::from_utf8(output.stdout).expect("utf-8 output")
}

/// Instantiates the module with a capturing `fd_write` and runs `_start`.
pub fn execute(bytes: &[u8]) -> wasmtime::Result<Output> {
    let (mut store, instance) = instantiate(bytes)?;
    let start = instance.get_typed_func::<(), ()>(&mut store, "_start")?;
    start.call(&mut store, ())?;
    Ok(store.into_data())
}

pub fn instantiate(bytes: &[u8]) -> wasmtime::Result<(Store<Output>, wasmtime::Instance)> {
    let engine = Engine::default();
    let module = Module::from_binary(&engine, bytes)?;
    let mut linker = Linker::<Output>::new(&engine);
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_write",
        |mut caller: Caller<'_, Output>, fd: i32, iovs: i32, iovs_len: i32, nwritten: i32| -> i32 {
            assert_eq!(fd, 1, "only stdout is written to");
            let Some(Extern::Memory(memory)) = caller.get_export("memory") else {
                return 8;
            };
            let word = |data: &[u8], at: usize| {
                u32::from_le_bytes(data[at..at + 4].try_into().unwrap()) as usize
            };

            let data = memory.data(&caller);
            let mut written = Vec::new();
            for i in 0..iovs_len as usize {
                let iov = iovs as usize + i * 8;
                let (ptr, len) = (word(data, iov), word(data, iov + 4));
                written.extend_from_slice(&data[ptr..ptr + len]);
            }

            let total = written.len() as u32;
            memory.data_mut(&mut caller)[nwritten as usize..nwritten as usize + 4]
                .copy_from_slice(&total.to_le_bytes());
            let output = caller.data_mut();
            output.stdout.extend(written);
            output.writes += 1;
            0
        },
    )?;
    let mut store = Store::new(&engine, Output::default());
    let instance = linker.instantiate(&mut store, &module)?;
    Ok((store, instance))
}
