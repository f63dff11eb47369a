use criterion::{criterion_group, criterion_main, Criterion};
use queso::{diagnostic::Diagnostic, parser::parse_program, util::intern::Interner};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/conditionals.queso");

fn parser(input: &str, interner: &mut Interner<str>, diagnostics: &mut Vec<Diagnostic>) {
    let program = parse_program(input, interner, diagnostics);
    _ = black_box(program);
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut interner = Interner::with_capacity(128);
    let mut diagnostics = Vec::new();

    c.bench_function("parser", |b| {
        b.iter(|| {
            diagnostics.clear();
            black_box(parser(black_box(INPUT), &mut interner, &mut diagnostics));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
