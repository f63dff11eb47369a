use criterion::{criterion_group, criterion_main, Criterion};
use queso::{codegen::Options, pipeline};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/currying.queso");

fn criterion_benchmark(c: &mut Criterion) {
    let options = Options::default();

    c.bench_function("analyze", |b| {
        b.iter(|| black_box(pipeline::analyze(black_box(INPUT))))
    });
    c.bench_function("compile", |b| {
        b.iter(|| black_box(pipeline::compile(black_box(INPUT), &options).ok()))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
