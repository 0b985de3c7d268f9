use criterion::{criterion_group, criterion_main, Criterion};
use ml::{
    codegen::CodeGen,
    lexer,
    parser::{self, ParseOptions},
};
use std::hint::black_box;

static INPUT: &str = include_str!("../../samples/big.ml");

fn criterion_benchmark(c: &mut Criterion) {
    let tokens = lexer::lex_in_new(INPUT).unwrap();

    c.bench_function("parse", |b| {
        b.iter(|| {
            let session =
                parser::parse(INPUT, black_box(&tokens), ParseOptions::default()).unwrap();
            black_box(session.exprs.len());
        });
    });

    let session = parser::parse(INPUT, &tokens, ParseOptions::default()).unwrap();
    c.bench_function("generate", |b| {
        b.iter(|| black_box(CodeGen::generate(black_box(&session))));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
