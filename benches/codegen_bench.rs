//! Benchmark for parsing and lowering with both backends.

use std::hint::black_box;

use bsc::modules::ModuleLinker;
use bsc::parser::parse;
use bsc::ssa_backend;
use bsc::NativeGenerator;
use criterion::{criterion_group, criterion_main, Criterion};

const FIB: &str = "fn fib(n: int32): int32 {
    if (n < 2) { return n; }
    return fib(n - 1) + fib(n - 2);
}
exit(fib(9));";

const LOOPS: &str = "var s = 0;
for (var i = 0; i < 100; i += 1) {
    var j = 0;
    while (j < i) {
        if (j % 3 == 0) { s += j; } else { s -= 1; }
        j += 1;
    }
}
exit(s);";

fn benchmark_parse(c: &mut Criterion) {
    c.bench_function("parse loops", |b| {
        b.iter(|| black_box(parse(black_box(LOOPS), "loops.bs").unwrap()))
    });
}

fn benchmark_native(c: &mut Criterion) {
    for (name, source) in [("fib", FIB), ("loops", LOOPS)] {
        let program = parse(source, "bench.bs").unwrap();
        c.bench_function(&format!("native {}", name), |b| {
            b.iter(|| black_box(NativeGenerator::new("bench.bs").compile(&program).unwrap()))
        });
    }
}

fn benchmark_ssa(c: &mut Criterion) {
    for (name, source) in [("fib", FIB), ("loops", LOOPS)] {
        let program = parse(source, "bench.bs").unwrap();
        c.bench_function(&format!("ssa {}", name), |b| {
            b.iter(|| {
                let mut linker = ModuleLinker::default();
                let ir = ssa_backend::compile(&program, &mut linker).unwrap();
                black_box(ir.to_string())
            })
        });
    }
}

criterion_group!(benches, benchmark_parse, benchmark_native, benchmark_ssa);
criterion_main!(benches);
