//! Benchmarks for the pattern matcher in isolation
//!
//! Rules and evaluation are left out: every case calls `match_pattern`
//! directly on prebuilt subjects, so the numbers reflect the backtracking
//! search itself (slot enumeration, orderless assignment, Flat grouping).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pmath_core::backend::*;

struct Fixture {
    kernel: Kernel,
    ctx: ThreadContext,
}

impl Fixture {
    fn new() -> Self {
        let kernel = Kernel::new_default();
        let ctx = kernel.root_context();
        Fixture { kernel, ctx }
    }

    fn sym(&self, name: &str) -> Symbol {
        self.kernel.symbol(name)
    }

    fn ints(&self, head: &Symbol, n: i64) -> Object {
        Object::call(head, (0..n).map(Object::Integer))
    }
}

/// Pattern: x_
fn bench_simple_blank(c: &mut Criterion) {
    let fx = Fixture::new();
    let sys = fx.kernel.system();
    let pattern = sys.named_blank(&fx.sym("x"));
    let value = Object::Integer(42);

    c.bench_function("simple_blank", |b| {
        b.iter(|| match_pattern(&fx.ctx, black_box(&value), black_box(&pattern)))
    });
}

/// Pattern: f(x_, x_) against f(e, e) with a nested `e`
fn bench_repeated_name(c: &mut Criterion) {
    let fx = Fixture::new();
    let sys = fx.kernel.system();
    let (f, g, x) = (fx.sym("f"), fx.sym("g"), fx.sym("x"));
    let nested = Object::call(&g, vec![Object::from("a"), fx.ints(&g, 8)]);
    let pattern = Object::call(&f, vec![sys.named_blank(&x), sys.named_blank(&x)]);
    let value = Object::call(&f, vec![nested.clone(), nested]);

    c.bench_function("repeated_name", |b| {
        b.iter(|| match_pattern(&fx.ctx, black_box(&value), black_box(&pattern)))
    });
}

/// Pattern: f(x__, y__, 0) over growing argument counts; worst case for
/// sequence slot enumeration because the literal sits at the end.
fn bench_sequence_split(c: &mut Criterion) {
    let fx = Fixture::new();
    let sys = fx.kernel.system();
    let (f, x, y) = (fx.sym("f"), fx.sym("x"), fx.sym("y"));
    let pattern = Object::call(
        &f,
        vec![sys.named_blank_sequence(&x), sys.named_blank_sequence(&y), Object::Integer(-1)],
    );

    let mut group = c.benchmark_group("sequence_split");
    for n in [4i64, 16, 64] {
        let value = fx.ints(&f, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &value, |b, value| {
            b.iter(|| match_pattern(&fx.ctx, black_box(value), black_box(&pattern)))
        });
    }
    group.finish();
}

/// Pattern: h(_String, x_Integer, ___) with Orderless `h`; the typed blanks
/// must be assigned to scattered positions.
fn bench_orderless(c: &mut Criterion) {
    let fx = Fixture::new();
    let sys = fx.kernel.system();
    let (h, x) = (fx.sym("h"), fx.sym("x"));
    h.set_attributes(Attributes::ORDERLESS).expect("attributes");
    let pattern = Object::call(
        &h,
        vec![sys.blank_of(&sys.string), sys.named_blank_of(&x, &sys.integer), sys.blank_null_sequence()],
    );

    let mut group = c.benchmark_group("orderless");
    for n in [4usize, 8, 16] {
        let mut args: Vec<Object> = (0..n).map(|i| Object::from(&fx.sym(&format!("s{}", i)))).collect();
        args.push(Object::from("tag"));
        args.push(Object::Integer(1));
        let value = Object::call(&h, args);
        group.bench_with_input(BenchmarkId::from_parameter(n), &value, |b, value| {
            b.iter(|| match_pattern(&fx.ctx, black_box(value), black_box(&pattern)))
        });
    }
    group.finish();
}

/// Pattern: f(x_, y_) with Flat `f`; y takes the remaining arguments as a group.
fn bench_flat(c: &mut Criterion) {
    let fx = Fixture::new();
    let sys = fx.kernel.system();
    let (f, x, y) = (fx.sym("f"), fx.sym("x"), fx.sym("y"));
    f.set_attributes(Attributes::FLAT).expect("attributes");
    let pattern = Object::call(&f, vec![sys.named_blank(&x), sys.named_blank_of(&y, &sys.integer)]);
    let value = fx.ints(&f, 12);

    c.bench_function("flat_grouping", |b| {
        b.iter(|| match_pattern(&fx.ctx, black_box(&value), black_box(&pattern)))
    });
}

fn bench_failures(c: &mut Criterion) {
    let fx = Fixture::new();
    let sys = fx.kernel.system();
    let (f, g) = (fx.sym("f"), fx.sym("g"));
    let mut group = c.benchmark_group("failures");

    let pattern = Object::call(&f, vec![sys.blank_of(&sys.string)]);
    let value = Object::call(&f, vec![Object::Integer(1)]);
    group.bench_function("type_mismatch", |b| {
        b.iter(|| match_pattern(&fx.ctx, black_box(&value), black_box(&pattern)))
    });

    let pattern = Object::call(&f, vec![sys.blank(), sys.blank()]);
    let value = fx.ints(&f, 3);
    group.bench_function("arity_mismatch", |b| {
        b.iter(|| match_pattern(&fx.ctx, black_box(&value), black_box(&pattern)))
    });

    let pattern = Object::call(&g, vec![sys.blank_null_sequence()]);
    group.bench_function("head_mismatch", |b| {
        b.iter(|| match_pattern(&fx.ctx, black_box(&value), black_box(&pattern)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_simple_blank,
    bench_repeated_name,
    bench_sequence_split,
    bench_orderless,
    bench_flat,
    bench_failures,
);

criterion_main!(benches);
