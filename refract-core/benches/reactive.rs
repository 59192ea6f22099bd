//! Benchmarks for refract-core
//!
//! Run with: cargo bench

use std::cell::Cell as Flag;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use refract_core::{Computed, Runtime};

// =============================================================================
// CELL BENCHMARKS
// =============================================================================

fn bench_cell_create(c: &mut Criterion) {
    let rt = Runtime::new();
    c.bench_function("cell_create", |b| b.iter(|| black_box(rt.create_cell(0i32))));
}

fn bench_cell_read(c: &mut Criterion) {
    let rt = Runtime::new();
    let cell = rt.create_cell(42i32);
    c.bench_function("cell_read", |b| b.iter(|| black_box(cell.read())));
}

fn bench_cell_write(c: &mut Criterion) {
    let rt = Runtime::new();
    let cell = rt.create_cell(0i32);
    let mut next = 0;
    c.bench_function("cell_write", |b| {
        b.iter(|| {
            next += 1;
            cell.write(black_box(next))
        })
    });
}

fn bench_cell_write_same_value(c: &mut Criterion) {
    let rt = Runtime::new();
    let cell = rt.create_cell(42i32);
    c.bench_function("cell_write_same_value", |b| b.iter(|| cell.write(black_box(42))));
}

// =============================================================================
// COMPUTED BENCHMARKS
// =============================================================================

fn bench_computed_read_cached(c: &mut Criterion) {
    let rt = Runtime::new();
    let cell = rt.create_cell(42i32);
    let doubled = rt.create_computed({
        let cell = cell.clone();
        move || Ok(cell.read() * 2)
    });
    let _ = doubled.read();

    c.bench_function("computed_read_cached", |b| b.iter(|| black_box(doubled.read())));
}

fn bench_computed_read_dirty(c: &mut Criterion) {
    let rt = Runtime::new();
    let cell = rt.create_cell(0i32);
    let doubled = rt.create_computed({
        let cell = cell.clone();
        move || Ok(cell.read() * 2)
    });
    let mut next = 0;

    c.bench_function("computed_read_dirty", |b| {
        b.iter(|| {
            next += 1;
            cell.write(next);
            black_box(doubled.read())
        })
    });
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");

    for depth in [1usize, 10, 100] {
        let rt = Runtime::new();
        let source = rt.create_cell(0i64);
        let mut chain: Vec<Computed<i64>> = Vec::with_capacity(depth);
        for _ in 0..depth {
            let previous = chain.last().cloned();
            let source = source.clone();
            chain.push(rt.create_computed(move || match &previous {
                Some(previous) => Ok(previous.read()? + 1),
                None => Ok(source.read() + 1),
            }));
        }
        let tail = chain.last().cloned();
        let mut next = 0;

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                next += 1;
                source.write(next);
                black_box(tail.as_ref().map(|tail| tail.read()))
            })
        });
    }

    group.finish();
}

// =============================================================================
// REACTION BENCHMARKS
// =============================================================================

fn bench_reaction_notify(c: &mut Criterion) {
    let rt = Runtime::new();
    let cell = rt.create_cell(0i32);
    let calls = Rc::new(Flag::new(0u64));
    let _reaction = {
        let calls = Rc::clone(&calls);
        cell.on_invalidate(move || calls.set(calls.get() + 1))
    };
    let mut next = 0;

    c.bench_function("reaction_notify", |b| {
        b.iter(|| {
            next += 1;
            cell.write(next)
        })
    });
    black_box(calls.get());
}

fn bench_batched_writes(c: &mut Criterion) {
    let rt = Runtime::new();
    let cells: Vec<_> = (0..10).map(|i| rt.create_cell(i)).collect();
    let view = rt.on_invalidate(|| {});
    let mut next = 0;

    c.bench_function("batched_writes_10", |b| {
        b.iter(|| {
            let _ = view.track(|| cells.iter().map(|c| c.read()).sum::<i32>());
            next += 1;
            rt.batch(|| {
                for cell in &cells {
                    cell.write(next);
                }
            })
        })
    });
}

// =============================================================================
// STRESS BENCHMARKS
// =============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for width in [10usize, 100, 1000] {
        let rt = Runtime::new();
        let source = rt.create_cell(0i32);
        let readers: Vec<Computed<i32>> = (0..width)
            .map(|i| {
                let source = source.clone();
                rt.create_computed(move || Ok(source.read() + i as i32))
            })
            .collect();
        let mut next = 0;

        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| {
                next += 1;
                source.write(next);
                for reader in &readers {
                    black_box(reader.read().ok());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    cell_benches,
    bench_cell_create,
    bench_cell_read,
    bench_cell_write,
    bench_cell_write_same_value,
);

criterion_group!(
    computed_benches,
    bench_computed_read_cached,
    bench_computed_read_dirty,
    bench_computed_chain,
);

criterion_group!(reaction_benches, bench_reaction_notify, bench_batched_writes);

criterion_group!(stress_benches, bench_fan_out);

criterion_main!(cell_benches, computed_benches, reaction_benches, stress_benches);
