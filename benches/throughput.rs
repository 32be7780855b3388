//! Throughput benchmarks for identifier allocation and its building blocks.
//!
//! Run with:
//!     cargo bench --bench throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sbf_ids::{shape_for, AllocatorBuilder, HashSeedTable, RangePermutation, StableFilter};

/// Operations executed per criterion iteration (hot-loop size).
const OPS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Group 1: allocator_next
// ---------------------------------------------------------------------------
// Range size drives both the permutation compaction cost and the filter size.

fn bench_allocator_next(c: &mut Criterion) {
    HashSeedTable::init();
    let mut group = c.benchmark_group("allocator_next");
    group.throughput(Throughput::Elements(OPS));

    for &len in &[1_024u32, 16_384, 65_536] {
        let mut ids = AllocatorBuilder::new().range(0..len).build().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                for _ in 0..OPS {
                    black_box(ids.next().ok());
                }
            })
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 2: filter
// ---------------------------------------------------------------------------

fn bench_filter(c: &mut Criterion) {
    let seeds = HashSeedTable::global();
    let mut group = c.benchmark_group("filter");
    group.throughput(Throughput::Elements(OPS));

    for &reset in &[2u8, 255] {
        let mut filter = StableFilter::new(shape_for(16_384, Some(reset)).unwrap());
        group.bench_with_input(BenchmarkId::new("insert", reset), &reset, |b, _| {
            let mut v: u16 = 0;
            b.iter(|| {
                for _ in 0..OPS {
                    filter.insert(black_box(&seeds.seeds_for(v)));
                    v = v.wrapping_add(1);
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("might_contain", reset), &reset, |b, _| {
            b.iter(|| {
                for i in 0..OPS {
                    black_box(filter.might_contain(black_box(&seeds.seeds_for(i as u16))));
                }
            })
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 3: permutation_draw
// ---------------------------------------------------------------------------

fn bench_permutation_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("permutation_draw");
    group.throughput(Throughput::Elements(OPS));

    for &len in &[1_024u32, 65_536] {
        let mut perm = RangePermutation::new(0..len).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                for _ in 0..OPS {
                    black_box(perm.draw());
                }
            })
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------

criterion_group!(benches, bench_allocator_next, bench_filter, bench_permutation_draw);
criterion_main!(benches);
