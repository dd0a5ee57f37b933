use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use samyama_sparql::sparql::algebra::{combine_tables, join};
use samyama_sparql::sparql::SolutionTable;

/// `?DOG ?OWNER` rows, one owner per ten dogs
fn dogs(size: usize) -> SolutionTable {
    SolutionTable::from_rows(
        ["?DOG", "?OWNER"],
        (0..size)
            .map(|i| {
                vec![
                    Some(format!("http://example.org/dog{i}")),
                    Some(format!("http://example.org/owner{}", i / 10)),
                ]
            })
            .collect(),
    )
}

/// `?OWNER ?NAME` rows for every other owner
fn owner_names(size: usize) -> SolutionTable {
    SolutionTable::from_rows(
        ["?OWNER", "?NAME"],
        (0..size / 10)
            .step_by(2)
            .map(|i| {
                vec![
                    Some(format!("http://example.org/owner{i}")),
                    Some(format!("Owner {i}@EN")),
                ]
            })
            .collect(),
    )
}

/// Benchmark hash equi-join throughput
fn bench_inner_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("inner_join");

    for size in [100, 1000, 10_000].iter() {
        let left = dogs(*size);
        let right = owner_names(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let joined = join(&left, &right);
                criterion::black_box(joined.len());
            });
        });
    }
    group.finish();
}

/// Benchmark a union run followed by an optional join
fn bench_union_then_optional(c: &mut Criterion) {
    let mut group = c.benchmark_group("union_then_optional");

    for size in [100, 1000, 10_000].iter() {
        let first = dogs(*size);
        let second = dogs(*size / 2);
        let names = owner_names(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let combined = combine_tables(vec![
                    first.clone(),
                    second.clone().with_flags(false, true),
                    names.clone().with_flags(true, false),
                ]);
                criterion::black_box(combined.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_inner_join, bench_union_then_optional);
criterion_main!(benches);
