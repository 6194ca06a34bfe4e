use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lazy_loop::{loop_range, Backend, PoolConfig};

/// Benchmarks for Loop evaluation.
///
/// This measures:
/// 1. Stage overhead: a bare `Iterator::map` chain vs. the same chain as a sequential Loop
/// 2. Pooled evaluation: sequential vs. the immediate and threads backends on a CPU-bound stage
///
/// To run these, use:
/// ```bash
/// cargo bench --bench loop_bench
/// ```

const SIZES: [usize; 3] = [1_000, 10_000, 100_000];

/// Cheap CPU-bound work per item.
fn spin(x: usize) -> u64 {
    (0..64u64).fold(x as u64, |acc, i| acc.wrapping_mul(31).wrapping_add(i))
}

/// Measure per-item overhead of the stage pipeline.
fn bench_stage_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("Stage Overhead");

    for &size in &SIZES {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("iterator", size), &size, |b, &size| {
            b.iter(|| {
                let total: usize = (0..size).map(|x| x + 1).filter(|x| x % 3 != 0).sum();
                black_box(total)
            })
        });

        group.bench_with_input(BenchmarkId::new("loop", size), &size, |b, &size| {
            b.iter(|| {
                let total = loop_range(size)
                    .map(|x| x + 1)
                    .filter(|x| x % 3 != 0)
                    .fold(0usize, |acc, x| acc + x)
                    .unwrap();
                black_box(total)
            })
        });
    }
    group.finish();
}

/// Measure pooled evaluation against sequential evaluation.
fn bench_pooled(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pooled Evaluation");

    for &size in &SIZES {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("sequential", size), &size, |b, &size| {
            b.iter(|| {
                let count = loop_range(size).map(spin).iter().unwrap().count();
                black_box(count)
            })
        });

        for (name, backend) in [("immediate", Backend::Immediate), ("threads", Backend::Threads)] {
            let config = PoolConfig::builder()
                .backend(backend)
                .max_workers(4)
                .chunk_size(1_000)
                .build();

            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &size| {
                b.iter(|| {
                    let count = loop_range(size)
                        .map(spin)
                        .concurrently(config.clone())
                        .unwrap()
                        .iter()
                        .unwrap()
                        .count();
                    black_box(count)
                })
            });
        }
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(2))
        .measurement_time(std::time::Duration::from_secs(5))
        .sample_size(30);
    targets = bench_stage_overhead, bench_pooled
);
criterion_main!(benches);
