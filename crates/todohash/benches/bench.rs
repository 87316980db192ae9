use core::{hint::black_box, time::Duration};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use todohash::{Record, Scope, Strategy, WorkUnit, aggregate};
use tokio::runtime::Builder;

fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let id = i32::try_from(i).unwrap_or(i32::MAX);
            Record::new(id % 97, format!("record {i}")).with_id(id + 1)
        })
        .collect()
}

/// Compares allocation and synchronization overhead of every aggregation
/// strategy. The simulated delay is zero so the collection cost dominates.
fn bench_strategies(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for n in [100_usize, 1_000, 10_000, 100_000] {
        let mut group = c.benchmark_group(format!("aggregate/{n}"));
        group.throughput(Throughput::Elements(n as u64));
        group.sample_size(20);

        for strategy in Strategy::ALL {
            group.bench_with_input(BenchmarkId::from_parameter(strategy), &strategy, |b, &strategy| {
                b.to_async(&rt).iter_batched(
                    || records(n),
                    |inputs| async move {
                        let hashed = aggregate(&Scope::new(), strategy, inputs, |scope, record| {
                            WorkUnit::new(record, Duration::ZERO).run(scope)
                        })
                        .await
                        .unwrap();
                        black_box(hashed)
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }

        group.finish();
    }
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
