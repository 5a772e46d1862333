use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fifo_pool::{join_handles, Config as PoolConfig, ThreadPool};
use std::{
    hint::black_box,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

// Benchmark 1: submit + drain
fn bench_submit_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_drain");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        for workers in [1, 4, num_cpus::get()] {
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{}", workers), size),
                &size,
                |b, &size| {
                    b.iter(|| {
                        let pool = ThreadPool::with_config(PoolConfig::default().with_threads(workers))
                            .unwrap();
                        let counter = Arc::new(AtomicUsize::new(0));
                        for i in 0..size {
                            let counter = Arc::clone(&counter);
                            pool.submit(move || {
                                counter.fetch_add(black_box(i) & 1, Ordering::Relaxed);
                            });
                        }
                        pool.stop();
                        pool.join();
                        black_box(counter.load(Ordering::Relaxed));
                    });
                },
            );
        }
    }

    group.finish();
}

// Benchmark 2: handles, blocking vs async
fn bench_handles(c: &mut Criterion) {
    let mut group = c.benchmark_group("handles");
    let pool = ThreadPool::with_config(PoolConfig::cpu_bound()).unwrap();

    for size in [100, 1000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("blocking_join", size), &size, |b, &size| {
            b.iter(|| {
                let handles: Vec<_> = (0..size)
                    .map(|i| pool.spawn_with_handle(move || black_box(i)).unwrap())
                    .collect();
                for handle in handles {
                    black_box(handle.join().unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("await", size), &size, |b, &size| {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let pool = &pool;
            b.to_async(&rt).iter(|| async move {
                let handles: Vec<_> = (0..size)
                    .map(|i| pool.spawn_with_handle(move || black_box(i)).unwrap())
                    .collect();
                black_box(join_handles(handles).await);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_submit_drain, bench_handles);
criterion_main!(benches);
