//! Throughput benchmarks: TreiberStack vs MichaelScottQueue vs FaaArrayQueue

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kalkan_queue::ConcurrentContainer;
use kalkan_queue::blocking::BlockingQueue;
use kalkan_queue::faa_array_queue::FaaArrayQueue;
use kalkan_queue::ms_queue::MichaelScottQueue;
use kalkan_queue::treiber_stack::TreiberStack;
use std::sync::Arc;
use std::thread;

fn pairs<C: ConcurrentContainer<usize>>(container: &C, ops: usize) {
    for i in 0..ops {
        container.push(i);
        black_box(container.pop());
    }
}

fn mpmc<C>(container: Arc<C>, threads: usize, ops_per_thread: usize)
where
    C: ConcurrentContainer<usize> + Send + Sync + 'static,
{
    let handles: Vec<_> = (0..threads)
        .map(|tid| {
            let container = container.clone();
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    container.push(tid * ops_per_thread + i);
                    black_box(container.pop());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop_single");
    let ops = 1000;
    group.throughput(Throughput::Elements((ops * 2) as u64));

    let stack = TreiberStack::new();
    group.bench_function("treiber_stack", |b| b.iter(|| pairs(&stack, ops)));

    let ms = MichaelScottQueue::new();
    group.bench_function("ms_queue", |b| b.iter(|| pairs(&ms, ops)));

    let faa = FaaArrayQueue::new();
    group.bench_function("faa_array_queue", |b| b.iter(|| pairs(&faa, ops)));

    group.finish();
}

fn bench_mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop_mpmc");
    group.sample_size(20);

    for threads in [2, 4, 8].iter() {
        let ops_per_thread = 5000;
        group.throughput(Throughput::Elements((threads * ops_per_thread * 2) as u64));

        group.bench_with_input(
            BenchmarkId::new("treiber_stack", threads),
            threads,
            |b, &num_threads| {
                b.iter(|| mpmc(Arc::new(TreiberStack::new()), num_threads, ops_per_thread));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("ms_queue", threads),
            threads,
            |b, &num_threads| {
                b.iter(|| mpmc(Arc::new(MichaelScottQueue::new()), num_threads, ops_per_thread));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("faa_array_queue", threads),
            threads,
            |b, &num_threads| {
                b.iter(|| mpmc(Arc::new(FaaArrayQueue::new()), num_threads, ops_per_thread));
            },
        );
    }

    group.finish();
}

fn bench_segment_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("faa_segment_capacity");
    group.sample_size(20);

    for capacity in [16, 256, 4096].iter() {
        let ops_per_thread = 5000;
        group.throughput(Throughput::Elements((4 * ops_per_thread * 2) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            capacity,
            |b, &capacity| {
                b.iter(|| {
                    mpmc(
                        Arc::new(FaaArrayQueue::with_segment_capacity(capacity)),
                        4,
                        ops_per_thread,
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_blocking_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_handoff");
    group.sample_size(20);
    let values = 10_000;
    group.throughput(Throughput::Elements(values as u64));

    group.bench_function("faa_array_queue", |b| {
        b.iter(|| {
            let queue: Arc<BlockingQueue<usize>> = Arc::new(BlockingQueue::new());
            let consumer = {
                let queue = queue.clone();
                thread::spawn(move || (0..values).filter_map(|_| queue.pop()).sum::<usize>())
            };
            for i in 0..values {
                queue.push(i);
            }
            black_box(consumer.join().unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_thread,
    bench_mpmc,
    bench_segment_capacity,
    bench_blocking_handoff
);
criterion_main!(benches);
