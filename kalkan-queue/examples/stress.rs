//! Multi-producer/multi-consumer stress driver for every collection.
//!
//! Run with `cargo run --release --example stress`.

use kalkan_queue::ConcurrentContainer;
use kalkan_queue::blocking::BlockingQueue;
use kalkan_queue::faa_array_queue::FaaArrayQueue;
use kalkan_queue::ms_queue::MichaelScottQueue;
use kalkan_queue::treiber_stack::TreiberStack;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

const PRODUCERS: usize = 8;
const CONSUMERS: usize = 8;
const PER_PRODUCER: usize = 100_000;
const TOTAL: usize = PRODUCERS * PER_PRODUCER;

/// One flag per value; flipping a flag twice means a duplicate pop.
struct Tally {
    seen: Vec<AtomicBool>,
    count: AtomicUsize,
}

impl Tally {
    fn new() -> Self {
        Self {
            seen: (0..TOTAL).map(|_| AtomicBool::new(false)).collect(),
            count: AtomicUsize::new(0),
        }
    }

    fn record(&self, value: usize) {
        let duplicate = self.seen[value].swap(true, Ordering::Relaxed);
        assert!(!duplicate, "value {value} popped twice");
        self.count.fetch_add(1, Ordering::Release);
    }

    fn done(&self) -> bool {
        self.count.load(Ordering::Acquire) == TOTAL
    }

    fn verify(&self) {
        assert!(self.seen.iter().all(|s| s.load(Ordering::Relaxed)));
    }
}

fn run<C>(name: &str, container: C)
where
    C: ConcurrentContainer<usize> + Send + Sync + 'static,
{
    let container = Arc::new(container);
    let tally = Arc::new(Tally::new());
    let start = Instant::now();
    let mut handles = vec![];

    for p in 0..PRODUCERS {
        let container = container.clone();
        handles.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                container.push(p * PER_PRODUCER + i);
            }
        }));
    }

    for _ in 0..CONSUMERS {
        let container = container.clone();
        let tally = tally.clone();
        handles.push(thread::spawn(move || {
            while !tally.done() {
                match container.pop() {
                    Some(v) => tally.record(v),
                    None => thread::yield_now(),
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    tally.verify();

    let elapsed = start.elapsed();
    let ops_per_sec = (2 * TOTAL) as f64 / elapsed.as_secs_f64();
    println!("{name:<20} {TOTAL} values in {elapsed:?} ({ops_per_sec:.0} ops/sec)");
}

fn run_blocking() {
    let queue: Arc<BlockingQueue<usize>> = Arc::new(BlockingQueue::new());
    let tally = Arc::new(Tally::new());
    let start = Instant::now();
    let mut handles = vec![];

    // Consumers start first and block on the empty queue
    for _ in 0..CONSUMERS {
        let queue = queue.clone();
        let tally = tally.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..TOTAL / CONSUMERS {
                // A permit bounds the elements, it does not reserve one
                let value = match queue.pop() {
                    Some(v) => v,
                    None => loop {
                        if let Some(v) = queue.container().pop() {
                            break v;
                        }
                        thread::yield_now();
                    },
                };
                tally.record(value);
            }
        }));
    }

    for p in 0..PRODUCERS {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                queue.push(p * PER_PRODUCER + i);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    tally.verify();

    println!("{:<20} {TOTAL} values in {:?}", "BlockingQueue", start.elapsed());
}

fn main() {
    println!("Kalkan queue stress test");
    println!("========================");
    println!("{PRODUCERS} producers, {CONSUMERS} consumers, {PER_PRODUCER} values each\n");

    run("TreiberStack", TreiberStack::new());
    run("MichaelScottQueue", MichaelScottQueue::new());
    run("FaaArrayQueue", FaaArrayQueue::new());
    run("FaaArrayQueue(64)", FaaArrayQueue::with_segment_capacity(64));
    run_blocking();

    println!("\nNo lost or duplicated values.");
}
