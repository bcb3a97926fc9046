use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use wfqueue_rs::{Config, OpaqueWord, WfQueue};

fn main() {
    println!("wfqueue-rs Basic Example");
    println!("========================\n");

    const N_PRODUCERS: usize = 4;
    const N_CONSUMERS: usize = 4;
    const ITEMS_PER_PRODUCER: usize = 1_000_000;
    const TOTAL_ITEMS: u64 = (N_PRODUCERS * ITEMS_PER_PRODUCER) as u64;

    let config = Config::new(N_PRODUCERS + N_CONSUMERS, true).unwrap();
    let queue = Arc::new(WfQueue::new(config).unwrap());

    println!("Configuration:");
    println!("  Producers: {N_PRODUCERS}");
    println!("  Consumers: {N_CONSUMERS}");
    println!("  Items per producer: {ITEMS_PER_PRODUCER}");
    println!("  Total items: {TOTAL_ITEMS}\n");

    let start = Instant::now();

    let mut producer_handles = vec![];
    for id in 0..N_PRODUCERS {
        let q = Arc::clone(&queue);
        producer_handles.push(thread::spawn(move || {
            for i in 0..ITEMS_PER_PRODUCER {
                let value = id * ITEMS_PER_PRODUCER + i + 1;
                q.enqueue(id, OpaqueWord::new(value).unwrap()).unwrap();
            }
            println!("Producer {id} finished");
        }));
    }

    let remaining = Arc::new(AtomicU64::new(TOTAL_ITEMS));
    let mut consumer_handles = vec![];
    for c in 0..N_CONSUMERS {
        let q = Arc::clone(&queue);
        let remaining = Arc::clone(&remaining);
        let thread_id = N_PRODUCERS + c;
        consumer_handles.push(thread::spawn(move || {
            let mut count = 0u64;
            let mut sum = 0u64;
            while remaining.load(Ordering::Relaxed) > 0 {
                match q.dequeue(thread_id).unwrap() {
                    Some(v) => {
                        sum += v.get() as u64;
                        count += 1;
                        remaining.fetch_sub(1, Ordering::Relaxed);
                    }
                    None => thread::yield_now(),
                }
            }
            (count, sum)
        }));
    }

    for handle in producer_handles {
        handle.join().unwrap();
    }

    let mut total = 0u64;
    let mut sum = 0u64;
    for handle in consumer_handles {
        let (count, s) = handle.join().unwrap();
        total += count;
        sum += s;
    }

    let duration = start.elapsed();

    println!("\nResults:");
    println!("  Items consumed: {total}");
    println!("  Sum: {sum}");
    println!("  Duration: {duration:.2?}");
    println!(
        "  Throughput: {:.2} million items/sec",
        total as f64 / duration.as_secs_f64() / 1_000_000.0
    );

    let snapshot = queue.metrics();
    println!("\nMetrics:");
    println!("  Fast enqueues: {}", snapshot.fast_enqueues);
    println!("  Slow enqueues: {}", snapshot.slow_enqueues);
    println!("  Fast dequeues: {}", snapshot.fast_dequeues);
    println!("  Slow dequeues: {}", snapshot.slow_dequeues);
    println!("  Empty dequeues: {}", snapshot.empty_dequeues);
    println!("  Segments allocated: {}", snapshot.segments_allocated);
    println!("  Segments reclaimed: {}", snapshot.segments_reclaimed);
}
