use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use wfqueue_rs::{Config, OpaqueWord, WfQueue};

fn queue(max_threads: usize) -> WfQueue {
    WfQueue::new(Config::new(max_threads, false).unwrap()).unwrap()
}

fn word(v: usize) -> OpaqueWord {
    OpaqueWord::new(v).unwrap()
}

/// S1: single thread, 10 000 sequential enqueues then dequeues, plus one more.
#[test]
fn single_thread_drains_in_order_then_reports_empty() {
    let q = queue(1);

    for v in 0..10_000usize {
        q.enqueue(0, word(v)).unwrap();
    }

    for v in 0..10_000usize {
        assert_eq!(q.dequeue(0).unwrap().unwrap().get(), v);
    }

    assert!(q.dequeue(0).unwrap().is_none());
}

/// S2: 8 producers, 8 consumers, conservation checked via checksum.
#[test]
fn eight_producers_eight_consumers_conserve_sum() {
    const PRODUCERS: usize = 8;
    const CONSUMERS: usize = 8;
    const ITEMS_PER_PRODUCER: usize = 10_000;
    const TOTAL: usize = PRODUCERS * ITEMS_PER_PRODUCER;

    let q = Arc::new(queue(PRODUCERS + CONSUMERS));
    let mut handles = Vec::new();

    for p in 0..PRODUCERS {
        let q = Arc::clone(&q);
        handles.push(thread::spawn(move || {
            for i in 0..ITEMS_PER_PRODUCER {
                q.enqueue(p, word(i + 1)).unwrap();
            }
        }));
    }

    let remaining = Arc::new(AtomicUsize::new(TOTAL));
    let sum = Arc::new(std::sync::atomic::AtomicU64::new(0));

    for c in 0..CONSUMERS {
        let q = Arc::clone(&q);
        let remaining = Arc::clone(&remaining);
        let sum = Arc::clone(&sum);
        handles.push(thread::spawn(move || {
            while remaining.load(Ordering::Relaxed) > 0 {
                if let Some(v) = q.dequeue(PRODUCERS + c).unwrap() {
                    sum.fetch_add(v.get() as u64, Ordering::Relaxed);
                    remaining.fetch_sub(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let expected: u64 = PRODUCERS as u64 * (ITEMS_PER_PRODUCER as u64 * (ITEMS_PER_PRODUCER as u64 + 1) / 2);
    assert_eq!(sum.load(Ordering::Relaxed), expected);

    assert!(q.dequeue(0).unwrap().is_none());
}

/// S3: two handles, strict FIFO between a single producer and single consumer.
#[test]
fn two_handle_fifo_order_preserved() {
    let q = queue(2);
    q.enqueue(0, word(0xA)).unwrap();
    q.enqueue(0, word(0xB)).unwrap();

    assert_eq!(q.dequeue(1).unwrap().unwrap().get(), 0xA);
    assert_eq!(q.dequeue(1).unwrap().unwrap().get(), 0xB);
}

/// S4: enough volume to cross several segments; checks conservation,
/// no-duplication, and that reclamation actually advanced the head.
#[test]
fn crosses_segments_and_reclaims() {
    use wfqueue_rs::NODE_SIZE;

    const PRODUCERS: usize = 2;
    const CONSUMERS: usize = 2;
    const ITEMS_PER_PRODUCER: usize = NODE_SIZE * 6;
    const TOTAL: usize = PRODUCERS * ITEMS_PER_PRODUCER;

    let q = Arc::new(queue(PRODUCERS + CONSUMERS));
    let mut handles = Vec::new();

    for p in 0..PRODUCERS {
        let q = Arc::clone(&q);
        handles.push(thread::spawn(move || {
            for i in 0..ITEMS_PER_PRODUCER {
                q.enqueue(p, word(p * ITEMS_PER_PRODUCER + i + 1)).unwrap();
            }
        }));
    }

    let remaining = Arc::new(AtomicUsize::new(TOTAL));
    let seen = Arc::new(std::sync::Mutex::new(Vec::with_capacity(TOTAL)));

    for c in 0..CONSUMERS {
        let q = Arc::clone(&q);
        let remaining = Arc::clone(&remaining);
        let seen = Arc::clone(&seen);
        handles.push(thread::spawn(move || {
            let mut local = Vec::new();
            while remaining.load(Ordering::Relaxed) > 0 {
                if let Some(v) = q.dequeue(PRODUCERS + c).unwrap() {
                    local.push(v.get());
                    remaining.fetch_sub(1, Ordering::Relaxed);
                }
            }
            seen.lock().unwrap().extend(local);
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let mut got = seen.lock().unwrap().clone();
    got.sort_unstable();
    let expected: Vec<usize> = (1..=TOTAL).collect();
    assert_eq!(got, expected, "conservation and no-duplication must hold");
}

#[test]
fn metrics_track_fast_and_slow_paths_when_enabled() {
    let q = WfQueue::new(Config::new(2, true).unwrap()).unwrap();

    q.enqueue(0, word(1)).unwrap();
    q.enqueue(0, word(2)).unwrap();
    q.dequeue(1).unwrap();
    q.dequeue(1).unwrap();
    assert!(q.dequeue(1).unwrap().is_none());

    let snapshot = q.metrics();
    assert_eq!(snapshot.fast_enqueues + snapshot.slow_enqueues, 2);
    assert_eq!(snapshot.fast_dequeues + snapshot.slow_dequeues, 2);
    assert_eq!(snapshot.empty_dequeues, 1);
}

/// S5: every consumer dequeues from an untouched queue; all see EMPTY.
#[test]
fn all_consumers_see_empty_when_nothing_enqueued() {
    const CONSUMERS: usize = 8;
    let q = Arc::new(queue(CONSUMERS));
    let mut handles = Vec::new();

    for c in 0..CONSUMERS {
        let q = Arc::clone(&q);
        handles.push(thread::spawn(move || q.dequeue(c).unwrap().is_none()));
    }

    for h in handles {
        assert!(h.join().unwrap());
    }
}

/// S6: interleaved single producer/consumer; a dequeue in between two
/// enqueues observes an empty queue.
#[test]
fn interleaved_empty_observed_between_enqueues() {
    let q = queue(2);

    q.enqueue(0, word(0x58)).unwrap(); // "X"
    assert_eq!(q.dequeue(1).unwrap().unwrap().get(), 0x58);
    assert!(q.dequeue(1).unwrap().is_none());
    q.enqueue(0, word(0x59)).unwrap(); // "Y"
    assert_eq!(q.dequeue(1).unwrap().unwrap().get(), 0x59);
}

#[test]
fn fifo_per_producer_holds_under_contention() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const ITEMS_PER_PRODUCER: usize = 20_000;

    // Encode (producer_id, sequence) into one word: producer in the high
    // bits, 1-based sequence in the low bits, so a single consumer-local
    // history can assert per-producer monotonicity without extra state.
    let encode = |p: usize, i: usize| word((p << 32) | (i + 1));

    let q = Arc::new(queue(PRODUCERS + CONSUMERS));
    let mut handles = Vec::new();

    for p in 0..PRODUCERS {
        let q = Arc::clone(&q);
        handles.push(thread::spawn(move || {
            for i in 0..ITEMS_PER_PRODUCER {
                q.enqueue(p, encode(p, i)).unwrap();
            }
        }));
    }

    let remaining = Arc::new(AtomicUsize::new(PRODUCERS * ITEMS_PER_PRODUCER));
    let last_seen: Arc<Vec<std::sync::Mutex<usize>>> =
        Arc::new((0..PRODUCERS).map(|_| std::sync::Mutex::new(0)).collect());

    for c in 0..CONSUMERS {
        let q = Arc::clone(&q);
        let remaining = Arc::clone(&remaining);
        let last_seen = Arc::clone(&last_seen);
        handles.push(thread::spawn(move || {
            while remaining.load(Ordering::Relaxed) > 0 {
                if let Some(v) = q.dequeue(PRODUCERS + c).unwrap() {
                    let raw = v.get();
                    let producer = raw >> 32;
                    let seq = raw & 0xFFFF_FFFF;
                    let mut last = last_seen[producer].lock().unwrap();
                    assert!(seq > *last, "FIFO-per-producer violated for producer {producer}");
                    *last = seq;
                    remaining.fetch_sub(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}
