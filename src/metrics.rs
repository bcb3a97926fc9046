use std::sync::atomic::{AtomicU64, Ordering};

/// Optional metrics for monitoring queue behavior.
///
/// A private accumulator of relaxed atomics (fast/slow enqueue, fast/slow
/// dequeue, empty, help, and segment-churn counts), toggled on only when
/// `Config::enable_metrics` is set, exposed through a `Copy` snapshot type.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
    fast_enqueues: AtomicU64,
    slow_enqueues: AtomicU64,
    fast_dequeues: AtomicU64,
    slow_dequeues: AtomicU64,
    empty_dequeues: AtomicU64,
    enq_helps: AtomicU64,
    deq_helps: AtomicU64,
    segments_allocated: AtomicU64,
    segments_reclaimed: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_fast_enqueue(&self) {
        self.fast_enqueues.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_slow_enqueue(&self) {
        self.slow_enqueues.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fast_dequeue(&self) {
        self.fast_dequeues.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_slow_dequeue(&self) {
        self.slow_dequeues.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty_dequeue(&self) {
        self.empty_dequeues.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_enq_help(&self) {
        self.enq_helps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deq_help(&self) {
        self.deq_helps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segment_allocated(&self) {
        self.segments_allocated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segment_reclaimed(&self, count: u64) {
        self.segments_reclaimed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fast_enqueues: self.fast_enqueues.load(Ordering::Relaxed),
            slow_enqueues: self.slow_enqueues.load(Ordering::Relaxed),
            fast_dequeues: self.fast_dequeues.load(Ordering::Relaxed),
            slow_dequeues: self.slow_dequeues.load(Ordering::Relaxed),
            empty_dequeues: self.empty_dequeues.load(Ordering::Relaxed),
            enq_helps: self.enq_helps.load(Ordering::Relaxed),
            deq_helps: self.deq_helps.load(Ordering::Relaxed),
            segments_allocated: self.segments_allocated.load(Ordering::Relaxed),
            segments_reclaimed: self.segments_reclaimed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fast_enqueues: u64,
    pub slow_enqueues: u64,
    pub fast_dequeues: u64,
    pub slow_dequeues: u64,
    pub empty_dequeues: u64,
    pub enq_helps: u64,
    pub deq_helps: u64,
    pub segments_allocated: u64,
    pub segments_reclaimed: u64,
}
