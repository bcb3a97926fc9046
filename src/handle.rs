use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicI64, AtomicPtr, Ordering};

use crate::error::QueueError;
use crate::request::{DeqReq, EnqReq};
use crate::segment::Segment;

/// Sentinel `hzd_id` meaning "this handle currently protects no segment".
pub(crate) const NO_HAZARD: i64 = i64::MAX;

/// Per-thread state.
///
/// Fields split into two groups:
///
/// - Atomics (`hzd_id`, `tail`, `head`, `enq_req`, `deq_req`): published for
///   peers and the reclaimer to read, and in the case of `tail`/`head`,
///   occasionally fast-forwarded by the reclaimer via CAS.
/// - Thread-local scratch (`tail_id`, `head_id`, the helper cursors,
///   `spare`, `peer_buf`): touched only by the single thread that
///   consistently presents this handle's `thread_id`, wrapped in
///   [`UnsafeCell`] and justified by an explicit `SAFETY:` argument rather
///   than a mutex, since only one thread ever touches them.
pub(crate) struct Handle {
    /// Segment id this thread is currently touching, or [`NO_HAZARD`].
    pub(crate) hzd_id: AtomicI64,
    /// Cached tail segment pointer used by enqueues.
    pub(crate) tail: AtomicPtr<Segment>,
    /// Cached head segment pointer used by dequeues.
    pub(crate) head: AtomicPtr<Segment>,
    /// Shadow of `tail`'s id, refreshed after every enqueue.
    tail_id: UnsafeCell<i64>,
    /// Shadow of `head`'s id, refreshed after every dequeue.
    head_id: UnsafeCell<i64>,
    /// Persistent enqueue help request.
    pub(crate) enq_req: EnqReq,
    /// Persistent dequeue help request.
    pub(crate) deq_req: DeqReq,
    /// Round-robin index into the handle ring for enqueue helping.
    enq_help_cursor: UnsafeCell<usize>,
    /// Round-robin index into the handle ring for dequeue helping.
    deq_help_cursor: UnsafeCell<usize>,
    /// Last observed peer enq-request id, used to detect the peer stalling.
    enq_help_saved_id: UnsafeCell<i64>,
    /// Preallocated segment, consumed when `find_cell` must extend the chain.
    spare: UnsafeCell<Option<Box<Segment>>>,
    /// Scratch storage used only during this handle's own reclamation pass.
    peer_buf: UnsafeCell<Vec<usize>>,
}

// SAFETY: every UnsafeCell-wrapped field above is accessed only by the one
// thread that consistently presents this handle's thread_id across its
// lifetime; that external contract is what makes the otherwise-unsynchronized
// reads/writes race-free. The atomic fields need no such argument.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
    /// `thread_id` seeds the help cursors at the next peer in the ring
    /// (`(thread_id + 1) % max_threads`), not a fixed constant.
    pub(crate) fn try_new(
        initial: *mut Segment,
        thread_id: usize,
        max_threads: usize,
    ) -> Result<Self, QueueError> {
        let next = (thread_id + 1) % max_threads;
        Ok(Self {
            hzd_id: AtomicI64::new(NO_HAZARD),
            tail: AtomicPtr::new(initial),
            head: AtomicPtr::new(initial),
            tail_id: UnsafeCell::new(0),
            head_id: UnsafeCell::new(0),
            enq_req: EnqReq::new(),
            deq_req: DeqReq::new(),
            enq_help_cursor: UnsafeCell::new(next),
            deq_help_cursor: UnsafeCell::new(next),
            enq_help_saved_id: UnsafeCell::new(0),
            spare: UnsafeCell::new(Some(Segment::try_new(0)?)),
            peer_buf: UnsafeCell::new(vec![0; max_threads]),
        })
    }

    pub(crate) fn publish_enq_hazard(&self) {
        // SAFETY: single-writer (this thread only).
        let id = unsafe { *self.tail_id.get() };
        self.hzd_id.store(id, Ordering::Relaxed);
    }

    pub(crate) fn publish_deq_hazard(&self) {
        // SAFETY: single-writer (this thread only).
        let id = unsafe { *self.head_id.get() };
        self.hzd_id.store(id, Ordering::Relaxed);
    }

    pub(crate) fn clear_hazard(&self) {
        self.hzd_id.store(NO_HAZARD, Ordering::Release);
    }

    pub(crate) fn refresh_tail_id(&self, id: i64) {
        // SAFETY: single-writer (this thread only).
        unsafe { *self.tail_id.get() = id };
    }

    pub(crate) fn refresh_head_id(&self, id: i64) {
        // SAFETY: single-writer (this thread only).
        unsafe { *self.head_id.get() = id };
    }

    pub(crate) fn take_spare(&self) -> Option<Box<Segment>> {
        // SAFETY: single-writer (this thread only).
        unsafe { (*self.spare.get()).take() }
    }

    pub(crate) fn set_spare(&self, segment: Option<Box<Segment>>) {
        // SAFETY: single-writer (this thread only).
        unsafe { *self.spare.get() = segment };
    }

    pub(crate) fn has_spare(&self) -> bool {
        // SAFETY: single-writer (this thread only).
        unsafe { (*self.spare.get()).is_some() }
    }

    pub(crate) fn enq_help_cursor(&self) -> usize {
        // SAFETY: single-writer (this thread only).
        unsafe { *self.enq_help_cursor.get() }
    }

    pub(crate) fn set_enq_help_cursor(&self, idx: usize) {
        // SAFETY: single-writer (this thread only).
        unsafe { *self.enq_help_cursor.get() = idx };
    }

    pub(crate) fn deq_help_cursor(&self) -> usize {
        // SAFETY: single-writer (this thread only).
        unsafe { *self.deq_help_cursor.get() }
    }

    pub(crate) fn set_deq_help_cursor(&self, idx: usize) {
        // SAFETY: single-writer (this thread only).
        unsafe { *self.deq_help_cursor.get() = idx };
    }

    pub(crate) fn enq_help_saved_id(&self) -> i64 {
        // SAFETY: single-writer (this thread only).
        unsafe { *self.enq_help_saved_id.get() }
    }

    pub(crate) fn set_enq_help_saved_id(&self, id: i64) {
        // SAFETY: single-writer (this thread only).
        unsafe { *self.enq_help_saved_id.get() = id };
    }

    pub(crate) fn peer_buf_set(&self, idx: usize, value: usize) {
        // SAFETY: single-writer (only the active reclaimer touches its own peer_buf).
        unsafe { (*self.peer_buf.get())[idx] = value };
    }

    pub(crate) fn peer_buf_get(&self, idx: usize) -> usize {
        // SAFETY: single-writer (only the active reclaimer touches its own peer_buf).
        unsafe { (*self.peer_buf.get())[idx] }
    }
}
