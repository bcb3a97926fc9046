use std::sync::atomic::{AtomicI64, AtomicPtr, Ordering};

use crate::cell::{top_ptr, Cell};
use crate::config::{Config, NODE_SIZE, PATIENCE};
use crate::error::QueueError;
use crate::handle::Handle;
use crate::invariants::{
    debug_assert_index_monotonic, debug_assert_not_hazarded, debug_assert_segment_succession,
    debug_assert_single_claim,
};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::opaque::{OpaqueWord, NIL, TOP};
use crate::request::{DeqReq, EnqReq};
use crate::segment::Segment;

/// Checks a peer's published hazard id and backs `curr` off to the first
/// segment that peer still protects, if it lags behind `curr`.
fn check(peer_hzd_id: &AtomicI64, curr: *mut Segment, old: *mut Segment) -> *mut Segment {
    let hzd_id = peer_hzd_id.load(Ordering::Acquire);
    // SAFETY: curr/old form a live chain rooted at the queue's pre-reclamation head.
    let curr_id = unsafe { (*curr).id };

    if hzd_id < curr_id {
        let mut tmp = old;
        loop {
            // SAFETY: see above; `tmp` walks forward along `next` from `old`.
            let tmp_id = unsafe { (*tmp).id };
            if tmp_id >= hzd_id {
                break;
            }
            tmp = unsafe { (*tmp).next.load(Ordering::Relaxed) };
        }
        tmp
    } else {
        curr
    }
}

/// Advances a peer's cached `tail`/`head` pointer toward `curr`, then
/// re-applies `check` against the peer's hazard id.
fn update(
    peer_segment: &AtomicPtr<Segment>,
    peer_hzd_id: &AtomicI64,
    mut curr: *mut Segment,
    old: *mut Segment,
) -> *mut Segment {
    let mut node = peer_segment.load(Ordering::Acquire);
    // SAFETY: node/curr are live queue-owned segments.
    if unsafe { (*node).id } < unsafe { (*curr).id } {
        if let Err(actual) = peer_segment.compare_exchange(node, curr, Ordering::SeqCst, Ordering::SeqCst) {
            node = actual;
            // SAFETY: node came from the atomic we just loaded.
            if unsafe { (*node).id } < unsafe { (*curr).id } {
                curr = node;
            }
        }
        curr = check(peer_hzd_id, curr, old);
    }
    curr
}

/// A wait-free multi-producer multi-consumer FIFO queue of opaque,
/// pointer-sized values (Yang-Mellor-Crummey design).
///
/// Every [`enqueue`](WfQueue::enqueue) and [`dequeue`](WfQueue::dequeue)
/// completes in a bounded number of its own steps, regardless of
/// contention or preemption among peer threads. A thread participates by
/// consistently presenting the same `thread_id` (`< max_threads`) across
/// every call; presenting more than one id from the same logical thread,
/// or the same id from two threads concurrently, is undefined behavior.
pub struct WfQueue {
    head: AtomicPtr<Segment>,
    enq_idx: AtomicI64,
    deq_idx: AtomicI64,
    help_idx: AtomicI64,
    handles: Box<[Handle]>,
    config: Config,
    metrics: Metrics,
}

// SAFETY: every interior-mutable field reachable from `WfQueue` (via
// `Handle`'s `UnsafeCell`s) is already justified `Send`/`Sync` on `Handle`
// itself; `WfQueue` adds no additional unsynchronized state.
unsafe impl Send for WfQueue {}
unsafe impl Sync for WfQueue {}

impl WfQueue {
    /// Creates a queue configured for up to `config.max_threads` participants.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConfiguration`] if `max_threads == 0`,
    /// or [`QueueError::AllocationFailure`] if the initial segment or any
    /// handle's preallocated spare cannot be reserved.
    pub fn new(config: Config) -> Result<Self, QueueError> {
        if config.max_threads == 0 {
            return Err(QueueError::InvalidConfiguration { max_threads: 0 });
        }

        let initial = Box::into_raw(Segment::try_new(0)?);

        let mut handles = Vec::new();
        handles
            .try_reserve_exact(config.max_threads)
            .map_err(|_| QueueError::AllocationFailure)?;
        for thread_id in 0..config.max_threads {
            handles.push(Handle::try_new(initial, thread_id, config.max_threads)?);
        }

        Ok(Self {
            head: AtomicPtr::new(initial),
            enq_idx: AtomicI64::new(1),
            deq_idx: AtomicI64::new(1),
            help_idx: AtomicI64::new(0),
            handles: handles.into_boxed_slice(),
            config,
            metrics: Metrics::new(),
        })
    }

    /// The maximum number of participating threads this queue was built for.
    #[must_use]
    pub fn max_threads(&self) -> usize {
        self.config.max_threads
    }

    /// A point-in-time snapshot of this queue's metrics counters.
    ///
    /// Counters are zero throughout if `Config::enable_metrics` was false
    /// at construction.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Enqueues `value`, linearizing it into the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AllocationFailure`] if the segment chain must
    /// be extended and no allocation is available (the thread's own spare
    /// was already exhausted by a peer).
    ///
    /// # Panics
    ///
    /// May panic (via indexing) if `thread_id >= self.max_threads()`.
    pub fn enqueue(&self, thread_id: usize, value: OpaqueWord) -> Result<(), QueueError> {
        let th = &self.handles[thread_id];
        th.publish_enq_hazard();

        let mut id = 0i64;
        let mut success = false;

        for _ in 0..PATIENCE {
            if self.enq_fast(value, th, &mut id)? {
                success = true;
                break;
            }
        }

        if !success {
            self.enq_slow(value, th, id)?;
        }

        // SAFETY: `tail` always points at a live, queue-owned segment.
        let tail_id = unsafe { (*th.tail.load(Ordering::Relaxed)).id };
        th.refresh_tail_id(tail_id);
        th.clear_hazard();

        if self.config.enable_metrics {
            if success {
                self.metrics.record_fast_enqueue();
            } else {
                self.metrics.record_slow_enqueue();
            }
        }

        Ok(())
    }

    /// Dequeues the next value in FIFO order, or `None` if the queue is
    /// empty at this call's linearization point.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AllocationFailure`] under the same condition
    /// as [`enqueue`](Self::enqueue).
    ///
    /// # Panics
    ///
    /// May panic (via indexing) if `thread_id >= self.max_threads()`.
    pub fn dequeue(&self, thread_id: usize) -> Result<Option<OpaqueWord>, QueueError> {
        let th = &self.handles[thread_id];
        th.publish_deq_hazard();

        let mut id = 0i64;
        let mut res = TOP;
        let mut used_slow = false;

        for _ in 0..PATIENCE {
            res = self.deq_fast(th, &mut id)?;
            if res != TOP {
                break;
            }
        }

        if res == TOP {
            used_slow = true;
            res = self.deq_slow(th, id)?;
        }

        if res != NIL {
            let cursor = th.deq_help_cursor();
            // SAFETY: cursor is always in `[0, max_threads)`.
            let peer = &self.handles[cursor];
            self.help_deq(th, peer)?;
            th.set_deq_help_cursor((cursor + 1) % self.config.max_threads);
        }

        // SAFETY: `head` always points at a live, queue-owned segment.
        let head_id = unsafe { (*th.head.load(Ordering::Relaxed)).id };
        th.refresh_head_id(head_id);
        th.clear_hazard();

        if !th.has_spare() {
            self.cleanup(thread_id);
            th.set_spare(Some(Segment::try_new(0)?));
        }

        if self.config.enable_metrics {
            if res == NIL {
                self.metrics.record_empty_dequeue();
            } else if used_slow {
                self.metrics.record_slow_dequeue();
            } else {
                self.metrics.record_fast_dequeue();
            }
        }

        Ok(if res == NIL { None } else { Some(OpaqueWord::from_raw(res)) })
    }

    /// Translates a global cell index into a `(cell, segment)` pair,
    /// extending the segment chain (from `thread_handle`'s spare, or a
    /// fresh allocation) if the walk runs past the current tail.
    fn find_cell(
        &self,
        start: &AtomicPtr<Segment>,
        thread_handle: &Handle,
        idx: i64,
    ) -> Result<(*const Cell, *mut Segment), QueueError> {
        let mut curr = start.load(Ordering::Relaxed);
        let target = idx / NODE_SIZE as i64;

        loop {
            // SAFETY: `curr` is always a live, queue-owned segment: either
            // the caller's cached pointer or one just installed/adopted below.
            let curr_id = unsafe { (*curr).id };
            if curr_id >= target {
                break;
            }

            // SAFETY: same as above.
            let mut next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            if next.is_null() {
                let spare = match thread_handle.take_spare() {
                    Some(spare) => spare,
                    None => Segment::try_new(curr_id + 1)?,
                };
                let spare_ptr = Box::into_raw(spare);
                // SAFETY: `spare_ptr` was just boxed and is not yet shared.
                unsafe { (*spare_ptr).id = curr_id + 1 };

                // SAFETY: `curr` is live per above.
                match unsafe { &(*curr).next }.compare_exchange(
                    std::ptr::null_mut(),
                    spare_ptr,
                    Ordering::Release,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        next = spare_ptr;
                        thread_handle.set_spare(None);
                        if self.config.enable_metrics {
                            self.metrics.record_segment_allocated();
                        }
                    }
                    Err(existing) => {
                        // SAFETY: `spare_ptr` was never published; we still
                        // exclusively own it.
                        let reclaimed = unsafe { Box::from_raw(spare_ptr) };
                        thread_handle.set_spare(Some(reclaimed));
                        next = existing;
                    }
                }
            }

            // SAFETY: `next` is a live, queue-owned segment by this point.
            debug_assert_segment_succession!(curr_id, unsafe { (*next).id });
            curr = next;
        }

        // SAFETY: `curr` now holds the segment containing `idx`.
        let cells = unsafe { &(*curr).cells };
        let cell = &cells[(idx % NODE_SIZE as i64) as usize] as *const Cell;
        Ok((cell, curr))
    }

    fn enq_fast(&self, value: OpaqueWord, th: &Handle, id: &mut i64) -> Result<bool, QueueError> {
        let i = self.enq_idx.fetch_add(1, Ordering::SeqCst);
        let (cell_ptr, seg) = self.find_cell(&th.tail, th, i)?;
        th.tail.store(seg, Ordering::Relaxed);

        // SAFETY: cell_ptr is backed by `seg`, protected by this thread's
        // just-published enqueue hazard.
        let cell = unsafe { &*cell_ptr };
        if cell
            .val
            .compare_exchange(NIL, value.get(), Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            Ok(true)
        } else {
            *id = i;
            Ok(false)
        }
    }

    fn enq_slow(&self, value: OpaqueWord, th: &Handle, id_in: i64) -> Result<(), QueueError> {
        th.enq_req.val.store(value.get(), Ordering::Relaxed);
        th.enq_req.id.store(id_in, Ordering::Release);

        let mut i;
        loop {
            i = self.enq_idx.fetch_add(1, Ordering::Relaxed);
            let (cell_ptr, _seg) = self.find_cell(&th.tail, th, i)?;
            // SAFETY: protected by this thread's published hazard.
            let cell = unsafe { &*cell_ptr };

            let enq_req_ptr = &th.enq_req as *const EnqReq as *mut EnqReq;
            let bound = cell
                .enq_ref
                .compare_exchange(std::ptr::null_mut(), enq_req_ptr, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
                && cell.val.load(Ordering::Relaxed) != TOP;

            if bound {
                let _ = th.enq_req.id.compare_exchange(id_in, -i, Ordering::Relaxed, Ordering::Relaxed);
                break;
            }

            if th.enq_req.id.load(Ordering::Relaxed) <= 0 {
                break;
            }
        }

        let final_id = -th.enq_req.id.load(Ordering::Relaxed);
        let (cell_ptr, seg) = self.find_cell(&th.tail, th, final_id)?;
        th.tail.store(seg, Ordering::Relaxed);

        if final_id > i {
            let mut l_ei = self.enq_idx.load(Ordering::Relaxed);
            while l_ei <= final_id {
                match self.enq_idx.compare_exchange_weak(l_ei, final_id + 1, Ordering::Relaxed, Ordering::Relaxed) {
                    Ok(_) => break,
                    Err(actual) => l_ei = actual,
                }
            }
            debug_assert_index_monotonic!("enq_idx", i, final_id + 1);
        }

        // SAFETY: protected by this thread's published hazard.
        unsafe { &*cell_ptr }.val.store(value.get(), Ordering::Relaxed);
        Ok(())
    }

    /// Drives the enqueue side of `cell` (at global index `node_id`) toward
    /// a terminal state, helping a stalled peer if necessary.
    ///
    /// Returns the cell's real value, [`TOP`] (contested, caller should
    /// retry), or [`NIL`] (permanently empty: no producer will ever claim
    /// this cell).
    fn help_enq(&self, cell: &Cell, th: &Handle, node_id: i64) -> Result<usize, QueueError> {
        let mut res = cell.val.load(Ordering::Acquire);

        if res != TOP && res != NIL {
            return Ok(res);
        }

        if res == NIL {
            match cell.val.compare_exchange(NIL, TOP, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => {}
                Err(actual) => {
                    if actual != TOP {
                        return Ok(actual);
                    }
                }
            }
        }

        let mut enq = cell.enq_ref.load(Ordering::Relaxed);

        if enq.is_null() {
            let mut cursor = th.enq_help_cursor();
            let mut peer = &self.handles[cursor];
            let mut pe = &peer.enq_req as *const EnqReq as *mut EnqReq;
            let mut id = peer.enq_req.id.load(Ordering::Relaxed);

            let saved = th.enq_help_saved_id();
            if saved != 0 && saved != id {
                th.set_enq_help_saved_id(0);
                cursor = (cursor + 1) % self.config.max_threads;
                th.set_enq_help_cursor(cursor);
                peer = &self.handles[cursor];
                pe = &peer.enq_req as *const EnqReq as *mut EnqReq;
                id = peer.enq_req.id.load(Ordering::Relaxed);
            }

            let bind_attempted = id > 0 && id <= node_id;
            let mut cas_failed_distinct = false;

            if bind_attempted {
                match cell.enq_ref.compare_exchange(enq, pe, Ordering::Relaxed, Ordering::Relaxed) {
                    Ok(_) => {}
                    Err(actual) => {
                        enq = actual;
                        cas_failed_distinct = enq != pe;
                    }
                }
            }

            if cas_failed_distinct {
                th.set_enq_help_saved_id(id);
            } else {
                th.set_enq_help_saved_id(0);
                let next_cursor = (cursor + 1) % self.config.max_threads;
                th.set_enq_help_cursor(next_cursor);
            }

            if enq.is_null() {
                match cell.enq_ref.compare_exchange(
                    std::ptr::null_mut(),
                    top_ptr::<EnqReq>(),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => enq = top_ptr::<EnqReq>(),
                    Err(actual) => enq = actual,
                }
            }
        }

        if enq == top_ptr::<EnqReq>() {
            return Ok(if self.enq_idx.load(Ordering::Relaxed) <= node_id { NIL } else { TOP });
        }

        // SAFETY: `enq` is a live `EnqReq` owned by some handle in this
        // queue's ring (either the cell's own request or a peer's).
        let enq_ref = unsafe { &*enq };
        let enq_id = enq_ref.id.load(Ordering::Acquire);
        let enq_val = enq_ref.val.load(Ordering::Acquire);

        if enq_id > node_id {
            if cell.val.load(Ordering::Relaxed) == TOP && self.enq_idx.load(Ordering::Relaxed) <= node_id {
                return Ok(NIL);
            }
        } else {
            let finalized = (enq_id > 0
                && enq_ref.id.compare_exchange(enq_id, -node_id, Ordering::Relaxed, Ordering::Relaxed).is_ok())
                || (enq_id == -node_id && cell.val.load(Ordering::Relaxed) == TOP);

            if finalized {
                let mut l_ei = self.enq_idx.load(Ordering::Relaxed);
                while l_ei <= node_id {
                    match self.enq_idx.compare_exchange(l_ei, node_id + 1, Ordering::Relaxed, Ordering::Relaxed) {
                        Ok(_) => break,
                        Err(actual) => l_ei = actual,
                    }
                }
                cell.val.store(enq_val, Ordering::Relaxed);
                if self.config.enable_metrics {
                    self.metrics.record_enq_help();
                }
            }
        }

        Ok(cell.val.load(Ordering::Relaxed))
    }

    fn deq_fast(&self, th: &Handle, id: &mut i64) -> Result<usize, QueueError> {
        let i = self.deq_idx.fetch_add(1, Ordering::SeqCst);
        let (cell_ptr, seg) = self.find_cell(&th.head, th, i)?;
        th.head.store(seg, Ordering::Relaxed);

        // SAFETY: protected by this thread's published dequeue hazard.
        let cell = unsafe { &*cell_ptr };
        let res = self.help_enq(cell, th, i)?;

        if res == NIL {
            return Ok(NIL);
        }

        if res != TOP {
            match cell.deq_ref.compare_exchange(
                std::ptr::null_mut(),
                top_ptr::<DeqReq>(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(res),
                Err(actual) => debug_assert_single_claim!(actual),
            }
        }

        *id = i;
        Ok(TOP)
    }

    fn deq_slow(&self, th: &Handle, id: i64) -> Result<usize, QueueError> {
        th.deq_req.id.store(id, Ordering::Release);
        th.deq_req.idx.store(id, Ordering::Release);

        self.help_deq(th, th)?;

        let i = -th.deq_req.idx.load(Ordering::Relaxed);
        let (cell_ptr, seg) = self.find_cell(&th.head, th, i)?;
        th.head.store(seg, Ordering::Relaxed);
        // SAFETY: protected by this thread's published dequeue hazard.
        let res = unsafe { &*cell_ptr }.val.load(Ordering::Relaxed);

        Ok(if res == TOP { NIL } else { res })
    }

    /// Drives `ph`'s pending dequeue request forward on its behalf. `th` is
    /// the calling (helping) thread; it may be the same handle as `ph`.
    fn help_deq(&self, th: &Handle, ph: &Handle) -> Result<(), QueueError> {
        let mut idx = ph.deq_req.idx.load(Ordering::Acquire);
        let id = ph.deq_req.id.load(Ordering::Relaxed);

        if idx < id {
            return Ok(());
        }

        let hzd_id = ph.hzd_id.load(Ordering::Relaxed);
        th.hzd_id.store(hzd_id, Ordering::SeqCst);
        idx = ph.deq_req.idx.load(Ordering::Relaxed);

        let mut i = id + 1;
        let mut old_val = id;
        let mut new_val = 0i64;

        loop {
            while idx == old_val && new_val == 0 {
                let (cell_ptr, _seg) = self.find_cell(&ph.head, th, i)?;
                // SAFETY: `th` just published a hazard covering `ph`'s segment chain.
                let cell = unsafe { &*cell_ptr };

                let mut l_di = self.deq_idx.load(Ordering::Relaxed);
                while l_di <= i {
                    match self.deq_idx.compare_exchange_weak(l_di, i + 1, Ordering::Relaxed, Ordering::Relaxed) {
                        Ok(_) => break,
                        Err(actual) => l_di = actual,
                    }
                }

                let res = self.help_enq(cell, th, i)?;
                if res == NIL || (res != TOP && cell.deq_ref.load(Ordering::Relaxed).is_null()) {
                    new_val = i;
                } else {
                    idx = ph.deq_req.idx.load(Ordering::Acquire);
                }

                i += 1;
            }

            if new_val != 0 {
                match ph.deq_req.idx.compare_exchange(idx, new_val, Ordering::Release, Ordering::Acquire) {
                    Ok(_) => idx = new_val,
                    Err(actual) => idx = actual,
                }

                if idx >= new_val {
                    new_val = 0;
                }
            }

            if idx < 0 || ph.deq_req.id.load(Ordering::Relaxed) != id {
                break;
            }

            let (cell_ptr, _seg) = self.find_cell(&ph.head, th, idx)?;
            // SAFETY: same as above.
            let cell = unsafe { &*cell_ptr };
            let peer_deq_req = &ph.deq_req as *const DeqReq as *mut DeqReq;

            let claimed = cell.val.load(Ordering::Relaxed) == TOP || {
                match cell.deq_ref.compare_exchange(std::ptr::null_mut(), peer_deq_req, Ordering::Relaxed, Ordering::Relaxed) {
                    Ok(_) => true,
                    Err(actual) => actual == peer_deq_req,
                }
            };

            if claimed {
                let _ = ph.deq_req.idx.compare_exchange(idx, -idx, Ordering::Relaxed, Ordering::Relaxed);
                if self.config.enable_metrics {
                    self.metrics.record_deq_help();
                }
                break;
            }

            old_val = idx;
            if idx >= i {
                i = idx + 1;
            }
        }

        Ok(())
    }

    /// Advances the shared head past segments no handle can observe and
    /// frees them. At most one thread acts as reclaimer at a time; a call
    /// finding another reclaimer active, or insufficient garbage, is a
    /// cheap no-op.
    fn cleanup(&self, thread_id: usize) {
        let th = &self.handles[thread_id];
        let oid = self.help_idx.load(Ordering::Acquire);
        if oid == -1 {
            return;
        }

        let mut new_seg = th.head.load(Ordering::Relaxed);
        // SAFETY: `new_seg` is a live, queue-owned segment.
        let new_id = unsafe { (*new_seg).id };
        if new_id - oid < (self.config.max_threads as i64 * 2) {
            return;
        }

        if self.help_idx.compare_exchange(oid, -1, Ordering::Acquire, Ordering::Relaxed).is_err() {
            return;
        }

        // From here on only this thread acts as the reclaimer.

        let mut l_ei = self.enq_idx.load(Ordering::Relaxed);
        let l_di = self.deq_idx.load(Ordering::Relaxed);
        while l_ei <= l_di {
            match self.enq_idx.compare_exchange_weak(l_ei, l_di + 1, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => l_ei = actual,
            }
        }
        debug_assert!(self.enq_idx.load(Ordering::Relaxed) >= l_di + 1);

        let old_seg = self.head.load(Ordering::Relaxed);
        let max_threads = self.config.max_threads;

        let mut visited = 0usize;
        let mut peer_id = thread_id;
        loop {
            let peer = &self.handles[peer_id];
            new_seg = check(&peer.hzd_id, new_seg, old_seg);
            new_seg = update(&peer.tail, &peer.hzd_id, new_seg, old_seg);
            new_seg = update(&peer.head, &peer.hzd_id, new_seg, old_seg);

            th.peer_buf_set(visited, peer_id);
            visited += 1;
            peer_id = (peer_id + 1) % max_threads;

            // SAFETY: new_seg is a live segment.
            let new_id = unsafe { (*new_seg).id };
            if !(new_id > oid && peer_id != thread_id) {
                break;
            }
        }

        let mut new_id = unsafe { (*new_seg).id };
        while new_id > oid {
            if visited == 0 {
                break;
            }
            visited -= 1;
            let peer = &self.handles[th.peer_buf_get(visited)];
            new_seg = check(&peer.hzd_id, new_seg, old_seg);
            new_id = unsafe { (*new_seg).id };
        }

        let nid = new_id;
        if nid <= oid {
            self.help_idx.store(oid, Ordering::Release);
            return;
        }

        self.head.store(new_seg, Ordering::Relaxed);
        self.help_idx.store(nid, Ordering::Release);

        let mut old_ptr = old_seg;
        let mut reclaimed = 0u64;
        while old_ptr != new_seg {
            // SAFETY: `old_ptr` was excluded from every handle's protected
            // range by `check`/`update` above, so no handle can still
            // dereference it; this thread is the sole reclaimer.
            if cfg!(debug_assertions) {
                for peer in self.handles.iter() {
                    let peer_hzd = peer.hzd_id.load(Ordering::Relaxed);
                    if peer_hzd != crate::handle::NO_HAZARD {
                        let old_id = unsafe { (*old_ptr).id };
                        debug_assert_not_hazarded!(old_id, peer_hzd);
                    }
                }
            }

            let next = unsafe { (*old_ptr).next.load(Ordering::Relaxed) };
            unsafe { drop(Box::from_raw(old_ptr)) };
            old_ptr = next;
            reclaimed += 1;
        }

        if self.config.enable_metrics && reclaimed > 0 {
            self.metrics.record_segment_reclaimed(reclaimed);
        }
    }
}

impl Drop for WfQueue {
    fn drop(&mut self) {
        let mut curr = *self.head.get_mut();
        while !curr.is_null() {
            // SAFETY: the queue uniquely owns its remaining segment chain
            // at drop time; no other thread can be operating on it.
            let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            unsafe { drop(Box::from_raw(curr)) };
            curr = next;
        }
        // Each handle's `spare` (an `Option<Box<Segment>>`) is freed by the
        // derived drop glue for `self.handles` that runs after this body.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(max_threads: usize) -> WfQueue {
        WfQueue::new(Config::new(max_threads, true).unwrap()).unwrap()
    }

    #[test]
    fn single_thread_fifo() {
        let q = queue(1);
        for v in 1..=1000usize {
            q.enqueue(0, OpaqueWord::new(v).unwrap()).unwrap();
        }
        for v in 1..=1000usize {
            let got = q.dequeue(0).unwrap().unwrap();
            assert_eq!(got.get(), v);
        }
        assert!(q.dequeue(0).unwrap().is_none());
    }

    #[test]
    fn empty_queue_returns_none() {
        let q = queue(4);
        assert!(q.dequeue(0).unwrap().is_none());
        assert!(q.dequeue(2).unwrap().is_none());
    }

    #[test]
    fn interleaved_single_producer_consumer() {
        let q = queue(2);
        q.enqueue(0, OpaqueWord::new(10).unwrap()).unwrap();
        assert_eq!(q.dequeue(1).unwrap().unwrap().get(), 10);
        assert!(q.dequeue(1).unwrap().is_none());
        q.enqueue(0, OpaqueWord::new(20).unwrap()).unwrap();
        assert_eq!(q.dequeue(1).unwrap().unwrap().get(), 20);
    }

    #[test]
    fn crosses_multiple_segments() {
        let q = queue(1);
        let count = NODE_SIZE * 3 + 17;
        for v in 1..=count {
            q.enqueue(0, OpaqueWord::new(v).unwrap()).unwrap();
        }
        for v in 1..=count {
            assert_eq!(q.dequeue(0).unwrap().unwrap().get(), v);
        }
        assert!(q.dequeue(0).unwrap().is_none());
    }

    #[test]
    fn metrics_record_fast_path_activity() {
        let q = queue(1);
        q.enqueue(0, OpaqueWord::new(1).unwrap()).unwrap();
        q.dequeue(0).unwrap();
        let snap = q.metrics();
        assert_eq!(snap.fast_enqueues, 1);
        assert_eq!(snap.fast_dequeues, 1);
    }

    #[test]
    fn multi_producer_multi_consumer_conserves_values() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;
        use std::thread;

        let producers = 4;
        let per_producer = 5_000usize;
        let total = producers * per_producer;
        let q = Arc::new(queue(producers * 2));

        let mut handles = Vec::new();
        for p in 0..producers {
            let q = Arc::clone(&q);
            handles.push(thread::spawn(move || {
                for v in 0..per_producer {
                    let word = p * per_producer + v + 1;
                    q.enqueue(p, OpaqueWord::new(word).unwrap()).unwrap();
                }
            }));
        }

        // Consumers race for a shared completion counter rather than a
        // fixed per-consumer quota: dequeues need not distribute evenly.
        let remaining = Arc::new(AtomicUsize::new(total));
        let results = Arc::new(std::sync::Mutex::new(Vec::with_capacity(total)));
        for c in 0..producers {
            let q = Arc::clone(&q);
            let results = Arc::clone(&results);
            let remaining = Arc::clone(&remaining);
            handles.push(thread::spawn(move || {
                let mut collected = Vec::new();
                while remaining.load(Ordering::Relaxed) > 0 {
                    if let Some(v) = q.dequeue(producers + c).unwrap() {
                        collected.push(v.get());
                        remaining.fetch_sub(1, Ordering::Relaxed);
                    }
                }
                results.lock().unwrap().extend(collected);
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let mut got = results.lock().unwrap().clone();
        got.sort_unstable();
        let expected: Vec<usize> = (1..=total).collect();
        assert_eq!(got, expected);
    }
}
