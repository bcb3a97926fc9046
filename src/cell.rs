use std::sync::atomic::{AtomicPtr, AtomicUsize};

use crate::request::{DeqReq, EnqReq};

/// Returns the distinguished "sealed, no producer/consumer can rendezvous
/// here" pointer value shared by `enq_ref` and `deq_ref`.
///
/// An all-ones bit pattern that can never be a real allocation's address.
pub(crate) fn top_ptr<T>() -> *mut T {
    usize::MAX as *mut T
}

/// One FIFO slot: an opaque value plus two helper-request references.
///
/// Cache-line aligned to eliminate false sharing between adjacent cells in
/// a segment's row: the same cache-alignment discipline used elsewhere in
/// this crate for frequently cross-thread-read atomics.
#[repr(align(64))]
pub(crate) struct Cell {
    /// `NIL -> (value | TOP)`. Terminal once either is stored.
    pub(crate) val: AtomicUsize,
    /// `NIL -> (helper_request | TOP)`.
    pub(crate) enq_ref: AtomicPtr<EnqReq>,
    /// `NIL -> (helper_request | TOP)`.
    pub(crate) deq_ref: AtomicPtr<DeqReq>,
}

impl Cell {
    pub(crate) fn new() -> Self {
        Self {
            val: AtomicUsize::new(0),
            enq_ref: AtomicPtr::new(std::ptr::null_mut()),
            deq_ref: AtomicPtr::new(std::ptr::null_mut()),
        }
    }
}
