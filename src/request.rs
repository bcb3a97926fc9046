use std::sync::atomic::{AtomicI64, AtomicUsize};

/// A persistent enqueue help request.
///
/// `id > 0` means pending with claimed index `id`; `id <= 0` means
/// completed at cell `-id`.
#[repr(align(64))]
#[derive(Debug)]
pub(crate) struct EnqReq {
    pub(crate) id: AtomicI64,
    pub(crate) val: AtomicUsize,
}

impl EnqReq {
    pub(crate) fn new() -> Self {
        Self {
            id: AtomicI64::new(0),
            val: AtomicUsize::new(0),
        }
    }
}

/// A persistent dequeue help request.
///
/// `idx == id` means pending; a positive `idx > id` means a helper has
/// tentatively located a fulfilling cell; a negative `idx` means resolved
/// at cell `-idx`.
#[repr(align(64))]
#[derive(Debug)]
pub(crate) struct DeqReq {
    pub(crate) id: AtomicI64,
    pub(crate) idx: AtomicI64,
}

impl DeqReq {
    pub(crate) fn new() -> Self {
        Self {
            id: AtomicI64::new(0),
            idx: AtomicI64::new(-1),
        }
    }
}
