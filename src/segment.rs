use std::sync::atomic::AtomicPtr;

use crate::cell::Cell;
use crate::config::NODE_SIZE;
use crate::error::QueueError;

/// A fixed-size contiguous array of cells plus a successor link and a
/// monotonic segment id.
///
/// Segments form a singly linked list from the queue head onward. The list
/// grows only at the tail, by linking a new segment whose `id` is
/// `previous.id + 1`; segments are retired from the head and retirement is
/// permanent.
pub(crate) struct Segment {
    pub(crate) next: AtomicPtr<Segment>,
    pub(crate) id: i64,
    pub(crate) cells: Box<[Cell]>,
}

impl Segment {
    /// Allocates a new segment with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AllocationFailure`] if the cell array cannot
    /// be reserved. Stable Rust has no fallible `Box::new`, so this goes
    /// through `Vec::try_reserve_exact` and builds the cells in place:
    /// allocate via `Vec`, then convert to `Box<[T]>`, fallibly instead of
    /// the infallible `Vec::with_capacity` a trusting allocator could use.
    pub(crate) fn try_new(id: i64) -> Result<Box<Self>, QueueError> {
        let mut cells: Vec<Cell> = Vec::new();
        cells
            .try_reserve_exact(NODE_SIZE)
            .map_err(|_| QueueError::AllocationFailure)?;
        cells.resize_with(NODE_SIZE, Cell::new);

        Ok(Box::new(Self {
            next: AtomicPtr::new(std::ptr::null_mut()),
            id,
            cells: cells.into_boxed_slice(),
        }))
    }
}
