use thiserror::Error;

/// Error types for queue construction and steady-state operation.
///
/// `EMPTY` is deliberately not represented here — it is a first-class
/// return value of `dequeue` (`None`), not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// `max_threads == 0` at construction.
    #[error("invalid configuration: max_threads must be at least 1, got {max_threads}")]
    InvalidConfiguration {
        /// The rejected thread count.
        max_threads: usize,
    },
    /// A required segment allocation failed.
    ///
    /// The slow path already tried its spare segment before this surfaces;
    /// this is a fatal runtime condition, not something the caller can
    /// usefully retry.
    #[error("allocation failure while extending the segment chain")]
    AllocationFailure,
    /// `value` collided with one of the two reserved sentinels (`NIL`/`TOP`).
    #[error("opaque word {0:#x} collides with a reserved sentinel (0 or usize::MAX)")]
    ReservedValue(usize),
}
