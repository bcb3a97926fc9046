//! Debug assertion macros for queue invariants.
//!
//! These macros provide runtime checks for the concurrent algorithm's core
//! invariants: segment succession, index monotonicity, hazard-pointer
//! safety, and single-consumer cell claims. They are only active in debug
//! builds (`#[cfg(debug_assertions)]`), so there is zero overhead in
//! release builds.

// =============================================================================
// INV-SEG-01: Segment id succession
// =============================================================================

/// Assert that a newly linked segment's id is exactly one more than its
/// predecessor's.
///
/// **Invariant**: every segment id equals its predecessor's id plus one.
///
/// Used in: `find_cell` after winning (or losing) the segment-append CAS.
macro_rules! debug_assert_segment_succession {
    ($prev_id:expr, $new_id:expr) => {
        debug_assert!(
            $new_id == $prev_id + 1,
            "INV-SEG-01 violated: segment id {} does not follow {}",
            $new_id,
            $prev_id
        )
    };
}

// =============================================================================
// INV-SEG-02: Index monotonicity
// =============================================================================

/// Assert that a shared index counter only increases.
///
/// **Invariant**: `enq_idx`, `deq_idx` strictly increase.
///
/// Used in: the monotonicity-fix loops in `enq_slow`, `help_enq`, `help_deq`.
macro_rules! debug_assert_index_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-SEG-02 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-HZD-01: Hazard-pointer safety
// =============================================================================

/// Assert that a segment about to be freed is not protected by any
/// handle's hazard id.
///
/// **Invariant**: a segment may be freed only when every handle's `hzd_id`
/// is strictly greater than that segment's id.
///
/// Used in: `cleanup` immediately before freeing a retired segment.
macro_rules! debug_assert_not_hazarded {
    ($segment_id:expr, $hzd_id:expr) => {
        debug_assert!(
            $hzd_id > $segment_id,
            "INV-HZD-01 violated: freeing segment {} still protected by hazard id {}",
            $segment_id,
            $hzd_id
        )
    };
}

// =============================================================================
// INV-CELL-01: At most one consumer per cell
// =============================================================================

/// Assert that a failed `deq_ref` claim CAS lost to a genuine prior claim
/// (a non-null actual value), not to a corrupted or still-NIL state.
///
/// **Invariant**: for any cell, at most one consumer observes its real
/// value; once a consumer claims a cell via `deq_ref` the value is
/// delivered exactly once. A losing CAS on an already-NIL `deq_ref` would
/// mean the CAS itself is broken, since `compare_exchange` only fails when
/// the current value differs from the expected `NIL`.
///
/// Used in: the fast-path dequeue claim CAS's losing branch, in debug
/// builds, to catch a regression that would let the claim protocol itself
/// report a spurious failure.
macro_rules! debug_assert_single_claim {
    ($actual:expr) => {
        debug_assert!(
            !$actual.is_null(),
            "INV-CELL-01 violated: deq_ref claim CAS failed against a NIL actual value"
        )
    };
}

pub(crate) use debug_assert_index_monotonic;
pub(crate) use debug_assert_not_hazarded;
pub(crate) use debug_assert_segment_succession;
pub(crate) use debug_assert_single_claim;
