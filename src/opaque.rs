use std::num::NonZeroUsize;

use crate::error::QueueError;

/// `TOP`: the distinguished "helper-claimed / permanently empty" marker.
pub(crate) const TOP: usize = usize::MAX;
/// `NIL`: the distinguished "uninitialized" marker (the all-zero value).
pub(crate) const NIL: usize = 0;

/// An opaque, pointer-sized value transported by [`WfQueue`](crate::WfQueue).
///
/// The core never copies, owns, or frees what this wraps — it is a bare
/// word, typically a pointer to a heap-allocated payload. Two bit patterns
/// are reserved by the core and cannot be stored: `0` (`NIL`) and
/// `usize::MAX` (`TOP`). Construction rejects both up front so the rest of
/// the algorithm never has to re-check user input for sentinel collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpaqueWord(NonZeroUsize);

impl OpaqueWord {
    /// Wraps a raw word, rejecting the reserved sentinels.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ReservedValue`] if `value` is `0` or
    /// `usize::MAX`.
    pub fn new(value: usize) -> Result<Self, QueueError> {
        if value == NIL || value == TOP {
            return Err(QueueError::ReservedValue(value));
        }
        // SAFETY: value != 0 was just checked above.
        Ok(Self(unsafe { NonZeroUsize::new_unchecked(value) }))
    }

    /// Wraps a non-null pointer as an opaque word.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ReservedValue`] if the pointer's address equals
    /// the reserved `TOP` sentinel (`usize::MAX`) — astronomically unlikely
    /// for a real allocation, but checked rather than assumed.
    pub fn from_ptr<T>(ptr: *mut T) -> Result<Self, QueueError> {
        Self::new(ptr as usize)
    }

    /// Returns the underlying word.
    #[must_use]
    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Reinterprets the word as a raw pointer.
    #[must_use]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0.get() as *mut T
    }

    pub(crate) fn from_raw(value: usize) -> Self {
        debug_assert!(value != NIL && value != TOP, "raw value collides with a sentinel");
        // SAFETY: debug_assert above guards the invariant in debug builds;
        // callers of this crate-internal constructor only ever pass back
        // words that originated from a validated `OpaqueWord`.
        Self(unsafe { NonZeroUsize::new_unchecked(value) })
    }
}
