use crate::error::QueueError;

/// Size of each segment's cell array.
///
/// Fixed at compile time: must comfortably exceed the largest
/// `max_threads` this crate is ever constructed with so a single segment
/// normally absorbs a full round of concurrent requests.
pub const NODE_SIZE: usize = 1024;

/// Fast-path retry budget before falling back to the slow (helper-registering) path.
pub const PATIENCE: usize = 10;

/// Configuration for [`WfQueue`](crate::WfQueue).
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Maximum number of participating threads. Each thread is identified
    /// by an integer in `[0, max_threads)`.
    pub max_threads: usize,
    /// Enable metrics collection (relaxed atomic counters, slight overhead).
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConfiguration`] if `max_threads == 0`.
    pub fn new(max_threads: usize, enable_metrics: bool) -> Result<Self, QueueError> {
        if max_threads == 0 {
            return Err(QueueError::InvalidConfiguration { max_threads });
        }

        Ok(Self {
            max_threads,
            enable_metrics,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_threads: 128,
            enable_metrics: false,
        }
    }
}
