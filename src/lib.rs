//! A wait-free multi-producer multi-consumer FIFO queue of opaque,
//! pointer-sized values, following the Yang-Mellor-Crummey (YMC) design.
//!
//! Every [`WfQueue::enqueue`] and [`WfQueue::dequeue`] completes in a
//! bounded number of its own steps regardless of contention or preemption
//! among peer threads — no operation spins unboundedly, blocks, or waits
//! on a condition variable. Producers and consumers share a segmented,
//! lazily-extended array of cells; threads that fail to make progress on
//! their own cell are helped to completion by whichever peer happens to
//! touch that cell next.
//!
//! # Key properties
//!
//! - **Wait-free**: bounded steps per operation, independent of other
//!   threads' scheduling.
//! - **FIFO per producer**: a thread's own enqueues are observed in order.
//! - **Fixed thread set**: the maximum number of participants is declared
//!   at construction; each thread is identified by an integer
//!   `thread_id < max_threads` that it must present consistently.
//! - **Opaque transport**: the queue moves pointer-sized words
//!   ([`OpaqueWord`]) without copying, owning, or freeing what they
//!   reference.
//!
//! # Example
//!
//! ```
//! use wfqueue_rs::{Config, OpaqueWord, WfQueue};
//!
//! let queue = WfQueue::new(Config::new(2, false).unwrap()).unwrap();
//!
//! queue.enqueue(0, OpaqueWord::new(42).unwrap()).unwrap();
//! let value = queue.dequeue(1).unwrap().unwrap();
//! assert_eq!(value.get(), 42);
//! assert!(queue.dequeue(1).unwrap().is_none());
//! ```

mod cell;
mod config;
mod error;
mod handle;
mod invariants;
mod metrics;
mod opaque;
mod queue;
mod request;
mod segment;

pub use config::{Config, NODE_SIZE, PATIENCE};
pub use error::QueueError;
pub use metrics::MetricsSnapshot;
pub use opaque::OpaqueWord;
pub use queue::WfQueue;
