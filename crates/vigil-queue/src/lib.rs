//! Durable delivery queue for outbound agent payloads.
//!
//! When the upstream endpoint is unreachable, payloads are buffered here,
//! persisted to disk, and replayed on a staged backoff schedule once
//! delivery resumes. The queue is bounded: under capacity pressure it
//! evicts the oldest entries so fresh data always wins.
//!
//! ```
//! use chrono::Utc;
//! use vigil_queue::DeliveryQueue;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let queue = DeliveryQueue::new(1000, dir.path());
//!
//! let now = Utc::now();
//! let id = queue.enqueue("metrics", b"{}".to_vec(), now).unwrap();
//!
//! for item in queue.pending(now) {
//!     // attempt delivery ...
//!     queue.mark_sent(item.id).unwrap();
//! }
//! assert!(queue.is_empty());
//! # let _ = id;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod queue;
pub mod types;

// Re-export main types at crate root
pub use error::{QueueError, Result};
pub use queue::DeliveryQueue;
pub use types::{QueueStats, QueuedItem, backoff_for};
