//! Resource-health tracking with hysteresis for the Vigil agent.
//!
//! `vigil-health` turns periodic metric snapshots into a debounced stream
//! of status transitions. Evaluation itself is a pure, ordered tie-break
//! over thresholds; the monitor wraps it with offline detection, a
//! stability-window detour through `Recovering` when a host climbs back
//! out of `Offline` or `Critical`, and persisted per-host status rows.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use vigil_health::{HealthConfig, HealthMonitor, MetricSnapshot};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let monitor = HealthMonitor::new(HealthConfig::default(), dir.path());
//!
//! let now = Utc::now();
//! monitor.record_snapshot("web-1", MetricSnapshot::new(42.0, 55.0, 30.0, now));
//! let update = monitor.update_status("web-1", now).unwrap();
//! println!("{} -> {}", update.old_status, update.new_status);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod evaluator;
pub mod monitor;
pub mod types;

// Re-export main types at crate root
pub use error::{HealthError, Result};
pub use evaluator::evaluate;
pub use monitor::{HealthMonitor, LogNotifier, StatusChange, StatusNotifier, StatusUpdate};
pub use types::{HealthConfig, HealthRecord, HealthState, MetricSnapshot};
