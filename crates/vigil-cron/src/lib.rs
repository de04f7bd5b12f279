//! Scheduled-job execution correlation for the Vigil agent.
//!
//! `vigil-cron` watches a host's job scheduler without requiring the jobs
//! themselves to be instrumented. It correlates two independent signals
//! (start/failure observations extracted from scheduler log lines, and
//! kernel-level process-exit notifications) into a deduplicated stream of
//! failure and timeout events.
//!
//! # Architecture
//!
//! - [`patterns`]: stateless extraction of typed observations from log lines
//! - [`orphans`]: time-bounded cache for exits that arrived before their
//!   start observation, bridging pid-namespace and ordering races
//! - [`source`]: log-source selection (journal query with file-tail
//!   fallback, byte-offset tracking, rotation detection)
//! - [`correlator`]: the [`CronMonitor`] owning the per-command job table
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use vigil_cron::{CronConfig, CronMonitor};
//!
//! let monitor = CronMonitor::new(CronConfig::default());
//!
//! // Kernel exit feed reports a traced process exit at any time.
//! monitor.report_exit(4242, 4241, 0, 0, 1, Utc::now());
//!
//! // The scheduler tick drives the check cycle.
//! // let events = monitor.check(Utc::now())?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod correlator;
pub mod error;
pub mod orphans;
pub mod patterns;
pub mod source;
pub mod types;

// Re-export main types at crate root
pub use correlator::CronMonitor;
pub use error::{CronError, Result};
pub use orphans::{OrphanCache, OrphanExit};
pub use patterns::{FailureObservation, Observation, StartObservation, describe_exit_code};
pub use source::{FileTail, JournalQuery, LogReader, LogSource};
pub use types::{
    ActiveRun, AlertState, CronConfig, CronEvent, CronEventKind, JobRecord, TIMEOUT_EXIT_CODE,
};
