//! The Vigil host monitoring agent.
//!
//! Ties the subsystem crates together into one periodic loop:
//!
//! - [`vigil_cron`] correlates scheduled-job starts and exits into failure
//!   and timeout events
//! - [`vigil_health`] evaluates resource snapshots into a debounced health
//!   status per host
//! - [`vigil_queue`] buffers payloads the [`EventSink`] could not deliver
//!   and replays them with backoff
//!
//! The agent itself stays transport-agnostic: everything outbound goes
//! through the [`EventSink`] trait.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod config;
pub mod error;
pub mod sink;

// Re-export main types at crate root
pub use agent::{Agent, KIND_CRON_EVENT, KIND_METRICS, KIND_STATUS_CHANGE};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use sink::{EventSink, LogSink};
