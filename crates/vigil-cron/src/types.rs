//! Core types for job-execution tracking.
//!
//! This module provides the fundamental types of the correlation engine:
//! - [`JobRecord`]: the long-lived state for one distinct job command
//! - [`ActiveRun`]: the currently running execution of a job, if any
//! - [`AlertState`]: explicit alert-suppression state for a record
//! - [`CronEvent`]: an emitted, non-persisted notification
//! - [`CronConfig`]: the immutable configuration snapshot for a check cycle

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exit code reserved for timeout / long-running events.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Whether the latest failure of a job has already been notified.
///
/// A record is re-armed (set back to [`AlertState::Unnotified`]) whenever an
/// execution finishes, so each unresolved failure produces exactly one alert
/// no matter how many check cycles observe it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    /// No alert has been sent for the current failure or run.
    #[default]
    Unnotified,
    /// An alert was already sent; suppress duplicates until re-armed.
    Notified,
}

impl AlertState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unnotified => "unnotified",
            Self::Notified => "notified",
        }
    }

    /// Returns true if an alert has already been sent.
    #[must_use]
    pub const fn is_notified(&self) -> bool {
        matches!(self, Self::Notified)
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The currently running execution of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRun {
    /// Process id observed at start.
    pub pid: u32,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

/// Per-command execution state.
///
/// One record exists per distinct command string; the record is re-matched
/// across every execution of that command and dropped only by the retention
/// sweep after seven days of inactivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// The job command (identity key).
    pub command: String,
    /// Timestamp of the most recent observed start.
    pub last_execution: DateTime<Utc>,
    /// The in-flight execution, if one has started and not yet exited.
    pub active: Option<ActiveRun>,
    /// Exit code of the most recently finished execution.
    pub last_exit_code: i32,
    /// Human-readable description of the last failure, if any.
    pub last_error: String,
    /// Consecutive failures; reset to zero on a successful exit.
    pub failure_count: u32,
    /// Wall-clock duration of the last finished execution.
    pub last_duration: Duration,
    /// Alert-suppression state for the current failure or run.
    pub alert: AlertState,
}

impl JobRecord {
    /// Creates a fresh record for a command first observed at `now`.
    #[must_use]
    pub fn new(command: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            command: command.into(),
            last_execution: now,
            active: None,
            last_exit_code: 0,
            last_error: String::new(),
            failure_count: 0,
            last_duration: Duration::ZERO,
            alert: AlertState::Unnotified,
        }
    }

    /// Returns true if an execution is currently in flight.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.active.is_some()
    }
}

/// The kind of an emitted cron event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CronEventKind {
    /// A job exited with a non-ignored, nonzero exit code.
    CronError,
    /// A job exceeded its configured or default timeout.
    LongRunning,
}

impl CronEventKind {
    /// Returns the kind as a string tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CronError => "cron_error",
            Self::LongRunning => "long_running",
        }
    }
}

impl std::fmt::Display for CronEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An emitted notification about a job execution.
///
/// Events are produced by the correlator and handed to the delivery path;
/// they are never stored by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronEvent {
    /// Unique identifier for this event.
    pub id: Uuid,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// Exit code of the failed job, or [`TIMEOUT_EXIT_CODE`] for timeouts.
    pub exit_code: i32,
    /// Human-readable description.
    pub message: String,
    /// The job command this event concerns.
    pub command: String,
    /// Event kind tag.
    pub kind: CronEventKind,
}

impl CronEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(
        kind: CronEventKind,
        command: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            exit_code,
            message: message.into(),
            command: command.into(),
            kind,
        }
    }
}

/// Configuration snapshot for the correlator.
///
/// Externally supplied and read-only for the duration of a check cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    /// Master switch; a disabled correlator performs no work.
    pub enabled: bool,
    /// Track any command seen in the logs. When off, only commands that
    /// appear in `timeouts` or `ignored_exit_codes` are tracked.
    pub auto_discover: bool,
    /// Explicit log file to tail instead of the journal.
    pub log_path: Option<PathBuf>,
    /// Journal unit to query when no explicit log path is set.
    pub journal_unit: String,
    /// Default timeout for jobs without an override. Zero disables
    /// timeout alerting for such jobs.
    pub default_timeout: Duration,
    /// Per-command timeout overrides.
    pub timeouts: HashMap<String, Duration>,
    /// Per-command exit codes that should not raise alerts.
    pub ignored_exit_codes: HashMap<String, Vec<i32>>,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_discover: true,
            log_path: None,
            journal_unit: "cron.service".to_string(),
            default_timeout: Duration::ZERO,
            timeouts: HashMap::new(),
            ignored_exit_codes: HashMap::new(),
        }
    }
}

impl CronConfig {
    /// Returns true if `exit_code` is on the ignore list for `command`.
    #[must_use]
    pub fn is_ignored(&self, command: &str, exit_code: i32) -> bool {
        self.ignored_exit_codes
            .get(command)
            .is_some_and(|codes| codes.contains(&exit_code))
    }

    /// Returns the effective timeout for `command` (override or default).
    #[must_use]
    pub fn timeout_for(&self, command: &str) -> Duration {
        self.timeouts
            .get(command)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    /// Returns true if `command` is explicitly configured, making it
    /// trackable even with auto-discovery disabled.
    #[must_use]
    pub fn is_known_command(&self, command: &str) -> bool {
        self.timeouts.contains_key(command) || self.ignored_exit_codes.contains_key(command)
    }
}
