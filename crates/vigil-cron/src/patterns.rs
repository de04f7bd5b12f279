//! Log-line pattern extraction.
//!
//! Turns raw scheduler log lines into typed observations. A candidate line is
//! either a *failure observation* (the scheduler reported a failed job) or a
//! *start observation* (the scheduler launched a command). Everything else is
//! silently ignored; a single malformed line never aborts a check cycle.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// A typed observation extracted from one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The scheduler reported a failed job execution.
    Failure(FailureObservation),
    /// The scheduler launched a job command.
    Start(StartObservation),
}

/// A failure reported directly in the log text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureObservation {
    /// The user the job ran as (defaults to `root`).
    pub user: String,
    /// The job command, if the line carried one.
    pub command: String,
    /// Exit code parsed from the line (defaults to 1).
    pub exit_code: i32,
    /// Leading timestamp of the line, when parseable.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A job-start line: the scheduler forked a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartObservation {
    /// Process id the scheduler logged for the run.
    pub pid: u32,
    /// The launched command.
    pub command: String,
}

static USER_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"\(([^)]+)\)").unwrap()
});

static CMD_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"CMD \((.*)\)").unwrap()
});

static EXIT_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"(?i)exit code\s*(\d+)").unwrap()
});

static PID_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"(?i)cron\[(\d+)\]").unwrap()
});

/// Returns true if the line mentions the job scheduler at all.
#[must_use]
pub fn is_cron_line(line: &str) -> bool {
    line.to_lowercase().contains("cron")
}

/// Returns true if the line carries a failure marker.
#[must_use]
pub fn is_failure_line(line: &str) -> bool {
    line.to_lowercase().contains("fail")
}

/// Extracts a typed observation from a candidate line.
///
/// Returns `None` when the line matches no extraction rule (start lines
/// without a command, lines without a pid, plain chatter).
#[must_use]
pub fn extract(line: &str) -> Option<Observation> {
    if is_failure_line(line) {
        return Some(Observation::Failure(extract_failure(line)));
    }

    if line.contains("CMD") {
        let pid = PID_RE
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())?;
        let command = extract_command(line)?;
        if command.is_empty() {
            return None;
        }
        return Some(Observation::Start(StartObservation { pid, command }));
    }

    None
}

fn extract_failure(line: &str) -> FailureObservation {
    let user = USER_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map_or_else(|| "root".to_string(), |m| m.as_str().to_string());

    let command = extract_command(line).unwrap_or_default();

    let exit_code = EXIT_CODE_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1);

    FailureObservation {
        user,
        command,
        exit_code,
        timestamp: leading_timestamp(line),
    }
}

fn extract_command(line: &str) -> Option<String> {
    CMD_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Parses the leading timestamp of a log line, if present.
///
/// Accepts journald short-iso (`2024-06-01 12:00:01`) and RFC 3339 leading
/// tokens. Returns `None` for anything else so the caller can skip the
/// recency filter rather than drop the line.
#[must_use]
pub fn leading_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(first) {
        return Some(ts.with_timezone(&Utc));
    }

    let second = tokens.next()?;
    let joined = format!("{first} {second}");
    NaiveDateTime::parse_from_str(&joined, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Maps a job exit code to a human-readable description.
#[must_use]
pub fn describe_exit_code(code: i32) -> String {
    match code {
        1 => "General Error".to_string(),
        2 => "Misuse of Shell Builtins".to_string(),
        126 => "Command Cannot Execute".to_string(),
        127 => "Command Not Found".to_string(),
        128 => "Invalid Argument to Exit".to_string(),
        130 => "Terminated by Ctrl-C".to_string(),
        137 => "Killed (SIGKILL)".to_string(),
        139 => "Segmentation Fault".to_string(),
        143 => "Terminated (SIGTERM)".to_string(),
        c if c > 128 => format!("Signal {}", c - 128),
        _ => "Unknown Error".to_string(),
    }
}
