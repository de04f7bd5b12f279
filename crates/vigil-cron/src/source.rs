//! Log-source selection: journal query with file-tail fallback.
//!
//! This module provides:
//! - [`LogSource`]: the seam the correlator reads new lines through
//! - [`FileTail`]: direct file reading with per-path byte offsets and
//!   rotation detection
//! - [`JournalQuery`]: the unit-scoped structured query collaborator
//! - [`LogReader`]: the selection policy tying the two together

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::CronConfig;

/// Default log file tailed when neither an explicit path nor a working
/// journal query is available.
pub const DEFAULT_LOG_PATH: &str = "/var/log/syslog";

/// Source of new scheduler log lines for one check cycle.
pub trait LogSource: Send {
    /// Returns all lines that appeared since the previous call (or since
    /// `since` for query-backed sources).
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot be read this cycle; the
    /// caller aborts the cycle and retries on the next tick.
    fn read_new(&mut self, since: DateTime<Utc>) -> Result<Vec<String>>;
}

/// Unit-scoped structured log query (journald or equivalent).
///
/// Out-of-scope mechanics live behind this trait; the correlator only
/// depends on "lines for a unit since a timestamp".
pub trait JournalQuery: Send {
    /// Returns raw message lines for `unit` logged at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be queried; the reader falls
    /// back to direct file tailing.
    fn query_since(&mut self, unit: &str, since: DateTime<Utc>) -> Result<Vec<String>>;
}

/// Direct file reading with byte-offset tracking.
///
/// Each path remembers how far it has been read. A file whose current size
/// is smaller than the stored offset has been rotated; reading restarts
/// from byte zero.
#[derive(Debug, Default)]
pub struct FileTail {
    offsets: HashMap<PathBuf, u64>,
}

impl FileTail {
    /// Creates a tail with no recorded offsets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads all complete lines appended to `path` since the last call.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_new(&mut self, path: &Path) -> Result<Vec<String>> {
        let size = fs::metadata(path)?.len();
        let mut offset = self.offsets.get(path).copied().unwrap_or(0);

        if size < offset {
            debug!(path = %path.display(), "log file shrank, treating as rotated");
            offset = 0;
        }

        if size == offset {
            return Ok(Vec::new());
        }

        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buf = String::new();
        file.read_to_string(&mut buf)?;

        self.offsets.insert(path.to_path_buf(), size);
        Ok(buf.lines().map(str::to_string).collect())
    }
}

/// Source-selection policy for a check cycle.
///
/// An explicitly configured log path is always read directly. Otherwise the
/// journal query is preferred, with direct tailing of the default log file
/// as the fallback when the query fails.
pub struct LogReader {
    explicit_path: Option<PathBuf>,
    fallback_path: PathBuf,
    unit: String,
    journal: Option<Box<dyn JournalQuery>>,
    tail: FileTail,
}

impl std::fmt::Debug for LogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogReader")
            .field("explicit_path", &self.explicit_path)
            .field("fallback_path", &self.fallback_path)
            .field("unit", &self.unit)
            .field("has_journal", &self.journal.is_some())
            .finish_non_exhaustive()
    }
}

impl LogReader {
    /// Creates a reader from the correlator configuration.
    #[must_use]
    pub fn from_config(config: &CronConfig) -> Self {
        Self {
            explicit_path: config.log_path.clone(),
            fallback_path: PathBuf::from(DEFAULT_LOG_PATH),
            unit: config.journal_unit.clone(),
            journal: None,
            tail: FileTail::new(),
        }
    }

    /// Attaches a journal query collaborator.
    #[must_use]
    pub fn with_journal(mut self, journal: Box<dyn JournalQuery>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Overrides the fallback log path (the default is [`DEFAULT_LOG_PATH`]).
    #[must_use]
    pub fn with_fallback_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_path = path.into();
        self
    }
}

impl LogSource for LogReader {
    fn read_new(&mut self, since: DateTime<Utc>) -> Result<Vec<String>> {
        if let Some(path) = self.explicit_path.clone() {
            return self.tail.read_new(&path);
        }

        if let Some(journal) = self.journal.as_mut() {
            match journal.query_since(&self.unit, since) {
                Ok(lines) => return Ok(lines),
                Err(err) => {
                    warn!(unit = %self.unit, error = %err, "journal query failed, falling back to file tail");
                }
            }
        }

        let path = self.fallback_path.clone();
        self.tail.read_new(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CronError;
    use std::io::Write;

    fn write_lines(path: &Path, content: &str) {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("open");
        file.write_all(content.as_bytes()).expect("write");
    }

    mod file_tail_tests {
        use super::*;

        #[test]
        fn reads_whole_file_on_first_call() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("syslog");
            write_lines(&path, "line one\nline two\n");

            let mut tail = FileTail::new();
            let lines = tail.read_new(&path).expect("read");
            assert_eq!(lines, vec!["line one", "line two"]);
        }

        #[test]
        fn second_call_returns_only_appended_lines() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("syslog");
            write_lines(&path, "old\n");

            let mut tail = FileTail::new();
            tail.read_new(&path).expect("read");

            write_lines(&path, "new\n");
            let lines = tail.read_new(&path).expect("read");
            assert_eq!(lines, vec!["new"]);
        }

        #[test]
        fn unchanged_file_yields_nothing() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("syslog");
            write_lines(&path, "only\n");

            let mut tail = FileTail::new();
            tail.read_new(&path).expect("read");
            let lines = tail.read_new(&path).expect("read");
            assert!(lines.is_empty());
        }

        #[test]
        fn shrunk_file_restarts_from_zero() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("syslog");
            write_lines(&path, "a much longer first generation\n");

            let mut tail = FileTail::new();
            tail.read_new(&path).expect("read");

            // Rotation: the file is replaced by a shorter one.
            fs::write(&path, "fresh\n").expect("rewrite");
            let lines = tail.read_new(&path).expect("read");
            assert_eq!(lines, vec!["fresh"]);
        }

        #[test]
        fn missing_file_is_an_error() {
            let dir = tempfile::tempdir().expect("tempdir");
            let mut tail = FileTail::new();
            let err = tail.read_new(&dir.path().join("absent")).unwrap_err();
            assert!(matches!(err, CronError::Io(_)));
        }
    }

    mod log_reader_tests {
        use super::*;

        struct FailingJournal;

        impl JournalQuery for FailingJournal {
            fn query_since(&mut self, _unit: &str, _since: DateTime<Utc>) -> Result<Vec<String>> {
                Err(CronError::SourceUnavailable {
                    reason: "journal down".to_string(),
                })
            }
        }

        struct FixedJournal(Vec<String>);

        impl JournalQuery for FixedJournal {
            fn query_since(&mut self, _unit: &str, _since: DateTime<Utc>) -> Result<Vec<String>> {
                Ok(self.0.clone())
            }
        }

        #[test]
        fn explicit_path_bypasses_journal() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("cron.log");
            write_lines(&path, "from file\n");

            let config = CronConfig {
                log_path: Some(path),
                ..CronConfig::default()
            };
            let mut reader = LogReader::from_config(&config)
                .with_journal(Box::new(FixedJournal(vec!["from journal".to_string()])));

            let lines = reader.read_new(Utc::now()).expect("read");
            assert_eq!(lines, vec!["from file"]);
        }

        #[test]
        fn journal_is_preferred_without_explicit_path() {
            let config = CronConfig::default();
            let mut reader = LogReader::from_config(&config)
                .with_journal(Box::new(FixedJournal(vec!["from journal".to_string()])));

            let lines = reader.read_new(Utc::now()).expect("read");
            assert_eq!(lines, vec!["from journal"]);
        }

        #[test]
        fn journal_failure_falls_back_to_file() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("syslog");
            write_lines(&path, "fallback line\n");

            let config = CronConfig::default();
            let mut reader = LogReader::from_config(&config)
                .with_journal(Box::new(FailingJournal))
                .with_fallback_path(&path);

            let lines = reader.read_new(Utc::now()).expect("read");
            assert_eq!(lines, vec!["fallback line"]);
        }
    }
}
