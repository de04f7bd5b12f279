//! Job-execution correlation engine.
//!
//! The [`CronMonitor`] owns the per-command job table and reconciles two
//! independent, asynchronously arriving signals: start/failure observations
//! extracted from scheduler log lines, and kernel-level process-exit
//! notifications. Exits that arrive before their start observation are
//! parked in the [`OrphanCache`](crate::orphans::OrphanCache) and adopted
//! retroactively; failures detected through either path are alerted exactly
//! once per unresolved failure.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::orphans::{OrphanCache, OrphanExit};
use crate::patterns::{self, FailureObservation, Observation, StartObservation};
use crate::source::{LogReader, LogSource};
use crate::types::{
    ActiveRun, AlertState, CronConfig, CronEvent, CronEventKind, JobRecord, TIMEOUT_EXIT_CODE,
};

/// Failure lines older than this are treated as historical replay and
/// dropped (restart or rotation re-reads old entries).
const RECENCY_WINDOW_SECS: i64 = 120;

/// Job records inactive longer than this are dropped by [`CronMonitor::cleanup`].
/// Sized to tolerate weekly jobs and weekend gaps.
const RETENTION_DAYS: i64 = 7;

/// Mutable correlation state, guarded by a single lock.
///
/// The scheduler tick ([`CronMonitor::check`]) and the asynchronous kernel
/// exit feed ([`CronMonitor::report_exit`]) both mutate this; the reporting
/// path reads it. One mutex serializes all of them.
struct MonitorState {
    jobs: HashMap<String, JobRecord>,
    orphans: OrphanCache,
    reader: Box<dyn LogSource>,
    last_check: Option<DateTime<Utc>>,
}

/// The job-execution correlator.
pub struct CronMonitor {
    config: CronConfig,
    state: Mutex<MonitorState>,
}

impl std::fmt::Debug for CronMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CronMonitor {
    /// Creates a monitor reading logs per the configured source selection.
    #[must_use]
    pub fn new(config: CronConfig) -> Self {
        let reader = LogReader::from_config(&config);
        Self::with_source(config, Box::new(reader))
    }

    /// Creates a monitor with an explicit log source.
    #[must_use]
    pub fn with_source(config: CronConfig, source: Box<dyn LogSource>) -> Self {
        Self {
            config,
            state: Mutex::new(MonitorState {
                jobs: HashMap::new(),
                orphans: OrphanCache::new(),
                reader: source,
                last_check: None,
            }),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CronConfig {
        &self.config
    }

    /// Runs one check cycle: ingest new log lines, update the job table,
    /// and return the events produced this cycle.
    ///
    /// A disabled monitor returns an empty sequence without side effects.
    ///
    /// # Errors
    ///
    /// Returns an error when the log source cannot be read; no observations
    /// are processed that cycle and state is left unchanged for retry.
    pub fn check(&self, now: DateTime<Utc>) -> Result<Vec<CronEvent>> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }

        let mut state = self.state.lock();
        let prev_check = state.last_check;
        let since =
            prev_check.unwrap_or_else(|| now - ChronoDuration::seconds(RECENCY_WINDOW_SECS));

        let lines = state.reader.read_new(since)?;

        let mut events = Vec::new();
        {
            let MonitorState { jobs, orphans, .. } = &mut *state;

            for line in &lines {
                if !patterns::is_cron_line(line) {
                    continue;
                }
                match patterns::extract(line) {
                    Some(Observation::Failure(failure)) => {
                        self.ingest_failure(&failure, now, &mut events);
                    }
                    Some(Observation::Start(start)) => {
                        self.ingest_start(jobs, orphans, &start, now);
                    }
                    None => {}
                }
            }

            self.alert_pass(jobs, now, &mut events);
            self.timeout_pass(jobs, prev_check, now, &mut events);
        }

        state.last_check = Some(now);

        if !events.is_empty() {
            info!(events = events.len(), "check cycle produced events");
        }
        Ok(events)
    }

    /// Ingests a kernel exit notification for a traced process.
    ///
    /// Matches the exit against active runs by pid, parent pid, namespace
    /// pid, or namespace parent pid; unmatched exits are cached as orphans
    /// under both their host and namespace pids, and the orphan cache is
    /// swept for expired entries.
    pub fn report_exit(
        &self,
        pid: u32,
        parent_pid: u32,
        ns_pid: u32,
        ns_parent_pid: u32,
        exit_code: i32,
        now: DateTime<Utc>,
    ) {
        let mut state = self.state.lock();

        let matched = state.jobs.values_mut().find(|job| {
            job.active.as_ref().is_some_and(|run| {
                run.pid == pid
                    || run.pid == parent_pid
                    || run.pid == ns_pid
                    || run.pid == ns_parent_pid
            })
        });

        if let Some(job) = matched {
            if let Some(run) = job.active.take() {
                job.last_exit_code = exit_code;
                job.last_duration = (now - run.started_at).to_std().unwrap_or_default();
                // Re-arming here is what makes both the dedup pass and the
                // finished-variant timeout one-shot per execution.
                job.alert = AlertState::Unnotified;
                if exit_code == 0 {
                    job.failure_count = 0;
                } else {
                    job.failure_count += 1;
                    job.last_error = patterns::describe_exit_code(exit_code);
                }
                debug!(
                    command = %job.command,
                    pid,
                    exit_code,
                    duration_secs = job.last_duration.as_secs(),
                    "matched exit to active run"
                );
            }
            return;
        }

        debug!(pid, ns_pid, exit_code, "no active run matched, caching orphan exit");
        state.orphans.insert(OrphanExit {
            pid,
            parent_pid,
            ns_pid,
            ns_parent_pid,
            exit_code,
            stored_at: now,
        });
        state.orphans.sweep(now);
    }

    /// Removes job records inactive for more than seven days.
    ///
    /// Returns the number of records removed.
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock();
        let before = state.jobs.len();
        state
            .jobs
            .retain(|_, job| now - job.last_execution <= ChronoDuration::days(RETENTION_DAYS));
        let removed = before - state.jobs.len();
        if removed > 0 {
            info!(removed, "dropped stale job records");
        }
        removed
    }

    /// Returns a snapshot of all tracked job records, sorted by command.
    ///
    /// Safe to call from the reporting path at any time; it serializes with
    /// the tick through the same lock.
    #[must_use]
    pub fn tracked_jobs(&self) -> Vec<JobRecord> {
        let state = self.state.lock();
        let mut jobs: Vec<JobRecord> = state.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.command.cmp(&b.command));
        jobs
    }

    /// Returns the record for one command, if tracked.
    #[must_use]
    pub fn job(&self, command: &str) -> Option<JobRecord> {
        let state = self.state.lock();
        state.jobs.get(command).cloned()
    }

    fn ingest_failure(
        &self,
        failure: &FailureObservation,
        now: DateTime<Utc>,
        events: &mut Vec<CronEvent>,
    ) {
        if let Some(ts) = failure.timestamp {
            if (now - ts).num_seconds() > RECENCY_WINDOW_SECS {
                debug!(command = %failure.command, "dropping stale failure line");
                return;
            }
        }

        if self.config.is_ignored(&failure.command, failure.exit_code) {
            debug!(
                command = %failure.command,
                exit_code = failure.exit_code,
                "exit code is on the ignore list"
            );
            return;
        }

        let message = format!(
            "Cron job '{}' for user {} failed with exit code {}: {}",
            failure.command,
            failure.user,
            failure.exit_code,
            patterns::describe_exit_code(failure.exit_code)
        );
        events.push(CronEvent::new(
            CronEventKind::CronError,
            &failure.command,
            failure.exit_code,
            message,
            now,
        ));
    }

    fn ingest_start(
        &self,
        jobs: &mut HashMap<String, JobRecord>,
        orphans: &mut OrphanCache,
        start: &StartObservation,
        now: DateTime<Utc>,
    ) {
        if start.command.is_empty() {
            return;
        }
        if !self.config.auto_discover && !self.config.is_known_command(&start.command) {
            debug!(command = %start.command, "auto-discovery off, ignoring unknown command");
            return;
        }

        let job = jobs
            .entry(start.command.clone())
            .or_insert_with(|| JobRecord::new(&start.command, now));
        job.active = Some(ActiveRun {
            pid: start.pid,
            started_at: now,
        });
        job.last_execution = now;

        // The exit may have been observed before this start line was read.
        if let Some(orphan) = orphans.take(start.pid) {
            debug!(
                command = %job.command,
                pid = start.pid,
                exit_code = orphan.exit_code,
                "adopted orphaned exit"
            );
            job.last_exit_code = orphan.exit_code;
            job.active = None;
            if orphan.exit_code != 0 {
                job.failure_count += 1;
                job.last_error = patterns::describe_exit_code(orphan.exit_code);
                job.alert = AlertState::Unnotified;
            }
        }
    }

    /// The sole alerting path for failures detected purely via kernel
    /// tracing: any record with an unnotified nonzero exit gets exactly one
    /// `cron_error` event.
    fn alert_pass(
        &self,
        jobs: &mut HashMap<String, JobRecord>,
        now: DateTime<Utc>,
        events: &mut Vec<CronEvent>,
    ) {
        for job in jobs.values_mut() {
            if job.last_exit_code == 0
                || job.alert.is_notified()
                || self.config.is_ignored(&job.command, job.last_exit_code)
            {
                continue;
            }

            let message = format!(
                "Cron job '{}' failed with exit code {}: {}",
                job.command,
                job.last_exit_code,
                patterns::describe_exit_code(job.last_exit_code)
            );
            events.push(CronEvent::new(
                CronEventKind::CronError,
                &job.command,
                job.last_exit_code,
                message,
                now,
            ));
            job.alert = AlertState::Notified;
        }
    }

    fn timeout_pass(
        &self,
        jobs: &mut HashMap<String, JobRecord>,
        prev_check: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        events: &mut Vec<CronEvent>,
    ) {
        for job in jobs.values_mut() {
            let timeout = self.config.timeout_for(&job.command);
            if timeout.is_zero() || job.alert.is_notified() {
                continue;
            }

            if let Some(run) = job.active {
                let elapsed = (now - run.started_at).to_std().unwrap_or_default();
                if elapsed > timeout {
                    let message = format!(
                        "Cron job '{}' has been running for {}s (timeout {}s)",
                        job.command,
                        elapsed.as_secs(),
                        timeout.as_secs()
                    );
                    events.push(CronEvent::new(
                        CronEventKind::LongRunning,
                        &job.command,
                        TIMEOUT_EXIT_CODE,
                        message,
                        now,
                    ));
                    job.alert = AlertState::Notified;
                }
            } else if prev_check.is_some_and(|prev| job.last_execution >= prev)
                && job.last_duration > timeout
            {
                // The run started and finished between two checks, so the
                // active branch above never saw it.
                let message = format!(
                    "Cron job '{}' ran for {}s (timeout {}s) before finishing",
                    job.command,
                    job.last_duration.as_secs(),
                    timeout.as_secs()
                );
                events.push(CronEvent::new(
                    CronEventKind::LongRunning,
                    &job.command,
                    TIMEOUT_EXIT_CODE,
                    message,
                    now,
                ));
                job.alert = AlertState::Notified;
            }
        }
    }
}
