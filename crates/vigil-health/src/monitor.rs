//! The health hysteresis state machine.
//!
//! [`HealthMonitor`] keeps the latest metric snapshot and the persisted
//! status row per host, applies the debounced recovery path, and notifies
//! registered [`StatusNotifier`]s on every status change, and only on
//! changes.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use vigil_persist::JsonStore;

use crate::error::Result;
use crate::evaluator::evaluate;
use crate::types::{HealthConfig, HealthRecord, HealthState, MetricSnapshot};

/// A status transition reported to notifiers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusChange {
    /// The host whose status changed.
    pub server_id: String,
    /// Status before the change.
    pub old_status: HealthState,
    /// Status after the change.
    pub new_status: HealthState,
    /// Reason attached to the previous status.
    pub old_reason: String,
    /// Reason attached to the new status.
    pub new_reason: String,
    /// When the change happened.
    pub changed_at: DateTime<Utc>,
}

/// Consumer of status transitions (the forwarding path is out of scope
/// for this crate; implementations bridge to it).
pub trait StatusNotifier: Send + Sync {
    /// Returns the notifier's name for logging.
    fn name(&self) -> &str;

    /// Called once per status change.
    fn notify(&self, change: &StatusChange);
}

/// A notifier that writes transitions to the tracing log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, change: &StatusChange) {
        info!(
            server_id = %change.server_id,
            old_status = %change.old_status,
            new_status = %change.new_status,
            reason = %change.new_reason,
            "health status changed"
        );
    }
}

/// The outcome of one [`HealthMonitor::update_status`] call.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// Status before this evaluation.
    pub old_status: HealthState,
    /// Status after this evaluation.
    pub new_status: HealthState,
    /// Reason before this evaluation.
    pub old_reason: String,
    /// Reason after this evaluation.
    pub new_reason: String,
}

impl StatusUpdate {
    /// Returns true if the status value changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.old_status != self.new_status
    }
}

struct MonitorState {
    snapshots: HashMap<String, MetricSnapshot>,
    records: HashMap<String, HealthRecord>,
}

/// Per-host health tracking with hysteresis and persisted status rows.
pub struct HealthMonitor {
    config: HealthConfig,
    state: Mutex<MonitorState>,
    store: JsonStore,
    notifiers: RwLock<Vec<Box<dyn StatusNotifier>>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HealthMonitor {
    /// Creates a monitor persisting status rows under `data_dir`, loading
    /// any existing rows from disk.
    #[must_use]
    pub fn new(config: HealthConfig, data_dir: impl AsRef<Path>) -> Self {
        let store = JsonStore::new(data_dir, "health");
        let records: HashMap<String, HealthRecord> = store.load();
        debug!(count = records.len(), "loaded health records from disk");

        Self {
            config,
            state: Mutex::new(MonitorState {
                snapshots: HashMap::new(),
                records,
            }),
            store,
            notifiers: RwLock::new(Vec::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Registers a notifier for status transitions.
    pub fn add_notifier(&self, notifier: Box<dyn StatusNotifier>) {
        debug!(notifier = %notifier.name(), "registered status notifier");
        self.notifiers.write().push(notifier);
    }

    /// Records the latest metric snapshot for a host.
    pub fn record_snapshot(&self, server_id: &str, snapshot: MetricSnapshot) {
        let mut state = self.state.lock();
        state.snapshots.insert(server_id.to_string(), snapshot);
    }

    /// Returns the current status row for a host, if any.
    #[must_use]
    pub fn status(&self, server_id: &str) -> Option<HealthRecord> {
        let state = self.state.lock();
        state.records.get(server_id).cloned()
    }

    /// Evaluates the latest snapshot for a host, applies hysteresis, and
    /// persists the result.
    ///
    /// The transition *into* Healthy from Offline or Critical detours
    /// through Recovering when the stability window is nonzero; the dwell
    /// time there is measured against the last status *change*, so
    /// evaluations that keep the status do not reset the clock.
    ///
    /// # Errors
    ///
    /// Returns an error when the status row cannot be persisted; the
    /// caller should treat it as transient and retry next cycle.
    pub fn update_status(&self, server_id: &str, now: DateTime<Utc>) -> Result<StatusUpdate> {
        let mut state = self.state.lock();

        let prior = state
            .records
            .get(server_id)
            .cloned()
            .unwrap_or_else(|| HealthRecord::new(now));

        let snapshot = state.snapshots.get(server_id).copied();
        let stale = snapshot
            .is_none_or(|s| (now - s.sampled_at).to_std().unwrap_or_default() > self.config.offline_timeout);
        let snapshot = snapshot.unwrap_or(MetricSnapshot::new(0.0, 0.0, 0.0, now));

        let (evaluated, eval_reason) = evaluate(&snapshot, stale, &self.config);

        let (new_status, new_reason) = match (prior.status, evaluated) {
            (HealthState::Recovering, HealthState::Healthy) => {
                let dwell = (now - prior.last_change).to_std().unwrap_or_default();
                if dwell >= self.config.stability_window {
                    (HealthState::Healthy, eval_reason)
                } else {
                    // Hold the original reason while waiting out the window.
                    (HealthState::Recovering, prior.reason.clone())
                }
            }
            (previous, HealthState::Healthy)
                if previous.requires_stability()
                    && !self.config.stability_window.is_zero() =>
            {
                (
                    HealthState::Recovering,
                    format!("recovering from {previous}"),
                )
            }
            (_, status) => (status, eval_reason),
        };

        let update = StatusUpdate {
            old_status: prior.status,
            new_status,
            old_reason: prior.reason.clone(),
            new_reason: new_reason.clone(),
        };

        if update.changed() {
            // Persist against a candidate copy first; the in-memory record
            // is committed only once the row is on disk, so a transient
            // save failure leaves the transition pending for the next
            // cycle to retry (and to notify).
            let mut records = state.records.clone();
            records.insert(
                server_id.to_string(),
                HealthRecord {
                    status: new_status,
                    last_change: now,
                    reason: new_reason,
                },
            );
            self.store.save(&records)?;
            state.records = records;
            drop(state);

            let change = StatusChange {
                server_id: server_id.to_string(),
                old_status: update.old_status,
                new_status: update.new_status,
                old_reason: update.old_reason.clone(),
                new_reason: update.new_reason.clone(),
                changed_at: now,
            };
            for notifier in self.notifiers.read().iter() {
                notifier.notify(&change);
            }
        } else if new_reason != prior.reason && state.records.contains_key(server_id) {
            // Same status, fresher reason: update the row but leave the
            // last-change timestamp alone. Same discipline, disk first.
            let mut records = state.records.clone();
            if let Some(record) = records.get_mut(server_id) {
                record.reason = new_reason;
            }
            self.store.save(&records)?;
            state.records = records;
        }

        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid date")
    }

    fn monitor_in(dir: &Path, config: HealthConfig) -> HealthMonitor {
        HealthMonitor::new(config, dir)
    }

    fn fresh(cpu: f64, mem: f64, disk: f64, at: DateTime<Utc>) -> MetricSnapshot {
        MetricSnapshot::new(cpu, mem, disk, at)
    }

    #[derive(Default)]
    struct CountingNotifier {
        calls: Arc<AtomicUsize>,
    }

    impl StatusNotifier for CountingNotifier {
        fn name(&self) -> &str {
            "counting"
        }

        fn notify(&self, _change: &StatusChange) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn first_evaluation_moves_unknown_to_healthy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let monitor = monitor_in(dir.path(), HealthConfig::default());
        let now = t0();

        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, now));
        let update = monitor.update_status("web-1", now).expect("update");

        assert_eq!(update.old_status, HealthState::Unknown);
        assert_eq!(update.new_status, HealthState::Healthy);
        assert!(update.changed());
    }

    #[test]
    fn missing_snapshot_is_offline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let monitor = monitor_in(dir.path(), HealthConfig::default());

        let update = monitor.update_status("web-1", t0()).expect("update");
        assert_eq!(update.new_status, HealthState::Offline);
    }

    #[test]
    fn stale_snapshot_goes_offline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let monitor = monitor_in(dir.path(), HealthConfig::default());
        let now = t0();

        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, now));
        let update = monitor
            .update_status("web-1", now + ChronoDuration::seconds(301))
            .expect("update");
        assert_eq!(update.new_status, HealthState::Offline);
    }

    #[test]
    fn critical_to_healthy_detours_through_recovering() {
        let dir = tempfile::tempdir().expect("tempdir");
        let monitor = monitor_in(dir.path(), HealthConfig::default());
        let now = t0();

        monitor.record_snapshot("web-1", fresh(96.0, 10.0, 10.0, now));
        let update = monitor.update_status("web-1", now).expect("update");
        assert_eq!(update.new_status, HealthState::Critical);

        let later = now + ChronoDuration::seconds(30);
        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, later));
        let update = monitor.update_status("web-1", later).expect("update");
        assert_eq!(update.new_status, HealthState::Recovering);
        assert!(update.new_reason.contains("critical"));
    }

    #[test]
    fn recovering_holds_until_stability_window_elapses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let monitor = monitor_in(dir.path(), HealthConfig::default());
        let now = t0();

        monitor.record_snapshot("web-1", fresh(96.0, 10.0, 10.0, now));
        monitor.update_status("web-1", now).expect("update");

        let entered = now + ChronoDuration::seconds(10);
        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, entered));
        monitor.update_status("web-1", entered).expect("update");
        let original_reason = monitor.status("web-1").expect("record").reason;

        // 119 seconds after entering Recovering: still recovering, same reason.
        let almost = entered + ChronoDuration::seconds(119);
        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, almost));
        let update = monitor.update_status("web-1", almost).expect("update");
        assert_eq!(update.new_status, HealthState::Recovering);
        assert_eq!(update.new_reason, original_reason);
        assert!(!update.changed());

        // At 120 seconds the transition is final.
        let done = entered + ChronoDuration::seconds(120);
        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, done));
        let update = monitor.update_status("web-1", done).expect("update");
        assert_eq!(update.new_status, HealthState::Healthy);
    }

    #[test]
    fn repeated_recovering_evaluations_do_not_reset_the_clock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let monitor = monitor_in(dir.path(), HealthConfig::default());
        let now = t0();

        monitor.record_snapshot("web-1", fresh(96.0, 10.0, 10.0, now));
        monitor.update_status("web-1", now).expect("update");

        let entered = now + ChronoDuration::seconds(10);
        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, entered));
        monitor.update_status("web-1", entered).expect("update");
        let change_stamp = monitor.status("web-1").expect("record").last_change;

        // Several evaluations inside the window must not move last_change.
        for offset in [30, 60, 90] {
            let at = entered + ChronoDuration::seconds(offset);
            monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, at));
            monitor.update_status("web-1", at).expect("update");
            assert_eq!(
                monitor.status("web-1").expect("record").last_change,
                change_stamp
            );
        }

        // So the window elapses relative to entry, not the last evaluation.
        let done = entered + ChronoDuration::seconds(120);
        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, done));
        let update = monitor.update_status("web-1", done).expect("update");
        assert_eq!(update.new_status, HealthState::Healthy);
    }

    #[test]
    fn zero_stability_window_skips_recovering() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = HealthConfig {
            stability_window: Duration::ZERO,
            ..HealthConfig::default()
        };
        let monitor = monitor_in(dir.path(), config);
        let now = t0();

        monitor.record_snapshot("web-1", fresh(96.0, 10.0, 10.0, now));
        monitor.update_status("web-1", now).expect("update");

        let later = now + ChronoDuration::seconds(30);
        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, later));
        let update = monitor.update_status("web-1", later).expect("update");
        assert_eq!(update.new_status, HealthState::Healthy);
    }

    #[test]
    fn warning_to_healthy_needs_no_recovery() {
        let dir = tempfile::tempdir().expect("tempdir");
        let monitor = monitor_in(dir.path(), HealthConfig::default());
        let now = t0();

        monitor.record_snapshot("web-1", fresh(85.0, 10.0, 10.0, now));
        monitor.update_status("web-1", now).expect("update");

        let later = now + ChronoDuration::seconds(30);
        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, later));
        let update = monitor.update_status("web-1", later).expect("update");
        assert_eq!(update.new_status, HealthState::Healthy);
    }

    #[test]
    fn notifier_fires_once_per_change() {
        let dir = tempfile::tempdir().expect("tempdir");
        let monitor = monitor_in(dir.path(), HealthConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        monitor.add_notifier(Box::new(CountingNotifier {
            calls: Arc::clone(&calls),
        }));
        let now = t0();

        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, now));
        monitor.update_status("web-1", now).expect("update");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "unknown -> healthy");

        // Unchanged evaluations are silent.
        for offset in [60, 120, 180] {
            let at = now + ChronoDuration::seconds(offset);
            monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, at));
            monitor.update_status("web-1", at).expect("update");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let at = now + ChronoDuration::seconds(240);
        monitor.record_snapshot("web-1", fresh(96.0, 10.0, 10.0, at));
        monitor.update_status("web-1", at).expect("update");
        assert_eq!(calls.load(Ordering::SeqCst), 2, "healthy -> critical");
    }

    #[test]
    fn failed_persist_leaves_transition_pending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocked = dir.path().join("state");
        // Occupy the data directory path with a regular file so the row
        // cannot be written.
        std::fs::write(&blocked, b"").expect("write");

        let monitor = monitor_in(&blocked, HealthConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        monitor.add_notifier(Box::new(CountingNotifier {
            calls: Arc::clone(&calls),
        }));
        let now = t0();

        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, now));
        let result = monitor.update_status("web-1", now);
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no notify without a row");
        assert!(
            monitor.status("web-1").is_none(),
            "unsaved transition must not commit"
        );

        // Clear the blockage; the next cycle carries the full transition.
        std::fs::remove_file(&blocked).expect("remove");
        std::fs::create_dir(&blocked).expect("mkdir");

        let retry = now + ChronoDuration::seconds(60);
        monitor.record_snapshot("web-1", fresh(10.0, 10.0, 10.0, retry));
        let update = monitor.update_status("web-1", retry).expect("update");
        assert!(update.changed());
        assert_eq!(update.new_status, HealthState::Healthy);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(blocked.join("health.json").exists());
    }

    #[test]
    fn status_rows_survive_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let now = t0();

        {
            let monitor = monitor_in(dir.path(), HealthConfig::default());
            monitor.record_snapshot("web-1", fresh(96.0, 10.0, 10.0, now));
            monitor.update_status("web-1", now).expect("update");
        }

        let monitor = monitor_in(dir.path(), HealthConfig::default());
        let record = monitor.status("web-1").expect("persisted record");
        assert_eq!(record.status, HealthState::Critical);
        assert_eq!(record.last_change, now);
    }
}
