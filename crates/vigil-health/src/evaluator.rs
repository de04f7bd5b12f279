//! Pure health evaluation.
//!
//! Turns one metric snapshot into a status and reason. The order is a
//! fixed tie-break, not a numeric maximum: staleness short-circuits
//! everything, then critical resources in CPU/memory/disk order, then the
//! same order at the warning threshold.

use crate::types::{HealthConfig, HealthState, MetricSnapshot};

/// Evaluates a snapshot into a status and human-readable reason.
///
/// `stale` is derived by the caller from the snapshot's age against the
/// configured offline timeout; a stale snapshot is Offline regardless of
/// its metric values.
#[must_use]
pub fn evaluate(
    snapshot: &MetricSnapshot,
    stale: bool,
    config: &HealthConfig,
) -> (HealthState, String) {
    if !config.enabled {
        return (HealthState::Healthy, "monitoring disabled".to_string());
    }

    if stale {
        return (
            HealthState::Offline,
            "no metrics received within the offline timeout".to_string(),
        );
    }

    let crit = config.critical_threshold;
    let warn = config.warning_threshold;

    if snapshot.cpu_percent >= crit {
        return (
            HealthState::Critical,
            format!("CPU usage critical: {:.1}%", snapshot.cpu_percent),
        );
    }
    if snapshot.memory_percent >= crit {
        return (
            HealthState::Critical,
            format!("memory usage critical: {:.1}%", snapshot.memory_percent),
        );
    }
    if snapshot.disk_percent >= crit {
        return (
            HealthState::Critical,
            format!("disk usage critical: {:.1}%", snapshot.disk_percent),
        );
    }
    if snapshot.cpu_percent >= warn {
        return (
            HealthState::Warning,
            format!("CPU usage high: {:.1}%", snapshot.cpu_percent),
        );
    }
    if snapshot.memory_percent >= warn {
        return (
            HealthState::Warning,
            format!("memory usage high: {:.1}%", snapshot.memory_percent),
        );
    }
    if snapshot.disk_percent >= warn {
        return (
            HealthState::Warning,
            format!("disk usage high: {:.1}%", snapshot.disk_percent),
        );
    }
    if snapshot.clock_drift {
        return (
            HealthState::Warning,
            "system clock drift detected".to_string(),
        );
    }

    (
        HealthState::Healthy,
        "all resources within thresholds".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use test_case::test_case;

    fn snapshot(cpu: f64, mem: f64, disk: f64) -> MetricSnapshot {
        MetricSnapshot::new(cpu, mem, disk, Utc::now())
    }

    #[test_case(85.0, 60.0, 70.0, HealthState::Warning ; "warning cpu")]
    #[test_case(96.0, 50.0, 50.0, HealthState::Critical ; "critical cpu")]
    #[test_case(50.0, 96.0, 50.0, HealthState::Critical ; "critical memory")]
    #[test_case(50.0, 50.0, 96.0, HealthState::Critical ; "critical disk")]
    #[test_case(50.0, 85.0, 50.0, HealthState::Warning ; "warning memory")]
    #[test_case(50.0, 50.0, 85.0, HealthState::Warning ; "warning disk")]
    #[test_case(50.0, 50.0, 50.0, HealthState::Healthy ; "all nominal")]
    fn default_thresholds(cpu: f64, mem: f64, disk: f64, expected: HealthState) {
        let config = HealthConfig::default();
        let (status, _) = evaluate(&snapshot(cpu, mem, disk), false, &config);
        assert_eq!(status, expected);
    }

    #[test]
    fn stale_snapshot_is_offline_regardless_of_values() {
        let config = HealthConfig::default();
        let (status, reason) = evaluate(&snapshot(10.0, 10.0, 10.0), true, &config);
        assert_eq!(status, HealthState::Offline);
        assert!(reason.contains("offline timeout"));
    }

    #[test]
    fn critical_cpu_wins_the_tie_break() {
        let config = HealthConfig::default();
        let (status, reason) = evaluate(&snapshot(96.0, 97.0, 98.0), false, &config);
        assert_eq!(status, HealthState::Critical);
        assert!(reason.starts_with("CPU"), "CPU is checked first: {reason}");
    }

    #[test]
    fn critical_beats_warning_on_other_resources() {
        let config = HealthConfig::default();
        let (status, reason) = evaluate(&snapshot(85.0, 96.0, 50.0), false, &config);
        assert_eq!(status, HealthState::Critical);
        assert!(reason.contains("memory"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let config = HealthConfig::default();
        let (status, _) = evaluate(&snapshot(80.0, 0.0, 0.0), false, &config);
        assert_eq!(status, HealthState::Warning);
        let (status, _) = evaluate(&snapshot(95.0, 0.0, 0.0), false, &config);
        assert_eq!(status, HealthState::Critical);
    }

    #[test]
    fn clock_drift_warns_when_otherwise_healthy() {
        let config = HealthConfig::default();
        let drifting = snapshot(10.0, 10.0, 10.0).with_clock_drift();
        let (status, reason) = evaluate(&drifting, false, &config);
        assert_eq!(status, HealthState::Warning);
        assert!(reason.contains("clock drift"));
    }

    #[test]
    fn resource_pressure_outranks_clock_drift() {
        let config = HealthConfig::default();
        let drifting = snapshot(10.0, 10.0, 85.0).with_clock_drift();
        let (_, reason) = evaluate(&drifting, false, &config);
        assert!(reason.contains("disk"));
    }

    #[test]
    fn disabled_monitoring_is_always_healthy() {
        let config = HealthConfig {
            enabled: false,
            ..HealthConfig::default()
        };
        let (status, reason) = evaluate(&snapshot(99.0, 99.0, 99.0), true, &config);
        assert_eq!(status, HealthState::Healthy);
        assert_eq!(reason, "monitoring disabled");
    }
}
