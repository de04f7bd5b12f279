//! Core types for host-health tracking.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The health status of a monitored host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// No evaluation has happened yet.
    #[default]
    Unknown,
    /// All resources within thresholds.
    Healthy,
    /// At least one resource crossed the warning threshold.
    Warning,
    /// At least one resource crossed the critical threshold.
    Critical,
    /// No metrics arrived within the offline timeout.
    Offline,
    /// Back within thresholds, waiting out the stability window.
    Recovering,
}

impl HealthState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Offline => "offline",
            Self::Recovering => "recovering",
        }
    }

    /// Returns true if this state detours through Recovering on the way
    /// back to Healthy.
    #[must_use]
    pub const fn requires_stability(&self) -> bool {
        matches!(self, Self::Offline | Self::Critical)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One sampled set of resource metrics for a host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// CPU utilization in percent.
    pub cpu_percent: f64,
    /// Memory utilization in percent.
    pub memory_percent: f64,
    /// Disk utilization in percent.
    pub disk_percent: f64,
    /// True when the host clock drifts from the reference clock.
    pub clock_drift: bool,
    /// When the sample was taken.
    pub sampled_at: DateTime<Utc>,
}

impl MetricSnapshot {
    /// Creates a snapshot with the given utilization percentages.
    #[must_use]
    pub const fn new(
        cpu_percent: f64,
        memory_percent: f64,
        disk_percent: f64,
        sampled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cpu_percent,
            memory_percent,
            disk_percent,
            clock_drift: false,
            sampled_at,
        }
    }

    /// Marks the snapshot as exhibiting clock drift.
    #[must_use]
    pub const fn with_clock_drift(mut self) -> Self {
        self.clock_drift = true;
        self
    }
}

/// The persisted status row for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Current status.
    pub status: HealthState,
    /// When the status value last *changed*. Dwell time in
    /// [`HealthState::Recovering`] is measured against this, so it must
    /// never move on evaluations that retain the same status.
    pub last_change: DateTime<Utc>,
    /// Human-readable reason for the current status.
    pub reason: String,
}

impl HealthRecord {
    /// Creates the initial record for a host first seen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            status: HealthState::Unknown,
            last_change: now,
            reason: "no evaluation yet".to_string(),
        }
    }
}

/// Thresholds and windows for health evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Master switch; disabled monitoring always evaluates to Healthy.
    pub enabled: bool,
    /// Utilization percent at which a resource is a warning.
    pub warning_threshold: f64,
    /// Utilization percent at which a resource is critical.
    pub critical_threshold: f64,
    /// A snapshot older than this marks the host Offline.
    pub offline_timeout: Duration,
    /// Minimum dwell time in Recovering before Healthy is final.
    /// Zero skips the Recovering detour entirely.
    pub stability_window: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warning_threshold: 80.0,
            critical_threshold: 95.0,
            offline_timeout: Duration::from_secs(300),
            stability_window: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_unknown() {
        assert_eq!(HealthState::default(), HealthState::Unknown);
    }

    #[test]
    fn only_offline_and_critical_require_stability() {
        assert!(HealthState::Offline.requires_stability());
        assert!(HealthState::Critical.requires_stability());
        assert!(!HealthState::Warning.requires_stability());
        assert!(!HealthState::Healthy.requires_stability());
        assert!(!HealthState::Unknown.requires_stability());
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(HealthState::Recovering.to_string(), "recovering");
        assert_eq!(HealthState::Offline.as_str(), "offline");
    }

    #[test]
    fn snapshot_builder_sets_drift() {
        let snapshot = MetricSnapshot::new(10.0, 20.0, 30.0, Utc::now()).with_clock_drift();
        assert!(snapshot.clock_drift);
    }

    #[test]
    fn default_config_matches_documented_thresholds() {
        let config = HealthConfig::default();
        assert!((config.warning_threshold - 80.0).abs() < f64::EPSILON);
        assert!((config.critical_threshold - 95.0).abs() < f64::EPSILON);
        assert!(config.enabled);
    }
}
