//! The agent runner.
//!
//! [`Agent`] wires the three subsystems together: each tick runs the cron
//! check cycle and the health evaluation, then hands every resulting payload
//! to the [`EventSink`]. Failed deliveries land in the delivery queue and are
//! drained on the flush cadence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use vigil_cron::{CronEvent, CronMonitor, LogSource};
use vigil_health::{HealthMonitor, MetricSnapshot, StatusChange};
use vigil_queue::DeliveryQueue;

use crate::config::AgentConfig;
use crate::error::Result;
use crate::sink::EventSink;

/// Payload kind for cron failure and timeout events.
pub const KIND_CRON_EVENT: &str = "cron_event";
/// Payload kind for health status transitions.
pub const KIND_STATUS_CHANGE: &str = "status_change";
/// Payload kind for forwarded metric snapshots.
pub const KIND_METRICS: &str = "metrics";

/// How often old job rows are purged.
const CLEANUP_INTERVAL_SECS: i64 = 24 * 60 * 60;

/// The host-resident monitoring agent.
pub struct Agent {
    config: AgentConfig,
    cron: CronMonitor,
    health: HealthMonitor,
    queue: DeliveryQueue,
    sink: Box<dyn EventSink>,
    last_cleanup: Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("server_id", &self.config.server_id)
            .field("sink", &self.sink.name())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Creates an agent from configuration with the default log source and
    /// the given sink.
    #[must_use]
    pub fn new(config: AgentConfig, sink: Box<dyn EventSink>) -> Self {
        let cron = CronMonitor::new(config.cron.clone());
        Self::assemble(config, cron, sink)
    }

    /// Creates an agent reading scheduler lines from the given source.
    #[must_use]
    pub fn with_log_source(
        config: AgentConfig,
        source: Box<dyn LogSource>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        let cron = CronMonitor::with_source(config.cron.clone(), source);
        Self::assemble(config, cron, sink)
    }

    fn assemble(config: AgentConfig, cron: CronMonitor, sink: Box<dyn EventSink>) -> Self {
        let health = HealthMonitor::new(config.health.clone(), &config.data_dir);
        let queue = DeliveryQueue::new(config.queue_capacity, &config.data_dir);

        Self {
            config,
            cron,
            health,
            queue,
            sink,
            last_cleanup: Mutex::new(None),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the health monitor, for notifier registration.
    #[must_use]
    pub const fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Returns the delivery queue.
    #[must_use]
    pub const fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    /// Returns the cron monitor.
    #[must_use]
    pub const fn cron(&self) -> &CronMonitor {
        &self.cron
    }

    /// Feeds a metric snapshot for this host into the health monitor.
    pub fn record_metrics(&self, snapshot: MetricSnapshot) {
        self.health
            .record_snapshot(&self.config.server_id, snapshot);
    }

    /// Records a metric snapshot and forwards it through the sink.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be serialized or a failed
    /// delivery cannot be buffered.
    pub fn publish_metrics(&self, snapshot: MetricSnapshot, now: DateTime<Utc>) -> Result<()> {
        self.record_metrics(snapshot);
        let payload = serde_json::to_vec(&snapshot)?;
        self.dispatch(KIND_METRICS, payload, now)
    }

    /// Reports a traced process exit to the cron correlator.
    pub fn report_exit(
        &self,
        pid: u32,
        parent_pid: u32,
        ns_pid: u32,
        ns_parent_pid: u32,
        exit_code: i32,
        now: DateTime<Utc>,
    ) {
        self.cron
            .report_exit(pid, parent_pid, ns_pid, ns_parent_pid, exit_code, now);
    }

    /// Runs one monitoring cycle: cron check, health evaluation, delivery.
    ///
    /// # Errors
    ///
    /// Returns an error when a subsystem fails to persist state or a payload
    /// cannot be serialized. Delivery failures are not errors; those payloads
    /// are buffered in the queue.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        for event in self.cron.check(now)? {
            self.dispatch_cron_event(&event, now)?;
        }

        let update = self.health.update_status(&self.config.server_id, now)?;
        if update.changed() {
            let change = StatusChange {
                server_id: self.config.server_id.clone(),
                old_status: update.old_status,
                new_status: update.new_status,
                old_reason: update.old_reason,
                new_reason: update.new_reason,
                changed_at: now,
            };
            let payload = serde_json::to_vec(&change)?;
            self.dispatch(KIND_STATUS_CHANGE, payload, now)?;
        }

        self.maybe_cleanup(now)?;
        Ok(())
    }

    fn dispatch_cron_event(&self, event: &CronEvent, now: DateTime<Utc>) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.dispatch(KIND_CRON_EVENT, payload, now)
    }

    fn dispatch(&self, kind: &str, payload: Vec<u8>, now: DateTime<Utc>) -> Result<()> {
        match self.sink.deliver(kind, &payload) {
            Ok(()) => {
                self.queue.set_connected(true);
                Ok(())
            }
            Err(e) => {
                warn!(kind, sink = %self.sink.name(), error = %e, "delivery failed, buffering");
                self.queue.set_connected(false);
                self.queue.enqueue(kind, payload, now)?;
                Ok(())
            }
        }
    }

    /// Drains eligible buffered payloads through the sink.
    ///
    /// Stops at the first failed delivery so an unreachable upstream is not
    /// hammered with the whole backlog. Returns the number delivered.
    ///
    /// # Errors
    ///
    /// Returns an error when the queue snapshot cannot be persisted.
    pub fn flush(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut delivered = 0;

        for item in self.queue.pending(now) {
            match self.sink.deliver(&item.kind, &item.payload) {
                Ok(()) => {
                    self.queue.mark_sent(item.id)?;
                    delivered += 1;
                }
                Err(e) => {
                    debug!(id = item.id, error = %e, "buffered delivery failed");
                    self.queue.mark_failed(item.id, &e)?;
                    self.queue.set_connected(false);
                    return Ok(delivered);
                }
            }
        }

        if delivered > 0 {
            self.queue.set_connected(true);
            info!(delivered, remaining = self.queue.len(), "flushed buffered payloads");
        }
        Ok(delivered)
    }

    fn maybe_cleanup(&self, now: DateTime<Utc>) -> Result<()> {
        let mut last = self.last_cleanup.lock();
        let due = last.is_none_or(|t| (now - t).num_seconds() >= CLEANUP_INTERVAL_SECS);
        if due {
            let removed = self.cron.cleanup(now);
            if removed > 0 {
                info!(removed, "purged stale job rows");
            }
            *last = Some(now);
        }
        Ok(())
    }

    /// Runs the agent loop until the shutdown signal fires.
    ///
    /// Ticks on `check_interval`, flushes on `flush_interval`. Subsystem
    /// errors are logged and the loop carries on; they are treated as
    /// transient.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            server_id = %self.config.server_id,
            check_interval_secs = self.config.check_interval.as_secs(),
            flush_interval_secs = self.config.flush_interval.as_secs(),
            "agent started"
        );

        let mut check = tokio::time::interval(self.config.check_interval);
        let mut flush = tokio::time::interval(self.config.flush_interval);

        loop {
            tokio::select! {
                _ = check.tick() => {
                    if let Err(e) = self.tick(Utc::now()) {
                        error!(error = %e, "monitoring cycle failed");
                    }
                }
                _ = flush.tick() => {
                    if !self.queue.is_empty() {
                        if let Err(e) = self.flush(Utc::now()) {
                            error!(error = %e, "queue flush failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("shutdown signal received, stopping agent");
                    break;
                }
            }
        }
    }
}
