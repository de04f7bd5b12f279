//! Agent configuration.
//!
//! One JSON file configures the whole agent: identity, data directory,
//! cadences, and the per-subsystem sections consumed by the cron
//! correlator, the health monitor, and the delivery queue.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_cron::CronConfig;
use vigil_health::HealthConfig;

use crate::error::{AgentError, Result};

fn default_server_id() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/vigil")
}

const fn default_check_interval() -> Duration {
    Duration::from_secs(60)
}

const fn default_flush_interval() -> Duration {
    Duration::from_secs(30)
}

const fn default_queue_capacity() -> usize {
    1000
}

/// Main agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Identity this host reports under (defaults to the system hostname).
    #[serde(default = "default_server_id")]
    pub server_id: String,
    /// Directory for persisted state (queue snapshot, status rows).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// How often the monitoring cycle runs.
    #[serde(default = "default_check_interval")]
    pub check_interval: Duration,
    /// How often buffered payloads are retried.
    #[serde(default = "default_flush_interval")]
    pub flush_interval: Duration,
    /// Maximum number of buffered payloads before oldest-first eviction.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Scheduled-job correlation settings.
    #[serde(default)]
    pub cron: CronConfig,
    /// Health evaluation settings.
    #[serde(default)]
    pub health: HealthConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_id: default_server_id(),
            data_dir: default_data_dir(),
            check_interval: default_check_interval(),
            flush_interval: default_flush_interval(),
            queue_capacity: default_queue_capacity(),
            cron: CronConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// parsed values fail validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| AgentError::Config {
            reason: format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ),
        })?;

        Self::from_json(&content)
    }

    /// Parses configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| AgentError::Config {
            reason: format!("invalid JSON: {e}"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for values the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server_id.is_empty() {
            return Err(AgentError::Config {
                reason: "server_id cannot be empty".to_string(),
            });
        }

        if self.check_interval.is_zero() {
            return Err(AgentError::Config {
                reason: "check_interval must be greater than zero".to_string(),
            });
        }

        if self.flush_interval.is_zero() {
            return Err(AgentError::Config {
                reason: "flush_interval must be greater than zero".to_string(),
            });
        }

        if self.queue_capacity == 0 {
            return Err(AgentError::Config {
                reason: "queue_capacity must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
