//! Agent error types.

use thiserror::Error;

/// Errors surfaced by the agent runner.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The cron correlator failed a check cycle.
    #[error("cron monitor error: {0}")]
    Cron(#[from] vigil_cron::CronError),

    /// The health monitor failed to persist a status row.
    #[error("health monitor error: {0}")]
    Health(#[from] vigil_health::HealthError),

    /// The delivery queue failed to persist its snapshot.
    #[error("delivery queue error: {0}")]
    Queue(#[from] vigil_queue::QueueError),

    /// A payload could not be serialized for delivery.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The configuration file is missing or malformed.
    #[error("configuration error: {reason}")]
    Config {
        /// What went wrong.
        reason: String,
    },

    /// Filesystem error while reading or writing configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_reason() {
        let err = AgentError::Config {
            reason: "missing server_id".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: missing server_id");
    }

    #[test]
    fn io_error_converts() {
        let err: AgentError = std::io::Error::other("boom").into();
        assert!(matches!(err, AgentError::Io(_)));
    }
}
