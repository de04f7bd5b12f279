//! Error types for the vigil-cron crate.

use thiserror::Error;

/// Errors that can occur while correlating job executions.
#[derive(Debug, Error)]
pub enum CronError {
    /// The configured log source could not be read this cycle.
    #[error("log source unavailable: {reason}")]
    SourceUnavailable {
        /// Why the source could not be read.
        reason: String,
    },

    /// Filesystem access to a log file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for correlation operations.
pub type Result<T> = std::result::Result<T, CronError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_source_unavailable() {
        let err = CronError::SourceUnavailable {
            reason: "journal query timed out".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "log source unavailable: journal query timed out"
        );
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: CronError = io_err.into();
        assert!(matches!(err, CronError::Io(_)));
    }
}
