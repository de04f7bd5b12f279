//! Error types for the vigil-health crate.

use thiserror::Error;

/// Errors that can occur while tracking host health.
#[derive(Debug, Error)]
pub enum HealthError {
    /// The status store could not be read or written.
    #[error("persistence error: {0}")]
    Persist(#[from] vigil_persist::PersistError),
}

/// Result type for health operations.
pub type Result<T> = std::result::Result<T, HealthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_wraps_persist() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = HealthError::Persist(io_err.into());
        assert!(err.to_string().contains("denied"));
    }
}
