//! Error types for the vigil-queue crate.

use thiserror::Error;

/// Errors that can occur while operating the delivery queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue snapshot could not be read or written.
    #[error("persistence error: {0}")]
    Persist(#[from] vigil_persist::PersistError),
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_wraps_persist() {
        let io_err = std::io::Error::other("disk full");
        let err = QueueError::Persist(io_err.into());
        assert!(err.to_string().contains("disk full"));
    }
}
