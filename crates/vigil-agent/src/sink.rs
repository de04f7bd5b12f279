//! Outbound delivery seam.
//!
//! The agent hands every outbound payload to an [`EventSink`]. Production
//! deployments bridge this to whatever transport carries data off the host;
//! the bundled [`LogSink`] writes payloads to the tracing log, which keeps a
//! bare agent useful without any upstream at all.

use tracing::info;

/// Destination for outbound payloads.
///
/// A failed delivery returns the transport's error text; the agent buffers
/// the payload in the delivery queue and retries later.
pub trait EventSink: Send + Sync {
    /// Returns the sink's name for logging.
    fn name(&self) -> &str;

    /// Attempts to deliver one payload of the given kind.
    ///
    /// # Errors
    ///
    /// Returns the transport error text when delivery fails.
    fn deliver(&self, kind: &str, payload: &[u8]) -> std::result::Result<(), String>;
}

/// A sink that writes every payload to the tracing log.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, kind: &str, payload: &[u8]) -> std::result::Result<(), String> {
        info!(
            kind,
            payload = %String::from_utf8_lossy(payload),
            "outbound payload"
        );
        Ok(())
    }
}
