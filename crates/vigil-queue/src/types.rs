//! Core types for the delivery queue.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A payload waiting for (re)delivery to the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedItem {
    /// Monotonic identity; also encodes insertion order.
    pub id: u64,
    /// Opaque payload kind tag (e.g. `metrics`, `cron_event`).
    pub kind: String,
    /// Opaque payload bytes; the queue never inspects them.
    pub payload: Vec<u8>,
    /// When the item was first enqueued. Never changes afterwards;
    /// backoff eligibility is measured against this.
    pub created_at: DateTime<Utc>,
    /// Number of failed delivery attempts so far.
    pub retries: u32,
    /// Error text from the most recent failed attempt.
    pub last_error: String,
}

impl QueuedItem {
    /// Returns the item's age at `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// Returns true if the item is due for a (re)delivery attempt.
    ///
    /// Fresh items are always eligible; retried items wait out the staged
    /// backoff measured from their original creation time, so failed
    /// attempts never push the eligibility window further out.
    #[must_use]
    pub fn eligible(&self, now: DateTime<Utc>) -> bool {
        if self.retries == 0 {
            return true;
        }
        self.age(now) >= backoff_for(self.retries)
    }
}

/// Staged, capped backoff schedule indexed by retry count.
#[must_use]
pub const fn backoff_for(retries: u32) -> Duration {
    let secs = match retries {
        0 => 5,
        1 => 10,
        2 => 20,
        3 => 30,
        4 => 45,
        _ => 60,
    };
    Duration::from_secs(secs)
}

/// Read-only introspection of the queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    /// Number of queued items.
    pub total: usize,
    /// Item counts per payload kind.
    pub by_kind: HashMap<String, usize>,
    /// Item counts per retry count.
    pub by_retries: HashMap<u32, usize>,
    /// Age of the oldest queued item, if any.
    pub oldest_age: Option<Duration>,
    /// Whether direct delivery is currently succeeding.
    pub connected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 5)]
    #[test_case(1, 10)]
    #[test_case(2, 20)]
    #[test_case(3, 30)]
    #[test_case(4, 45)]
    #[test_case(5, 60)]
    #[test_case(6, 60 ; "capped above five")]
    #[test_case(40, 60 ; "capped far above five")]
    fn backoff_table(retries: u32, expected_secs: u64) {
        assert_eq!(backoff_for(retries), Duration::from_secs(expected_secs));
    }

    #[test]
    fn fresh_item_is_immediately_eligible() {
        let now = Utc::now();
        let item = QueuedItem {
            id: 1,
            kind: "metrics".to_string(),
            payload: vec![],
            created_at: now,
            retries: 0,
            last_error: String::new(),
        };
        assert!(item.eligible(now));
    }

    #[test]
    fn retried_item_waits_from_creation_not_last_attempt() {
        let now = Utc::now();
        let item = QueuedItem {
            id: 1,
            kind: "metrics".to_string(),
            payload: vec![],
            created_at: now - chrono::Duration::seconds(59),
            retries: 6,
            last_error: "timeout".to_string(),
        };
        // 59s old with a 60s capped backoff: not yet.
        assert!(!item.eligible(now));
        // One second later the window opens, regardless of when the last
        // attempt happened.
        assert!(item.eligible(now + chrono::Duration::seconds(1)));
    }
}
