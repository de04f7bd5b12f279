//! The durable delivery queue.
//!
//! [`DeliveryQueue`] persists outbound payloads that could not be delivered
//! directly, replays them on a staged backoff schedule, and evicts oldest
//! entries under capacity pressure. Callers drive delivery through the
//! `pending` / `mark_sent` / `mark_failed` protocol; the queue itself never
//! touches the network.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use vigil_persist::JsonStore;

use crate::error::Result;
use crate::types::{QueueStats, QueuedItem};

/// Maximum number of items one `pending` call returns.
const PENDING_BATCH_LIMIT: usize = 100;

struct QueueState {
    /// Items keyed by id. Ids are monotonic, so iteration order is
    /// insertion (and therefore creation) order.
    items: BTreeMap<u64, QueuedItem>,
    next_id: u64,
}

/// Persistent FIFO-ish delivery queue with staged retry backoff.
pub struct DeliveryQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    store: JsonStore,
    connected: AtomicBool,
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("capacity", &self.capacity)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl DeliveryQueue {
    /// Opens the queue, loading any buffered items from `data_dir`.
    ///
    /// `capacity` is clamped to at least one item.
    #[must_use]
    pub fn new(capacity: usize, data_dir: impl AsRef<Path>) -> Self {
        let store = JsonStore::new(data_dir, "queue");
        let loaded: Vec<QueuedItem> = store.load();
        let next_id = loaded.iter().map(|i| i.id).max().map_or(1, |max| max + 1);
        let items: BTreeMap<u64, QueuedItem> =
            loaded.into_iter().map(|item| (item.id, item)).collect();

        if !items.is_empty() {
            info!(count = items.len(), "loaded buffered items from disk");
        }

        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState { items, next_id }),
            store,
            connected: AtomicBool::new(true),
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers a payload for later delivery, evicting oldest items first
    /// so the queue never exceeds its capacity after the insert completes.
    ///
    /// Returns the new item's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn enqueue(&self, kind: &str, payload: Vec<u8>, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock();

        while state.items.len() + 1 > self.capacity {
            if let Some((id, evicted)) = state.items.pop_first() {
                warn!(
                    id,
                    kind = %evicted.kind,
                    retries = evicted.retries,
                    "queue over capacity, evicting oldest item"
                );
            } else {
                break;
            }
        }

        let id = state.next_id;
        state.next_id += 1;
        state.items.insert(
            id,
            QueuedItem {
                id,
                kind: kind.to_string(),
                payload,
                created_at: now,
                retries: 0,
                last_error: String::new(),
            },
        );

        self.store.save(&state.items.values().collect::<Vec<_>>())?;
        debug!(id, kind, queued = state.items.len(), "buffered payload");
        Ok(id)
    }

    /// Returns up to 100 items due for (re)delivery, oldest first.
    #[must_use]
    pub fn pending(&self, now: DateTime<Utc>) -> Vec<QueuedItem> {
        let state = self.state.lock();
        state
            .items
            .values()
            .filter(|item| item.eligible(now))
            .take(PENDING_BATCH_LIMIT)
            .cloned()
            .collect()
    }

    /// Removes a successfully delivered item.
    ///
    /// Returns true if the item existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn mark_sent(&self, id: u64) -> Result<bool> {
        let mut state = self.state.lock();
        let removed = state.items.remove(&id).is_some();
        if removed {
            self.store.save(&state.items.values().collect::<Vec<_>>())?;
            debug!(id, remaining = state.items.len(), "delivered buffered item");
        }
        Ok(removed)
    }

    /// Records a failed delivery attempt: bumps the retry count and stores
    /// the error text. The creation timestamp is deliberately untouched.
    ///
    /// Returns true if the item existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn mark_failed(&self, id: u64, error: &str) -> Result<bool> {
        let mut state = self.state.lock();
        let Some(item) = state.items.get_mut(&id) else {
            return Ok(false);
        };
        item.retries += 1;
        item.last_error = error.to_string();
        debug!(id, retries = item.retries, error, "delivery attempt failed");
        self.store.save(&state.items.values().collect::<Vec<_>>())?;
        Ok(true)
    }

    /// Returns the number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Returns a breakdown of the queue contents.
    #[must_use]
    pub fn stats(&self, now: DateTime<Utc>) -> QueueStats {
        let state = self.state.lock();
        let mut stats = QueueStats {
            total: state.items.len(),
            connected: self.is_connected(),
            ..QueueStats::default()
        };

        for item in state.items.values() {
            *stats.by_kind.entry(item.kind.clone()).or_default() += 1;
            *stats.by_retries.entry(item.retries).or_default() += 1;
        }
        stats.oldest_age = state.items.values().next().map(|item| item.age(now));

        stats
    }

    /// Records whether direct delivery is currently succeeding. Purely
    /// observational; it never gates queue behavior.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Returns the externally reported connectivity flag.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
