//! Time-bounded cache for exit notifications that arrived early.
//!
//! The kernel exit feed and the log observer race: a traced process can
//! terminate before its start line is read. Such exits are parked here,
//! keyed under every pid they might later be looked up by, until a start
//! observation adopts them or the 60-second TTL expires.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// How long an unmatched exit stays resolvable.
const ORPHAN_TTL_SECS: i64 = 60;

/// A process exit observed before any matching job start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanExit {
    /// Host-namespace pid of the exited process.
    pub pid: u32,
    /// Parent pid reported with the exit.
    pub parent_pid: u32,
    /// Pid as seen inside the process's pid namespace.
    pub ns_pid: u32,
    /// Parent pid inside the pid namespace.
    pub ns_parent_pid: u32,
    /// Exit code of the process.
    pub exit_code: i32,
    /// When the exit notification arrived.
    pub stored_at: DateTime<Utc>,
}

/// Lookup of orphaned exits, keyed by host pid and namespace pid.
#[derive(Debug, Default)]
pub struct OrphanCache {
    entries: HashMap<u32, OrphanExit>,
}

impl OrphanCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an orphan under its host pid and, if distinct, its
    /// namespace pid, so either key can retrieve it later.
    pub fn insert(&mut self, orphan: OrphanExit) {
        self.entries.insert(orphan.pid, orphan);
        if orphan.ns_pid != 0 && orphan.ns_pid != orphan.pid {
            self.entries.insert(orphan.ns_pid, orphan);
        }
    }

    /// Resolves and removes the orphan matching `pid`.
    ///
    /// Tries an exact key lookup first, then scans for an entry whose
    /// parent, namespace, or namespace-parent pid equals `pid`. The
    /// scheduler's logged pid is often a parent of the traced process, and
    /// the exit may have been observed from inside a different pid
    /// namespace than the log. The orphan is removed under every key it
    /// was stored under.
    pub fn take(&mut self, pid: u32) -> Option<OrphanExit> {
        let orphan = match self.entries.remove(&pid) {
            Some(orphan) => orphan,
            None => {
                let key = self
                    .entries
                    .iter()
                    .find(|(_, o)| {
                        o.parent_pid == pid || o.ns_pid == pid || o.ns_parent_pid == pid
                    })
                    .map(|(key, _)| *key)?;
                self.entries.remove(&key)?
            }
        };

        // Drop the aliases so a resolved orphan can never match again.
        self.entries.remove(&orphan.pid);
        self.entries.remove(&orphan.ns_pid);

        Some(orphan)
    }

    /// Discards entries older than the TTL.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        self.entries
            .retain(|_, o| (now - o.stored_at).num_seconds() <= ORPHAN_TTL_SECS);
    }

    /// Returns the number of keys currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
