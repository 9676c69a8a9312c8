//! # Pending-Query Table
//!
//! Maps correlation ids of outstanding queries to the one-shot resolver of
//! the suspended caller.
//!
//! Flow:
//! 1. `execute` calls [`PendingQueries::register`] and gets a fresh
//!    correlation id plus a oneshot receiver.
//! 2. The query envelope is published carrying that id.
//! 3. The inbound loop receives the result envelope and calls
//!    [`PendingQueries::resolve`].
//! 4. `execute` awaits the receiver, racing it against the fixed timeout;
//!    the loser is suppressed by removal from the table before acting.
//!
//! Removal-on-first-trigger guarantees at-most-once resolution per id: a
//! result arriving after the entry is gone is logged and dropped, never
//! surfaced to any caller.

use crate::message::QueryResult;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// An outstanding query awaiting its result.
struct PendingEntry {
    /// Channel resolving the suspended caller.
    sender: oneshot::Sender<QueryResult>,
    /// When the query was registered.
    registered_at: Instant,
    /// Query name (for logging).
    query: String,
}

/// Counters over the lifetime of one table.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Queries registered.
    pub registered: AtomicU64,
    /// Queries resolved by a matching result.
    pub completed: AtomicU64,
    /// Entries evicted unresolved (timeout or abandoned publish).
    pub evicted: AtomicU64,
    /// Results that arrived with no matching entry.
    pub orphaned: AtomicU64,
}

/// Table of outstanding queries, keyed by correlation id.
///
/// Correlation ids come from a per-table monotonic counter, so they are
/// unique among one bus's outstanding requests; they are scoped to the
/// issuing bus, not globally.
pub struct PendingQueries {
    entries: DashMap<u64, PendingEntry>,
    next_id: AtomicU64,
    stats: PendingStats,
}

impl PendingQueries {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
            stats: PendingStats::default(),
        }
    }

    /// Register an outstanding query.
    ///
    /// Returns the fresh correlation id and the receiver the caller
    /// suspends on.
    pub fn register(&self, query: &str) -> (u64, oneshot::Receiver<QueryResult>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        self.entries.insert(
            id,
            PendingEntry {
                sender: tx,
                registered_at: Instant::now(),
                query: query.to_string(),
            },
        );
        self.stats.registered.fetch_add(1, Ordering::Relaxed);

        debug!(correlation_id = id, query = query, "registered pending query");

        (id, rx)
    }

    /// Resolve an outstanding query with its result.
    ///
    /// Returns true if an entry existed and the waiter was resolved. An
    /// unknown id (already resolved, already timed out, or never ours) is
    /// logged and dropped; it is never an error.
    pub fn resolve(&self, id: u64, result: QueryResult) -> bool {
        let Some((_, entry)) = self.entries.remove(&id) else {
            self.stats.orphaned.fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = id,
                code = result.code,
                "result for unknown or expired correlation id, dropped"
            );
            return false;
        };

        let waited = entry.registered_at.elapsed();
        match entry.sender.send(result) {
            Ok(()) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = id,
                    query = entry.query,
                    waited_ms = waited.as_millis() as u64,
                    "resolved pending query"
                );
                true
            }
            Err(_) => {
                // Receiver already gone; the caller stopped waiting.
                self.stats.orphaned.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = id,
                    query = entry.query,
                    "pending query waiter dropped"
                );
                false
            }
        }
    }

    /// Remove an entry without resolving it (timeout expiry, or an
    /// abandoned publish). Returns true if the entry was still present.
    pub fn evict(&self, id: u64) -> bool {
        if let Some((_, entry)) = self.entries.remove(&id) {
            self.stats.evicted.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = id,
                query = entry.query,
                "evicted pending query"
            );
            true
        } else {
            false
        }
    }

    /// Number of currently outstanding queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no query is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

impl Default for PendingQueries {
    fn default() -> Self {
        Self::new()
    }
}
