//! # Handler Registries
//!
//! Per-bus registries binding event names to subscriber callbacks and query
//! names to their single handler. Both are owned state of one [`crate::Bus`]
//! instance; nothing here is process-global.

use crate::message::{Query, QueryResult, RemoteEvent};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Callback invoked for every matching remote event.
pub type EventHandler = Arc<dyn Fn(RemoteEvent) + Send + Sync>;

/// Handler producing the result for a named query. May suspend.
pub type QueryHandler = Arc<dyn Fn(Query) -> BoxFuture<'static, QueryResult> + Send + Sync>;

/// Ordered event-name → subscribers mapping.
///
/// Multiple handlers per name are permitted; all are invoked on a matching
/// event, in registration order. Entries persist for the lifetime of the
/// bus; there is no unsubscribe operation.
#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the list for `event`.
    pub fn subscribe(&self, event: &str, handler: EventHandler) {
        debug_assert!(!event.is_empty(), "event name must be non-empty");
        self.handlers
            .write()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    /// Snapshot of the handlers registered for `event`, in registration
    /// order. Cloned out so no lock is held while handlers run.
    #[must_use]
    pub fn handlers_for(&self, event: &str) -> Vec<EventHandler> {
        self.handlers
            .read()
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of handlers registered for `event`.
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.read().get(event).map_or(0, Vec::len)
    }
}

/// Query-name → handler mapping. At most one handler per name; a later
/// registration silently replaces the earlier one.
#[derive(Default)]
pub struct QueryRegistry {
    handlers: RwLock<HashMap<String, QueryHandler>>,
}

impl QueryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `query`, replacing any earlier binding.
    pub fn bind(&self, query: &str, handler: QueryHandler) {
        debug_assert!(!query.is_empty(), "query name must be non-empty");
        self.handlers.write().insert(query.to_string(), handler);
    }

    /// The handler currently bound to `query`, if any. Cloned out so no
    /// lock is held while the handler runs.
    #[must_use]
    pub fn get(&self, query: &str) -> Option<QueryHandler> {
        self.handlers.read().get(query).cloned()
    }
}
