//! # Bus Messages
//!
//! The application-level message types carried by the bus: events, queries,
//! and query results. Payloads are free-form JSON values; the bus never
//! inspects them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Opaque identifier of a bus instance.
///
/// Must be unique among cooperating instances: it namespaces the instance's
/// topics (`bus/{id}/rpc`, `bus/{id}/events`) and marks envelopes for
/// self-loop suppression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(String);

impl BusId {
    /// Create a bus id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BusId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BusId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A named notification with a free-form payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name subscribers register against.
    pub name: String,
    /// Free-form payload.
    pub data: Value,
}

impl Event {
    /// Create a new event.
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// An [`Event`] as delivered to local subscribers, carrying the id of the
/// bus that dispatched it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEvent {
    /// The originating bus.
    pub source: BusId,
    /// Event name.
    pub name: String,
    /// Free-form payload.
    pub data: Value,
}

/// A request addressed to exactly one target bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Query name the target looks up its handler by.
    pub name: String,
    /// Free-form payload.
    pub data: Value,
}

impl Query {
    /// Create a new query.
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Response to a [`Query`].
///
/// `code` carries the outcome: [`QueryResult::BAD_QUERY`] and
/// [`QueryResult::TIMEOUT`] are reserved, every other value is
/// handler-defined. Protocol-level failures never surface as errors to
/// callers of `execute`; they arrive as one of the reserved results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Outcome code.
    pub code: i64,
    /// Free-form payload.
    pub data: Value,
}

impl QueryResult {
    /// Reserved code: the target bus has no handler for the query name.
    pub const BAD_QUERY: i64 = 0;

    /// Reserved code: no result arrived within the timeout window.
    pub const TIMEOUT: i64 = -1;

    /// Create a new result.
    pub fn new(code: i64, data: Value) -> Self {
        Self { code, data }
    }

    /// The result synthesized for a query nobody handles.
    #[must_use]
    pub fn bad_query() -> Self {
        Self::new(Self::BAD_QUERY, json!({"error": "Bad query"}))
    }

    /// The result synthesized when the timeout window elapses.
    #[must_use]
    pub fn timeout() -> Self {
        Self::new(Self::TIMEOUT, json!({"error": "Timeout"}))
    }
}
