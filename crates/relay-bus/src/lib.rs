//! # Relay Bus - Event Broadcast and Query RPC
//!
//! Turns a topic-based publish/subscribe transport into two higher-level
//! primitives:
//!
//! - **Events**: fire-and-forget broadcast to every other bus instance.
//! - **Queries**: request/response RPC addressed to a single bus instance,
//!   correlated per call and bounded by a fixed timeout.
//!
//! ## Topology
//!
//! ```text
//! ┌──────────────┐                          ┌──────────────┐
//! │   Bus "a"    │   bus/a/events           │   Bus "b"    │
//! │              │ ────────┐                │              │
//! │  dispatch()  │         ▼                │ subscribe()  │
//! └──────────────┘   ┌───────────┐          └──────────────┘
//!        │           │ Transport │                 ▲
//!        │           │ (broker)  │ ────────────────┘
//!        │           └───────────┘   bus/+/events
//!        │                 ▲
//!        │  bus/b/rpc      │   bus/a/rpc
//!        └─────────────────┘ ◄──── query results echo the
//!           execute()               caller's correlation id
//! ```
//!
//! The transport collaborator owns connection establishment, reconnection,
//! wildcard matching, and per-topic delivery order. This crate adds only
//! application-level routing, correlation, and timeout on top of it; it
//! does not guarantee delivery, cross-topic ordering, or exactly-once
//! semantics.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod connector;
pub mod envelope;
pub mod error;
pub mod message;
pub mod pending;
pub mod registry;
pub mod transport;

// Re-export main types
pub use bus::Bus;
pub use connector::{Connector, Dialer};
pub use envelope::{events_topic, rpc_topic, DecodeError, Envelope, EVENTS_WILDCARD};
pub use error::BusError;
pub use message::{BusId, Event, Query, QueryResult, RemoteEvent};
pub use pending::{PendingQueries, PendingStats};
pub use registry::{EventHandler, QueryHandler, QueryRegistry, SubscriptionRegistry};
pub use transport::{InboundMessage, Transport, TransportError};

use std::time::Duration;

/// Window an outstanding query waits for its result before it times out.
///
/// Fixed, not caller-configurable.
pub const QUERY_TIMEOUT: Duration = Duration::from_millis(5000);
