//! # Transport Seam
//!
//! The external collaborator contract: a connected topic-based pub/sub
//! client. The transport owns connection establishment, authentication,
//! reconnection, wildcard matching, and per-topic delivery order; the bus
//! only declares subscribe patterns and publishes/consumes raw payloads.

use async_trait::async_trait;
use thiserror::Error;

/// A raw message delivered by the transport for a subscribed pattern.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Concrete topic the message was published on.
    pub topic: String,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

/// Errors from transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is not connected.
    #[error("transport is not connected")]
    NotConnected,

    /// The connection is closed and will not deliver further messages.
    #[error("transport connection closed")]
    Closed,

    /// A publish was not accepted.
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// A subscription was not accepted.
    #[error("subscribe to {pattern} failed: {reason}")]
    Subscribe { pattern: String, reason: String },

    /// Opening the connection failed.
    #[error("dial failed: {0}")]
    Dial(String),
}

/// A live pub/sub connection the bus binds to.
///
/// Implementations need interior mutability: the bus shares one transport
/// between its public API and its spawned inbound loop.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Subscribe to a topic pattern. Wildcard semantics (`+`, `#`) are the
    /// transport's own.
    async fn subscribe(&self, pattern: &str) -> Result<(), TransportError>;

    /// Publish a payload on a concrete topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Whether the transport currently reports itself connected.
    fn is_connected(&self) -> bool;

    /// Resolves once the transport signals connected; immediately if it
    /// already is.
    async fn connected(&self);

    /// Next inbound message for any subscribed pattern, in transport
    /// delivery order. `None` means the connection closed.
    async fn recv(&self) -> Option<InboundMessage>;
}
