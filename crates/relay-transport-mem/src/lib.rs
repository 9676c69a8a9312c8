//! # In-Memory Broker Transport
//!
//! A process-local pub/sub broker implementing the bus's [`Transport`]
//! seam. Suitable for single-process operation, development, and the test
//! suite; distributed deployments would plug in a real broker client
//! behind the same trait.
//!
//! Semantics kept deliberately broker-like:
//! - clients attach to a shared [`MemoryBroker`] and subscribe topic
//!   patterns, where `+` matches exactly one topic segment and `#` the
//!   entire remainder;
//! - a publication is delivered to every attached client with a matching
//!   pattern, the publisher included (the bus filters its own traffic by
//!   envelope source, not the transport);
//! - per-client delivery order equals publication order (one unbounded
//!   queue per client);
//! - dropping a [`MemoryTransport`] detaches the client.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

use async_trait::async_trait;
use parking_lot::RwLock;
use relay_bus::{Dialer, InboundMessage, Transport, TransportError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

/// Match a topic against a subscription pattern.
///
/// Segment-wise over `/`: `+` matches exactly one segment, `#` matches
/// the whole remainder (including an empty one).
#[must_use]
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_segments = pattern.split('/');
    let mut topic_segments = topic.split('/');

    loop {
        match (pattern_segments.next(), topic_segments.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// One attached client: its subscription patterns and inbound queue.
struct ClientHandle {
    patterns: Vec<String>,
    sender: mpsc::UnboundedSender<InboundMessage>,
}

struct BrokerState {
    clients: RwLock<HashMap<u64, ClientHandle>>,
    next_client: AtomicU64,
}

/// A process-local pub/sub broker clients attach to.
///
/// Cheap to clone; clones share the same broker.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(BrokerState {
                clients: RwLock::new(HashMap::new()),
                next_client: AtomicU64::new(1),
            }),
        }
    }

    /// Attach a new client. The returned transport is immediately
    /// connected; it detaches on drop.
    #[must_use]
    pub fn attach(&self) -> MemoryTransport {
        let client_id = self.state.next_client.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.state.clients.write().insert(
            client_id,
            ClientHandle {
                patterns: Vec::new(),
                sender,
            },
        );
        debug!(client = client_id, "client attached");

        MemoryTransport {
            state: Arc::clone(&self.state),
            client_id,
            inbound: Mutex::new(receiver),
        }
    }

    /// Number of currently attached clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.state.clients.read().len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for MemoryBroker {
    /// The host string is irrelevant for an in-process broker.
    async fn dial(&self, _host: &str) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(self.attach()))
    }
}

/// One client's connection to a [`MemoryBroker`].
pub struct MemoryTransport {
    state: Arc<BrokerState>,
    client_id: u64,
    inbound: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn subscribe(&self, pattern: &str) -> Result<(), TransportError> {
        let mut clients = self.state.clients.write();
        let client = clients
            .get_mut(&self.client_id)
            .ok_or(TransportError::Closed)?;
        client.patterns.push(pattern.to_string());
        trace!(client = self.client_id, pattern = pattern, "subscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let clients = self.state.clients.read();
        for client in clients.values() {
            if client
                .patterns
                .iter()
                .any(|pattern| topic_matches(pattern, topic))
            {
                // A failed send means the client is detaching; skip it.
                let _ = client.sender.send(InboundMessage {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                });
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn connected(&self) {}

    async fn recv(&self) -> Option<InboundMessage> {
        self.inbound.lock().await.recv().await
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.state.clients.write().remove(&self.client_id);
        debug!(client = self.client_id, "client detached");
    }
}
