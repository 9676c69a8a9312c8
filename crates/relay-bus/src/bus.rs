//! # Bus Orchestrator
//!
//! Owns the handler registries and the pending-query table, binds to the
//! transport's inbound stream, decodes envelopes, and routes them:
//!
//! ```text
//! inbound ──decode──▶ src == own id? ──▶ drop (self-loop suppression)
//!                        │
//!          ┌─────────────┼──────────────┐
//!          ▼             ▼              ▼
//!       event          query          result
//!          │             │              │
//!   subscription    query registry   pending-query
//!     registry      (spawned, may       table
//!   (in order)        suspend)       (resolve id)
//! ```
//!
//! All registries and the pending table are owned by one `Bus` instance;
//! nothing is shared across instances except, indirectly, the transport.

use crate::envelope::{events_topic, rpc_topic, Envelope, EVENTS_WILDCARD};
use crate::error::BusError;
use crate::message::{BusId, Event, Query, QueryResult, RemoteEvent};
use crate::pending::{PendingQueries, PendingStats};
use crate::registry::{QueryRegistry, SubscriptionRegistry};
use crate::transport::{InboundMessage, Transport};
use crate::QUERY_TIMEOUT;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A node's local endpoint binding event/query semantics onto a shared
/// transport.
///
/// Cheap to clone; clones share the same underlying instance.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    id: BusId,
    transport: Arc<dyn Transport>,
    subscriptions: SubscriptionRegistry,
    queries: QueryRegistry,
    pending: PendingQueries,
}

impl Bus {
    /// Bind a bus identity to a live transport connection.
    ///
    /// Subscribes the instance's RPC topic and the events wildcard, then
    /// spawns the inbound dispatch loop. The connected-hook runs
    /// immediately if the transport already reports connected, otherwise
    /// on its future connect notification.
    pub async fn bind(
        id: impl Into<BusId>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, BusError> {
        let id = id.into();

        transport.subscribe(&rpc_topic(&id)).await?;
        transport.subscribe(EVENTS_WILDCARD).await?;

        let inner = Arc::new(BusInner {
            id,
            transport,
            subscriptions: SubscriptionRegistry::new(),
            queries: QueryRegistry::new(),
            pending: PendingQueries::new(),
        });

        if inner.transport.is_connected() {
            inner.on_connected();
        } else {
            let hook = Arc::clone(&inner);
            tokio::spawn(async move {
                hook.transport.connected().await;
                hook.on_connected();
            });
        }

        let dispatch = Arc::clone(&inner);
        tokio::spawn(dispatch.run());

        Ok(Self { inner })
    }

    /// This instance's id.
    #[must_use]
    pub fn id(&self) -> &BusId {
        &self.inner.id
    }

    /// Register a handler for a named event.
    ///
    /// Multiple handlers per name are permitted; all run on a matching
    /// event, in registration order, for the lifetime of the bus.
    pub fn subscribe<H>(&self, event: &str, handler: H)
    where
        H: Fn(RemoteEvent) + Send + Sync + 'static,
    {
        self.inner.subscriptions.subscribe(event, Arc::new(handler));
    }

    /// Bind the single handler for a named query, replacing any earlier
    /// binding. The handler may suspend before producing its result.
    pub fn on<H, Fut>(&self, query: &str, handler: H)
    where
        H: Fn(Query) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueryResult> + Send + 'static,
    {
        self.inner
            .queries
            .bind(query, Arc::new(move |q| Box::pin(handler(q))));
    }

    /// Broadcast an event to every other bus on the transport.
    ///
    /// Fire-and-forget: no acknowledgment, no delivery guarantee beyond
    /// the transport's own. The instance's own subscribers are never
    /// invoked for it (self-loop suppression).
    pub async fn dispatch(&self, event: Event) -> Result<(), BusError> {
        let inner = &self.inner;
        let envelope = Envelope::Event {
            src: inner.id.clone(),
            name: event.name,
            data: event.data,
        };
        inner
            .publish_envelope(&events_topic(&inner.id), &envelope)
            .await
    }

    /// Send a query to `target` and suspend until its result or the
    /// timeout window elapses, whichever comes first.
    ///
    /// Protocol-level failures come back as reserved results, never as
    /// errors: `(0, {"error":"Bad query"})` when the target has no
    /// handler, `(-1, {"error":"Timeout"})` after [`QUERY_TIMEOUT`].
    pub async fn execute(
        &self,
        target: impl Into<BusId>,
        query: Query,
    ) -> Result<QueryResult, BusError> {
        let inner = &self.inner;
        let target = target.into();

        // Register before publishing so a fast responder cannot beat the
        // waiter into the table.
        let (id, mut rx) = inner.pending.register(&query.name);

        let envelope = Envelope::Query {
            src: inner.id.clone(),
            dst: target.clone(),
            id,
            name: query.name,
            data: query.data,
        };
        if let Err(err) = inner.publish_envelope(&rpc_topic(&target), &envelope).await {
            inner.pending.evict(id);
            return Err(err);
        }

        match tokio::time::timeout(QUERY_TIMEOUT, &mut rx).await {
            Ok(Ok(result)) => Ok(result),
            // Resolver dropped without sending; treat as expired.
            Ok(Err(_)) => Ok(QueryResult::timeout()),
            Err(_) => {
                if inner.pending.evict(id) {
                    Ok(QueryResult::timeout())
                } else {
                    // The result landed while the timer was firing; the
                    // entry is already gone, so the value sits in the
                    // channel. First trigger wins.
                    Ok(rx.try_recv().unwrap_or_else(|_| QueryResult::timeout()))
                }
            }
        }
    }

    /// Number of queries currently awaiting a result.
    #[must_use]
    pub fn pending_queries(&self) -> usize {
        self.inner.pending.len()
    }

    /// Lifetime counters of the pending-query table.
    #[must_use]
    pub fn pending_stats(&self) -> &PendingStats {
        self.inner.pending.stats()
    }
}

impl BusInner {
    /// Inbound dispatch loop; one per bus, spawned at bind time.
    async fn run(self: Arc<Self>) {
        while let Some(message) = self.transport.recv().await {
            Self::handle_message(&self, message);
        }
        debug!(bus = %self.id, "inbound stream closed, dispatch loop exiting");
    }

    /// Route one transport-delivered message.
    fn handle_message(this: &Arc<Self>, message: InboundMessage) {
        let envelope = match Envelope::decode(&message.payload) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                trace!(bus = %this.id, topic = %message.topic, "unrecognized envelope kind, dropped");
                return;
            }
            Err(err) => {
                warn!(bus = %this.id, topic = %message.topic, error = %err, "malformed envelope, dropped");
                return;
            }
        };

        // Self-loop suppression: the wildcard events subscription also
        // matches our own publications.
        if *envelope.src() == this.id {
            trace!(bus = %this.id, topic = %message.topic, "self-originated message, dropped");
            return;
        }

        match envelope {
            Envelope::Event { src, name, data } => this.handle_event(RemoteEvent {
                source: src,
                name,
                data,
            }),
            Envelope::Query {
                src,
                id,
                name,
                data,
                ..
            } => {
                // Spawned so the loop keeps draining while the handler
                // suspends; a handler may itself execute nested queries.
                let bus = Arc::clone(this);
                tokio::spawn(async move {
                    bus.answer_query(src, id, Query::new(name, data)).await;
                });
            }
            Envelope::Result { id, code, data, .. } => {
                this.pending.resolve(id, QueryResult::new(code, data));
            }
        }
    }

    /// Invoke every subscriber registered for the event, in order.
    fn handle_event(&self, event: RemoteEvent) {
        for handler in self.subscriptions.handlers_for(&event.name) {
            // A failing handler is fatal to that invocation only; the
            // remaining handlers still run.
            if catch_unwind(AssertUnwindSafe(|| handler(event.clone()))).is_err() {
                warn!(bus = %self.id, event = %event.name, "event handler panicked");
            }
        }
    }

    /// Produce and publish the result for one inbound query.
    async fn answer_query(&self, querier: BusId, correlation_id: u64, query: Query) {
        let name = query.name.clone();
        let result = match self.queries.get(&query.name) {
            Some(handler) => handler(query).await,
            None => {
                debug!(bus = %self.id, query = %name, "no handler bound, answering bad query");
                QueryResult::bad_query()
            }
        };

        let envelope = Envelope::Result {
            src: self.id.clone(),
            dst: querier.clone(),
            id: correlation_id,
            code: result.code,
            data: result.data,
        };
        if let Err(err) = self
            .publish_envelope(&rpc_topic(&querier), &envelope)
            .await
        {
            // Response loss is the transport's concern; the querier will
            // time out.
            warn!(bus = %self.id, querier = %querier, error = %err, "failed to publish query result");
        }
    }

    async fn publish_envelope(&self, topic: &str, envelope: &Envelope) -> Result<(), BusError> {
        let payload = envelope.encode()?;
        self.transport.publish(topic, payload).await?;
        Ok(())
    }

    /// Connected-hook. Reconnect/resubscribe handling would live here;
    /// the current design has none (known gap).
    fn on_connected(&self) {
        debug!(bus = %self.id, "transport connected");
    }
}
