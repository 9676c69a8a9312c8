//! # Connector
//!
//! Thin factory: dials the transport, waits for it to report connected,
//! and yields a bound [`Bus`]. The [`Dialer`] trait is the seam through
//! which embedders and tests inject the concrete transport (an in-memory
//! broker, a real broker client, ...).

use crate::bus::Bus;
use crate::error::BusError;
use crate::message::BusId;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Opens a transport connection to a host.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Dial `host` and return the live connection.
    async fn dial(&self, host: &str) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Factory constructing a ready [`Bus`] from a dialer.
pub struct Connector;

impl Connector {
    /// Open a connection to `host`, wait until the transport signals
    /// connected, and bind a bus under `bus_id`.
    pub async fn connect<D>(
        dialer: &D,
        bus_id: impl Into<BusId>,
        host: &str,
    ) -> Result<Bus, BusError>
    where
        D: Dialer + ?Sized,
    {
        let bus_id = bus_id.into();
        debug!(bus = %bus_id, host = host, "connecting");

        let transport = dialer.dial(host).await?;
        transport.connected().await;

        Bus::bind(bus_id, transport).await
    }
}
