//! # Envelope Codec
//!
//! The tagged wire format distinguishing the three message kinds carried
//! between bus instances, plus the topic naming scheme.
//!
//! ## Wire shapes (JSON)
//!
//! ```text
//! {"x":"event",  "src":ID, "name":N, "data":D}
//! {"x":"query",  "src":ID, "dst":ID, "id":C, "name":N, "data":D}
//! {"x":"result", "src":ID, "dst":ID, "id":C, "code":K, "data":D}
//! ```
//!
//! Decoding an envelope with an unrecognized `"x"` value is a no-op (the
//! message is silently dropped); a malformed payload is an error the bus
//! treats as non-fatal.

use crate::message::BusId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wildcard pattern covering the events topics of all bus instances.
///
/// Pattern matching is delegated entirely to the transport.
pub const EVENTS_WILDCARD: &str = "bus/+/events";

/// Unicast RPC topic for a bus instance: queries addressed to it and
/// results addressed back to its outstanding queries.
#[must_use]
pub fn rpc_topic(id: &BusId) -> String {
    format!("bus/{id}/rpc")
}

/// Broadcast events topic a bus instance publishes its own events on.
#[must_use]
pub fn events_topic(id: &BusId) -> String {
    format!("bus/{id}/events")
}

/// Errors from envelope decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON or does not match the envelope shape.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload carries no string `"x"` kind tag.
    #[error("envelope is missing the \"x\" kind tag")]
    MissingKind,
}

/// The wire envelope: a tagged union over the three message kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "x", rename_all = "lowercase")]
pub enum Envelope {
    /// Broadcast notification.
    Event {
        /// Originating bus.
        src: BusId,
        /// Event name.
        name: String,
        /// Free-form payload.
        data: Value,
    },

    /// Request addressed to one bus.
    Query {
        /// Originating bus (where the result goes back to).
        src: BusId,
        /// Target bus.
        dst: BusId,
        /// Correlation id, scoped to the originating bus.
        id: u64,
        /// Query name.
        name: String,
        /// Free-form payload.
        data: Value,
    },

    /// Response to a query, echoing its correlation id.
    Result {
        /// Responding bus.
        src: BusId,
        /// The bus that issued the query.
        dst: BusId,
        /// Correlation id echoed from the query.
        id: u64,
        /// Outcome code.
        code: i64,
        /// Free-form payload.
        data: Value,
    },
}

impl Envelope {
    /// The originating bus id, for self-loop suppression.
    #[must_use]
    pub fn src(&self) -> &BusId {
        match self {
            Self::Event { src, .. } | Self::Query { src, .. } | Self::Result { src, .. } => src,
        }
    }

    /// Serialize to the transport payload representation.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from a transport payload.
    ///
    /// Returns `Ok(None)` for a well-formed payload whose kind tag is not
    /// one of `event`/`query`/`result`; such messages are dropped without
    /// being an error.
    pub fn decode(payload: &[u8]) -> Result<Option<Self>, DecodeError> {
        let value: Value = serde_json::from_slice(payload)?;
        let kind = value
            .get("x")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingKind)?;

        match kind {
            "event" | "query" | "result" => Ok(Some(serde_json::from_value(value)?)),
            _ => Ok(None),
        }
    }
}
