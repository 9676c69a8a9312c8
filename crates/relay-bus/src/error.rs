//! # Bus Errors
//!
//! Only infrastructure failures cross the public API as errors. Every
//! protocol-level condition (bad query, timeout, orphan result, malformed
//! envelope, self-originated message) is handled inside the bus and, where
//! caller-visible at all, travels as a [`crate::QueryResult`] value.

use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by the public bus API.
#[derive(Debug, Error)]
pub enum BusError {
    /// The underlying transport rejected an operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An outbound envelope could not be serialized.
    #[error("envelope encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
