//! Error types for the bus crate

use concord_core::DomainError;
use concord_ports::{ConnectorError, StoreError};
use thiserror::Error;

use crate::events::{EventKind, PayloadSchema};

/// Payload encoding/decoding errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} carries {expected:?} payloads, got {found:?}")]
    SchemaMismatch {
        kind: EventKind,
        expected: PayloadSchema,
        found: PayloadSchema,
    },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}

/// Dispatch-level errors
///
/// Only `Transport` ends the dispatch loop.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Transport error: {0}")]
    Transport(#[from] StoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Dispatcher stopped")]
    Stopped,
}

/// Error returned by a callback.
///
/// Logged by the dispatch loop and otherwise swallowed.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("{0} delivered without a decoded payload")]
    MissingPayload(EventKind),

    #[error("{0}")]
    Other(String),
}

impl From<CodecError> for HandlerError {
    fn from(e: CodecError) -> Self {
        HandlerError::Bus(BusError::Codec(e))
    }
}
