//! Mirror errors

use concord_bus::{BusError, CodecError, HandlerError};
use concord_clock::HeartbeatError;
use concord_core::{DomainError, ExchangeId, InstrumentId};
use concord_ports::{ConnectorError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Shared store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Order store error: {0}")]
    Orders(#[from] concord_orders::Error),

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Heartbeat error: {0}")]
    Heartbeat(#[from] HeartbeatError),

    #[error("Exchange {0} is not mirrored by this process")]
    UnknownExchange(ExchangeId),

    #[error("Instrument {0} is not mirrored by this process")]
    UnknownInstrument(InstrumentId),

    #[error("This process keeps no order store")]
    NoOrderStore,
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Bus(BusError::Codec(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for HandlerError {
    fn from(e: Error) -> Self {
        match e {
            Error::Domain(e) => HandlerError::Domain(e),
            Error::Store(e) => HandlerError::Store(e),
            Error::Bus(e) => HandlerError::Bus(e),
            Error::Connector(e) => HandlerError::Connector(e),
            Error::Orders(concord_orders::Error::Reconcile(e)) => HandlerError::Domain(e),
            Error::Orders(concord_orders::Error::Store(e)) => HandlerError::Store(e),
            Error::Orders(concord_orders::Error::Bus(e)) => HandlerError::Bus(e),
            other => HandlerError::Other(other.to_string()),
        }
    }
}
