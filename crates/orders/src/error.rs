//! Order store errors

use concord_bus::{BusError, CodecError};
use concord_core::{DomainError, ExchangeId, InstrumentId};
use concord_ports::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Two views of different orders were merged
    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] DomainError),

    #[error("Shared store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("No order book kept for instrument {instr_id} on exchange {exchange_id}")]
    UnknownInstrument {
        exchange_id: ExchangeId,
        instr_id: InstrumentId,
    },
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Bus(BusError::Codec(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
