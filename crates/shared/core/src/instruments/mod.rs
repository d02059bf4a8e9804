//! Instrument and exchange metadata
//!
//! Loaded by the runner from configuration; the bus only needs identity,
//! ownership and kind (which decides funding/liquidation feeds).

mod instrument;

pub use instrument::{ExchangeInfo, InstrumentInfo, InstrumentKind};
