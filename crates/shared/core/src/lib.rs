//! Concord Core Domain
//!
//! Pure domain types shared by every process on the bus: orders and their
//! reconciliation, balances, positions, market data, connectivity status and
//! control payloads.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod error;
pub mod instruments;
pub mod reconcile;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    Balance,
    BookLevel,
    CancelAllExchange,
    CancelAllInstrument,
    Candle,
    // Connectivity
    ConnectionStatus,
    ConnectivityStatus,
    // Control payloads
    ExchangeApiPayload,
    ExchangeStatus,
    FeedChannel,
    FundingRate,
    InstrStatus,
    Latency,
    // Orders
    Order,
    OrderBook,
    OrderStatus,
    OrderType,
    Position,
    RELOAD_ALL_ORDERS,
    RELOAD_DATA,
    SentinelPayload,
    Side,
    StrategyInfo,
    Trade,
    TriggerPayload,
};
pub use error::{DomainError, Result};
pub use instruments::{ExchangeInfo, InstrumentInfo, InstrumentKind};
pub use reconcile::{merge, merge_all};
pub use values::{Currency, ExchangeId, InstrumentId, OrderId, Price, Quantity, Timestamp};
