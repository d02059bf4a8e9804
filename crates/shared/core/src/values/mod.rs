mod ids;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub use ids::{ExchangeId, InstrumentId, OrderId};

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Quantity value - signed where the sign carries the side
pub type Quantity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Currency code (e.g. "USDT")
pub type Currency = String;
