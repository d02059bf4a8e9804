//! Market data carried on the bus: books, funding, candles

use serde::{Deserialize, Serialize};

use crate::values::{ExchangeId, InstrumentId, Price, Quantity, Timestamp};

/// A price level in a book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub qty: Quantity,
}

/// L2 order book snapshot for an instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub instr_id: InstrumentId,
    /// Bids, best first
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    /// Asks, best first
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn mid(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Price::TWO),
            _ => None,
        }
    }
}

/// Funding rate of a perpetual instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    pub instr_id: InstrumentId,
    #[serde(default)]
    pub rate: rust_decimal::Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_rate: Option<rust_decimal::Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_funding_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: Timestamp,
    pub close: Price,
    pub instr_id: InstrumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_id: Option<ExchangeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trades: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
}
