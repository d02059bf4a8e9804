use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderType;
use crate::values::{ExchangeId, InstrumentId, Price, Quantity, Timestamp};

/// A public or private execution, also used for liquidations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub time: Timestamp,
    /// Signed quantity: positive for buyer-initiated trades
    pub qty: Quantity,
    pub price: Price,
    pub instr_id: InstrumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_id: Option<ExchangeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
    #[serde(default)]
    pub is_liquidation: bool,
    #[serde(default = "default_trade_count")]
    pub trade_count: u32,
}

fn default_trade_count() -> u32 {
    1
}

impl Trade {
    pub fn new(instr_id: InstrumentId, qty: Quantity, price: Price, time: Timestamp) -> Self {
        Self {
            id: None,
            time,
            qty,
            price,
            instr_id,
            exchange_id: None,
            order_type: None,
            exchange_order_id: None,
            fee: None,
            is_liquidation: false,
            trade_count: 1,
        }
    }

    pub fn liquidation(mut self) -> Self {
        self.is_liquidation = true;
        self
    }

    /// Returns the notional value of the trade (price * |qty|)
    pub fn notional(&self) -> Decimal {
        self.price * self.qty.abs()
    }
}
