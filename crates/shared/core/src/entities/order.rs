use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, OrderType, Side};
use crate::values::{ExchangeId, InstrumentId, OrderId, Price, Quantity, Timestamp};

/// An order as seen by every process in the fleet
///
/// Several producers publish partial copies of the same order (same `id`);
/// [`Order::merge`] picks the authoritative one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Creation time
    pub time: Timestamp,
    pub instr_id: InstrumentId,
    pub exchange_id: ExchangeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    #[serde(rename = "order_status", default)]
    pub status: OrderStatus,
    /// Required for limit orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// Signed quantity: positive buys, negative sells
    #[serde(default)]
    pub qty: Quantity,
    #[serde(default)]
    pub total_filled: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strat_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_key: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_open: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ack_mkt: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_filled_mkt: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_cancel: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_canceled_mkt: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_rejected_mkt: Option<Timestamp>,
}

impl Order {
    /// Create a locally originated order with a random id
    pub fn new(
        instr_id: InstrumentId,
        exchange_id: ExchangeId,
        order_type: OrderType,
        qty: Quantity,
        price: Option<Price>,
        time: Timestamp,
    ) -> Self {
        Self {
            id: OrderId::random(),
            time,
            instr_id,
            exchange_id,
            exchange_order_id: None,
            order_type: Some(order_type),
            status: OrderStatus::New,
            price,
            qty,
            total_filled: Decimal::ZERO,
            strat_id: None,
            event_type: None,
            event_key: None,
            time_open: None,
            time_ack_mkt: None,
            time_filled_mkt: None,
            time_cancel: None,
            time_canceled_mkt: None,
            time_rejected_mkt: None,
        }
    }

    /// Create an order first seen on the exchange (e.g. placed manually).
    /// Its id is derived from the exchange order id.
    pub fn external(
        exchange_order_id: impl Into<String>,
        instr_id: InstrumentId,
        exchange_id: ExchangeId,
        qty: Quantity,
        price: Option<Price>,
        time: Timestamp,
    ) -> Self {
        let exchange_order_id = exchange_order_id.into();
        Self {
            id: OrderId::external(&exchange_order_id, exchange_id, instr_id),
            exchange_order_id: Some(exchange_order_id),
            order_type: None,
            ..Self::new(instr_id, exchange_id, OrderType::Limit, qty, price, time)
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_total_filled(mut self, total_filled: Quantity) -> Self {
        self.total_filled = total_filled;
        self
    }

    pub fn with_strategy(mut self, strat_id: u32, event_key: Option<Uuid>) -> Self {
        self.strat_id = Some(strat_id);
        self.event_key = event_key;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the id was derived from the exchange order id
    pub fn is_external(&self) -> bool {
        match &self.exchange_order_id {
            Some(eoid) => self.id == OrderId::external(eoid, self.exchange_id, self.instr_id),
            None => false,
        }
    }

    pub fn side(&self) -> Side {
        Side::from_qty(self.qty)
    }

    /// Notional value of the order (`qty * price`, signed)
    pub fn cost(&self) -> Decimal {
        self.price.map(|p| p * self.qty).unwrap_or(Decimal::ZERO)
    }

    /// Unfilled absolute quantity
    pub fn remaining_qty(&self) -> Decimal {
        (self.qty.abs() - self.total_filled).max(Decimal::ZERO)
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let price = self
            .price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "MKT".to_string());
        write!(
            f,
            "ORDER {} {} instr={} {}@{}",
            self.status, self.id, self.instr_id, self.qty, price
        )
    }
}
