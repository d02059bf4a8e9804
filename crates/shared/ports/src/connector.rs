use concord_core::{
    Balance, ExchangeId, InstrumentId, Order, OrderStatus, Position, Quantity, Timestamp,
};

use crate::error::ConnectorResult;

/// What the exchange answered to an order placement
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementAck {
    pub exchange_order_id: String,
    pub status: OrderStatus,
    /// Exchange timestamp of the acknowledgement
    pub time: Timestamp,
    pub total_filled: Option<Quantity>,
}

/// Port to an exchange adapter (REST/WebSocket client).
///
/// Adapters live outside this workspace; the bus only drives them through
/// this trait.
pub trait ExchangeConnector: Send {
    fn exchange_id(&self) -> ExchangeId;

    fn place_order(&mut self, order: &Order) -> ConnectorResult<PlacementAck>;

    fn cancel_order(&mut self, order: &Order) -> ConnectorResult<()>;

    /// Cancel every open order on one instrument
    fn cancel_all_orders(&mut self, instr_id: InstrumentId) -> ConnectorResult<()>;

    fn fetch_balances(&mut self) -> ConnectorResult<Vec<Balance>> {
        Ok(Vec::new())
    }

    fn fetch_positions(&mut self) -> ConnectorResult<Vec<Position>> {
        Ok(Vec::new())
    }

    fn fetch_open_orders(&mut self) -> ConnectorResult<Vec<Order>> {
        Ok(Vec::new())
    }
}
