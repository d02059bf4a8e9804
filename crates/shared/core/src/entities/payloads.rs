//! Control and bookkeeping payloads
//!
//! These carry free-form `data`/`config` blobs; only the routing fields are
//! typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::values::{ExchangeId, InstrumentId, OrderId, Timestamp};

/// Action asking every order store to re-read the shared store
pub const RELOAD_ALL_ORDERS: &str = "reload_all_orders";
pub const RELOAD_DATA: &str = "reload_data";

/// Command addressed to the processes serving one exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeApiPayload {
    pub exchange_id: ExchangeId,
    pub action: String,
}

impl ExchangeApiPayload {
    pub fn reload_all_orders(exchange_id: ExchangeId) -> Self {
        Self {
            exchange_id,
            action: RELOAD_ALL_ORDERS.to_string(),
        }
    }

    pub fn is_reload_all_orders(&self) -> bool {
        self.action == RELOAD_ALL_ORDERS
    }

    /// Ask the connector of `exchange_id` to refetch balances, positions and orders
    pub fn reload_data(exchange_id: ExchangeId) -> Self {
        Self {
            exchange_id,
            action: RELOAD_DATA.to_string(),
        }
    }

    pub fn is_reload_data(&self) -> bool {
        self.action == RELOAD_DATA
    }
}

/// Request to cancel every order of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAllExchange {
    pub exchange_id: ExchangeId,
}

/// Request to cancel every order of one instrument.
/// Carries the exchange so it routes to that exchange's connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAllInstrument {
    pub exchange_id: ExchangeId,
    pub instr_id: InstrumentId,
}

/// Event for a named trigger process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub trigger_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Event for a named sentinel process (snapshot, update, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelPayload {
    pub sentinel_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Strategy decision context recorded alongside an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyInfo {
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_key: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Timestamp>,
}

/// Latency sample recorded by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Latency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}
