//! Payload codec
//!
//! Payloads travel as compact JSON objects. Identifiers are strings, enums
//! travel by name and absent fields are omitted entirely, never sent as
//! `null`: a missing field means "unknown to this producer", which the
//! order merge relies on.

use concord_core::{
    Balance, CancelAllExchange, CancelAllInstrument, Candle, ExchangeApiPayload, ExchangeStatus,
    FundingRate, InstrStatus, Latency, Order, OrderBook, Position, SentinelPayload, StrategyInfo,
    Trade, TriggerPayload,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;
use crate::events::{EventKind, PayloadSchema, RoutingRule};

/// Fields consulted for the routing key, first present wins
pub const ROUTING_PRECEDENCE: [&str; 4] = ["instr_id", "exchange_id", "trigger_id", "sentinel_id"];

/// A value that can be published on the bus
pub trait Payload: Serialize {
    fn schema(&self) -> PayloadSchema;
}

macro_rules! payload {
    ($($ty:ty => $schema:ident),* $(,)?) => {
        $(
            impl Payload for $ty {
                fn schema(&self) -> PayloadSchema {
                    PayloadSchema::$schema
                }
            }
        )*
    };
}

payload! {
    Order => Order,
    Trade => Trade,
    Balance => Balance,
    Position => Position,
    OrderBook => OrderBook,
    FundingRate => FundingRate,
    Candle => Candle,
    ExchangeStatus => ExchangeStatus,
    InstrStatus => InstrStatus,
    ExchangeApiPayload => ExchangeApi,
    CancelAllExchange => CancelAllExchange,
    CancelAllInstrument => CancelAllInstrument,
    TriggerPayload => Trigger,
    SentinelPayload => Sentinel,
    StrategyInfo => StrategyInfo,
    Latency => Latency,
    () => Empty,
}

/// A decoded payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Order(Order),
    Trade(Trade),
    Balance(Balance),
    Position(Position),
    OrderBook(OrderBook),
    FundingRate(FundingRate),
    Candle(Candle),
    ExchangeStatus(ExchangeStatus),
    InstrStatus(InstrStatus),
    ExchangeApi(ExchangeApiPayload),
    CancelAllExchange(CancelAllExchange),
    CancelAllInstrument(CancelAllInstrument),
    Trigger(TriggerPayload),
    Sentinel(SentinelPayload),
    StrategyInfo(StrategyInfo),
    Latency(Latency),
    Empty,
}

impl Payload for Event {
    fn schema(&self) -> PayloadSchema {
        match self {
            Event::Order(_) => PayloadSchema::Order,
            Event::Trade(_) => PayloadSchema::Trade,
            Event::Balance(_) => PayloadSchema::Balance,
            Event::Position(_) => PayloadSchema::Position,
            Event::OrderBook(_) => PayloadSchema::OrderBook,
            Event::FundingRate(_) => PayloadSchema::FundingRate,
            Event::Candle(_) => PayloadSchema::Candle,
            Event::ExchangeStatus(_) => PayloadSchema::ExchangeStatus,
            Event::InstrStatus(_) => PayloadSchema::InstrStatus,
            Event::ExchangeApi(_) => PayloadSchema::ExchangeApi,
            Event::CancelAllExchange(_) => PayloadSchema::CancelAllExchange,
            Event::CancelAllInstrument(_) => PayloadSchema::CancelAllInstrument,
            Event::Trigger(_) => PayloadSchema::Trigger,
            Event::Sentinel(_) => PayloadSchema::Sentinel,
            Event::StrategyInfo(_) => PayloadSchema::StrategyInfo,
            Event::Latency(_) => PayloadSchema::Latency,
            Event::Empty => PayloadSchema::Empty,
        }
    }
}

macro_rules! accessor {
    ($($name:ident => $variant:ident($ty:ty)),* $(,)?) => {
        impl Event {
            $(
                pub fn $name(&self) -> Option<&$ty> {
                    match self {
                        Event::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            )*
        }
    };
}

accessor! {
    as_order => Order(Order),
    as_trade => Trade(Trade),
    as_balance => Balance(Balance),
    as_position => Position(Position),
    as_orderbook => OrderBook(OrderBook),
    as_funding => FundingRate(FundingRate),
    as_candle => Candle(Candle),
    as_exchange_status => ExchangeStatus(ExchangeStatus),
    as_instr_status => InstrStatus(InstrStatus),
    as_exchange_api => ExchangeApi(ExchangeApiPayload),
    as_cancel_all_exchange => CancelAllExchange(CancelAllExchange),
    as_cancel_all_instrument => CancelAllInstrument(CancelAllInstrument),
    as_trigger => Trigger(TriggerPayload),
    as_sentinel => Sentinel(SentinelPayload),
}

/// Serialize a payload for `kind`, with top-level nulls stripped
pub fn to_value<P: Payload + ?Sized>(kind: EventKind, payload: &P) -> Result<Value, CodecError> {
    let found = payload.schema();
    let expected = kind.schema();
    if found != expected {
        return Err(CodecError::SchemaMismatch {
            kind,
            expected,
            found,
        });
    }
    let mut value = serde_json::to_value(payload)?;
    strip_nulls(&mut value);
    Ok(value)
}

/// Wire bytes of an already-checked value. Empty-schema kinds carry no body.
pub fn value_to_bytes(kind: EventKind, value: &Value) -> Result<Vec<u8>, CodecError> {
    if kind.schema() == PayloadSchema::Empty {
        return Ok(Vec::new());
    }
    Ok(serde_json::to_vec(value)?)
}

pub fn encode<P: Payload + ?Sized>(kind: EventKind, payload: &P) -> Result<Vec<u8>, CodecError> {
    let value = to_value(kind, payload)?;
    value_to_bytes(kind, &value)
}

/// Encoding as text, for hash-store values
pub fn encode_string<P: Payload + ?Sized>(
    kind: EventKind,
    payload: &P,
) -> Result<String, CodecError> {
    let value = to_value(kind, payload)?;
    Ok(serde_json::to_string(&value)?)
}

/// Schema-driven decode of a payload received for `kind`
pub fn decode(kind: EventKind, bytes: &[u8]) -> Result<Event, CodecError> {
    use PayloadSchema as P;

    let event = match kind.schema() {
        P::Order => Event::Order(serde_json::from_slice(bytes)?),
        P::Trade => Event::Trade(serde_json::from_slice(bytes)?),
        P::Balance => Event::Balance(serde_json::from_slice(bytes)?),
        P::Position => Event::Position(serde_json::from_slice(bytes)?),
        P::OrderBook => Event::OrderBook(serde_json::from_slice(bytes)?),
        P::FundingRate => Event::FundingRate(serde_json::from_slice(bytes)?),
        P::Candle => Event::Candle(serde_json::from_slice(bytes)?),
        P::ExchangeStatus => Event::ExchangeStatus(serde_json::from_slice(bytes)?),
        P::InstrStatus => Event::InstrStatus(serde_json::from_slice(bytes)?),
        P::ExchangeApi => Event::ExchangeApi(serde_json::from_slice(bytes)?),
        P::CancelAllExchange => Event::CancelAllExchange(serde_json::from_slice(bytes)?),
        P::CancelAllInstrument => Event::CancelAllInstrument(serde_json::from_slice(bytes)?),
        P::Trigger => Event::Trigger(serde_json::from_slice(bytes)?),
        P::Sentinel => Event::Sentinel(serde_json::from_slice(bytes)?),
        P::StrategyInfo => Event::StrategyInfo(serde_json::from_slice(bytes)?),
        P::Latency => Event::Latency(serde_json::from_slice(bytes)?),
        P::Empty => Event::Empty,
    };
    Ok(event)
}

/// Routing suffix for a serialized payload of `kind`
pub fn routing_key(kind: EventKind, value: &Value) -> Option<String> {
    match kind.routing() {
        RoutingRule::Unrouted => None,
        RoutingRule::Precedence => ROUTING_PRECEDENCE
            .iter()
            .find_map(|field| routing_field(value, field)),
        RoutingRule::ExchangeOnly => routing_field(value, "exchange_id"),
    }
}

fn routing_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Remove the payload's own `null` members. Blobs inside it are opaque.
fn strip_nulls(value: &mut Value) {
    if let Value::Object(map) = value {
        map.retain(|_, v| !v.is_null());
    }
}
