//! Channel names and shared-store key layout

use std::fmt;

use concord_core::{ExchangeId, InstrumentId};

use crate::events::EventKind;

/// Suffix addressing one entity on a base channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<InstrumentId> for RoutingKey {
    fn from(id: InstrumentId) -> Self {
        Self(id.to_string())
    }
}

impl From<ExchangeId> for RoutingKey {
    fn from(id: ExchangeId) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RoutingKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for RoutingKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Channel grammar: `<base>` or `<base>:<routing key>`
pub struct Channels;

impl Channels {
    pub const SEPARATOR: char = ':';

    /// `order_exchange:7`, or the bare base when no key is given
    pub fn channel(kind: EventKind, key: Option<&str>) -> String {
        match key {
            Some(key) => format!("{}{}{}", kind.base(), Self::SEPARATOR, key),
            None => kind.base().to_string(),
        }
    }

    /// Pattern matching every channel of a kind: `order_update*`
    pub fn pattern(kind: EventKind) -> String {
        format!("{}*", kind.base())
    }

    /// Split a channel into its kind and routing key
    pub fn parse(channel: &str) -> Option<(EventKind, Option<&str>)> {
        match channel.split_once(Self::SEPARATOR) {
            Some((base, key)) => EventKind::from_base(base).map(|k| (k, Some(key))),
            None => EventKind::from_base(channel).map(|k| (k, None)),
        }
    }
}

/// Hash keys and fields in the shared store
pub struct HashKeys;

impl HashKeys {
    pub const POSITION: &'static str = "position";
    pub const FUNDING: &'static str = "funding";
    pub const ORDERBOOK: &'static str = "orderbook";
    pub const TIMESTAMP: &'static str = "timestamp";

    /// `exchange:<id>`
    pub fn exchange(id: ExchangeId) -> String {
        format!("exchange:{}", id)
    }

    /// `instrument:<id>`
    pub fn instrument(id: InstrumentId) -> String {
        format!("instrument:{}", id)
    }

    /// `orders:<exchange id>:<instrument id>`, order id -> serialized order
    pub fn orders(exchange_id: ExchangeId, instr_id: InstrumentId) -> String {
        format!("orders:{}:{}", exchange_id, instr_id)
    }

    /// `balance:<currency>` on the exchange hash
    pub fn balance_field(currency: &str) -> String {
        format!("balance:{}", currency)
    }

    /// `position:<instrument id>` on the exchange hash
    pub fn position_field(instr_id: InstrumentId) -> String {
        format!("position:{}", instr_id)
    }

    pub fn is_balance_field(field: &str) -> bool {
        field.starts_with("balance:")
    }

    pub fn is_position_field(field: &str) -> bool {
        field.starts_with("position:")
    }
}
