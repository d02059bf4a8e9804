use serde::{Deserialize, Serialize};

use crate::values::{ExchangeId, InstrumentId, Price, Quantity};

/// Kind of tradeable instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Spot,
    Future,
    Perpetual,
    Option,
}

/// Exchange metadata, as loaded from the instrument database
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub id: ExchangeId,
    /// Feed name used by the market-data ingesters (e.g. "BINANCE_FUTURES")
    pub feed_name: String,
    pub exchange_name: String,
}

impl ExchangeInfo {
    pub fn new(id: ExchangeId, feed_name: impl Into<String>, exchange_name: impl Into<String>) -> Self {
        Self {
            id,
            feed_name: feed_name.into(),
            exchange_name: exchange_name.into(),
        }
    }
}

/// Instrument metadata needed by the bus: identity, owning exchange and kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub id: InstrumentId,
    pub exchange: ExchangeInfo,
    pub symbol: String,
    pub kind: InstrumentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_size: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_size: Option<Quantity>,
}

impl InstrumentInfo {
    pub fn new(
        id: InstrumentId,
        exchange: ExchangeInfo,
        symbol: impl Into<String>,
        kind: InstrumentKind,
    ) -> Self {
        Self {
            id,
            exchange,
            symbol: symbol.into(),
            kind,
            base: None,
            quote: None,
            tick_size: None,
            min_order_size: None,
        }
    }

    pub fn exchange_id(&self) -> ExchangeId {
        self.exchange.id
    }

    /// Only perpetuals pay funding
    pub fn has_funding(&self) -> bool {
        self.kind == InstrumentKind::Perpetual
    }

    /// Liquidation feeds exist for derivatives only
    pub fn has_liquidations(&self) -> bool {
        self.kind != InstrumentKind::Spot
    }
}

impl std::fmt::Display for InstrumentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} ({})", self.symbol, self.exchange.feed_name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> ExchangeInfo {
        ExchangeInfo::new(ExchangeId::new(1), "BINANCE_FUTURES", "binance")
    }

    #[test]
    fn test_funding_and_liquidation_flags() {
        let perp = InstrumentInfo::new(InstrumentId::new(1), exchange(), "BTC-USDT-PERP", InstrumentKind::Perpetual);
        let spot = InstrumentInfo::new(InstrumentId::new(2), exchange(), "BTC-USDT", InstrumentKind::Spot);
        let future = InstrumentInfo::new(InstrumentId::new(3), exchange(), "BTC-USDT-0628", InstrumentKind::Future);

        assert!(perp.has_funding() && perp.has_liquidations());
        assert!(!spot.has_funding() && !spot.has_liquidations());
        assert!(!future.has_funding() && future.has_liquidations());
    }

    #[test]
    fn test_display() {
        let perp = InstrumentInfo::new(InstrumentId::new(1), exchange(), "BTC-USDT-PERP", InstrumentKind::Perpetual);
        assert_eq!(perp.to_string(), "BTC-USDT-PERP@BINANCE_FUTURES (1)");
    }
}
