//! Event kinds and their static descriptors
//!
//! Every message on the bus belongs to one [`EventKind`]. The kind fixes the
//! base channel name, the payload schema, how a routing suffix is derived
//! from the payload, and which mirrored entity drives its subscriptions.

use std::fmt;

/// Payload shape carried by an event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadSchema {
    Order,
    Trade,
    Balance,
    Position,
    OrderBook,
    FundingRate,
    Candle,
    ExchangeStatus,
    InstrStatus,
    ExchangeApi,
    CancelAllExchange,
    CancelAllInstrument,
    Trigger,
    Sentinel,
    StrategyInfo,
    Latency,
    /// No body at all
    Empty,
}

/// How the routing suffix of a channel is derived from a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingRule {
    /// Bare base channel
    Unrouted,
    /// First present of `instr_id`, `exchange_id`, `trigger_id`, `sentinel_id`
    Precedence,
    /// Commands addressed to one exchange's connector: `exchange_id` only
    ExchangeOnly,
}

/// Entity whose ids a subscription to this kind is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Instrument,
    Exchange,
    /// Free-form name (trigger / sentinel)
    Named,
    None,
}

/// Static metadata of an event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDescriptor {
    pub base: &'static str,
    pub schema: PayloadSchema,
    pub routing: RoutingRule,
    pub driver: Driver,
    /// Consumed by the persistence layer only
    pub persisted: bool,
}

const fn descriptor(
    base: &'static str,
    schema: PayloadSchema,
    routing: RoutingRule,
    driver: Driver,
) -> EventDescriptor {
    EventDescriptor {
        base,
        schema,
        routing,
        driver,
        persisted: false,
    }
}

const fn persisted(base: &'static str, schema: PayloadSchema) -> EventDescriptor {
    EventDescriptor {
        base,
        schema,
        routing: RoutingRule::Unrouted,
        driver: Driver::None,
        persisted: true,
    }
}

/// Every event kind known to the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    OrderUpdate,
    OrderExchange,
    CancelOrder,
    CancelAllOrders,
    CancelAllOrdersExchange,
    CancelAllOrdersInstr,
    ExchangeStatus,
    InstrStatus,
    BalanceUpdate,
    PositionUpdate,
    TradeUpdate,
    TradeExec,
    LiquidationUpdate,
    OrderbookUpdate,
    FundingRateUpdate,
    CandleUpdate,
    ExchangeApi,
    TriggerEvent,
    SentinelEvent,
    DbAddOrder,
    DbAddTrade,
    DbStrategyInfo,
    DbAddLatency,
}

impl EventKind {
    pub const ALL: [EventKind; 23] = [
        EventKind::OrderUpdate,
        EventKind::OrderExchange,
        EventKind::CancelOrder,
        EventKind::CancelAllOrders,
        EventKind::CancelAllOrdersExchange,
        EventKind::CancelAllOrdersInstr,
        EventKind::ExchangeStatus,
        EventKind::InstrStatus,
        EventKind::BalanceUpdate,
        EventKind::PositionUpdate,
        EventKind::TradeUpdate,
        EventKind::TradeExec,
        EventKind::LiquidationUpdate,
        EventKind::OrderbookUpdate,
        EventKind::FundingRateUpdate,
        EventKind::CandleUpdate,
        EventKind::ExchangeApi,
        EventKind::TriggerEvent,
        EventKind::SentinelEvent,
        EventKind::DbAddOrder,
        EventKind::DbAddTrade,
        EventKind::DbStrategyInfo,
        EventKind::DbAddLatency,
    ];

    pub const fn descriptor(&self) -> EventDescriptor {
        use Driver as D;
        use PayloadSchema as P;
        use RoutingRule as R;

        match self {
            EventKind::OrderUpdate => descriptor("order_update", P::Order, R::Precedence, D::Instrument),
            EventKind::OrderExchange => descriptor("order_exchange", P::Order, R::ExchangeOnly, D::Exchange),
            EventKind::CancelOrder => descriptor("cancel_order", P::Order, R::ExchangeOnly, D::Exchange),
            EventKind::CancelAllOrders => descriptor("cancel_all_orders", P::Empty, R::Unrouted, D::None),
            EventKind::CancelAllOrdersExchange => descriptor(
                "cancel_all_orders_exchange",
                P::CancelAllExchange,
                R::ExchangeOnly,
                D::Exchange,
            ),
            EventKind::CancelAllOrdersInstr => descriptor(
                "cancel_all_orders_instr",
                P::CancelAllInstrument,
                R::ExchangeOnly,
                D::Exchange,
            ),
            EventKind::ExchangeStatus => descriptor("exchange_status", P::ExchangeStatus, R::Precedence, D::Exchange),
            EventKind::InstrStatus => descriptor("instr_status", P::InstrStatus, R::Precedence, D::Instrument),
            EventKind::BalanceUpdate => descriptor("balance_update", P::Balance, R::Precedence, D::Exchange),
            EventKind::PositionUpdate => descriptor("position_update", P::Position, R::Precedence, D::Instrument),
            EventKind::TradeUpdate => descriptor("trade_update", P::Trade, R::Precedence, D::Instrument),
            EventKind::TradeExec => descriptor("trade_exec", P::Trade, R::Precedence, D::Instrument),
            EventKind::LiquidationUpdate => descriptor("liquidation_update", P::Trade, R::Precedence, D::Instrument),
            EventKind::OrderbookUpdate => descriptor("orderbook_update", P::OrderBook, R::Precedence, D::Instrument),
            EventKind::FundingRateUpdate => {
                descriptor("funding_rate_update", P::FundingRate, R::Precedence, D::Instrument)
            }
            EventKind::CandleUpdate => descriptor("candle_update", P::Candle, R::Precedence, D::Instrument),
            EventKind::ExchangeApi => descriptor("exchange_api", P::ExchangeApi, R::Precedence, D::Exchange),
            EventKind::TriggerEvent => descriptor("trigger_event", P::Trigger, R::Precedence, D::Named),
            EventKind::SentinelEvent => descriptor("sentinel_event", P::Sentinel, R::Precedence, D::Named),
            EventKind::DbAddOrder => persisted("db_add_order", P::Order),
            EventKind::DbAddTrade => persisted("db_add_trade", P::Trade),
            EventKind::DbStrategyInfo => persisted("db_strategy_info", P::StrategyInfo),
            EventKind::DbAddLatency => persisted("db_add_latency", P::Latency),
        }
    }

    pub const fn base(&self) -> &'static str {
        self.descriptor().base
    }

    pub const fn schema(&self) -> PayloadSchema {
        self.descriptor().schema
    }

    pub const fn routing(&self) -> RoutingRule {
        self.descriptor().routing
    }

    pub const fn driver(&self) -> Driver {
        self.descriptor().driver
    }

    /// Look up a kind by its base channel name
    pub fn from_base(base: &str) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|k| k.base() == base)
    }

    /// Kinds published many times per second; logged at trace level
    pub fn is_high_rate(&self) -> bool {
        matches!(self, EventKind::OrderbookUpdate | EventKind::TradeUpdate)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_bases_are_unique() {
        let bases: HashSet<_> = EventKind::ALL.iter().map(|k| k.base()).collect();
        assert_eq!(bases.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_from_base() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_base(kind.base()), Some(kind));
        }
        assert_eq!(EventKind::from_base("nope"), None);
    }

    #[test]
    fn test_persisted_kinds_are_unrouted() {
        for kind in EventKind::ALL {
            let d = kind.descriptor();
            if d.persisted {
                assert!(kind.base().starts_with("db_"));
                assert_eq!(d.routing, RoutingRule::Unrouted);
            }
        }
        assert_eq!(EventKind::CancelAllOrders.routing(), RoutingRule::Unrouted);
    }

    #[test]
    fn test_exchange_commands_route_by_exchange() {
        for kind in [
            EventKind::OrderExchange,
            EventKind::CancelOrder,
            EventKind::CancelAllOrdersInstr,
        ] {
            assert_eq!(kind.routing(), RoutingRule::ExchangeOnly);
            assert_eq!(kind.driver(), Driver::Exchange);
        }
    }
}
