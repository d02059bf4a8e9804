mod market;
mod order;
mod order_status;
mod order_type;
mod payloads;
mod position;
mod side;
mod status;
mod trade;

pub use market::{BookLevel, Candle, FundingRate, OrderBook};
pub use order::Order;
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use payloads::{
    CancelAllExchange, CancelAllInstrument, ExchangeApiPayload, Latency, RELOAD_ALL_ORDERS, RELOAD_DATA,
    SentinelPayload, StrategyInfo, TriggerPayload,
};
pub use position::{Balance, Position};
pub use side::Side;
pub use status::{
    ConnectionStatus, ConnectivityStatus, ExchangeStatus, FeedChannel, InstrStatus,
};
pub use trade::Trade;
