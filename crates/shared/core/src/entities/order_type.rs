use serde::{Deserialize, Serialize};

/// Order types routed to exchange connectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Execute at current market price
    Market,
    /// Execute at specified price or better
    Limit,
    /// Limit order that must rest on the book
    PostOnly,
    /// Immediate-or-cancel limit order
    Ioc,
}
