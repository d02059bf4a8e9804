//! Concord Order Store
//!
//! Live orders of the fleet, cached per process and dual-written to the
//! shared store:
//!
//! ```text
//!                 OrderStore
//!               /            \
//!     ExchangeOrders(1)   ExchangeOrders(2)
//!      /          \              |
//! leaf(1,10)   leaf(1,11)     leaf(2,20)     hash orders:<exchange>:<instrument>
//! ```
//!
//! Conflicting views of an order are reconciled with `Order::merge`;
//! terminal orders are evicted from the cache and from the shared hash.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use concord_orders::OrderStore;
//!
//! let mut orders = OrderStore::with_instruments(bus, clock, &instruments)?;
//! orders.fire_order(order)?;          // to the exchange connector
//! orders.received_order(ack)?;        // from the exchange connector
//! for order in orders.orders() { ... }
//! ```

pub mod error;
pub mod exchange;
pub mod leaf;
pub mod store;

pub use error::{Error, Result};
pub use exchange::ExchangeOrders;
pub use leaf::InstrumentOrders;
pub use store::OrderStore;
