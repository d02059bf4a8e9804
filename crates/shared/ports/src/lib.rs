//! Concord Ports
//!
//! Port definitions (traits) for the Concord event bus.
//! These define the boundaries between domain logic and infrastructure:
//! the shared store (pub/sub + hashes), time, and exchange adapters.

mod clock;
mod connector;
mod error;
mod store;

pub use clock::Clock;
pub use connector::{ExchangeConnector, PlacementAck};
pub use error::{ConnectorError, ConnectorResult, StoreError, StoreResult};
pub use store::{HashStore, InboundMessage, Publisher, SharedStore, Subscription};
