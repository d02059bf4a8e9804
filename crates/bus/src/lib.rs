//! Concord Bus
//!
//! Event protocol and dispatch engine shared by every process of the fleet:
//! - Event kinds with their channel, schema and routing rule
//! - JSON payload codec (ids as strings, enums by name, no nulls)
//! - Publish side ([`Bus`]) and the sequential dispatch loop ([`Dispatcher`])
//! - In-process shared store for single-process runs and tests
//!
//! ## Architecture
//!
//! ```text
//! Connectors, feeds, strategies, recorders
//!         │ publish(kind, payload)
//!    ┌────▼─────────┐
//!    │ Shared store │  pub/sub + hashes
//!    └────┬─────────┘
//!         │ Channels:
//!         │ order_update:<instr>, order_exchange:<exch>, db_add_order, ...
//!    ┌────▼───────┐
//!    │ Dispatcher │  one loop per process, callbacks in order
//!    └────┬───────┘
//!         │
//!    Mirrors, order store, application callbacks
//! ```

pub mod channels;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod transport;

// Re-export commonly used types
pub use channels::{Channels, HashKeys, RoutingKey};
pub use codec::{Event, Payload};
pub use config::BusConfig;
pub use dispatch::{Bus, Callback, DispatchHandle, Dispatcher, KindRegistration, Message, callback};
pub use error::{BusError, CodecError, HandlerError};
pub use events::{Driver, EventKind, PayloadSchema, RoutingRule};
pub use transport::MemoryStore;
