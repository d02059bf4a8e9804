//! Concord Domain Mirrors
//!
//! Every process keeps a local copy of the exchanges and instruments it
//! cares about. Mirrors are hydrated from the shared store at start, kept in
//! sync by hooks that run ahead of user callbacks, and write through the bus
//! when the process itself changes something:
//!
//! ```text
//!   set_balance(..)                                balance_update:1
//!        │                                               │
//!        ▼                                               ▼
//! ┌──────────────┐  publish + hset  ┌─────────┐   ┌─────────────┐
//! │ExchangeMirror│ ───────────────▶ │  store  │──▶│ hook (apply)│──▶ user callbacks
//! └──────────────┘                  └─────────┘   └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use concord_mirror::{Manager, ManagerOptions, ShutdownGuard};
//!
//! let manager = Manager::new(bus, clock, &config, ManagerOptions {
//!     instruments,
//!     has_orders: true,
//!     has_status: true,
//!     ..Default::default()
//! })?;
//! let mut manager = ShutdownGuard::new(manager);
//! manager.subscribe(EventKind::OrderbookUpdate, vec![on_book], true)?;
//! manager.run()?;
//! ```

pub mod bridge;
pub mod error;
pub mod exchange;
pub mod fields;
pub mod guard;
pub mod hooks;
pub mod instrument;
pub mod manager;
pub mod state;

pub use bridge::ConnectorBridge;
pub use error::{Error, Result};
pub use exchange::ExchangeMirror;
pub use guard::ShutdownGuard;
pub use hooks::{Hook, mirror_hook};
pub use instrument::InstrumentMirror;
pub use manager::{Manager, ManagerOptions};
pub use state::MirrorState;
