//! Concord Clock Infrastructure
//!
//! Time sources and periodic tasks:
//!
//! - [`SystemClock`]: wall clock for production processes
//! - [`ManualClock`]: frozen clock for deterministic tests
//! - [`HeartbeatScheduler`]: periodic callbacks, free-running or aligned
//!   to wall-clock multiples of their period ("pile")
//!
//! ## Usage
//!
//! ```ignore
//! use concord_clock::{Heartbeat, HeartbeatScheduler, SystemClock};
//! use std::{sync::Arc, time::Duration};
//!
//! let mut scheduler = HeartbeatScheduler::new(Arc::new(SystemClock::new()), Duration::from_millis(500));
//!
//! // every minute, two seconds past the minute, in every process
//! scheduler.add(
//!     Heartbeat::every(Duration::from_secs(60)).pile().offset(Duration::from_secs(2)),
//!     || log::info!("snapshot"),
//! )?;
//! scheduler.start()?;
//! ```

pub mod heartbeat;
mod manual;
mod system;

pub use heartbeat::{Alignment, Heartbeat, HeartbeatError, HeartbeatScheduler, Schedule};
pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use concord_ports::Clock;
