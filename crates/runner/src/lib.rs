//! Concord Runner - one fleet process
//!
//! Loads a [`NodeConfig`], builds the mirror manager it describes and runs
//! the dispatch loop until shutdown:
//!
//! ```text
//!  node.json ──▶ load_config ──▶ build_manager ──▶ run_node ──▶ ShutdownGuard
//!                                    │                │            (api = UNAVAILABLE)
//!                                    │                ├── dispatch loop (blocking pool)
//!                                    │                └── heartbeats (snapshot)
//!                                    └── mirrors hydrated from the store
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod node;

pub use config::{ConfigError, NodeConfig, load_config, load_config_from_str, load_default_config};
pub use error::RunnerError;
pub use logging::init_logging;
pub use node::{build_manager, run_node};
