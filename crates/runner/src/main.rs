use std::process::ExitCode;
use std::sync::Arc;

use concord_bus::MemoryStore;
use concord_clock::SystemClock;
use concord_runner::{build_manager, init_logging, load_config, load_default_config, run_node};
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            load_config(path)
        }
        None => load_default_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(MemoryStore::new());
    let manager = match build_manager(&config, store, Arc::new(SystemClock::new())) {
        Ok(manager) => manager,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for ctrl-c: {}", e);
        }
    };
    match run_node(manager, shutdown).await {
        Ok(()) => {
            info!("Node {} stopped", config.bus.node_name);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
