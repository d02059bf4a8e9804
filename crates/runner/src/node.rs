//! One process of the fleet: a mirror manager on a blocking thread

use std::future::Future;
use std::sync::Arc;

use concord_bus::Bus;
use concord_clock::{Clock, Heartbeat};
use concord_core::InstrumentId;
use concord_mirror::{Manager, MirrorState, ShutdownGuard};
use concord_ports::SharedStore;
use log::{error, info, warn};

use crate::config::NodeConfig;
use crate::error::RunnerError;

/// Build the manager described by `config`: mirrors, subscriptions and the
/// order book snapshot heartbeat
pub fn build_manager(
    config: &NodeConfig,
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
) -> Result<Manager, RunnerError> {
    info!(
        "Building node {} ({} exchanges, {} instruments)",
        config.bus.node_name,
        config.exchanges.len(),
        config.instruments.len()
    );
    let mut manager = Manager::new(Bus::new(store), clock, &config.bus, config.manager_options())?;

    for kind in config.event_kinds()? {
        manager.subscribe(kind, Vec::new(), true)?;
    }

    if let Some(period) = config.snapshot_interval() {
        manager.add_heartbeat(
            Heartbeat::every(period).named("orderbook-snapshot"),
            save_snapshots,
        )?;
    }
    Ok(manager)
}

fn save_snapshots(state: &mut MirrorState) {
    let now = state.clock().now();
    let ids: Vec<InstrumentId> = state.instruments().map(|m| m.id()).collect();
    for id in ids {
        if let Some(instrument) = state.instrument_mut(id) {
            if let Err(e) = instrument.save_snapshot(now) {
                warn!("Snapshot of instrument {} failed: {}", id, e);
            }
        }
    }
}

/// Run `manager` until `shutdown` resolves or the transport fails.
///
/// The dispatch loop blocks, so it runs on the blocking pool. On every exit
/// path the mirrored entities are marked unavailable before this returns.
pub async fn run_node<F>(manager: Manager, shutdown: F) -> Result<(), RunnerError>
where
    F: Future<Output = ()> + Send,
{
    let handle = manager.handle();
    let mut worker = tokio::task::spawn_blocking(move || {
        let mut manager = ShutdownGuard::new(manager);
        manager.run()
    });

    tokio::select! {
        result = &mut worker => {
            let result = result?;
            if let Err(e) = &result {
                error!("Dispatch loop failed: {}", e);
            }
            Ok(result?)
        }
        _ = shutdown => {
            info!("Shutdown requested, stopping dispatch loop");
            handle.stop();
            Ok(worker.await??)
        }
    }
}
