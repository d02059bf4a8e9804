//! A node started from configuration, observed by a second process

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use concord_bus::{Bus, BusConfig, MemoryStore};
use concord_clock::{ManualClock, SystemClock};
use concord_core::{BookLevel, ConnectivityStatus, ExchangeId, InstrumentId, OrderBook};
use concord_mirror::{Manager, ManagerOptions};
use concord_ports::HashStore;
use concord_runner::{NodeConfig, RunnerError, build_manager, load_config_from_str, run_node};
use rust_decimal_macros::dec;
use tokio::sync::oneshot;

fn config() -> NodeConfig {
    load_config_from_str(
        r#"{
            "bus": {"node_name": "test-node", "poll_interval_ms": 5, "heartbeat_min_tick_ms": 1},
            "instruments": [{
                "id": 10,
                "exchange": {"id": 1, "feed_name": "BINANCE", "exchange_name": "binance"},
                "symbol": "BTC-USDT",
                "kind": "spot"
            }],
            "subscribe": ["orderbook_update"],
            "snapshot_interval_ms": 10
        }"#,
    )
    .unwrap()
}

fn observer(store: &MemoryStore, config: &NodeConfig) -> Manager {
    Manager::new(
        Bus::new(Arc::new(store.clone())),
        ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()),
        &BusConfig::default(),
        config.manager_options(),
    )
    .unwrap()
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_node_snapshots_books_and_marks_unavailable_on_shutdown() {
    let _ = env_logger::try_init();
    let store = MemoryStore::new();
    let config = config();
    let node = build_manager(&config, Arc::new(store.clone()), Arc::new(SystemClock::new())).unwrap();

    let mut feed = observer(&store, &config);
    feed.state_mut()
        .get_instrument_mut(InstrumentId::new(10))
        .unwrap()
        .set_orderbook(OrderBook {
            instr_id: InstrumentId::new(10),
            bids: vec![BookLevel { price: dec!(99), qty: dec!(1) }],
            asks: vec![BookLevel { price: dec!(101), qty: dec!(1) }],
            timestamp: None,
        })
        .unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let running = tokio::spawn(run_node(node, async move {
        let _ = stopped.await;
    }));

    let snapshot_store = store.clone();
    assert!(
        wait_for(move || {
            snapshot_store
                .hget("instrument:10", "orderbook")
                .map(|raw| raw.is_some())
                .unwrap_or(false)
        })
        .await
    );
    assert!(store.hget("instrument:10", "timestamp").unwrap().is_some());

    stop.send(()).unwrap();
    running.await.unwrap().unwrap();

    // the observer was created before shutdown and follows status updates
    feed.process_pending().unwrap();
    let unavailable = Some(ConnectivityStatus::Unavailable);
    assert_eq!(feed.get_exchange(ExchangeId::new(1)).unwrap().status().api, unavailable);
    assert_eq!(feed.get_instrument(InstrumentId::new(10)).unwrap().status().api, unavailable);
}

#[tokio::test]
async fn test_node_returns_transport_failure() {
    let store = MemoryStore::new();
    let config = config();
    let node = build_manager(&config, Arc::new(store.clone()), Arc::new(SystemClock::new())).unwrap();

    let running = tokio::spawn(run_node(node, std::future::pending()));
    store.close();

    let result = running.await.unwrap();
    assert!(matches!(result, Err(RunnerError::Mirror(_))));
}

#[test]
fn test_unknown_subscription_is_a_config_error() {
    let mut config = config();
    config.subscribe.push("tick".to_string());
    let result = build_manager(
        &config,
        Arc::new(MemoryStore::new()),
        Arc::new(SystemClock::new()),
    );
    assert!(matches!(result, Err(RunnerError::Config(_))));
}

#[test]
fn test_manager_options_follow_config() {
    let options: ManagerOptions = config().manager_options();
    assert!(options.has_status);
    assert!(!options.has_orders);
    assert_eq!(options.instruments[0].id, InstrumentId::new(10));
}
