//! Two processes sharing one store converge on the same orders
//!
//! Each process runs its own dispatcher with an `OrderStore` as state and
//! feeds `order_update` messages into it.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use concord_bus::{Bus, Dispatcher, EventKind, HandlerError, MemoryStore, Message, callback};
use concord_clock::ManualClock;
use concord_core::{
    ExchangeId, ExchangeInfo, InstrumentId, InstrumentInfo, InstrumentKind, Order, OrderStatus,
    OrderType,
};
use concord_orders::OrderStore;
use concord_ports::HashStore;
use rust_decimal_macros::dec;

fn instrument() -> InstrumentInfo {
    InstrumentInfo::new(
        InstrumentId::new(10),
        ExchangeInfo::new(ExchangeId::new(1), "BINANCE", "binance"),
        "BTC-USDT",
        InstrumentKind::Spot,
    )
}

fn process(store: &MemoryStore) -> Dispatcher<OrderStore> {
    let bus = Bus::new(Arc::new(store.clone()));
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
    let orders = OrderStore::with_instruments(bus.clone(), clock, &[instrument()]).unwrap();
    let mut dispatcher = Dispatcher::new(orders, bus).unwrap();

    let on_order = callback(|orders: &mut OrderStore, msg: &Message| {
        let order = msg
            .event()?
            .as_order()
            .ok_or(HandlerError::MissingPayload(msg.kind))?;
        orders
            .handle_local(order.clone())
            .map_err(|e| HandlerError::Other(e.to_string()))?;
        Ok(())
    });
    dispatcher
        .subscribe(
            EventKind::OrderUpdate,
            Some(&[InstrumentId::new(10).into()]),
            vec![on_order],
            true,
        )
        .unwrap();
    dispatcher
}

fn base_order() -> Order {
    Order::new(
        InstrumentId::new(10),
        ExchangeId::new(1),
        OrderType::Limit,
        dec!(10),
        Some(dec!(100)),
        Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap(),
    )
}

#[test]
fn test_processes_converge_regardless_of_origin() {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = MemoryStore::new();
    let mut connector = process(&store);
    let mut strategy = process(&store);

    let open = base_order().with_status(OrderStatus::Open);
    let partial = open
        .clone()
        .with_status(OrderStatus::Partial)
        .with_total_filled(dec!(3));

    // the connector sees the partial fill first, the strategy republishes a
    // stale OPEN copy afterwards
    connector.state_mut().received_order(partial.clone()).unwrap();
    strategy.state_mut().received_order(open.clone()).unwrap();
    connector.process_pending().unwrap();
    strategy.process_pending().unwrap();

    let a = connector.state().get(&open.id).unwrap().clone();
    let b = strategy.state().get(&open.id).unwrap().clone();
    assert_eq!(a, b);
    assert_eq!(a.status, OrderStatus::Partial);
    assert_eq!(a.total_filled, dec!(3));
}

#[test]
fn test_fill_evicts_in_every_process() {
    let store = MemoryStore::new();
    let mut connector = process(&store);
    let mut strategy = process(&store);

    let open = base_order().with_status(OrderStatus::Open);
    connector.state_mut().received_order(open.clone()).unwrap();
    strategy.process_pending().unwrap();
    assert!(strategy.state().get(&open.id).is_some());

    let mut filled = open
        .clone()
        .with_status(OrderStatus::Filled)
        .with_total_filled(dec!(10));
    filled.time_filled_mkt = Some(open.time + Duration::seconds(5));
    connector.state_mut().received_order(filled).unwrap();
    strategy.process_pending().unwrap();
    connector.process_pending().unwrap();

    assert!(connector.state().get(&open.id).is_none());
    assert!(strategy.state().get(&open.id).is_none());
    assert_eq!(store.hget("orders:1:10", open.id.as_str()).unwrap(), None);
}

#[test]
fn test_restart_reloads_live_orders() {
    let store = MemoryStore::new();
    let mut first = process(&store);
    let open = base_order().with_status(OrderStatus::Open);
    first.state_mut().received_order(open.clone()).unwrap();
    drop(first);

    let restarted = process(&store);
    assert_eq!(restarted.state().get(&open.id), Some(&open));
    assert_eq!(restarted.state().len(), 1);
}
