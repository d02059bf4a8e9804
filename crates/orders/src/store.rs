//! Order store root
//!
//! Three levels: the store (all exchanges), [`ExchangeOrders`] and
//! [`InstrumentOrders`] leaves. Only leaves own orders; the upper levels
//! union their children on demand.
//!
//! Every update goes through [`Order::merge`] against the known copy, so
//! duplicated or reordered updates from several producers converge on the
//! same order in every process. Terminal orders leave the cache and the
//! shared hash as soon as they are seen.

use std::collections::BTreeMap;
use std::sync::Arc;

use concord_bus::{Bus, EventKind};
use concord_core::{
    CancelAllExchange, CancelAllInstrument, ExchangeId, InstrumentId, InstrumentInfo, Order,
    OrderId, OrderStatus,
};
use concord_ports::Clock;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::exchange::ExchangeOrders;
use crate::leaf::InstrumentOrders;

pub struct OrderStore {
    bus: Bus,
    clock: Arc<dyn Clock>,
    exchanges: BTreeMap<ExchangeId, ExchangeOrders>,
}

impl OrderStore {
    pub fn new(bus: Bus, clock: Arc<dyn Clock>) -> Self {
        Self {
            bus,
            clock,
            exchanges: BTreeMap::new(),
        }
    }

    /// Create a store for `instruments`, loading their orders
    pub fn with_instruments(
        bus: Bus,
        clock: Arc<dyn Clock>,
        instruments: &[InstrumentInfo],
    ) -> Result<Self> {
        let mut store = Self::new(bus, clock);
        for instr in instruments {
            store.add_instrument(instr)?;
        }
        Ok(store)
    }

    /// Start keeping orders for `instr` (and its exchange)
    pub fn add_instrument(&mut self, instr: &InstrumentInfo) -> Result<()> {
        self.add_leaf(instr.exchange_id(), instr.id)
    }

    pub fn add_leaf(&mut self, exchange_id: ExchangeId, instr_id: InstrumentId) -> Result<()> {
        let exchange = self
            .exchanges
            .entry(exchange_id)
            .or_insert_with(|| ExchangeOrders::new(exchange_id));
        if exchange.leaf(instr_id).is_none() {
            info!("Loading orders of instrument {} on exchange {}", instr_id, exchange_id);
        }
        exchange.add_instrument(self.bus.store(), instr_id)
    }

    pub fn manages(&self, exchange_id: ExchangeId, instr_id: InstrumentId) -> bool {
        self.instrument_orders(exchange_id, instr_id).is_some()
    }

    fn leaf_mut(&mut self, order: &Order) -> Result<&mut InstrumentOrders> {
        self.exchanges
            .get_mut(&order.exchange_id)
            .and_then(|e| e.leaf_mut(order.instr_id))
            .ok_or(Error::UnknownInstrument {
                exchange_id: order.exchange_id,
                instr_id: order.instr_id,
            })
    }

    /// Reconcile an update into the local cache only. Returns the winner.
    ///
    /// Used for updates observed on the bus: their producer already wrote
    /// the shared hash.
    pub fn handle_local(&mut self, order: Order) -> Result<Order> {
        debug!("Handling order {}", order);
        self.leaf_mut(&order)?.apply(order)
    }

    /// An order update learned by this process (e.g. an exchange ack):
    /// reconcile, publish on `order_update` and persist.
    pub fn received_order(&mut self, order: Order) -> Result<Order> {
        info!("Received order {}", order);
        self.store_and_publish(EventKind::OrderUpdate, order)
    }

    /// A new order to be placed: reconcile, publish on `order_exchange`
    /// for the exchange's connector, and persist.
    pub fn fire_order(&mut self, order: Order) -> Result<Order> {
        info!("Fire order {}", order);
        self.store_and_publish(EventKind::OrderExchange, order)
    }

    /// The cache only changes once the hash holds the winner
    fn store_and_publish(&mut self, kind: EventKind, order: Order) -> Result<Order> {
        let bus = self.bus.clone();
        let leaf = self.leaf_mut(&order)?;
        let kept = leaf.reconcile(order)?;
        leaf.persist(bus.store(), &kept)?;
        leaf.commit(&kept);
        bus.publish(kind, &kept)?;
        Ok(kept)
    }

    /// Ask the exchange to cancel `order`. Returns the published copy.
    pub fn cancel_order(&self, order: &Order) -> Result<Order> {
        let mut cancel = order.clone();
        cancel.status = OrderStatus::Cancel;
        cancel.time_cancel = Some(self.clock.now());
        info!("Cancel order {}", cancel);
        self.bus.publish(EventKind::CancelOrder, &cancel)?;
        Ok(cancel)
    }

    pub fn cancel_all_orders(&self) -> Result<()> {
        info!("Cancel all orders on every exchange");
        self.bus.publish(EventKind::CancelAllOrders, &())?;
        Ok(())
    }

    pub fn cancel_all_orders_exchange(&self, exchange_id: ExchangeId) -> Result<()> {
        info!("Cancel all orders on exchange {}", exchange_id);
        self.bus.publish(
            EventKind::CancelAllOrdersExchange,
            &CancelAllExchange { exchange_id },
        )?;
        Ok(())
    }

    pub fn cancel_all_orders_instr(
        &self,
        exchange_id: ExchangeId,
        instr_id: InstrumentId,
    ) -> Result<()> {
        info!("Cancel all orders of instrument {} on exchange {}", instr_id, exchange_id);
        self.bus.publish(
            EventKind::CancelAllOrdersInstr,
            &CancelAllInstrument {
                exchange_id,
                instr_id,
            },
        )?;
        Ok(())
    }

    /// Forget every order, locally and in the shared store
    pub fn delete_all_orders(&mut self) -> Result<()> {
        info!("Deleting all orders");
        let store = self.bus.store();
        for exchange in self.exchanges.values_mut() {
            exchange.clear(store)?;
        }
        Ok(())
    }

    pub fn delete_exchange_orders(&mut self, exchange_id: ExchangeId) -> Result<()> {
        info!("Deleting all orders of exchange {}", exchange_id);
        if let Some(exchange) = self.exchanges.get_mut(&exchange_id) {
            exchange.clear(self.bus.store())?;
        }
        Ok(())
    }

    /// Re-read orders from the shared store, for one exchange or all.
    /// Returns the number of live orders loaded.
    pub fn reload_all_orders(&mut self, exchange_id: Option<ExchangeId>) -> Result<usize> {
        match exchange_id {
            Some(id) => info!("Reloading all orders of exchange {}", id),
            None => info!("Reloading all orders of all exchanges"),
        }
        let store = self.bus.store();
        let mut loaded = 0;
        for exchange in self.exchanges.values_mut() {
            if exchange_id.is_none_or(|id| id == exchange.exchange_id()) {
                loaded += exchange.reload(store)?;
            }
        }
        Ok(loaded)
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.exchanges.values().find_map(|e| e.get(id))
    }

    /// Every live order, unioned from the leaves on each call
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.exchanges.values().flat_map(ExchangeOrders::orders)
    }

    pub fn exchange(&self, exchange_id: ExchangeId) -> Option<&ExchangeOrders> {
        self.exchanges.get(&exchange_id)
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &ExchangeOrders> {
        self.exchanges.values()
    }

    pub fn instrument_orders(
        &self,
        exchange_id: ExchangeId,
        instr_id: InstrumentId,
    ) -> Option<&InstrumentOrders> {
        self.exchanges.get(&exchange_id)?.leaf(instr_id)
    }

    pub fn len(&self) -> usize {
        self.exchanges.values().map(ExchangeOrders::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use concord_bus::MemoryStore;
    use concord_clock::ManualClock;
    use concord_core::{ExchangeInfo, InstrumentKind, OrderType};
    use concord_ports::HashStore;
    use rust_decimal_macros::dec;

    fn instruments() -> Vec<InstrumentInfo> {
        let binance = ExchangeInfo::new(ExchangeId::new(1), "BINANCE", "binance");
        let okx = ExchangeInfo::new(ExchangeId::new(2), "OKX", "okx");
        vec![
            InstrumentInfo::new(InstrumentId::new(10), binance.clone(), "BTC-USDT", InstrumentKind::Spot),
            InstrumentInfo::new(InstrumentId::new(11), binance, "BTC-USDT-PERP", InstrumentKind::Perpetual),
            InstrumentInfo::new(InstrumentId::new(20), okx, "BTC-USDT", InstrumentKind::Spot),
        ]
    }

    fn setup() -> (MemoryStore, OrderStore) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        let orders =
            OrderStore::with_instruments(Bus::new(Arc::new(store.clone())), clock, &instruments())
                .unwrap();
        (store, orders)
    }

    fn order(exchange: u32, instr: u32) -> Order {
        Order::new(
            InstrumentId::new(instr),
            ExchangeId::new(exchange),
            OrderType::Limit,
            dec!(1),
            Some(dec!(100)),
            Utc.with_ymd_and_hms(2024, 5, 1, 7, 59, 0).unwrap(),
        )
    }

    #[test]
    fn test_received_order_is_persisted() {
        let (store, mut orders) = setup();
        let open = order(1, 10).with_status(OrderStatus::Open);
        orders.received_order(open.clone()).unwrap();

        assert_eq!(orders.get(&open.id), Some(&open));
        assert!(store.hget("orders:1:10", open.id.as_str()).unwrap().is_some());
    }

    #[test]
    fn test_filled_order_is_evicted_everywhere() {
        let (store, mut orders) = setup();
        let open = order(1, 10).with_status(OrderStatus::Open);
        orders.received_order(open.clone()).unwrap();

        let filled = open.clone().with_status(OrderStatus::Filled).with_total_filled(dec!(1));
        orders.received_order(filled).unwrap();

        let leaf = orders.instrument_orders(ExchangeId::new(1), InstrumentId::new(10)).unwrap();
        assert!(leaf.get(&open.id).is_none());
        assert_eq!(store.hget("orders:1:10", open.id.as_str()).unwrap(), None);
    }

    #[test]
    fn test_failed_write_leaves_cache_untouched() {
        let (store, mut orders) = setup();
        let open = order(1, 10).with_status(OrderStatus::Open);
        orders.received_order(open.clone()).unwrap();

        store.close();
        let filled = open.clone().with_status(OrderStatus::Filled).with_total_filled(dec!(1));
        assert!(orders.received_order(filled).is_err());
        assert!(orders.fire_order(order(1, 11)).is_err());

        // still in step with the hash, which never saw either write
        assert_eq!(orders.get(&open.id), Some(&open));
        assert_eq!(orders.len(), 1);
    }

    #[test]
    fn test_stale_update_does_not_regress() {
        let (_store, mut orders) = setup();
        let partial = order(2, 20)
            .with_status(OrderStatus::Partial)
            .with_total_filled(dec!(0.6));
        orders.received_order(partial.clone()).unwrap();

        let stale = partial.clone().with_total_filled(dec!(0.2));
        let kept = orders.handle_local(stale).unwrap();
        assert_eq!(kept.total_filled, dec!(0.6));
    }

    #[test]
    fn test_unknown_instrument() {
        let (_store, mut orders) = setup();
        let err = orders.handle_local(order(1, 99)).unwrap_err();
        assert!(matches!(err, Error::UnknownInstrument { .. }));
        assert!(!orders.manages(ExchangeId::new(1), InstrumentId::new(99)));
    }

    #[test]
    fn test_union_views() {
        let (_store, mut orders) = setup();
        for (e, i) in [(1, 10), (1, 11), (2, 20)] {
            orders.handle_local(order(e, i)).unwrap();
        }
        assert_eq!(orders.len(), 3);
        assert_eq!(orders.orders().count(), 3);
        assert_eq!(orders.exchange(ExchangeId::new(1)).unwrap().len(), 2);
    }

    #[test]
    fn test_cancel_order_stamps_time() {
        let (_store, orders) = setup();
        let open = order(1, 10).with_status(OrderStatus::Open);
        let cancel = orders.cancel_order(&open).unwrap();
        assert_eq!(cancel.status, OrderStatus::Cancel);
        assert_eq!(
            cancel.time_cancel,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_reload_and_delete() {
        let (store, mut orders) = setup();
        let a = order(1, 10).with_status(OrderStatus::Open);
        let b = order(2, 20).with_status(OrderStatus::Open);
        orders.received_order(a.clone()).unwrap();
        orders.received_order(b.clone()).unwrap();

        // another process closed `a` without us seeing the update
        store.hdel("orders:1:10", a.id.as_str()).unwrap();
        assert_eq!(orders.reload_all_orders(Some(ExchangeId::new(1))).unwrap(), 0);
        assert!(orders.get(&a.id).is_none());
        assert!(orders.get(&b.id).is_some());

        orders.delete_all_orders().unwrap();
        assert!(orders.is_empty());
        assert!(store.hgetall("orders:2:20").unwrap().is_empty());
    }
}
