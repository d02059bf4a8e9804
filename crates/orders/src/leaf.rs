//! Orders of one instrument on one exchange

use std::collections::HashMap;

use concord_bus::{EventKind, HashKeys, codec};
use concord_core::{ExchangeId, InstrumentId, Order, OrderId};
use concord_ports::HashStore;
use log::{debug, warn};

use crate::error::Result;

/// Leaf of the order store: the live orders of one (exchange, instrument)
/// pair, mirrored in the hash `orders:<exchange>:<instrument>`.
#[derive(Debug, Clone)]
pub struct InstrumentOrders {
    exchange_id: ExchangeId,
    instr_id: InstrumentId,
    hash_key: String,
    orders: HashMap<OrderId, Order>,
}

impl InstrumentOrders {
    pub fn new(exchange_id: ExchangeId, instr_id: InstrumentId) -> Self {
        Self {
            exchange_id,
            instr_id,
            hash_key: HashKeys::orders(exchange_id, instr_id),
            orders: HashMap::new(),
        }
    }

    pub fn exchange_id(&self) -> ExchangeId {
        self.exchange_id
    }

    pub fn instr_id(&self) -> InstrumentId {
        self.instr_id
    }

    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    pub fn orders(&self) -> &HashMap<OrderId, Order> {
        &self.orders
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Replace the local map with the content of the shared hash.
    ///
    /// Entries that fail to decode are skipped. Returns the number loaded.
    pub fn load(&mut self, store: &dyn HashStore) -> Result<usize> {
        let entries = store.hgetall(&self.hash_key)?;
        self.orders.clear();
        for (field, raw) in entries {
            match codec::decode(EventKind::OrderUpdate, raw.as_bytes()) {
                Ok(event) => {
                    if let Some(order) = event.as_order() {
                        self.orders.insert(order.id.clone(), order.clone());
                    }
                }
                Err(e) => warn!("Skipping unreadable order {} in {}: {}", field, self.hash_key, e),
            }
        }
        debug!("Loaded {} orders from {}", self.orders.len(), self.hash_key);
        Ok(self.orders.len())
    }

    /// Reconcile `order` with the known copy and keep the winner.
    ///
    /// A terminal winner is evicted instead of stored. Returns the winner.
    pub fn apply(&mut self, order: Order) -> Result<Order> {
        let order = self.reconcile(order)?;
        self.commit(&order);
        Ok(order)
    }

    /// Winner of `order` against the known copy, without keeping it
    pub fn reconcile(&self, order: Order) -> Result<Order> {
        match self.orders.get(&order.id) {
            Some(known) => {
                debug!("Order {} already known, reconciling", order.id);
                Ok(order.merge(known)?)
            }
            None => Ok(order),
        }
    }

    /// Keep an already reconciled order, or evict it when terminal
    pub fn commit(&mut self, order: &Order) {
        if order.is_terminal() {
            if self.orders.remove(&order.id).is_some() {
                debug!("Order {} is {}, evicted", order.id, order.status);
            }
        } else {
            self.orders.insert(order.id.clone(), order.clone());
        }
    }

    /// Write `order` to the shared hash, or delete its field when terminal
    pub fn persist(&self, store: &dyn HashStore, order: &Order) -> Result<()> {
        if order.is_terminal() {
            store.hdel(&self.hash_key, order.id.as_str())?;
        } else {
            let json = codec::encode_string(EventKind::OrderUpdate, order)?;
            store.hset(&self.hash_key, order.id.as_str(), &json)?;
        }
        Ok(())
    }

    /// Drop every order, locally and in the shared hash
    pub fn clear(&mut self, store: &dyn HashStore) -> Result<()> {
        self.orders.clear();
        store.del(&self.hash_key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use concord_bus::MemoryStore;
    use concord_core::{OrderStatus, OrderType};
    use rust_decimal_macros::dec;

    fn leaf() -> InstrumentOrders {
        InstrumentOrders::new(ExchangeId::new(1), InstrumentId::new(5))
    }

    fn order() -> Order {
        Order::new(
            InstrumentId::new(5),
            ExchangeId::new(1),
            OrderType::Limit,
            dec!(2),
            Some(dec!(10)),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_apply_keeps_reconciled_order() {
        let mut leaf = leaf();
        let open = order().with_status(OrderStatus::Open);
        leaf.apply(open.clone()).unwrap();

        let stale = open.clone().with_status(OrderStatus::New);
        let kept = leaf.apply(stale).unwrap();
        assert_eq!(kept.status, OrderStatus::Open);
        assert_eq!(leaf.get(&open.id).unwrap().status, OrderStatus::Open);
    }

    #[test]
    fn test_terminal_order_is_evicted() {
        let store = MemoryStore::new();
        let mut leaf = leaf();
        let open = order().with_status(OrderStatus::Open);
        leaf.apply(open.clone()).unwrap();
        leaf.persist(&store, &open).unwrap();

        let filled = open.clone().with_status(OrderStatus::Filled);
        let kept = leaf.apply(filled).unwrap();
        leaf.persist(&store, &kept).unwrap();

        assert!(leaf.get(&open.id).is_none());
        assert_eq!(store.hget("orders:1:5", open.id.as_str()).unwrap(), None);
    }

    #[test]
    fn test_load_skips_garbage() {
        let store = MemoryStore::new();
        let order = order().with_status(OrderStatus::Open);
        let json = codec::encode_string(EventKind::OrderUpdate, &order).unwrap();
        store.hset("orders:1:5", order.id.as_str(), &json).unwrap();
        store.hset("orders:1:5", "junk", "{").unwrap();

        let mut leaf = leaf();
        assert_eq!(leaf.load(&store).unwrap(), 1);
        assert_eq!(leaf.get(&order.id), Some(&order));
    }
}
