use std::collections::BTreeMap;

use concord_core::{ExchangeId, InstrumentId, Order, OrderId};
use concord_ports::HashStore;

use crate::error::Result;
use crate::leaf::InstrumentOrders;

/// Orders of one exchange, one leaf per instrument
#[derive(Debug, Clone)]
pub struct ExchangeOrders {
    exchange_id: ExchangeId,
    instruments: BTreeMap<InstrumentId, InstrumentOrders>,
}

impl ExchangeOrders {
    pub fn new(exchange_id: ExchangeId) -> Self {
        Self {
            exchange_id,
            instruments: BTreeMap::new(),
        }
    }

    pub fn exchange_id(&self) -> ExchangeId {
        self.exchange_id
    }

    /// Add an instrument and load its orders. No-op if already present.
    pub fn add_instrument(&mut self, store: &dyn HashStore, instr_id: InstrumentId) -> Result<()> {
        if self.instruments.contains_key(&instr_id) {
            return Ok(());
        }
        let mut leaf = InstrumentOrders::new(self.exchange_id, instr_id);
        leaf.load(store)?;
        self.instruments.insert(instr_id, leaf);
        Ok(())
    }

    pub fn leaf(&self, instr_id: InstrumentId) -> Option<&InstrumentOrders> {
        self.instruments.get(&instr_id)
    }

    pub fn leaf_mut(&mut self, instr_id: InstrumentId) -> Option<&mut InstrumentOrders> {
        self.instruments.get_mut(&instr_id)
    }

    pub fn leaves(&self) -> impl Iterator<Item = &InstrumentOrders> {
        self.instruments.values()
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.instruments.values().find_map(|leaf| leaf.get(id))
    }

    /// Union of every leaf, computed on each call
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.instruments.values().flat_map(|leaf| leaf.orders().values())
    }

    pub fn len(&self) -> usize {
        self.instruments.values().map(InstrumentOrders::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reload(&mut self, store: &dyn HashStore) -> Result<usize> {
        let mut loaded = 0;
        for leaf in self.instruments.values_mut() {
            loaded += leaf.load(store)?;
        }
        Ok(loaded)
    }

    pub fn clear(&mut self, store: &dyn HashStore) -> Result<()> {
        for leaf in self.instruments.values_mut() {
            leaf.clear(store)?;
        }
        Ok(())
    }
}
