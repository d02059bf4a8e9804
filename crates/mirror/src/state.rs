//! Everything a process mirrors, owned by its dispatch loop

use std::collections::BTreeMap;
use std::sync::Arc;

use concord_bus::Bus;
use concord_clock::Clock;
use concord_core::{
    ConnectionStatus, ConnectivityStatus, ExchangeId, ExchangeInfo, InstrumentId, InstrumentInfo,
};
use concord_orders::OrderStore;
use log::{error, info};

use crate::error::{Error, Result};
use crate::exchange::ExchangeMirror;
use crate::instrument::InstrumentMirror;

/// State of the dispatch loop: exchange and instrument mirrors plus the
/// optional order store, looked up by id.
pub struct MirrorState {
    bus: Bus,
    clock: Arc<dyn Clock>,
    exchanges: BTreeMap<ExchangeId, ExchangeMirror>,
    instruments: BTreeMap<InstrumentId, InstrumentMirror>,
    orders: Option<OrderStore>,
}

impl MirrorState {
    pub fn new(bus: Bus, clock: Arc<dyn Clock>, has_orders: bool) -> Self {
        let orders = has_orders.then(|| OrderStore::new(bus.clone(), Arc::clone(&clock)));
        Self {
            bus,
            clock,
            exchanges: BTreeMap::new(),
            instruments: BTreeMap::new(),
            orders,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Mirror an exchange. Returns false if it already was.
    pub fn add_exchange(&mut self, info: ExchangeInfo) -> Result<bool> {
        if self.exchanges.contains_key(&info.id) {
            return Ok(false);
        }
        info!("Mirroring exchange {} ({})", info.exchange_name, info.id);
        let mirror = ExchangeMirror::new(info, self.bus.clone())?;
        self.exchanges.insert(mirror.id(), mirror);
        Ok(true)
    }

    /// Mirror an instrument, its exchange and its orders.
    /// Returns false if it already was.
    pub fn add_instrument(&mut self, info: InstrumentInfo) -> Result<bool> {
        if self.instruments.contains_key(&info.id) {
            return Ok(false);
        }
        self.add_exchange(info.exchange.clone())?;
        if let Some(orders) = self.orders.as_mut() {
            orders.add_instrument(&info)?;
        }
        info!("Mirroring instrument {}", info);
        let mirror = InstrumentMirror::new(info, self.bus.clone())?;
        self.instruments.insert(mirror.id(), mirror);
        Ok(true)
    }

    pub fn exchange(&self, id: ExchangeId) -> Option<&ExchangeMirror> {
        self.exchanges.get(&id)
    }

    pub fn exchange_mut(&mut self, id: ExchangeId) -> Option<&mut ExchangeMirror> {
        self.exchanges.get_mut(&id)
    }

    pub fn get_exchange(&self, id: ExchangeId) -> Result<&ExchangeMirror> {
        self.exchange(id).ok_or(Error::UnknownExchange(id))
    }

    pub fn get_exchange_mut(&mut self, id: ExchangeId) -> Result<&mut ExchangeMirror> {
        self.exchange_mut(id).ok_or(Error::UnknownExchange(id))
    }

    pub fn instrument(&self, id: InstrumentId) -> Option<&InstrumentMirror> {
        self.instruments.get(&id)
    }

    pub fn instrument_mut(&mut self, id: InstrumentId) -> Option<&mut InstrumentMirror> {
        self.instruments.get_mut(&id)
    }

    pub fn get_instrument(&self, id: InstrumentId) -> Result<&InstrumentMirror> {
        self.instrument(id).ok_or(Error::UnknownInstrument(id))
    }

    pub fn get_instrument_mut(&mut self, id: InstrumentId) -> Result<&mut InstrumentMirror> {
        self.instrument_mut(id).ok_or(Error::UnknownInstrument(id))
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &ExchangeMirror> {
        self.exchanges.values()
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentMirror> {
        self.instruments.values()
    }

    /// Instruments traded on `exchange_id`
    pub fn instruments_of(&self, exchange_id: ExchangeId) -> impl Iterator<Item = &InstrumentMirror> {
        self.instruments
            .values()
            .filter(move |m| m.exchange_id() == exchange_id)
    }

    pub fn orders(&self) -> Option<&OrderStore> {
        self.orders.as_ref()
    }

    pub fn orders_mut(&mut self) -> Option<&mut OrderStore> {
        self.orders.as_mut()
    }

    pub fn get_orders_mut(&mut self) -> Result<&mut OrderStore> {
        self.orders.as_mut().ok_or(Error::NoOrderStore)
    }

    /// Re-hydrate every mirror and the order store from the shared store
    pub fn refresh_all(&mut self) -> Result<()> {
        for exchange in self.exchanges.values_mut() {
            exchange.refresh_all()?;
        }
        for instrument in self.instruments.values_mut() {
            instrument.refresh_all()?;
        }
        if let Some(orders) = self.orders.as_mut() {
            orders.reload_all_orders(None)?;
        }
        Ok(())
    }

    /// Set the `api` channel of every mirrored entity
    pub fn set_api_status(&mut self, status: ConnectivityStatus) -> Result<()> {
        let update = ConnectionStatus {
            api: Some(status),
            ..Default::default()
        };
        for exchange in self.exchanges.values_mut() {
            exchange.set_status(update.clone())?;
        }
        for instrument in self.instruments.values_mut() {
            instrument.set_status(update.clone())?;
        }
        Ok(())
    }

    /// Best effort `api = UNAVAILABLE` on every entity; failures are logged
    pub(crate) fn mark_unavailable(&mut self) {
        let update = ConnectionStatus {
            api: Some(ConnectivityStatus::Unavailable),
            ..Default::default()
        };
        for exchange in self.exchanges.values_mut() {
            if let Err(e) = exchange.set_status(update.clone()) {
                error!("Cannot mark exchange {} unavailable: {}", exchange.id(), e);
            }
        }
        for instrument in self.instruments.values_mut() {
            if let Err(e) = instrument.set_status(update.clone()) {
                error!("Cannot mark instrument {} unavailable: {}", instrument.id(), e);
            }
        }
    }
}
