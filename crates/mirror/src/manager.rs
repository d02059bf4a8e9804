//! Process-level entry point: mirrors, order store and dispatch loop

use std::collections::HashMap;
use std::sync::Arc;

use concord_bus::{
    Bus, BusConfig, Callback, DispatchHandle, Dispatcher, Driver, EventKind, KindRegistration,
    RoutingKey, RoutingRule, callback,
};
use concord_clock::{Clock, Heartbeat, HeartbeatScheduler};
use concord_core::{ExchangeId, ExchangeInfo, InstrumentId, InstrumentInfo};
use log::{info, warn};
use parking_lot::Mutex;

use crate::error::Result;
use crate::exchange::ExchangeMirror;
use crate::hooks::{mirror_hook, targets};
use crate::instrument::InstrumentMirror;
use crate::state::MirrorState;

/// What a process mirrors
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    pub exchanges: Vec<ExchangeInfo>,
    /// Their exchanges are mirrored too
    pub instruments: Vec<InstrumentInfo>,
    /// Keep an order store for the instruments
    pub has_orders: bool,
    /// Follow `exchange_status` and `instr_status` of every mirrored entity
    pub has_status: bool,
}

/// Owns the dispatch loop of a process.
///
/// Subscriptions made through the manager get the mirror hook of their kind
/// registered ahead of the user callbacks, and entity-driven kinds are
/// routed to the mirrored exchanges or instruments.
pub struct Manager {
    dispatcher: Dispatcher<MirrorState>,
    hooks: HashMap<EventKind, Callback<MirrorState>>,
    scheduler: HeartbeatScheduler,
}

impl Manager {
    pub fn new(
        bus: Bus,
        clock: Arc<dyn Clock>,
        config: &BusConfig,
        options: ManagerOptions,
    ) -> Result<Self> {
        let mut state = MirrorState::new(bus.clone(), Arc::clone(&clock), options.has_orders);
        for exchange in options.exchanges {
            state.add_exchange(exchange)?;
        }
        for instrument in options.instruments {
            state.add_instrument(instrument)?;
        }

        let dispatcher = Dispatcher::with_config(state, bus, config)?;
        let mut manager = Self {
            dispatcher,
            hooks: HashMap::new(),
            scheduler: HeartbeatScheduler::new(clock, config.heartbeat_min_tick()),
        };

        if options.has_status {
            manager.subscribe(EventKind::ExchangeStatus, Vec::new(), true)?;
            manager.subscribe(EventKind::InstrStatus, Vec::new(), true)?;
        }
        info!(
            "Manager {} ready: {} exchanges, {} instruments, orders {}",
            config.node_name,
            manager.state().exchanges().count(),
            manager.state().instruments().count(),
            manager.state().orders().is_some()
        );
        Ok(manager)
    }

    pub fn bus(&self) -> &Bus {
        self.dispatcher.bus()
    }

    pub fn state(&self) -> &MirrorState {
        self.dispatcher.state()
    }

    pub fn state_mut(&mut self) -> &mut MirrorState {
        self.dispatcher.state_mut()
    }

    pub fn dispatcher(&self) -> &Dispatcher<MirrorState> {
        &self.dispatcher
    }

    pub fn handle(&self) -> DispatchHandle<MirrorState> {
        self.dispatcher.handle()
    }

    pub fn get_exchange(&self, id: ExchangeId) -> Result<&ExchangeMirror> {
        self.state().get_exchange(id)
    }

    pub fn get_instrument(&self, id: InstrumentId) -> Result<&InstrumentMirror> {
        self.state().get_instrument(id)
    }

    /// Subscribe `kind` for every mirrored entity that drives it.
    ///
    /// Instrument-driven kinds get one channel per mirrored instrument
    /// (funding only for perpetuals, liquidations only for derivatives),
    /// exchange-driven kinds one per mirrored exchange, the others the bare
    /// channel. Subscribing `order_update` also follows `exchange_api` so a
    /// `reload_all_orders` action reloads the order store.
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        callbacks: Vec<Callback<MirrorState>>,
        deserialize: bool,
    ) -> Result<Vec<String>> {
        let keys = self.driving_keys(kind);
        let mut channels = self.subscribe_with(kind, keys.as_deref(), callbacks, deserialize)?;
        if kind == EventKind::OrderUpdate {
            let keys = self.driving_keys(EventKind::ExchangeApi);
            channels.extend(self.subscribe_with(
                EventKind::ExchangeApi,
                keys.as_deref(),
                Vec::new(),
                true,
            )?);
        }
        Ok(channels)
    }

    /// Subscribe `kind` on explicit routing keys
    pub fn subscribe_keys(
        &mut self,
        kind: EventKind,
        keys: &[RoutingKey],
        callbacks: Vec<Callback<MirrorState>>,
        deserialize: bool,
    ) -> Result<Vec<String>> {
        self.subscribe_with(kind, Some(keys), callbacks, deserialize)
    }

    /// Subscribe to every channel of `kind`, mirrored or not
    pub fn psubscribe(
        &mut self,
        kind: EventKind,
        callbacks: Vec<Callback<MirrorState>>,
        deserialize: bool,
    ) -> Result<String> {
        let hooked = self.with_hook(kind, callbacks);
        let deserialize = deserialize || mirror_hook(kind).is_some();
        Ok(self.dispatcher.psubscribe(kind, hooked, deserialize)?)
    }

    /// Mirror a new instrument (and its exchange, if new) at runtime and
    /// extend the existing keyed subscriptions to it.
    ///
    /// Kinds subscribed while no entity drove them have no keyed channel
    /// to copy and are not extended. Connector commands stay on the
    /// exchange they were subscribed for.
    pub fn add_instrument(&mut self, info: InstrumentInfo) -> Result<()> {
        let exchange_id = info.exchange_id();
        let new_exchange = self.state().exchange(exchange_id).is_none();
        if !self.state_mut().add_instrument(info.clone())? {
            return Ok(());
        }

        for registration in self.extendable_registrations() {
            let key: RoutingKey = match registration.kind.driver() {
                Driver::Instrument if targets(registration.kind, &info) => info.id.into(),
                Driver::Exchange if new_exchange => exchange_id.into(),
                _ => continue,
            };
            self.dispatcher.subscribe(
                registration.kind,
                Some(&[key]),
                registration.callbacks,
                registration.deserialize,
            )?;
        }
        Ok(())
    }

    /// Mirror a new exchange at runtime and extend the exchange-driven
    /// subscriptions to it
    pub fn add_exchange(&mut self, info: ExchangeInfo) -> Result<()> {
        let exchange_id = info.id;
        if !self.state_mut().add_exchange(info)? {
            return Ok(());
        }
        for registration in self.extendable_registrations() {
            if registration.kind.driver() != Driver::Exchange {
                continue;
            }
            self.dispatcher.subscribe(
                registration.kind,
                Some(&[exchange_id.into()]),
                registration.callbacks,
                registration.deserialize,
            )?;
        }
        Ok(())
    }

    /// Run `task` on the dispatch loop at every tick of `heartbeat`.
    ///
    /// The tick only posts the task; it runs between two messages, so it
    /// may touch the mirrors freely.
    pub fn add_heartbeat<F>(&mut self, heartbeat: Heartbeat, task: F) -> Result<()>
    where
        F: FnMut(&mut MirrorState) + Send + 'static,
    {
        let handle = self.dispatcher.handle();
        let task = Arc::new(Mutex::new(task));
        let name = heartbeat.name.clone();
        self.scheduler.add(heartbeat, move || {
            let task = Arc::clone(&task);
            let posted = handle.post(move |state| {
                let mut task = task.lock();
                (*task)(state)
            });
            if let Err(e) = posted {
                warn!("Heartbeat {} not posted: {}", name, e);
            }
        })?;
        Ok(())
    }

    /// Handle everything already queued, without blocking
    pub fn process_pending(&mut self) -> Result<usize> {
        Ok(self.dispatcher.process_pending()?)
    }

    /// Start the heartbeats and block on the dispatch loop until it is
    /// stopped or the transport fails. Heartbeats stop with the loop.
    pub fn run(&mut self) -> Result<()> {
        self.scheduler.start()?;
        let result = self.dispatcher.run();
        self.scheduler.shutdown();
        Ok(result?)
    }

    fn extendable_registrations(&self) -> Vec<KindRegistration<MirrorState>> {
        let mut registrations = self.dispatcher.keyed_registrations();
        registrations.retain(|r| r.kind.routing() != RoutingRule::ExchangeOnly);
        registrations
    }

    fn subscribe_with(
        &mut self,
        kind: EventKind,
        keys: Option<&[RoutingKey]>,
        callbacks: Vec<Callback<MirrorState>>,
        deserialize: bool,
    ) -> Result<Vec<String>> {
        let hooked = self.with_hook(kind, callbacks);
        let deserialize = deserialize || mirror_hook(kind).is_some();
        Ok(self.dispatcher.subscribe(kind, keys, hooked, deserialize)?)
    }

    /// Routing keys of the mirrored entities that drive `kind`; `None` for
    /// kinds published on their bare channel or on named keys
    fn driving_keys(&self, kind: EventKind) -> Option<Vec<RoutingKey>> {
        let state = self.state();
        match kind.driver() {
            Driver::Instrument => Some(
                state
                    .instruments()
                    .filter(|m| targets(kind, m.info()))
                    .map(|m| m.id().into())
                    .collect(),
            ),
            Driver::Exchange => Some(state.exchanges().map(|m| m.id().into()).collect()),
            Driver::Named | Driver::None => None,
        }
    }

    /// Prepend the mirror hook of `kind`. The same hook `Arc` is reused on
    /// every channel so re-subscribing never registers it twice.
    fn with_hook(
        &mut self,
        kind: EventKind,
        callbacks: Vec<Callback<MirrorState>>,
    ) -> Vec<Callback<MirrorState>> {
        let Some(hook) = mirror_hook(kind) else {
            return callbacks;
        };
        let hook = Arc::clone(self.hooks.entry(kind).or_insert_with(|| callback(hook)));
        std::iter::once(hook).chain(callbacks).collect()
    }
}
