//! Dispatch engine
//!
//! [`Bus`] is the thread-safe publish side. [`Dispatcher`] owns one
//! receiving connection, the subscription tables and the process state `S`
//! that callbacks mutate. Its loop handles one message at a time: callbacks
//! never run concurrently, so `S` needs no locking. Work from other threads
//! (heartbeats) is posted back onto the loop through a [`DispatchHandle`].

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use concord_ports::{InboundMessage, SharedStore, Subscription};
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info, trace};

use crate::channels::{Channels, RoutingKey};
use crate::codec::{self, Event, Payload};
use crate::config::BusConfig;
use crate::error::{BusError, HandlerError};
use crate::events::EventKind;
use crate::transport::glob_match;

/// A delivered message as seen by callbacks
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: EventKind,
    pub channel: String,
    /// Pattern that matched, for pattern subscriptions
    pub pattern: Option<String>,
    pub raw: Vec<u8>,
    /// Decoded payload, when the subscription asked for it
    pub event: Option<Event>,
}

impl Message {
    /// Routing key part of the channel
    pub fn routing_key(&self) -> Option<&str> {
        self.channel
            .split_once(Channels::SEPARATOR)
            .map(|(_, key)| key)
    }

    pub fn event(&self) -> Result<&Event, HandlerError> {
        self.event
            .as_ref()
            .ok_or(HandlerError::MissingPayload(self.kind))
    }
}

/// Callback invoked by the dispatch loop.
///
/// Identity is the `Arc` allocation: registering the same `Arc` twice on a
/// channel is a no-op.
pub type Callback<S> = Arc<dyn Fn(&mut S, &Message) -> Result<(), HandlerError> + Send + Sync>;

pub fn callback<S, F>(f: F) -> Callback<S>
where
    F: Fn(&mut S, &Message) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_callback<S>(a: &Callback<S>, b: &Callback<S>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Publish side of the bus. Cheap to clone, safe to share across threads.
#[derive(Clone)]
pub struct Bus {
    store: Arc<dyn SharedStore>,
}

impl Bus {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn SharedStore {
        self.store.as_ref()
    }

    /// Publish on the channel derived from the payload's routing fields.
    /// Returns the channel used.
    pub fn publish<P: Payload + ?Sized>(
        &self,
        kind: EventKind,
        payload: &P,
    ) -> Result<String, BusError> {
        let value = codec::to_value(kind, payload)?;
        let key = codec::routing_key(kind, &value);
        let channel = Channels::channel(kind, key.as_deref());
        let bytes = codec::value_to_bytes(kind, &value)?;
        self.send(kind, channel, &bytes)
    }

    /// Publish on an explicit channel, bypassing routing
    pub fn publish_on<P: Payload + ?Sized>(
        &self,
        kind: EventKind,
        payload: &P,
        channel: &str,
    ) -> Result<String, BusError> {
        let bytes = codec::encode(kind, payload)?;
        self.send(kind, channel.to_string(), &bytes)
    }

    fn send(&self, kind: EventKind, channel: String, bytes: &[u8]) -> Result<String, BusError> {
        let receivers = self.store.publish(&channel, bytes)?;
        if kind.is_high_rate() {
            trace!("Published {} ({} receivers)", channel, receivers);
        } else {
            debug!("Published {} ({} receivers)", channel, receivers);
        }
        Ok(channel)
    }
}

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

struct Registration<S> {
    kind: EventKind,
    deserialize: bool,
    callbacks: Vec<Callback<S>>,
}

impl<S> Registration<S> {
    fn new(kind: EventKind, deserialize: bool) -> Self {
        Self {
            kind,
            deserialize,
            callbacks: Vec::new(),
        }
    }

    fn append(&mut self, callbacks: &[Callback<S>], deserialize: bool) {
        self.deserialize |= deserialize;
        for cb in callbacks {
            if !self.callbacks.iter().any(|c| same_callback(c, cb)) {
                self.callbacks.push(Arc::clone(cb));
            }
        }
    }
}

/// Callbacks registered for one kind on keyed channels
pub struct KindRegistration<S> {
    pub kind: EventKind,
    pub deserialize: bool,
    pub callbacks: Vec<Callback<S>>,
}

/// Handle for posting work onto a dispatch loop from another thread
pub struct DispatchHandle<S> {
    jobs: Sender<Job<S>>,
    stopped: Arc<AtomicBool>,
}

impl<S> Clone for DispatchHandle<S> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            stopped: Arc::clone(&self.stopped),
        }
    }
}

impl<S: 'static> DispatchHandle<S> {
    /// Run `f` on the dispatch thread, between two messages
    pub fn post<F>(&self, f: F) -> Result<(), BusError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if self.is_stopped() {
            return Err(BusError::Stopped);
        }
        self.jobs.send(Box::new(f)).map_err(|_| BusError::Stopped)
    }

    /// Ask the loop to return after the message in flight
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Subscription registry and sequential message loop
pub struct Dispatcher<S> {
    state: S,
    bus: Bus,
    subscription: Box<dyn Subscription>,
    exact: HashMap<String, Registration<S>>,
    patterns: HashMap<String, Registration<S>>,
    jobs_tx: Sender<Job<S>>,
    jobs_rx: Receiver<Job<S>>,
    stopped: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl<S: 'static> Dispatcher<S> {
    pub fn new(state: S, bus: Bus) -> Result<Self, BusError> {
        Self::with_config(state, bus, &BusConfig::default())
    }

    pub fn with_config(state: S, bus: Bus, config: &BusConfig) -> Result<Self, BusError> {
        let subscription = bus.store().subscription()?;
        let (jobs_tx, jobs_rx) = unbounded();
        Ok(Self {
            state,
            bus,
            subscription,
            exact: HashMap::new(),
            patterns: HashMap::new(),
            jobs_tx,
            jobs_rx,
            stopped: Arc::new(AtomicBool::new(false)),
            poll_interval: config.poll_interval(),
        })
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn handle(&self) -> DispatchHandle<S> {
        DispatchHandle {
            jobs: self.jobs_tx.clone(),
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Subscribe to `kind` on one channel per routing key, or on the bare
    /// base channel when `keys` is `None`. Returns the channels.
    ///
    /// Subscribing to an existing channel appends the callbacks that are not
    /// registered there yet.
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        keys: Option<&[RoutingKey]>,
        callbacks: Vec<Callback<S>>,
        deserialize: bool,
    ) -> Result<Vec<String>, BusError> {
        let channels: Vec<String> = match keys {
            Some(keys) => keys
                .iter()
                .map(|k| Channels::channel(kind, Some(k.as_str())))
                .collect(),
            None => vec![Channels::channel(kind, None)],
        };
        for channel in &channels {
            self.subscribe_channel(kind, channel, &callbacks, deserialize)?;
        }
        Ok(channels)
    }

    /// Subscribe `kind` on an explicit channel name
    pub fn subscribe_channel(
        &mut self,
        kind: EventKind,
        channel: &str,
        callbacks: &[Callback<S>],
        deserialize: bool,
    ) -> Result<(), BusError> {
        if !self.exact.contains_key(channel) {
            self.subscription.subscribe(channel)?;
            debug!("Subscribed {}", channel);
        }
        self.exact
            .entry(channel.to_string())
            .or_insert_with(|| Registration::new(kind, deserialize))
            .append(callbacks, deserialize);
        Ok(())
    }

    /// Subscribe to every channel of `kind` (`<base>*`). Returns the pattern.
    pub fn psubscribe(
        &mut self,
        kind: EventKind,
        callbacks: Vec<Callback<S>>,
        deserialize: bool,
    ) -> Result<String, BusError> {
        let pattern = Channels::pattern(kind);
        if !self.patterns.contains_key(&pattern) {
            self.subscription.psubscribe(&pattern)?;
            debug!("Pattern-subscribed {}", pattern);
        }
        self.patterns
            .entry(pattern.clone())
            .or_insert_with(|| Registration::new(kind, deserialize))
            .append(&callbacks, deserialize);
        Ok(pattern)
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.exact.contains_key(channel)
    }

    pub fn is_psubscribed(&self, kind: EventKind) -> bool {
        self.patterns.contains_key(&Channels::pattern(kind))
    }

    /// Number of callbacks on an exact channel
    pub fn callback_count(&self, channel: &str) -> usize {
        self.exact.get(channel).map_or(0, |r| r.callbacks.len())
    }

    /// Per kind, the union of callbacks registered on keyed channels.
    ///
    /// Used to extend existing subscriptions to a newly added entity.
    pub fn keyed_registrations(&self) -> Vec<KindRegistration<S>> {
        let mut by_kind: Vec<KindRegistration<S>> = Vec::new();
        for (channel, reg) in &self.exact {
            if !channel.contains(Channels::SEPARATOR) {
                continue;
            }
            let index = by_kind.iter().position(|k| k.kind == reg.kind);
            let index = index.unwrap_or_else(|| {
                by_kind.push(KindRegistration {
                    kind: reg.kind,
                    deserialize: false,
                    callbacks: Vec::new(),
                });
                by_kind.len() - 1
            });
            let entry = &mut by_kind[index];
            entry.deserialize |= reg.deserialize;
            for cb in &reg.callbacks {
                if !entry.callbacks.iter().any(|c| same_callback(c, cb)) {
                    entry.callbacks.push(Arc::clone(cb));
                }
            }
        }
        by_kind.sort_by_key(|k| k.kind);
        by_kind
    }

    /// Block handling messages until stopped or the transport fails.
    ///
    /// A transport error is returned to the caller; everything else is
    /// logged and the loop goes on.
    pub fn run(&mut self) -> Result<(), BusError> {
        info!(
            "Dispatch loop started: {} channels, {} patterns",
            self.exact.len(),
            self.patterns.len()
        );
        while !self.stopped.load(Ordering::Acquire) {
            self.run_jobs();
            match self.subscription.next_message(self.poll_interval) {
                Ok(Some(msg)) => self.dispatch(msg),
                Ok(None) => {}
                Err(e) => {
                    error!("Transport failed, leaving dispatch loop: {}", e);
                    return Err(BusError::Transport(e));
                }
            }
        }
        self.run_jobs();
        info!("Dispatch loop stopped");
        Ok(())
    }

    /// Handle everything already queued without blocking.
    /// Returns the number of messages and jobs handled.
    pub fn process_pending(&mut self) -> Result<usize, BusError> {
        let mut handled = self.run_jobs();
        while let Some(msg) = self.subscription.next_message(Duration::ZERO)? {
            self.dispatch(msg);
            handled += 1 + self.run_jobs();
        }
        Ok(handled)
    }

    fn run_jobs(&mut self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.jobs_rx.try_recv() {
            let state = &mut self.state;
            if catch_unwind(AssertUnwindSafe(|| job(state))).is_err() {
                error!("Posted job panicked");
            }
            count += 1;
        }
        count
    }

    fn registration(&self, msg: &InboundMessage) -> Option<&Registration<S>> {
        match &msg.pattern {
            Some(pattern) => self.patterns.get(pattern),
            None => self.exact.get(&msg.channel).or_else(|| {
                self.patterns
                    .iter()
                    .find(|(p, _)| glob_match(p, &msg.channel))
                    .map(|(_, reg)| reg)
            }),
        }
    }

    fn dispatch(&mut self, msg: InboundMessage) {
        let Some(reg) = self.registration(&msg) else {
            debug!("No handler for {}", msg.channel);
            return;
        };
        let kind = match Channels::parse(&msg.channel) {
            // `cancel_all_orders*` also matches `cancel_all_orders_instr:<id>`
            Some((k, _)) if k != reg.kind => {
                trace!("Skipping {} on the {} pattern", msg.channel, reg.kind);
                return;
            }
            Some((k, _)) => k,
            None => reg.kind,
        };
        let callbacks = reg.callbacks.clone();

        let event = if reg.deserialize {
            match codec::decode(kind, &msg.payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    error!("Dropping message on {}: {}", msg.channel, e);
                    return;
                }
            }
        } else {
            None
        };

        let message = Message {
            kind,
            channel: msg.channel,
            pattern: msg.pattern,
            raw: msg.payload,
            event,
        };
        if kind.is_high_rate() {
            trace!("Dispatching {} to {} callbacks", message.channel, callbacks.len());
        } else {
            debug!("Dispatching {} to {} callbacks", message.channel, callbacks.len());
        }

        for (i, cb) in callbacks.iter().enumerate() {
            let state = &mut self.state;
            match catch_unwind(AssertUnwindSafe(|| cb(state, &message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Callback #{} on {} failed: {}", i, message.channel, e),
                Err(_) => error!("Callback #{} on {} panicked", i, message.channel),
            }
        }
    }
}
