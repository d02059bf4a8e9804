//! In-process shared store
//!
//! Pub/sub and hashes with the semantics of the external store, for
//! single-process deployments and tests. Each subscription owns an
//! unbounded crossbeam channel; publishing fans a copy out to every
//! subscription whose channel set or pattern set matches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use concord_ports::{
    HashStore, InboundMessage, Publisher, SharedStore, StoreError, StoreResult, Subscription,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use dashmap::DashMap;
use parking_lot::RwLock;

struct Subscriber {
    id: u64,
    channels: HashSet<String>,
    patterns: HashSet<String>,
    tx: Sender<InboundMessage>,
}

#[derive(Default)]
struct Inner {
    hashes: DashMap<String, HashMap<String, String>>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Inner {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

/// Shared store living in this process. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close every connection.
    ///
    /// Blocked subscriptions wake up with `ConnectionClosed`; later calls fail
    /// the same way.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        // dropping the senders disconnects every receiver
        self.inner.subscribers.write().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Open a subscription with its concrete type
    pub fn open(&self) -> StoreResult<MemorySubscription> {
        self.inner.ensure_open()?;
        let (tx, rx) = unbounded();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push(Subscriber {
            id,
            channels: HashSet::new(),
            patterns: HashSet::new(),
            tx,
        });
        Ok(MemorySubscription {
            id,
            inner: Arc::clone(&self.inner),
            rx,
        })
    }
}

impl Publisher for MemoryStore {
    fn publish(&self, channel: &str, payload: &[u8]) -> StoreResult<usize> {
        self.inner.ensure_open()?;
        let subscribers = self.inner.subscribers.read();
        let mut delivered = 0;

        for sub in subscribers.iter() {
            if sub.channels.contains(channel) {
                let msg = InboundMessage {
                    channel: channel.to_string(),
                    pattern: None,
                    payload: payload.to_vec(),
                };
                if sub.tx.send(msg).is_ok() {
                    delivered += 1;
                }
            }
            for pattern in sub.patterns.iter().filter(|p| glob_match(p, channel)) {
                let msg = InboundMessage {
                    channel: channel.to_string(),
                    pattern: Some(pattern.clone()),
                    payload: payload.to_vec(),
                };
                if sub.tx.send(msg).is_ok() {
                    delivered += 1;
                }
            }
        }
        Ok(delivered)
    }
}

impl HashStore for MemoryStore {
    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.inner.ensure_open()?;
        self.inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.inner.ensure_open()?;
        Ok(self
            .inner
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned()))
    }

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.inner.ensure_open()?;
        Ok(self
            .inner
            .hashes
            .get(key)
            .map(|hash| hash.clone())
            .unwrap_or_default())
    }

    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        self.inner.ensure_open()?;
        let removed = match self.inner.hashes.get_mut(key) {
            Some(mut hash) => hash.remove(field).is_some(),
            None => false,
        };
        // an emptied hash disappears
        self.inner.hashes.remove_if(key, |_, hash| hash.is_empty());
        Ok(removed)
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        self.inner.ensure_open()?;
        Ok(self.inner.hashes.remove(key).is_some())
    }
}

impl SharedStore for MemoryStore {
    fn subscription(&self) -> StoreResult<Box<dyn Subscription>> {
        Ok(Box::new(self.open()?))
    }
}

/// Receiving connection on a [`MemoryStore`]
pub struct MemorySubscription {
    id: u64,
    inner: Arc<Inner>,
    rx: Receiver<InboundMessage>,
}

impl MemorySubscription {
    fn update(&self, f: impl FnOnce(&mut Subscriber)) -> StoreResult<()> {
        self.inner.ensure_open()?;
        let mut subscribers = self.inner.subscribers.write();
        let sub = subscribers
            .iter_mut()
            .find(|s| s.id == self.id)
            .ok_or(StoreError::ConnectionClosed)?;
        f(sub);
        Ok(())
    }
}

impl Subscription for MemorySubscription {
    fn subscribe(&mut self, channel: &str) -> StoreResult<()> {
        self.update(|sub| {
            sub.channels.insert(channel.to_string());
        })
    }

    fn psubscribe(&mut self, pattern: &str) -> StoreResult<()> {
        if pattern.is_empty() {
            return Err(StoreError::InvalidPattern(pattern.to_string()));
        }
        self.update(|sub| {
            sub.patterns.insert(pattern.to_string());
        })
    }

    fn next_message(&mut self, timeout: Duration) -> StoreResult<Option<InboundMessage>> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(RecvTimeoutError::Timeout) => self.inner.ensure_open().map(|_| None),
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::ConnectionClosed),
        }
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.inner.subscribers.write().retain(|s| s.id != self.id);
    }
}

/// Glob match supporting `*` (any run) and `?` (any single char)
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            // backtrack: let the last star swallow one more char
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
