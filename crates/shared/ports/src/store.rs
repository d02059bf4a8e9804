use std::collections::HashMap;
use std::time::Duration;

use crate::error::StoreResult;

/// A message delivered by a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel the message was published on
    pub channel: String,
    /// Pattern that matched, when delivered through a pattern subscription
    pub pattern: Option<String>,
    pub payload: Vec<u8>,
}

/// Publish side of the shared store.
///
/// Implementations must be safe to call from any thread.
pub trait Publisher: Send + Sync {
    /// Publish raw bytes on a channel, returning the number of receivers
    fn publish(&self, channel: &str, payload: &[u8]) -> StoreResult<usize>;
}

/// Hash side of the shared store: `key -> field -> value`
pub trait HashStore: Send + Sync {
    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Returns true if the field existed
    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool>;

    /// Returns true if the key existed
    fn del(&self, key: &str) -> StoreResult<bool>;
}

/// A receiving connection.
///
/// Delivery is at-least-once with no ordering across channels. A message
/// whose channel matches both an exact and a pattern subscription is
/// delivered once per match.
pub trait Subscription: Send {
    fn subscribe(&mut self, channel: &str) -> StoreResult<()>;

    /// Glob-style pattern (`*`, `?`)
    fn psubscribe(&mut self, pattern: &str) -> StoreResult<()>;

    /// Block up to `timeout` for the next message.
    ///
    /// `Ok(None)` on timeout; `Err(StoreError::ConnectionClosed)` once the
    /// store has been shut down.
    fn next_message(&mut self, timeout: Duration) -> StoreResult<Option<InboundMessage>>;
}

/// The full shared-store contract used by the bus
pub trait SharedStore: Publisher + HashStore {
    /// Open a new receiving connection
    fn subscription(&self) -> StoreResult<Box<dyn Subscription>>;
}
