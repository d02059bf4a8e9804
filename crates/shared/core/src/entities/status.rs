//! Connectivity status of exchanges and instruments
//!
//! Each status carries one value per feed channel. Updates are partial: only
//! the channels a producer knows about are set, and merging is
//! last-writer-wins per channel.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;
use crate::values::{ExchangeId, InstrumentId, Timestamp};

/// Connectivity value of a single feed channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectivityStatus {
    /// Channel does not apply (e.g. funding on a spot instrument)
    Ignore,
    Unknown,
    Undefined,
    Unavailable,
    Unreachable,
    Up,
    Down,
    Stop,
    Start,
    Ready,
    Starting,
    Stopping,
    Stopped,
    Started,
}

impl ConnectivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityStatus::Ignore => "IGNORE",
            ConnectivityStatus::Unknown => "UNKNOWN",
            ConnectivityStatus::Undefined => "UNDEFINED",
            ConnectivityStatus::Unavailable => "UNAVAILABLE",
            ConnectivityStatus::Unreachable => "UNREACHABLE",
            ConnectivityStatus::Up => "UP",
            ConnectivityStatus::Down => "DOWN",
            ConnectivityStatus::Stop => "STOP",
            ConnectivityStatus::Start => "START",
            ConnectivityStatus::Ready => "READY",
            ConnectivityStatus::Starting => "STARTING",
            ConnectivityStatus::Stopping => "STOPPING",
            ConnectivityStatus::Stopped => "STOPPED",
            ConnectivityStatus::Started => "STARTED",
        }
    }

    /// Parse the symbolic name stored in the shared store
    pub fn parse(name: &str) -> Option<Self> {
        let status = match name {
            "IGNORE" => ConnectivityStatus::Ignore,
            "UNKNOWN" => ConnectivityStatus::Unknown,
            "UNDEFINED" => ConnectivityStatus::Undefined,
            "UNAVAILABLE" => ConnectivityStatus::Unavailable,
            "UNREACHABLE" => ConnectivityStatus::Unreachable,
            "UP" => ConnectivityStatus::Up,
            "DOWN" => ConnectivityStatus::Down,
            "STOP" => ConnectivityStatus::Stop,
            "START" => ConnectivityStatus::Start,
            "READY" => ConnectivityStatus::Ready,
            "STARTING" => ConnectivityStatus::Starting,
            "STOPPING" => ConnectivityStatus::Stopping,
            "STOPPED" => ConnectivityStatus::Stopped,
            "STARTED" => ConnectivityStatus::Started,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feed channels tracked per exchange/instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedChannel {
    Api,
    Trades,
    L2Book,
    Funding,
    Private,
    Liquidations,
}

impl FeedChannel {
    pub const ALL: [FeedChannel; 6] = [
        FeedChannel::Api,
        FeedChannel::Trades,
        FeedChannel::L2Book,
        FeedChannel::Funding,
        FeedChannel::Private,
        FeedChannel::Liquidations,
    ];

    /// Hash field holding this channel's status
    pub fn field(&self) -> &'static str {
        match self {
            FeedChannel::Api => "status_api",
            FeedChannel::Trades => "status_trades",
            FeedChannel::L2Book => "status_l2_book",
            FeedChannel::Funding => "status_funding",
            FeedChannel::Private => "status_private",
            FeedChannel::Liquidations => "status_liquidations",
        }
    }
}

/// Per-channel connectivity, every channel optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ConnectivityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trades: Option<ConnectivityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2_book: Option<ConnectivityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding: Option<ConnectivityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<ConnectivityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidations: Option<ConnectivityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl ConnectionStatus {
    /// Every channel set to the same value
    pub fn all(status: ConnectivityStatus) -> Self {
        let mut s = Self::default();
        for channel in FeedChannel::ALL {
            s.set(channel, Some(status));
        }
        s
    }

    pub fn get(&self, channel: FeedChannel) -> Option<ConnectivityStatus> {
        match channel {
            FeedChannel::Api => self.api,
            FeedChannel::Trades => self.trades,
            FeedChannel::L2Book => self.l2_book,
            FeedChannel::Funding => self.funding,
            FeedChannel::Private => self.private,
            FeedChannel::Liquidations => self.liquidations,
        }
    }

    pub fn set(&mut self, channel: FeedChannel, value: Option<ConnectivityStatus>) {
        let slot = match channel {
            FeedChannel::Api => &mut self.api,
            FeedChannel::Trades => &mut self.trades,
            FeedChannel::L2Book => &mut self.l2_book,
            FeedChannel::Funding => &mut self.funding,
            FeedChannel::Private => &mut self.private,
            FeedChannel::Liquidations => &mut self.liquidations,
        };
        *slot = value;
    }

    /// Channels present in this (partial) status
    pub fn present(&self) -> impl Iterator<Item = (FeedChannel, ConnectivityStatus)> + '_ {
        FeedChannel::ALL
            .into_iter()
            .filter_map(|c| self.get(c).map(|v| (c, v)))
    }

    /// Last-writer-wins per channel: every channel present in `update`
    /// overwrites ours, absent channels are left alone.
    pub fn apply(&mut self, update: &ConnectionStatus) {
        for (channel, value) in update.present() {
            self.set(channel, Some(value));
        }
        if update.timestamp.is_some() {
            self.timestamp = update.timestamp;
        }
    }

    /// Ready for trading: api and private up, plus book or trades
    pub fn trading_up(&self) -> bool {
        let up = Some(ConnectivityStatus::Up);
        self.api == up && self.private == up && (self.l2_book == up || self.trades == up)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = FeedChannel::ALL
            .iter()
            .map(|c| self.get(*c).map(|s| s.as_str()).unwrap_or("_"))
            .collect();
        f.write_str(&parts.join(" "))
    }
}

/// Status of an exchange connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeStatus {
    pub exchange_id: ExchangeId,
    #[serde(flatten)]
    pub status: ConnectionStatus,
}

impl ExchangeStatus {
    pub fn new(exchange_id: ExchangeId, status: ConnectionStatus) -> Self {
        Self { exchange_id, status }
    }

    pub fn merge(&mut self, update: &ExchangeStatus) -> Result<(), DomainError> {
        if self.exchange_id != update.exchange_id {
            return Err(DomainError::InvalidArgument(format!(
                "cannot merge status of exchange {} into exchange {}",
                update.exchange_id, self.exchange_id
            )));
        }
        self.status.apply(&update.status);
        Ok(())
    }
}

/// Status of an instrument's feeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrStatus {
    pub instr_id: InstrumentId,
    #[serde(flatten)]
    pub status: ConnectionStatus,
}

impl InstrStatus {
    pub fn new(instr_id: InstrumentId, status: ConnectionStatus) -> Self {
        Self { instr_id, status }
    }

    pub fn merge(&mut self, update: &InstrStatus) -> Result<(), DomainError> {
        if self.instr_id != update.instr_id {
            return Err(DomainError::InvalidArgument(format!(
                "cannot merge status of instrument {} into instrument {}",
                update.instr_id, self.instr_id
            )));
        }
        self.status.apply(&update.status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_is_last_writer_wins_per_channel() {
        let mut current = ConnectionStatus::all(ConnectivityStatus::Down);
        let update = ConnectionStatus {
            api: Some(ConnectivityStatus::Up),
            ..Default::default()
        };
        current.apply(&update);
        assert_eq!(current.api, Some(ConnectivityStatus::Up));
        assert_eq!(current.trades, Some(ConnectivityStatus::Down));
    }

    #[test]
    fn test_trading_up() {
        let mut status = ConnectionStatus {
            api: Some(ConnectivityStatus::Up),
            private: Some(ConnectivityStatus::Up),
            ..Default::default()
        };
        assert!(!status.trading_up());
        status.trades = Some(ConnectivityStatus::Up);
        assert!(status.trading_up());
    }

    #[test]
    fn test_merge_rejects_other_exchange() {
        let mut a = ExchangeStatus::new(ExchangeId::new(1), ConnectionStatus::default());
        let b = ExchangeStatus::new(ExchangeId::new(2), ConnectionStatus::all(ConnectivityStatus::Up));
        assert!(a.merge(&b).is_err());
        assert_eq!(a.status.api, None);
    }

    #[test]
    fn test_status_wire_format() {
        let status = InstrStatus::new(
            InstrumentId::new(4),
            ConnectionStatus {
                api: Some(ConnectivityStatus::Unavailable),
                ..Default::default()
            },
        );
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"instr_id":"4","api":"UNAVAILABLE"}"#);
        let back: InstrStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_parse_roundtrips_names() {
        for name in ["UP", "DOWN", "IGNORE", "UNAVAILABLE"] {
            assert_eq!(ConnectivityStatus::parse(name).unwrap().as_str(), name);
        }
        assert!(ConnectivityStatus::parse("sideways").is_none());
    }
}
