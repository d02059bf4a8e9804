//! Node configuration
//!
//! One JSON file per process: bus settings, what to mirror and which
//! event kinds to follow.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use concord_bus::{BusConfig, EventKind};
use concord_core::{ExchangeInfo, InstrumentInfo};
use concord_mirror::ManagerOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),
    #[error("Instrument {0} is listed twice")]
    DuplicateInstrument(String),
    #[error("Node mirrors no exchange and no instrument")]
    NothingMirrored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub bus: BusConfig,
    /// Exchanges mirrored without any of their instruments
    #[serde(default)]
    pub exchanges: Vec<ExchangeInfo>,
    #[serde(default)]
    pub instruments: Vec<InstrumentInfo>,
    /// Keep an order store for the mirrored instruments
    #[serde(default)]
    pub has_orders: bool,
    /// Follow exchange and instrument connectivity
    #[serde(default = "default_true")]
    pub has_status: bool,
    /// Base channel names to follow, e.g. "orderbook_update"
    #[serde(default)]
    pub subscribe: Vec<String>,
    /// Period of the order book snapshot written to the store
    #[serde(default)]
    pub snapshot_interval_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// Load node configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<NodeConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<NodeConfig, ConfigError> {
    let config: NodeConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<NodeConfig, ConfigError> {
    let default_config = include_str!("node_config.json");
    load_config_from_str(default_config)
}

impl NodeConfig {
    /// Resolve `subscribe` to event kinds
    pub fn event_kinds(&self) -> Result<Vec<EventKind>, ConfigError> {
        self.subscribe
            .iter()
            .map(|base| {
                EventKind::from_base(base).ok_or_else(|| ConfigError::UnknownEventKind(base.clone()))
            })
            .collect()
    }

    pub fn snapshot_interval(&self) -> Option<Duration> {
        self.snapshot_interval_ms.map(Duration::from_millis)
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            exchanges: self.exchanges.clone(),
            instruments: self.instruments.clone(),
            has_orders: self.has_orders,
            has_status: self.has_status,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.is_empty() && self.instruments.is_empty() {
            return Err(ConfigError::NothingMirrored);
        }
        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if !seen.insert(instrument.id) {
                return Err(ConfigError::DuplicateInstrument(instrument.id.to_string()));
            }
        }
        self.event_kinds()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{InstrumentId, InstrumentKind};

    #[test]
    fn test_load_default_config() {
        let config = load_default_config().unwrap();
        assert!(!config.instruments.is_empty());
        assert_eq!(config.bus.node_name, "concord-node");
    }

    #[test]
    fn test_defaults() {
        let config = load_config_from_str(
            r#"{"exchanges": [{"id": 1, "feed_name": "BINANCE", "exchange_name": "binance"}]}"#,
        )
        .unwrap();
        assert!(config.has_status);
        assert!(!config.has_orders);
        assert_eq!(config.bus, BusConfig::default());
        assert_eq!(config.snapshot_interval(), None);
        assert!(config.event_kinds().unwrap().is_empty());
    }

    #[test]
    fn test_event_kinds() {
        let config = load_default_config().unwrap();
        let kinds = config.event_kinds().unwrap();
        assert!(kinds.contains(&EventKind::OrderbookUpdate));

        let mut bad = config.clone();
        bad.subscribe.push("order_book".to_string());
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::UnknownEventKind(base)) if base == "order_book"
        ));
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(matches!(
            load_config_from_str("{}"),
            Err(ConfigError::NothingMirrored)
        ));

        let mut config = load_default_config().unwrap();
        let twin = config.instruments[0].clone();
        config.instruments.push(twin);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateInstrument(_))
        ));
    }

    #[test]
    fn test_manager_options() {
        let config = load_default_config().unwrap();
        let options = config.manager_options();
        assert_eq!(options.instruments.len(), config.instruments.len());
        assert_eq!(options.has_orders, config.has_orders);
        let perp = config
            .instruments
            .iter()
            .find(|i| i.id == InstrumentId::new(2))
            .unwrap();
        assert_eq!(perp.kind, InstrumentKind::Perpetual);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            load_config_from_str("{not json"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            load_config("/nonexistent/node.json"),
            Err(ConfigError::IoError(_))
        ));
    }
}
