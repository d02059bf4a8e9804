use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-process bus settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Name used in logs and thread names
    #[serde(default = "default_node_name")]
    pub node_name: String,
    /// How long the dispatch loop blocks before checking for posted work
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Minimum gap between two heartbeat invocations
    #[serde(default = "default_heartbeat_min_tick")]
    pub heartbeat_min_tick_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            node_name: default_node_name(),
            poll_interval_ms: default_poll_interval(),
            heartbeat_min_tick_ms: default_heartbeat_min_tick(),
        }
    }
}

impl BusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_min_tick(&self) -> Duration {
        Duration::from_millis(self.heartbeat_min_tick_ms)
    }
}

fn default_node_name() -> String {
    "concord".to_string()
}

fn default_poll_interval() -> u64 {
    50
}

fn default_heartbeat_min_tick() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: BusConfig = serde_json::from_str(r#"{"node_name": "connector-2"}"#).unwrap();
        assert_eq!(config.node_name, "connector-2");
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.heartbeat_min_tick(), Duration::from_millis(500));
    }
}
