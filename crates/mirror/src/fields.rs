//! Fields of the `exchange:<id>` and `instrument:<id>` hashes

use std::collections::HashMap;

use concord_bus::{Event, EventKind, codec};
use concord_core::{ConnectionStatus, ConnectivityStatus, FeedChannel};
use concord_ports::{HashStore, StoreResult};
use log::warn;

/// Decode a JSON field written by a mirror. Garbage is logged and skipped.
pub fn decode_field(key: &str, field: &str, kind: EventKind, raw: &str) -> Option<Event> {
    match codec::decode(kind, raw.as_bytes()) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping unreadable {} in {}: {}", field, key, e);
            None
        }
    }
}

/// Read the `status_*` fields of an entity hash. Unknown values are skipped.
pub fn read_status(key: &str, fields: &HashMap<String, String>) -> ConnectionStatus {
    let mut status = ConnectionStatus::default();
    for channel in FeedChannel::ALL {
        let Some(raw) = fields.get(channel.field()) else {
            continue;
        };
        match ConnectivityStatus::parse(raw) {
            Some(value) => status.set(channel, Some(value)),
            None => warn!("Ignoring status {}={} in {}", channel.field(), raw, key),
        }
    }
    status
}

/// Write the channels present in `update`, leave the others untouched
pub fn write_status(store: &dyn HashStore, key: &str, update: &ConnectionStatus) -> StoreResult<()> {
    for (channel, value) in update.present() {
        store.hset(key, channel.field(), value.as_str())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_bus::MemoryStore;

    #[test]
    fn test_write_then_read_only_touches_present_channels() {
        let store = MemoryStore::new();
        store.hset("exchange:1", "status_trades", "DOWN").unwrap();

        let update = ConnectionStatus {
            api: Some(ConnectivityStatus::Up),
            ..Default::default()
        };
        write_status(&store, "exchange:1", &update).unwrap();

        let status = read_status("exchange:1", &store.hgetall("exchange:1").unwrap());
        assert_eq!(status.api, Some(ConnectivityStatus::Up));
        assert_eq!(status.trades, Some(ConnectivityStatus::Down));
        assert_eq!(status.private, None);
    }

    #[test]
    fn test_read_skips_unknown_values() {
        let mut fields = HashMap::new();
        fields.insert("status_api".to_string(), "SIDEWAYS".to_string());
        fields.insert("status_private".to_string(), "UP".to_string());
        let status = read_status("exchange:1", &fields);
        assert_eq!(status.api, None);
        assert_eq!(status.private, Some(ConnectivityStatus::Up));
    }

    #[test]
    fn test_decode_field_rejects_wrong_schema() {
        assert!(decode_field("exchange:1", "balance:USDT", EventKind::BalanceUpdate, "[1]").is_none());
        let event = decode_field(
            "exchange:1",
            "balance:USDT",
            EventKind::BalanceUpdate,
            r#"{"exchange_id":"1","currency":"USDT","qty":"5","total_qty":"5"}"#,
        )
        .unwrap();
        assert_eq!(event.as_balance().unwrap().currency, "USDT");
    }
}
