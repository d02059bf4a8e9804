//! Mirror of one exchange: connectivity, balances and positions

use std::collections::BTreeMap;

use concord_bus::{Bus, EventKind, HashKeys, codec};
use concord_core::{
    Balance, ConnectionStatus, Currency, DomainError, ExchangeId, ExchangeInfo, ExchangeStatus,
    InstrumentId, Position,
};
use log::{debug, info};

use crate::error::Result;
use crate::fields::{decode_field, read_status, write_status};

/// Local view of an exchange, backed by the hash `exchange:<id>`.
///
/// `set_*` methods publish and persist; `apply_*` methods only update the
/// local copy with what another process already published.
#[derive(Clone)]
pub struct ExchangeMirror {
    info: ExchangeInfo,
    bus: Bus,
    hash_key: String,
    status: ExchangeStatus,
    balances: BTreeMap<Currency, Balance>,
    positions: BTreeMap<InstrumentId, Position>,
}

impl ExchangeMirror {
    /// Build the mirror and hydrate it from the shared store
    pub fn new(info: ExchangeInfo, bus: Bus) -> Result<Self> {
        let mut mirror = Self {
            hash_key: HashKeys::exchange(info.id),
            status: ExchangeStatus::new(info.id, ConnectionStatus::default()),
            info,
            bus,
            balances: BTreeMap::new(),
            positions: BTreeMap::new(),
        };
        mirror.refresh_all()?;
        Ok(mirror)
    }

    pub fn id(&self) -> ExchangeId {
        self.info.id
    }

    pub fn info(&self) -> &ExchangeInfo {
        &self.info
    }

    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status.status
    }

    pub fn balances(&self) -> &BTreeMap<Currency, Balance> {
        &self.balances
    }

    pub fn balance(&self, currency: &str) -> Option<&Balance> {
        self.balances.get(currency)
    }

    pub fn positions(&self) -> &BTreeMap<InstrumentId, Position> {
        &self.positions
    }

    pub fn position(&self, instr_id: InstrumentId) -> Option<&Position> {
        self.positions.get(&instr_id)
    }

    /// Replace the local state with the content of the shared hash
    pub fn refresh_all(&mut self) -> Result<()> {
        let fields = self.bus.store().hgetall(&self.hash_key)?;
        self.status.status = read_status(&self.hash_key, &fields);
        self.balances.clear();
        self.positions.clear();

        for (field, raw) in &fields {
            if HashKeys::is_balance_field(field) {
                let event = decode_field(&self.hash_key, field, EventKind::BalanceUpdate, raw);
                if let Some(balance) = event.as_ref().and_then(|e| e.as_balance()) {
                    self.balances.insert(balance.currency.clone(), balance.clone());
                }
            } else if HashKeys::is_position_field(field) {
                let event = decode_field(&self.hash_key, field, EventKind::PositionUpdate, raw);
                if let Some(position) = event.as_ref().and_then(|e| e.as_position()) {
                    self.positions.insert(position.instr_id, position.clone());
                }
            }
        }
        debug!(
            "Refreshed exchange {}: [{}] {} balances, {} positions",
            self.id(),
            self.status.status,
            self.balances.len(),
            self.positions.len()
        );
        Ok(())
    }

    /// Merge `update` channel by channel, persist the channels it carries
    /// and publish the combined status.
    pub fn set_status(&mut self, update: ConnectionStatus) -> Result<&ConnectionStatus> {
        let update = ExchangeStatus::new(self.id(), update);
        self.status.merge(&update)?;
        write_status(self.bus.store(), &self.hash_key, &update.status)?;
        self.bus.publish(EventKind::ExchangeStatus, &self.status)?;
        info!(
            "Exchange {} status [{}]",
            self.info.exchange_name, self.status.status
        );
        Ok(&self.status.status)
    }

    pub fn apply_status(&mut self, update: &ExchangeStatus) -> Result<()> {
        self.status.merge(update)?;
        Ok(())
    }

    pub fn set_balance(&mut self, balance: Balance) -> Result<()> {
        self.check_exchange(balance.exchange_id)?;
        self.bus.publish(EventKind::BalanceUpdate, &balance)?;
        let json = codec::encode_string(EventKind::BalanceUpdate, &balance)?;
        self.bus.store().hset(
            &self.hash_key,
            &HashKeys::balance_field(&balance.currency),
            &json,
        )?;
        self.balances.insert(balance.currency.clone(), balance);
        Ok(())
    }

    pub fn apply_balance(&mut self, balance: &Balance) -> Result<()> {
        self.check_exchange(balance.exchange_id)?;
        self.balances.insert(balance.currency.clone(), balance.clone());
        Ok(())
    }

    pub fn set_position(&mut self, position: Position) -> Result<()> {
        self.bus.publish(EventKind::PositionUpdate, &position)?;
        let json = codec::encode_string(EventKind::PositionUpdate, &position)?;
        self.bus.store().hset(
            &self.hash_key,
            &HashKeys::position_field(position.instr_id),
            &json,
        )?;
        self.positions.insert(position.instr_id, position);
        Ok(())
    }

    pub fn apply_position(&mut self, position: &Position) {
        self.positions.insert(position.instr_id, position.clone());
    }

    /// Zero every stored balance whose currency is not in `excludes`:
    /// publish the zeroed balance, then drop its field.
    ///
    /// Used after a reload so currencies the exchange no longer reports do
    /// not linger. Returns the number of balances cleared.
    pub fn clear_balances(&mut self, excludes: &[Currency]) -> Result<usize> {
        let fields = self.bus.store().hgetall(&self.hash_key)?;
        let mut cleared = 0;
        for (field, raw) in &fields {
            if !HashKeys::is_balance_field(field) {
                continue;
            }
            let event = decode_field(&self.hash_key, field, EventKind::BalanceUpdate, raw);
            let Some(mut balance) = event.as_ref().and_then(|e| e.as_balance()).cloned() else {
                continue;
            };
            if excludes.contains(&balance.currency) {
                continue;
            }
            balance.clear();
            self.bus.publish(EventKind::BalanceUpdate, &balance)?;
            self.bus.store().hdel(&self.hash_key, field)?;
            cleared += 1;
        }
        self.balances.retain(|currency, _| excludes.contains(currency));
        debug!("Cleared {} balances of exchange {}", cleared, self.id());
        Ok(cleared)
    }

    /// Same as [`clear_balances`](Self::clear_balances) for positions
    pub fn clear_positions(&mut self, excludes: &[InstrumentId]) -> Result<usize> {
        let fields = self.bus.store().hgetall(&self.hash_key)?;
        let mut cleared = 0;
        for (field, raw) in &fields {
            if !HashKeys::is_position_field(field) {
                continue;
            }
            let event = decode_field(&self.hash_key, field, EventKind::PositionUpdate, raw);
            let Some(mut position) = event.as_ref().and_then(|e| e.as_position()).cloned() else {
                continue;
            };
            if excludes.contains(&position.instr_id) {
                continue;
            }
            position.clear();
            self.bus.publish(EventKind::PositionUpdate, &position)?;
            self.bus.store().hdel(&self.hash_key, field)?;
            cleared += 1;
        }
        self.positions.retain(|instr_id, _| excludes.contains(instr_id));
        debug!("Cleared {} positions of exchange {}", cleared, self.id());
        Ok(cleared)
    }

    fn check_exchange(&self, exchange_id: ExchangeId) -> Result<()> {
        if exchange_id != self.id() {
            return Err(DomainError::InvalidArgument(format!(
                "exchange {} cannot hold state of exchange {}",
                self.id(),
                exchange_id
            ))
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExchangeMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeMirror")
            .field("info", &self.info)
            .field("status", &self.status)
            .field("balances", &self.balances)
            .field("positions", &self.positions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_bus::MemoryStore;
    use concord_core::ConnectivityStatus;
    use concord_ports::{HashStore, SharedStore, Subscription};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    fn mirror(store: &MemoryStore) -> ExchangeMirror {
        let bus = Bus::new(Arc::new(store.clone()));
        ExchangeMirror::new(ExchangeInfo::new(ExchangeId::new(1), "BINANCE", "binance"), bus).unwrap()
    }

    #[test]
    fn test_hydrates_from_hash() {
        let store = MemoryStore::new();
        store.hset("exchange:1", "status_api", "UP").unwrap();
        store
            .hset(
                "exchange:1",
                "balance:USDT",
                r#"{"exchange_id":"1","currency":"USDT","qty":"100","total_qty":"120"}"#,
            )
            .unwrap();
        store
            .hset("exchange:1", "position:7", r#"{"instr_id":"7","qty":"-2","price":"50"}"#)
            .unwrap();

        let mirror = mirror(&store);
        assert_eq!(mirror.status().api, Some(ConnectivityStatus::Up));
        assert_eq!(mirror.balance("USDT").unwrap().total_qty, dec!(120));
        assert_eq!(mirror.position(InstrumentId::new(7)).unwrap().qty, dec!(-2));
    }

    #[test]
    fn test_set_status_persists_update_and_publishes_combined() {
        let store = MemoryStore::new();
        store.hset("exchange:1", "status_private", "UP").unwrap();
        let mut sub = store.subscription().unwrap();
        sub.subscribe("exchange_status:1").unwrap();

        let mut mirror = mirror(&store);
        mirror
            .set_status(ConnectionStatus {
                api: Some(ConnectivityStatus::Down),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.hget("exchange:1", "status_api").unwrap().as_deref(), Some("DOWN"));
        let msg = sub.next_message(Duration::from_millis(100)).unwrap().unwrap();
        let published: ExchangeStatus = decode_status(&msg.payload);
        assert_eq!(published.status.api, Some(ConnectivityStatus::Down));
        assert_eq!(published.status.private, Some(ConnectivityStatus::Up));
    }

    fn decode_status(bytes: &[u8]) -> ExchangeStatus {
        codec::decode(EventKind::ExchangeStatus, bytes)
            .unwrap()
            .as_exchange_status()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_set_balance_rejects_other_exchange() {
        let store = MemoryStore::new();
        let mut mirror = mirror(&store);
        let err = mirror.set_balance(Balance::new(ExchangeId::new(2), "USDT", dec!(1)));
        assert!(err.is_err());
        assert!(mirror.balances().is_empty());
    }

    #[test]
    fn test_clear_balances_keeps_excluded() {
        let store = MemoryStore::new();
        let mut mirror = mirror(&store);
        mirror.set_balance(Balance::new(ExchangeId::new(1), "USDT", dec!(100))).unwrap();
        mirror.set_balance(Balance::new(ExchangeId::new(1), "BTC", dec!(2))).unwrap();

        let mut sub = store.subscription().unwrap();
        sub.subscribe("balance_update:1").unwrap();
        let cleared = mirror.clear_balances(&["USDT".to_string()]).unwrap();

        assert_eq!(cleared, 1);
        assert!(mirror.balance("BTC").is_none());
        assert!(mirror.balance("USDT").is_some());
        assert_eq!(store.hget("exchange:1", "balance:BTC").unwrap(), None);
        let msg = sub.next_message(Duration::from_millis(100)).unwrap().unwrap();
        let zeroed = codec::decode(EventKind::BalanceUpdate, &msg.payload).unwrap();
        assert!(zeroed.as_balance().unwrap().qty.is_zero());
    }

    #[test]
    fn test_clear_positions() {
        let store = MemoryStore::new();
        let mut mirror = mirror(&store);
        mirror.set_position(Position::flat(InstrumentId::new(3))).unwrap();
        mirror
            .set_position(Position {
                instr_id: InstrumentId::new(4),
                qty: dec!(1),
                price: dec!(10),
                liquidation_price: None,
            })
            .unwrap();

        assert_eq!(mirror.clear_positions(&[InstrumentId::new(4)]).unwrap(), 1);
        assert!(mirror.position(InstrumentId::new(3)).is_none());
        assert!(store.hget("exchange:1", "position:4").unwrap().is_some());
    }
}
