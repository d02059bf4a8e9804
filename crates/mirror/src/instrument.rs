//! Mirror of one instrument: connectivity, position and market state

use chrono::{DateTime, Utc};
use concord_bus::{Bus, EventKind, HashKeys, codec};
use concord_core::{
    Candle, ConnectionStatus, ConnectivityStatus, DomainError, ExchangeId, FundingRate,
    InstrStatus, InstrumentId, InstrumentInfo, OrderBook, Position, Timestamp, Trade,
};
use log::{debug, info, warn};

use crate::error::Result;
use crate::fields::{decode_field, read_status, write_status};

/// Local view of an instrument, backed by the hash `instrument:<id>`.
///
/// Market data (`set_orderbook`, `set_last_trade`, `set_last_candle`) is
/// published only; [`save_snapshot`](Self::save_snapshot) writes the book
/// to the hash when a process wants late joiners to see it.
#[derive(Clone)]
pub struct InstrumentMirror {
    info: InstrumentInfo,
    bus: Bus,
    hash_key: String,
    status: InstrStatus,
    position: Position,
    orderbook: Option<OrderBook>,
    funding_rate: Option<FundingRate>,
    last_trade: Option<Trade>,
    last_liquidation: Option<Trade>,
    last_candle: Option<Candle>,
    timestamp: Option<Timestamp>,
}

impl InstrumentMirror {
    /// Build the mirror and hydrate it from the shared store
    pub fn new(info: InstrumentInfo, bus: Bus) -> Result<Self> {
        let mut mirror = Self {
            hash_key: HashKeys::instrument(info.id),
            status: InstrStatus::new(info.id, ConnectionStatus::default()),
            position: Position::flat(info.id),
            info,
            bus,
            orderbook: None,
            funding_rate: None,
            last_trade: None,
            last_liquidation: None,
            last_candle: None,
            timestamp: None,
        };
        mirror.refresh_all()?;
        Ok(mirror)
    }

    pub fn id(&self) -> InstrumentId {
        self.info.id
    }

    pub fn exchange_id(&self) -> ExchangeId {
        self.info.exchange_id()
    }

    pub fn info(&self) -> &InstrumentInfo {
        &self.info
    }

    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status.status
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn orderbook(&self) -> Option<&OrderBook> {
        self.orderbook.as_ref()
    }

    pub fn funding_rate(&self) -> Option<&FundingRate> {
        self.funding_rate.as_ref()
    }

    pub fn last_trade(&self) -> Option<&Trade> {
        self.last_trade.as_ref()
    }

    pub fn last_liquidation(&self) -> Option<&Trade> {
        self.last_liquidation.as_ref()
    }

    pub fn last_candle(&self) -> Option<&Candle> {
        self.last_candle.as_ref()
    }

    /// Time of the last snapshot written to the hash
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    /// Replace the local state with the content of the shared hash.
    ///
    /// Trades and candles are not stored and survive a refresh.
    pub fn refresh_all(&mut self) -> Result<()> {
        let fields = self.bus.store().hgetall(&self.hash_key)?;
        self.status.status = read_status(&self.hash_key, &fields);
        self.mask_funding();

        let key = &self.hash_key;
        self.position = fields
            .get(HashKeys::POSITION)
            .and_then(|raw| decode_field(key, HashKeys::POSITION, EventKind::PositionUpdate, raw))
            .and_then(|e| e.as_position().cloned())
            .unwrap_or_else(|| Position::flat(self.info.id));
        self.orderbook = fields
            .get(HashKeys::ORDERBOOK)
            .and_then(|raw| decode_field(key, HashKeys::ORDERBOOK, EventKind::OrderbookUpdate, raw))
            .and_then(|e| e.as_orderbook().cloned());
        self.funding_rate = fields
            .get(HashKeys::FUNDING)
            .and_then(|raw| decode_field(key, HashKeys::FUNDING, EventKind::FundingRateUpdate, raw))
            .and_then(|e| e.as_funding().cloned());
        self.timestamp = fields.get(HashKeys::TIMESTAMP).and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| warn!("Skipping timestamp {} in {}: {}", raw, key, e))
                .ok()
        });

        debug!(
            "Refreshed instrument {}: [{}] position {}",
            self.info, self.status.status, self.position.qty
        );
        Ok(())
    }

    /// Merge `update` channel by channel, persist the channels it carries
    /// and publish the combined status.
    ///
    /// Instruments without funding keep `funding = IGNORE`.
    pub fn set_status(&mut self, mut update: ConnectionStatus) -> Result<&ConnectionStatus> {
        if !self.info.has_funding() {
            update.funding = None;
        }
        let update = InstrStatus::new(self.id(), update);
        self.status.merge(&update)?;
        write_status(self.bus.store(), &self.hash_key, &update.status)?;
        self.bus.publish(EventKind::InstrStatus, &self.status)?;
        info!("Instrument {} status [{}]", self.info, self.status.status);
        Ok(&self.status.status)
    }

    pub fn apply_status(&mut self, update: &InstrStatus) -> Result<()> {
        self.status.merge(update)?;
        self.mask_funding();
        Ok(())
    }

    pub fn set_position(&mut self, position: Position) -> Result<()> {
        self.check_instrument(position.instr_id)?;
        self.bus.publish(EventKind::PositionUpdate, &position)?;
        let json = codec::encode_string(EventKind::PositionUpdate, &position)?;
        self.bus
            .store()
            .hset(&self.hash_key, HashKeys::POSITION, &json)?;
        self.position = position;
        Ok(())
    }

    pub fn apply_position(&mut self, position: &Position) -> Result<()> {
        self.check_instrument(position.instr_id)?;
        self.position = position.clone();
        Ok(())
    }

    pub fn set_funding_rate(&mut self, funding_rate: FundingRate) -> Result<()> {
        self.check_instrument(funding_rate.instr_id)?;
        self.bus.publish(EventKind::FundingRateUpdate, &funding_rate)?;
        let json = codec::encode_string(EventKind::FundingRateUpdate, &funding_rate)?;
        self.bus
            .store()
            .hset(&self.hash_key, HashKeys::FUNDING, &json)?;
        self.funding_rate = Some(funding_rate);
        Ok(())
    }

    pub fn apply_funding_rate(&mut self, funding_rate: &FundingRate) -> Result<()> {
        self.check_instrument(funding_rate.instr_id)?;
        self.funding_rate = Some(funding_rate.clone());
        Ok(())
    }

    pub fn set_orderbook(&mut self, orderbook: OrderBook) -> Result<()> {
        self.check_instrument(orderbook.instr_id)?;
        self.bus.publish(EventKind::OrderbookUpdate, &orderbook)?;
        self.orderbook = Some(orderbook);
        Ok(())
    }

    pub fn apply_orderbook(&mut self, orderbook: &OrderBook) -> Result<()> {
        self.check_instrument(orderbook.instr_id)?;
        self.orderbook = Some(orderbook.clone());
        Ok(())
    }

    /// Publish a trade, on `liquidation_update` when it is a liquidation
    pub fn set_last_trade(&mut self, trade: Trade) -> Result<()> {
        self.check_instrument(trade.instr_id)?;
        let kind = if trade.is_liquidation {
            EventKind::LiquidationUpdate
        } else {
            EventKind::TradeUpdate
        };
        self.bus.publish(kind, &trade)?;
        self.apply_trade(&trade)
    }

    pub fn apply_trade(&mut self, trade: &Trade) -> Result<()> {
        self.check_instrument(trade.instr_id)?;
        if trade.is_liquidation {
            self.last_liquidation = Some(trade.clone());
        } else {
            self.last_trade = Some(trade.clone());
        }
        Ok(())
    }

    pub fn set_last_candle(&mut self, candle: Candle) -> Result<()> {
        self.check_instrument(candle.instr_id)?;
        self.bus.publish(EventKind::CandleUpdate, &candle)?;
        self.last_candle = Some(candle);
        Ok(())
    }

    pub fn apply_candle(&mut self, candle: &Candle) -> Result<()> {
        self.check_instrument(candle.instr_id)?;
        self.last_candle = Some(candle.clone());
        Ok(())
    }

    /// Write the current order book and `now` to the hash
    pub fn save_snapshot(&mut self, now: Timestamp) -> Result<()> {
        let Some(orderbook) = &self.orderbook else {
            return Ok(());
        };
        let json = codec::encode_string(EventKind::OrderbookUpdate, orderbook)?;
        let store = self.bus.store();
        store.hset(&self.hash_key, HashKeys::ORDERBOOK, &json)?;
        store.hset(&self.hash_key, HashKeys::TIMESTAMP, &now.to_rfc3339())?;
        self.timestamp = Some(now);
        Ok(())
    }

    fn mask_funding(&mut self) {
        if !self.info.has_funding() {
            self.status.status.funding = Some(ConnectivityStatus::Ignore);
        }
    }

    fn check_instrument(&self, instr_id: InstrumentId) -> Result<()> {
        if instr_id != self.id() {
            return Err(DomainError::InvalidArgument(format!(
                "instrument {} cannot hold state of instrument {}",
                self.id(),
                instr_id
            ))
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for InstrumentMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentMirror")
            .field("info", &self.info)
            .field("status", &self.status)
            .field("position", &self.position)
            .field("orderbook", &self.orderbook)
            .field("funding_rate", &self.funding_rate)
            .finish_non_exhaustive()
    }
}
