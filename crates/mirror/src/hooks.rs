//! Internal hooks run ahead of user callbacks
//!
//! For every kind that carries mirrored state, the manager registers a hook
//! first on each channel so user callbacks see the mirrors already updated.

use concord_bus::{Event, EventKind, HandlerError, Message};
use concord_core::{InstrumentInfo, Order};
use log::{debug, info, trace};

use crate::error::Error;
use crate::state::MirrorState;

pub type Hook = fn(&mut MirrorState, &Message) -> Result<(), HandlerError>;

/// The hook that keeps the mirrors in sync with `kind`, if any
pub fn mirror_hook(kind: EventKind) -> Option<Hook> {
    let hook: Hook = match kind {
        EventKind::OrderbookUpdate => on_orderbook,
        EventKind::OrderUpdate | EventKind::OrderExchange => on_order,
        EventKind::TradeUpdate | EventKind::LiquidationUpdate => on_trade,
        EventKind::PositionUpdate => on_position,
        EventKind::BalanceUpdate => on_balance,
        EventKind::ExchangeStatus => on_exchange_status,
        EventKind::InstrStatus => on_instr_status,
        EventKind::FundingRateUpdate => on_funding_rate,
        EventKind::CandleUpdate => on_candle,
        EventKind::ExchangeApi => on_exchange_api,
        _ => return None,
    };
    Some(hook)
}

/// Whether an instrument-driven `kind` exists for `instrument` at all
pub fn targets(kind: EventKind, instrument: &InstrumentInfo) -> bool {
    match kind {
        EventKind::FundingRateUpdate => instrument.has_funding(),
        EventKind::LiquidationUpdate => instrument.has_liquidations(),
        _ => true,
    }
}

pub(crate) fn payload<'a, T>(
    msg: &'a Message,
    get: fn(&Event) -> Option<&T>,
) -> Result<&'a T, HandlerError> {
    get(msg.event()?).ok_or(HandlerError::MissingPayload(msg.kind))
}

fn on_orderbook(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let book = payload(msg, Event::as_orderbook)?;
    match state.instrument_mut(book.instr_id) {
        Some(instrument) => instrument.apply_orderbook(book)?,
        None => trace!("Order book of unmirrored instrument {}", book.instr_id),
    }
    Ok(())
}

fn on_order(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let order: &Order = payload(msg, Event::as_order)?;
    let Some(orders) = state.orders_mut() else {
        return Ok(());
    };
    if !orders.manages(order.exchange_id, order.instr_id) {
        debug!("Order {} is not on a managed instrument", order.id);
        return Ok(());
    }
    orders.handle_local(order.clone()).map_err(Error::from)?;
    Ok(())
}

fn on_trade(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let trade = payload(msg, Event::as_trade)?;
    match state.instrument_mut(trade.instr_id) {
        Some(instrument) => instrument.apply_trade(trade)?,
        None => trace!("Trade of unmirrored instrument {}", trade.instr_id),
    }
    Ok(())
}

fn on_position(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let position = payload(msg, Event::as_position)?;
    let Some(instrument) = state.instrument_mut(position.instr_id) else {
        debug!("Position of unmirrored instrument {}", position.instr_id);
        return Ok(());
    };
    instrument.apply_position(position)?;
    let exchange_id = instrument.exchange_id();
    if let Some(exchange) = state.exchange_mut(exchange_id) {
        exchange.apply_position(position);
    }
    Ok(())
}

fn on_balance(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let balance = payload(msg, Event::as_balance)?;
    match state.exchange_mut(balance.exchange_id) {
        Some(exchange) => exchange.apply_balance(balance)?,
        None => debug!("Balance of unmirrored exchange {}", balance.exchange_id),
    }
    Ok(())
}

fn on_exchange_status(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let status = payload(msg, Event::as_exchange_status)?;
    match state.exchange_mut(status.exchange_id) {
        Some(exchange) => exchange.apply_status(status)?,
        None => debug!("Status of unmirrored exchange {}", status.exchange_id),
    }
    Ok(())
}

fn on_instr_status(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let status = payload(msg, Event::as_instr_status)?;
    match state.instrument_mut(status.instr_id) {
        Some(instrument) => instrument.apply_status(status)?,
        None => debug!("Status of unmirrored instrument {}", status.instr_id),
    }
    Ok(())
}

fn on_funding_rate(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let rate = payload(msg, Event::as_funding)?;
    if let Some(instrument) = state.instrument_mut(rate.instr_id) {
        instrument.apply_funding_rate(rate)?;
    }
    Ok(())
}

fn on_candle(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let candle = payload(msg, Event::as_candle)?;
    if let Some(instrument) = state.instrument_mut(candle.instr_id) {
        instrument.apply_candle(candle)?;
    }
    Ok(())
}

fn on_exchange_api(state: &mut MirrorState, msg: &Message) -> Result<(), HandlerError> {
    let api = payload(msg, Event::as_exchange_api)?;
    if !api.is_reload_all_orders() {
        return Ok(());
    }
    if let Some(orders) = state.orders_mut() {
        let loaded = orders
            .reload_all_orders(Some(api.exchange_id))
            .map_err(Error::from)?;
        info!("Reloaded {} orders of exchange {}", loaded, api.exchange_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{ExchangeId, ExchangeInfo, InstrumentId, InstrumentKind};

    #[test]
    fn test_hook_table() {
        let with_hook: Vec<EventKind> = EventKind::ALL
            .into_iter()
            .filter(|k| mirror_hook(*k).is_some())
            .collect();
        assert_eq!(with_hook.len(), 12);
        assert!(mirror_hook(EventKind::CancelOrder).is_none());
        assert!(mirror_hook(EventKind::DbAddOrder).is_none());
        assert!(mirror_hook(EventKind::TriggerEvent).is_none());
    }

    #[test]
    fn test_targets() {
        let spot = InstrumentInfo::new(
            InstrumentId::new(1),
            ExchangeInfo::new(ExchangeId::new(1), "BINANCE", "binance"),
            "BTC-USDT",
            InstrumentKind::Spot,
        );
        assert!(!targets(EventKind::FundingRateUpdate, &spot));
        assert!(!targets(EventKind::LiquidationUpdate, &spot));
        assert!(targets(EventKind::OrderbookUpdate, &spot));
    }
}
