//! Exchange commands from the bus to a connector
//!
//! The bridge owns one [`ExchangeConnector`] and serves the commands
//! addressed to its exchange:
//!
//! ```text
//! order_exchange:<id>             -> place_order
//! cancel_order:<id>               -> cancel_order
//! cancel_all_orders               -> cancel_all_orders, every instrument
//! cancel_all_orders_exchange:<id> -> cancel_all_orders, every instrument
//! cancel_all_orders_instr:<id>    -> cancel_all_orders, one instrument
//! exchange_api:<id> reload_data   -> reload_data
//! ```
//!
//! Connector failures never escape: the order is marked and routed through
//! the order store so the whole fleet sees the outcome.

use std::sync::Arc;

use concord_bus::{Event, EventKind, Message, RoutingKey, callback};
use concord_core::{Currency, ExchangeApiPayload, ExchangeId, InstrumentId, Order, OrderStatus};
use concord_ports::{ConnectorError, ExchangeConnector};
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::error::Result;
use crate::hooks::payload;
use crate::manager::Manager;
use crate::state::MirrorState;

pub struct ConnectorBridge {
    exchange_id: ExchangeId,
    connector: Mutex<Box<dyn ExchangeConnector>>,
}

impl ConnectorBridge {
    pub fn new(connector: Box<dyn ExchangeConnector>) -> Arc<Self> {
        Arc::new(Self {
            exchange_id: connector.exchange_id(),
            connector: Mutex::new(connector),
        })
    }

    pub fn exchange_id(&self) -> ExchangeId {
        self.exchange_id
    }

    /// Subscribe the bridge to the commands of its exchange
    pub fn attach(self: &Arc<Self>, manager: &mut Manager) -> Result<()> {
        manager.get_exchange(self.exchange_id)?;
        let keys = [RoutingKey::from(self.exchange_id)];

        let bridge = Arc::clone(self);
        let on_place = callback(move |state: &mut MirrorState, msg: &Message| {
            let order = payload(msg, Event::as_order)?;
            bridge.place_order(state, order.clone())?;
            Ok(())
        });
        manager.subscribe_keys(EventKind::OrderExchange, &keys, vec![on_place], true)?;

        let bridge = Arc::clone(self);
        let on_cancel = callback(move |state: &mut MirrorState, msg: &Message| {
            let order = payload(msg, Event::as_order)?;
            bridge.cancel_order(state, order.clone())?;
            Ok(())
        });
        manager.subscribe_keys(EventKind::CancelOrder, &keys, vec![on_cancel], true)?;

        let bridge = Arc::clone(self);
        let on_cancel_all = callback(move |state: &mut MirrorState, _: &Message| {
            bridge.cancel_all_orders(state);
            Ok(())
        });
        manager.subscribe(EventKind::CancelAllOrders, vec![Arc::clone(&on_cancel_all)], false)?;
        manager.subscribe_keys(
            EventKind::CancelAllOrdersExchange,
            &keys,
            vec![on_cancel_all],
            false,
        )?;

        let bridge = Arc::clone(self);
        let on_cancel_instr = callback(move |_: &mut MirrorState, msg: &Message| {
            let target = payload(msg, Event::as_cancel_all_instrument)?;
            bridge.cancel_all_orders_instr(target.instr_id)?;
            Ok(())
        });
        manager.subscribe_keys(
            EventKind::CancelAllOrdersInstr,
            &keys,
            vec![on_cancel_instr],
            true,
        )?;

        let bridge = Arc::clone(self);
        let on_api = callback(move |state: &mut MirrorState, msg: &Message| {
            let api = payload(msg, Event::as_exchange_api)?;
            if api.is_reload_data() {
                bridge.reload_data(state)?;
            }
            Ok(())
        });
        manager.subscribe_keys(EventKind::ExchangeApi, &keys, vec![on_api], true)?;

        info!("Connector bridge attached to exchange {}", self.exchange_id);
        Ok(())
    }

    /// Send `order` to the exchange and publish the outcome.
    ///
    /// A refused placement becomes `REJECTED`, an acknowledgement that
    /// cannot be read `UNKNOWN`. Every outcome is also published on
    /// `db_add_order`.
    pub fn place_order(&self, state: &mut MirrorState, mut order: Order) -> Result<Order> {
        info!("Placing order {}", order);
        let placed = self.connector.lock().place_order(&order);
        match placed {
            Ok(ack) => {
                debug!("Order {} acknowledged as {}", order.id, ack.exchange_order_id);
                order.exchange_order_id = Some(ack.exchange_order_id);
                order.status = ack.status;
                order.time_ack_mkt = Some(ack.time);
                if order.time_open.is_none() && !ack.status.is_terminal() {
                    order.time_open = Some(ack.time);
                }
                if let Some(total_filled) = ack.total_filled {
                    order.total_filled = total_filled;
                }
            }
            Err(ConnectorError::UnparseableResponse(reason)) => {
                error!("Cannot parse acknowledgement of order {}: {}", order.id, reason);
                order.status = OrderStatus::Unknown;
            }
            Err(e) => {
                error!("Cannot send order {}: {}", order.id, e);
                order.status = OrderStatus::Rejected;
                order.time_rejected_mkt = Some(state.clock().now());
            }
        }

        let order = route(state, order)?;
        state.bus().publish(EventKind::DbAddOrder, &order)?;
        Ok(order)
    }

    /// Ask the exchange to cancel `order`. The exchange reports the
    /// cancellation itself; only a refusal is published here, as
    /// `CANCEL_REJECTED`.
    pub fn cancel_order(&self, state: &mut MirrorState, mut order: Order) -> Result<()> {
        info!("Cancelling order {}", order);
        let cancelled = self.connector.lock().cancel_order(&order);
        if let Err(e) = cancelled {
            warn!("Cancel of order {} refused: {}", order.id, e);
            order.status = OrderStatus::CancelRejected;
            order.time_rejected_mkt = Some(state.clock().now());
            route(state, order)?;
        }
        Ok(())
    }

    /// Cancel every open order on every mirrored instrument of the
    /// exchange. Failures are logged per instrument.
    pub fn cancel_all_orders(&self, state: &MirrorState) {
        info!("Cancelling all orders of exchange {}", self.exchange_id);
        for instrument in state.instruments_of(self.exchange_id) {
            if let Err(e) = self.cancel_all_orders_instr(instrument.id()) {
                error!("{}", e);
            }
        }
    }

    pub fn cancel_all_orders_instr(&self, instr_id: InstrumentId) -> Result<()> {
        info!("Cancelling all orders of instrument {}", instr_id);
        self.connector.lock().cancel_all_orders(instr_id)?;
        Ok(())
    }

    /// Refetch balances, positions and open orders from the exchange.
    ///
    /// Stale balances are cleared, the orders of the exchange are replaced
    /// by the open ones, then `reload_all_orders` tells every process to
    /// reload them.
    pub fn reload_data(&self, state: &mut MirrorState) -> Result<()> {
        info!("Loading exchange data of {}", self.exchange_id);
        let (balances, positions, open_orders) = {
            let mut connector = self.connector.lock();
            let balances = connector.fetch_balances();
            let positions = connector.fetch_positions();
            let open_orders = connector.fetch_open_orders();
            (balances, positions, open_orders)
        };
        let (balances, positions, open_orders) = (balances?, positions?, open_orders?);

        let exchange = state.get_exchange_mut(self.exchange_id)?;
        let held: Vec<Currency> = balances.iter().map(|b| b.currency.clone()).collect();
        for balance in balances {
            exchange.set_balance(balance)?;
        }
        exchange.clear_balances(&held)?;

        for position in positions {
            match state.instrument_mut(position.instr_id) {
                Some(instrument) => instrument.set_position(position)?,
                None => state.get_exchange_mut(self.exchange_id)?.set_position(position)?,
            }
        }

        if let Some(orders) = state.orders_mut() {
            orders.delete_exchange_orders(self.exchange_id)?;
        }
        info!("Loaded {} open orders", open_orders.len());
        for order in open_orders {
            route(state, order)?;
        }

        state.bus().publish(
            EventKind::ExchangeApi,
            &ExchangeApiPayload::reload_all_orders(self.exchange_id),
        )?;
        info!("Exchange data of {} loaded", self.exchange_id);
        Ok(())
    }
}

/// Store and republish through the order store when it keeps the order,
/// publish `order_update` directly otherwise
fn route(state: &mut MirrorState, order: Order) -> Result<Order> {
    let store = state
        .orders_mut()
        .filter(|o| o.manages(order.exchange_id, order.instr_id));
    if let Some(orders) = store {
        return Ok(orders.received_order(order)?);
    }
    state.bus().publish(EventKind::OrderUpdate, &order)?;
    Ok(order)
}
