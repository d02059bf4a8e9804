use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Currency, ExchangeId, InstrumentId, Price, Quantity};

/// Net position held on an instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instr_id: InstrumentId,
    /// Signed quantity (positive=long, negative=short)
    #[serde(default)]
    pub qty: Quantity,
    /// Average entry price
    #[serde(default)]
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation_price: Option<Price>,
}

impl Position {
    /// Flat position on an instrument
    pub fn flat(instr_id: InstrumentId) -> Self {
        Self {
            instr_id,
            qty: Decimal::ZERO,
            price: Decimal::ZERO,
            liquidation_price: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.qty.is_zero()
    }

    /// Reset to flat, keeping the instrument
    pub fn clear(&mut self) {
        self.qty = Decimal::ZERO;
        self.price = Decimal::ZERO;
        self.liquidation_price = None;
    }
}

/// Balance of one currency on one exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub exchange_id: ExchangeId,
    pub currency: Currency,
    /// Available quantity
    #[serde(default)]
    pub qty: Quantity,
    /// Quantity including what is locked in orders
    #[serde(default)]
    pub total_qty: Quantity,
}

impl Balance {
    pub fn new(exchange_id: ExchangeId, currency: impl Into<Currency>, qty: Quantity) -> Self {
        Self {
            exchange_id,
            currency: currency.into(),
            qty,
            total_qty: qty,
        }
    }

    pub fn clear(&mut self) {
        self.qty = Decimal::ZERO;
        self.total_qty = Decimal::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flat_position() {
        let mut position = Position {
            instr_id: InstrumentId::new(3),
            qty: dec!(-4),
            price: dec!(20),
            liquidation_price: Some(dec!(30)),
        };
        assert!(!position.is_flat());
        position.clear();
        assert_eq!(position, Position::flat(InstrumentId::new(3)));
    }

    #[test]
    fn test_balance_clear() {
        let mut balance = Balance::new(ExchangeId::new(1), "USDT", dec!(1000));
        assert_eq!(balance.total_qty, dec!(1000));
        balance.clear();
        assert!(balance.qty.is_zero());
        assert!(balance.total_qty.is_zero());
    }
}
