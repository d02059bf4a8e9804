use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side, derived from the sign of a quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
    /// Zero quantity
    Undefined,
}

impl Side {
    pub fn from_qty(qty: Decimal) -> Self {
        if qty > Decimal::ZERO {
            Side::Buy
        } else if qty < Decimal::ZERO {
            Side::Sell
        } else {
            Side::Undefined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_from_qty() {
        assert_eq!(Side::from_qty(dec!(1.5)), Side::Buy);
        assert_eq!(Side::from_qty(dec!(-0.1)), Side::Sell);
        assert_eq!(Side::from_qty(Decimal::ZERO), Side::Undefined);
    }
}
