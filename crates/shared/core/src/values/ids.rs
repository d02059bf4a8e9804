//! Identifiers shared across the fleet
//!
//! Numeric ids travel as strings on the wire (`"7"`) but decoding also
//! accepts plain JSON numbers, since older producers emit them that way.

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use uuid::Uuid;

struct NumericIdVisitor;

impl<'de> Visitor<'de> for NumericIdVisitor {
    type Value = u32;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a numeric identifier as a string or an integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
        u32::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u32, E> {
        u32::try_from(v).map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u32, E> {
        v.parse()
            .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn new(id: u32) -> Self {
                Self(id)
            }

            pub fn value(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(NumericIdVisitor).map(Self)
            }
        }
    };
}

numeric_id!(
    /// Exchange identifier, as registered in the instrument database
    ExchangeId
);

numeric_id!(
    /// Instrument identifier, unique across all exchanges
    InstrumentId
);

/// Order identifier
///
/// Orders originating from an exchange get a deterministic id built from the
/// exchange's own order id, so every process derives the same key for them.
/// Locally created orders get a random UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for a locally created order
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Deterministic id for an order first seen on an exchange:
    /// `<exchange_order_id>:<exchange_id>:<instr_id>`
    pub fn external(
        exchange_order_id: &str,
        exchange_id: ExchangeId,
        instr_id: InstrumentId,
    ) -> Self {
        Self(format!("{}:{}:{}", exchange_order_id, exchange_id, instr_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id_serializes_as_string() {
        let json = serde_json::to_string(&ExchangeId::new(7)).unwrap();
        assert_eq!(json, "\"7\"");
    }

    #[test]
    fn test_numeric_id_accepts_string_or_number() {
        let from_str: InstrumentId = serde_json::from_str("\"42\"").unwrap();
        let from_num: InstrumentId = serde_json::from_str("42").unwrap();
        assert_eq!(from_str, InstrumentId::new(42));
        assert_eq!(from_num, InstrumentId::new(42));
    }

    #[test]
    fn test_numeric_id_rejects_garbage() {
        assert!(serde_json::from_str::<ExchangeId>("\"binance\"").is_err());
        assert!(serde_json::from_str::<ExchangeId>("-1").is_err());
    }

    #[test]
    fn test_external_order_id() {
        let id = OrderId::external("abc123", ExchangeId::new(3), InstrumentId::new(17));
        assert_eq!(id.as_str(), "abc123:3:17");
    }

    #[test]
    fn test_random_order_ids_differ() {
        assert_ne!(OrderId::random(), OrderId::random());
    }
}
