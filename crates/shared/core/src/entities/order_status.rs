use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status, encoded on the wire by its upper-case name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created locally, not yet sent
    #[default]
    New,
    /// Accepted by the exchange and resting
    Open,
    /// Partially filled, still resting
    Partial,
    /// Cancel requested locally
    Cancel,
    /// Cancel acknowledged by the exchange
    Canceled,
    /// Exchange refused the cancel
    CancelRejected,
    /// Exchange refused the order
    Rejected,
    Filled,
    Closed,
    Expired,
    /// Local failure while handling the order
    Failed,
    /// Exchange acknowledged something we could not interpret
    Unknown,
}

impl OrderStatus {
    /// Terminal orders are never mutated again and leave the live caches
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Closed | OrderStatus::Filled
        )
    }

    /// Position in the lifecycle progression used to pick the most advanced
    /// of two differing statuses.
    pub fn progression(&self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Unknown => 1,
            OrderStatus::Open => 2,
            OrderStatus::Cancel => 3,
            OrderStatus::Partial => 4,
            OrderStatus::Canceled => 5,
            OrderStatus::CancelRejected => 6,
            OrderStatus::Rejected => 7,
            OrderStatus::Filled => 8,
            OrderStatus::Closed => 9,
            OrderStatus::Expired => 10,
            OrderStatus::Failed => 11,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Open => "OPEN",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Cancel => "CANCEL",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::CancelRejected => "CANCEL_REJECTED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Closed => "CLOSED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Closed.is_terminal());
        // expired and failed advance the progression but keep the order live
        assert!(!OrderStatus::Expired.is_terminal());
        assert!(!OrderStatus::Failed.is_terminal());
        assert!(!OrderStatus::CancelRejected.is_terminal());
    }

    #[test]
    fn test_progression_order() {
        let ordered = [
            OrderStatus::New,
            OrderStatus::Unknown,
            OrderStatus::Open,
            OrderStatus::Cancel,
            OrderStatus::Partial,
            OrderStatus::Canceled,
            OrderStatus::CancelRejected,
            OrderStatus::Rejected,
            OrderStatus::Filled,
            OrderStatus::Closed,
            OrderStatus::Expired,
            OrderStatus::Failed,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].progression() < pair[1].progression());
        }
    }

    #[test]
    fn test_wire_name() {
        let json = serde_json::to_string(&OrderStatus::CancelRejected).unwrap();
        assert_eq!(json, "\"CANCEL_REJECTED\"");
        assert_eq!(OrderStatus::CancelRejected.to_string(), "CANCEL_REJECTED");
        let back: OrderStatus = serde_json::from_str("\"PARTIAL\"").unwrap();
        assert_eq!(back, OrderStatus::Partial);
    }
}
