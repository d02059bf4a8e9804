//! Order reconciliation
//!
//! Copies of one order arrive from many producers, duplicated and out of
//! order. `merge` picks the authoritative copy so that every process folding
//! the same set of copies, in any order, ends on the same order.
//!
//! ```text
//! 1. exactly one terminal          -> the terminal one
//! 2. both terminal                 -> earliest of the first shared timestamp
//!                                     (rejected, canceled, filled)
//! 3. both PARTIAL                  -> larger total_filled
//! 4. statuses differ               -> later in the lifecycle progression
//! 5. otherwise                     -> earlier creation time
//! ```
//!
//! A tie inside a rule falls through to the next one. Two copies equal on
//! every rule are ordered by their canonical encoding, which keeps the merge
//! commutative.

use std::cmp::Ordering;

use crate::entities::{Order, OrderStatus};
use crate::error::{DomainError, Result};

/// Return the authoritative copy of two copies of the same order.
///
/// Fails with [`DomainError::InvalidArgument`] when the ids differ.
pub fn merge(a: &Order, b: &Order) -> Result<Order> {
    if a.id != b.id {
        return Err(DomainError::InvalidArgument(format!(
            "cannot merge orders with different ids: {} vs {}",
            a.id, b.id
        )));
    }
    Ok(pick(a, b).clone())
}

/// Fold any number of copies of one order into the authoritative copy.
/// Returns `Ok(None)` for an empty input.
pub fn merge_all<'a, I>(copies: I) -> Result<Option<Order>>
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut merged: Option<Order> = None;
    for copy in copies {
        merged = Some(match merged {
            Some(current) => merge(&current, copy)?,
            None => copy.clone(),
        });
    }
    Ok(merged)
}

impl Order {
    /// See [`merge`]
    pub fn merge(&self, other: &Order) -> Result<Order> {
        merge(self, other)
    }
}

fn pick<'a>(a: &'a Order, b: &'a Order) -> &'a Order {
    match (a.is_terminal(), b.is_terminal()) {
        (true, false) => return a,
        (false, true) => return b,
        (true, true) => {
            if let Some(winner) = earliest_terminal(a, b) {
                return winner;
            }
        }
        (false, false) => {}
    }

    if a.status == OrderStatus::Partial
        && b.status == OrderStatus::Partial
        && a.total_filled != b.total_filled
    {
        return if a.total_filled > b.total_filled { a } else { b };
    }

    if a.status != b.status {
        return if a.status.progression() > b.status.progression() {
            a
        } else {
            b
        };
    }

    match a.time.cmp(&b.time) {
        Ordering::Less => a,
        Ordering::Greater => b,
        Ordering::Equal => canonical_min(a, b),
    }
}

/// Earliest terminal timestamp among the pairs both copies populate
fn earliest_terminal<'a>(a: &'a Order, b: &'a Order) -> Option<&'a Order> {
    let pairs = [
        (a.time_rejected_mkt, b.time_rejected_mkt),
        (a.time_canceled_mkt, b.time_canceled_mkt),
        (a.time_filled_mkt, b.time_filled_mkt),
    ];
    for pair in pairs {
        if let (Some(ta), Some(tb)) = pair {
            match ta.cmp(&tb) {
                Ordering::Less => return Some(a),
                Ordering::Greater => return Some(b),
                Ordering::Equal => continue,
            }
        }
    }
    None
}

fn canonical_min<'a>(a: &'a Order, b: &'a Order) -> &'a Order {
    let ea = serde_json::to_vec(a).unwrap_or_default();
    let eb = serde_json::to_vec(b).unwrap_or_default();
    if eb < ea { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::OrderType;
    use crate::values::{ExchangeId, InstrumentId, OrderId, Timestamp};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn order(status: OrderStatus) -> Order {
        let mut o = Order::new(
            InstrumentId::new(11),
            ExchangeId::new(2),
            OrderType::Limit,
            dec!(10),
            Some(dec!(25000)),
            t0(),
        )
        .with_status(status);
        o.id = OrderId::new("ord-1");
        o
    }

    fn partial(filled: Decimal) -> Order {
        order(OrderStatus::Partial).with_total_filled(filled)
    }

    fn filled_at(secs: i64) -> Order {
        let mut o = order(OrderStatus::Filled).with_total_filled(dec!(10));
        o.time_filled_mkt = Some(t0() + Duration::seconds(secs));
        o
    }

    fn canceled_at(secs: i64) -> Order {
        let mut o = order(OrderStatus::Canceled);
        o.time_canceled_mkt = Some(t0() + Duration::seconds(secs));
        o
    }

    fn sample_copies() -> Vec<Order> {
        let mut later_open = order(OrderStatus::Open);
        later_open.time = t0() + Duration::milliseconds(5);
        let mut unknown = order(OrderStatus::Unknown);
        unknown.exchange_order_id = Some("X-9".into());
        vec![
            order(OrderStatus::New),
            order(OrderStatus::Open),
            later_open,
            order(OrderStatus::Cancel),
            unknown,
            partial(dec!(1)),
            partial(dec!(3)),
            order(OrderStatus::CancelRejected),
            order(OrderStatus::Expired),
            order(OrderStatus::Failed),
            filled_at(3),
            filled_at(7),
            canceled_at(2),
            canceled_at(4),
            order(OrderStatus::Rejected),
            order(OrderStatus::Closed),
        ]
    }

    #[test]
    fn test_merge_rejects_different_ids() {
        let a = order(OrderStatus::Open);
        let mut b = order(OrderStatus::Open);
        b.id = OrderId::new("other");
        let err = merge(&a, &b).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn test_merge_is_commutative() {
        let copies = sample_copies();
        for a in &copies {
            for b in &copies {
                assert_eq!(merge(a, b).unwrap(), merge(b, a).unwrap(), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        for a in sample_copies() {
            assert_eq!(merge(&a, &a).unwrap(), a);
        }
    }

    #[test]
    fn test_terminal_dominates_live() {
        for live in [
            order(OrderStatus::New),
            order(OrderStatus::Open),
            partial(dec!(9)),
            order(OrderStatus::Expired),
            order(OrderStatus::Failed),
        ] {
            let terminal = filled_at(1);
            assert_eq!(merge(&live, &terminal).unwrap(), terminal);
            assert_eq!(merge(&terminal, &live).unwrap(), terminal);
        }
    }

    #[test]
    fn test_both_terminal_earliest_timestamp_wins() {
        let early = filled_at(3);
        let late = filled_at(7);
        assert_eq!(merge(&late, &early).unwrap(), early);

        let early_cancel = canceled_at(2);
        let late_cancel = canceled_at(4);
        assert_eq!(merge(&late_cancel, &early_cancel).unwrap(), early_cancel);
    }

    #[test]
    fn test_both_terminal_rejected_checked_before_filled() {
        let mut a = filled_at(1);
        a.time_rejected_mkt = Some(t0() + Duration::seconds(9));
        let mut b = filled_at(5);
        b.time_rejected_mkt = Some(t0() + Duration::seconds(6));
        assert_eq!(merge(&a, &b).unwrap(), b);
    }

    #[test]
    fn test_both_terminal_without_shared_timestamp_uses_progression() {
        // canceled copy has only time_canceled_mkt, filled only time_filled_mkt
        let canceled = canceled_at(1);
        let filled = filled_at(2);
        assert_eq!(merge(&canceled, &filled).unwrap(), filled);
        assert_eq!(merge(&filled, &canceled).unwrap(), filled);
    }

    #[test]
    fn test_partial_fill_is_monotonic() {
        let fills = [dec!(1), dec!(4), dec!(2), dec!(7), dec!(3)];
        let mut current = partial(fills[0]);
        let mut max = fills[0];
        for filled in &fills[1..] {
            current = merge(&current, &partial(*filled)).unwrap();
            max = max.max(*filled);
            assert_eq!(current.total_filled, max);
        }
    }

    #[test]
    fn test_later_status_wins_when_live() {
        let open = order(OrderStatus::Open);
        let cancel = order(OrderStatus::Cancel);
        assert_eq!(merge(&open, &cancel).unwrap().status, OrderStatus::Cancel);

        let p = partial(dec!(1));
        assert_eq!(merge(&cancel, &p).unwrap().status, OrderStatus::Partial);

        let new = order(OrderStatus::New);
        let unknown = order(OrderStatus::Unknown);
        assert_eq!(merge(&unknown, &new).unwrap().status, OrderStatus::Unknown);
    }

    #[test]
    fn test_same_status_earlier_creation_wins() {
        let first = order(OrderStatus::Open);
        let mut second = order(OrderStatus::Open);
        second.time = t0() + Duration::seconds(1);
        assert_eq!(merge(&second, &first).unwrap(), first);
    }

    #[test]
    fn test_fold_order_independence() {
        let f = filled_at(3);
        let o = order(OrderStatus::Open);
        let p = partial(dec!(3));
        let permutations = [
            [&f, &o, &p],
            [&f, &p, &o],
            [&o, &f, &p],
            [&o, &p, &f],
            [&p, &f, &o],
            [&p, &o, &f],
        ];
        for perm in permutations {
            let merged = merge_all(perm).unwrap().unwrap();
            assert_eq!(merged.status, OrderStatus::Filled);
            assert_eq!(merged.total_filled, dec!(10));
        }
    }

    #[test]
    fn test_fold_is_order_independent_over_samples() {
        let copies = sample_copies();
        let forward = merge_all(copies.iter()).unwrap();
        let backward = merge_all(copies.iter().rev()).unwrap();
        assert_eq!(forward, backward);
        // terminal copies share no timestamp with CLOSED, so progression decides
        assert_eq!(forward.unwrap().status, OrderStatus::Closed);
    }

    #[test]
    fn test_merge_all_empty() {
        let none: Vec<Order> = vec![];
        assert!(merge_all(none.iter()).unwrap().is_none());
    }
}
