//! Whole-engine consistency checks
//!
//! Each check reads the shared state and reports the first broken relation
//! as an [`ExchangeError::InvariantViolation`].

use std::collections::BTreeMap;
use std::sync::Arc;

use bourse_core::{AssetId, DEBT_ACCOUNT, Side, UserId};
use bourse_matching::{MatchingEngine, OrderBook};
use rust_decimal::Decimal;

use crate::error::{ExchangeError, Result};
use crate::infrastructure::{AssetLedger, OrderRegistry};

fn violation(message: String) -> ExchangeError {
    ExchangeError::InvariantViolation(message)
}

/// Run every check in turn
pub fn validate(
    ledger: &AssetLedger,
    registry: &OrderRegistry,
    matching: &MatchingEngine,
) -> Result<()> {
    check_balances(ledger)?;
    check_frozen_matches_orders(ledger, registry)?;
    check_book_matches_registry(registry, matching)?;
    check_uncrossed(matching.book(Side::Buy), matching.book(Side::Sell))?;
    Ok(())
}

/// Totals per asset sum to zero and no account has the wrong sign
pub fn check_balances(ledger: &AssetLedger) -> Result<()> {
    let mut totals: BTreeMap<AssetId, Decimal> = BTreeMap::new();

    for (user_id, asset, balance) in ledger.balances() {
        let total = totals.entry(asset).or_default();
        let sum = balance.checked_total().and_then(|t| t.checked_add(*total));
        *total = sum
            .ok_or_else(|| violation(format!("{} total overflows at user {}", asset, user_id)))?;

        if user_id == DEBT_ACCOUNT {
            if balance.available > Decimal::ZERO || !balance.frozen.is_zero() {
                return Err(violation(format!(
                    "liability account holds {} available / {} frozen {}",
                    balance.available, balance.frozen, asset
                )));
            }
        } else if balance.available < Decimal::ZERO || balance.frozen < Decimal::ZERO {
            return Err(violation(format!(
                "user {} has negative {}: {} available / {} frozen",
                user_id, asset, balance.available, balance.frozen
            )));
        }
    }

    for (asset, total) in totals {
        if !total.is_zero() {
            return Err(violation(format!("{} does not balance: total {}", asset, total)));
        }
    }
    Ok(())
}

/// Frozen funds are exactly what the active orders reserve
pub fn check_frozen_matches_orders(ledger: &AssetLedger, registry: &OrderRegistry) -> Result<()> {
    let mut expected: BTreeMap<(UserId, AssetId), Decimal> = BTreeMap::new();
    for order in registry.active_orders() {
        let (asset, amount) = order.frozen_requirement();
        let reserved = expected.entry((order.user_id, asset)).or_default();
        *reserved = reserved.checked_add(amount).ok_or_else(|| {
            violation(format!(
                "reservations of user {} overflow at order {}",
                order.user_id, order.sequence_id
            ))
        })?;
    }

    for (user_id, asset, balance) in ledger.balances() {
        let reserved = expected.remove(&(user_id, asset)).unwrap_or_default();
        if balance.frozen != reserved {
            return Err(violation(format!(
                "user {} has {} frozen {} but active orders reserve {}",
                user_id, balance.frozen, asset, reserved
            )));
        }
    }

    // Reservations left over belong to users with no balance record at all
    if let Some(((user_id, asset), reserved)) = expected.into_iter().find(|(_, r)| !r.is_zero()) {
        return Err(violation(format!(
            "user {} has no {} balance but active orders reserve {}",
            user_id, asset, reserved
        )));
    }
    Ok(())
}

/// The two books together hold exactly the active orders
pub fn check_book_matches_registry(
    registry: &OrderRegistry,
    matching: &MatchingEngine,
) -> Result<()> {
    for order in registry.active_orders() {
        if order.unfilled_quantity() <= Decimal::ZERO {
            return Err(violation(format!(
                "active order {} has nothing left to fill",
                order.sequence_id
            )));
        }
        if !order.is_active() {
            return Err(violation(format!(
                "registered order {} has terminal status {:?}",
                order.sequence_id,
                order.status()
            )));
        }
        if !matching.book(order.side).contains(&order) {
            return Err(violation(format!(
                "active order {} is missing from the {} book",
                order.sequence_id, order.side
            )));
        }
    }

    for side in [Side::Buy, Side::Sell] {
        for resting in matching.book(side).iter() {
            let registered = registry.get_order(resting.sequence_id);
            if !registered.is_some_and(|o| Arc::ptr_eq(&o, resting)) {
                return Err(violation(format!(
                    "order {} rests in the {} book but is not active",
                    resting.sequence_id, side
                )));
            }
        }
    }

    if matching.order_count() != registry.len() {
        return Err(violation(format!(
            "books hold {} orders, registry holds {}",
            matching.order_count(),
            registry.len()
        )));
    }
    Ok(())
}

/// Best bid stays strictly below best ask
pub fn check_uncrossed(bids: &OrderBook, asks: &OrderBook) -> Result<()> {
    if let (Some(bid), Some(ask)) = (bids.best_price(), asks.best_price()) {
        if bid >= ask {
            return Err(violation(format!("book is crossed: bid {} >= ask {}", bid, ask)));
        }
    }
    Ok(())
}
