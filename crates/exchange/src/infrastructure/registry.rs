use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bourse_core::{Order, OrderRef, Price, Quantity, SequenceId, Side, UserId};
use dashmap::DashMap;
use log::{info, warn};

use super::ledger::AssetLedger;
use crate::error::{ExchangeError, Result};

/// Owner of the active order set and the global sequence counter
///
/// An order becomes active only after the funds it needs have been frozen.
#[derive(Debug)]
pub struct OrderRegistry {
    ledger: Arc<AssetLedger>,
    /// Last sequence id handed out; never reset
    sequence: AtomicU64,
    active: DashMap<SequenceId, OrderRef>,
}

impl OrderRegistry {
    pub fn new(ledger: Arc<AssetLedger>) -> Self {
        Self {
            ledger,
            sequence: AtomicU64::new(0),
            active: DashMap::new(),
        }
    }

    /// Freeze the order's funds, then create and register it
    pub fn create_order(
        &self,
        user_id: UserId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Result<OrderRef> {
        let asset = side.frozen_asset();
        let required = match side {
            Side::Buy => price
                .checked_mul(quantity)
                .ok_or(ExchangeError::InvalidQuantity(quantity))?,
            Side::Sell => quantity,
        };
        if !self.ledger.try_freeze(user_id, asset, required)? {
            warn!(
                "Rejected {} order from user {}: insufficient {} (required {})",
                side, user_id, asset, required
            );
            return Err(ExchangeError::InsufficientFunds {
                user_id,
                asset,
                required,
            });
        }

        let sequence_id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let order = Order::new_ref(sequence_id, user_id, side, price, quantity);
        self.active.insert(sequence_id, Arc::clone(&order));
        info!("Order created: {}", order);
        Ok(order)
    }

    /// Active order by sequence id
    pub fn get_order(&self, sequence_id: SequenceId) -> Option<OrderRef> {
        self.active.get(&sequence_id).map(|o| Arc::clone(o.value()))
    }

    /// Deregister an active order; removing an inactive id is a defect
    pub fn remove_order(&self, sequence_id: SequenceId) -> Result<OrderRef> {
        self.active
            .remove(&sequence_id)
            .map(|(_, order)| order)
            .ok_or_else(|| {
                ExchangeError::InvariantViolation(format!(
                    "order {} is not active and cannot be removed",
                    sequence_id
                ))
            })
    }

    /// All active orders, oldest first
    pub fn active_orders(&self) -> Vec<OrderRef> {
        let mut orders: Vec<OrderRef> = self
            .active
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        orders.sort_by_key(|o| o.sequence_id);
        orders
    }

    /// Active orders owned by one user, oldest first
    pub fn orders_of(&self, user_id: UserId) -> Vec<OrderRef> {
        let mut orders = self.active_orders();
        orders.retain(|o| o.user_id == user_id);
        orders
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Highest sequence id assigned so far, zero before the first order
    pub fn last_sequence_id(&self) -> SequenceId {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::{AssetBalance, AssetId, DEBT_ACCOUNT, OrderStatus, TransferMode};
    use rust_decimal_macros::dec;

    const ALICE: UserId = 1000;

    fn registry_with_fiat(amount: Quantity) -> (Arc<AssetLedger>, OrderRegistry) {
        let ledger = Arc::new(AssetLedger::new());
        ledger
            .try_transfer(
                TransferMode::AvailableToAvailable,
                DEBT_ACCOUNT,
                ALICE,
                AssetId::Fiat,
                amount,
                false,
            )
            .unwrap();
        let registry = OrderRegistry::new(Arc::clone(&ledger));
        (ledger, registry)
    }

    #[test]
    fn test_create_buy_freezes_notional() {
        let (ledger, registry) = registry_with_fiat(dec!(58000));

        let order = registry
            .create_order(ALICE, Side::Buy, dec!(2207.33), dec!(1.2))
            .unwrap();

        assert_eq!(order.sequence_id, 1);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(
            ledger.balance(ALICE, AssetId::Fiat),
            Some(AssetBalance::new(dec!(55351.204), dec!(2648.796)))
        );
        assert!(Arc::ptr_eq(&registry.get_order(1).unwrap(), &order));
    }

    #[test]
    fn test_insufficient_funds_creates_nothing() {
        let (ledger, registry) = registry_with_fiat(dec!(100));

        let err = registry
            .create_order(ALICE, Side::Buy, dec!(50.01), dec!(2))
            .unwrap_err();

        assert_eq!(
            err,
            ExchangeError::InsufficientFunds {
                user_id: ALICE,
                asset: AssetId::Fiat,
                required: dec!(100.02),
            }
        );
        assert!(registry.is_empty());
        assert_eq!(registry.last_sequence_id(), 0);
        assert_eq!(
            ledger.balance(ALICE, AssetId::Fiat),
            Some(AssetBalance::new(dec!(100), dec!(0)))
        );
    }

    #[test]
    fn test_sell_freezes_quantity() {
        let (ledger, registry) = registry_with_fiat(dec!(0));
        assert!(registry.create_order(ALICE, Side::Sell, dec!(10), dec!(1)).is_err());

        ledger
            .try_transfer(
                TransferMode::AvailableToAvailable,
                DEBT_ACCOUNT,
                ALICE,
                AssetId::Stock,
                dec!(5.5),
                false,
            )
            .unwrap();
        registry
            .create_order(ALICE, Side::Sell, dec!(10), dec!(0.8))
            .unwrap();

        assert_eq!(
            ledger.balance(ALICE, AssetId::Stock),
            Some(AssetBalance::new(dec!(4.7), dec!(0.8)))
        );
    }

    #[test]
    fn test_sequence_is_monotonic_and_never_reused() {
        let (_, registry) = registry_with_fiat(dec!(1000));

        let first = registry.create_order(ALICE, Side::Buy, dec!(1), dec!(1)).unwrap();
        let second = registry.create_order(ALICE, Side::Buy, dec!(1), dec!(1)).unwrap();
        registry.remove_order(second.sequence_id).unwrap();
        let third = registry.create_order(ALICE, Side::Buy, dec!(1), dec!(1)).unwrap();

        assert_eq!(
            (first.sequence_id, second.sequence_id, third.sequence_id),
            (1, 2, 3)
        );
        let active: Vec<SequenceId> = registry.active_orders().iter().map(|o| o.sequence_id).collect();
        assert_eq!(active, vec![1, 3]);
        assert_eq!(registry.orders_of(ALICE).len(), 2);
        assert!(registry.orders_of(ALICE + 1).is_empty());
    }

    #[test]
    fn test_double_remove_is_invariant_violation() {
        let (_, registry) = registry_with_fiat(dec!(10));
        let order = registry.create_order(ALICE, Side::Buy, dec!(1), dec!(1)).unwrap();

        registry.remove_order(order.sequence_id).unwrap();
        let err = registry.remove_order(order.sequence_id).unwrap_err();
        assert!(err.is_fatal());
        assert!(registry.get_order(order.sequence_id).is_none());
    }
}
