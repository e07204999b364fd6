use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AssetId, OrderStatus, Side};
use crate::values::{Price, Quantity, SequenceId, UserId};

/// Shared handle to an order.
///
/// The registry, an order book and a match result may all refer to the same
/// order while it is being matched, so orders are reference counted and only
/// their fill state is mutable.
pub type OrderRef = Arc<Order>;

#[derive(Debug, Clone, Copy)]
struct FillState {
    unfilled_quantity: Quantity,
    status: OrderStatus,
}

/// A limit order
///
/// Identity fields never change after creation. The unfilled quantity only
/// decreases, and the status moves from `Pending` towards a terminal state.
#[derive(Debug)]
pub struct Order {
    pub sequence_id: SequenceId,
    pub user_id: UserId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    state: Mutex<FillState>,
}

impl Order {
    /// Create a pending order with nothing filled
    pub fn new(
        sequence_id: SequenceId,
        user_id: UserId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            sequence_id,
            user_id,
            side,
            price,
            quantity,
            state: Mutex::new(FillState {
                unfilled_quantity: quantity,
                status: OrderStatus::Pending,
            }),
        }
    }

    /// Convenience constructor returning a shared handle
    pub fn new_ref(
        sequence_id: SequenceId,
        user_id: UserId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> OrderRef {
        Arc::new(Self::new(sequence_id, user_id, side, price, quantity))
    }

    /// Quantity still waiting to be matched
    pub fn unfilled_quantity(&self) -> Quantity {
        self.state.lock().unfilled_quantity
    }

    /// Quantity matched so far
    pub fn filled_quantity(&self) -> Quantity {
        self.quantity - self.unfilled_quantity()
    }

    pub fn status(&self) -> OrderStatus {
        self.state.lock().status
    }

    pub fn set_status(&self, status: OrderStatus) {
        self.state.lock().status = status;
    }

    /// Reduce the unfilled quantity by `quantity`, returning what is left
    pub fn fill(&self, quantity: Quantity) -> Quantity {
        let mut state = self.state.lock();
        debug_assert!(
            quantity <= state.unfilled_quantity,
            "fill of {} exceeds unfilled {} on order {}",
            quantity,
            state.unfilled_quantity,
            self.sequence_id
        );
        state.unfilled_quantity -= quantity;
        state.unfilled_quantity
    }

    /// Returns true if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.unfilled_quantity().is_zero()
    }

    /// Returns true while the order may rest in a book
    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Asset and amount this order keeps frozen for its unfilled quantity
    ///
    /// The buy amount never exceeds the order value checked when the order
    /// was accepted; it saturates rather than panics on an unchecked order.
    pub fn frozen_requirement(&self) -> (AssetId, Decimal) {
        let unfilled = self.unfilled_quantity();
        match self.side {
            Side::Buy => (AssetId::Fiat, self.price.saturating_mul(unfilled)),
            Side::Sell => (AssetId::Stock, unfilled),
        }
    }

    /// Point-in-time copy suitable for reporting
    pub fn snapshot(&self) -> OrderSnapshot {
        let state = *self.state.lock();
        OrderSnapshot {
            sequence_id: self.sequence_id,
            user_id: self.user_id,
            side: self.side,
            price: self.price,
            quantity: self.quantity,
            unfilled_quantity: state.unfilled_quantity,
            status: state.status,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = *self.state.lock();
        write!(
            f,
            "#{} user={} {} {}/{} @ {} ({:?})",
            self.sequence_id,
            self.user_id,
            self.side,
            state.unfilled_quantity,
            self.quantity,
            self.price,
            state.status
        )
    }
}

/// Immutable copy of an order's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub sequence_id: SequenceId,
    pub user_id: UserId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub unfilled_quantity: Quantity,
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_order_is_pending() {
        let order = Order::new(1, 1000, Side::Buy, dec!(2207.33), dec!(1.2));

        assert_eq!(order.unfilled_quantity(), dec!(1.2));
        assert_eq!(order.filled_quantity(), dec!(0));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.is_active());
    }

    #[test]
    fn test_fill_reduces_unfilled() {
        let order = Order::new(1, 1000, Side::Sell, dec!(100), dec!(5));

        assert_eq!(order.fill(dec!(2)), dec!(3));
        assert_eq!(order.filled_quantity(), dec!(2));
        assert!(!order.is_filled());

        assert_eq!(order.fill(dec!(3)), dec!(0));
        assert!(order.is_filled());
    }

    #[test]
    fn test_frozen_requirement() {
        let buy = Order::new(1, 1000, Side::Buy, dec!(2207.33), dec!(1.2));
        assert_eq!(buy.frozen_requirement(), (AssetId::Fiat, dec!(2648.796)));

        buy.fill(dec!(0.3));
        assert_eq!(buy.frozen_requirement(), (AssetId::Fiat, dec!(1986.597)));

        let sell = Order::new(2, 1001, Side::Sell, dec!(2215.6), dec!(0.8));
        assert_eq!(sell.frozen_requirement(), (AssetId::Stock, dec!(0.8)));
    }

    #[test]
    fn test_shared_handle_sees_mutation() {
        let order = Order::new_ref(7, 1000, Side::Buy, dec!(10), dec!(1));
        let other = Arc::clone(&order);

        order.fill(dec!(1));
        order.set_status(OrderStatus::FullyFilled);

        assert_eq!(other.status(), OrderStatus::FullyFilled);
        assert!(other.status().is_terminal());
    }

    #[test]
    fn test_snapshot() {
        let order = Order::new(3, 1002, Side::Sell, dec!(2221.1), dec!(0.3));
        let snapshot = order.snapshot();

        assert_eq!(snapshot.sequence_id, 3);
        assert_eq!(snapshot.unfilled_quantity, dec!(0.3));
        assert_eq!(snapshot.status, OrderStatus::Pending);
    }
}
