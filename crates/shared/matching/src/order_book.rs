use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use bourse_core::{Order, OrderRef, Price, Quantity, SequenceId, Side};
use log::debug;
use serde::{Deserialize, Serialize};

/// Priority key for BTreeMap ordering
///
/// Bids: higher price first, asks: lower price first. Ties at the same price
/// go to the lower sequence id (earlier arrival).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BookKey {
    price: Price,
    sequence_id: SequenceId,
    is_bid: bool,
}

impl BookKey {
    fn of(order: &Order) -> Self {
        BookKey {
            price: order.price,
            sequence_id: order.sequence_id,
            is_bid: order.side == Side::Buy,
        }
    }
}

impl Ord for BookKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_price = if self.is_bid {
            // Bids: higher price first (reverse order)
            other.price.cmp(&self.price)
        } else {
            // Asks: lower price first (natural order)
            self.price.cmp(&other.price)
        };
        by_price.then(self.sequence_id.cmp(&other.sequence_id))
    }
}

impl PartialOrd for BookKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Aggregated resting quantity at one price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: usize,
}

/// One side of the order book, ordered by price-time priority
///
/// Orders are located by the key derived from their immutable price and
/// sequence id, so an order whose unfilled quantity changed while resting is
/// still found and removed by identity.
#[derive(Debug)]
pub struct OrderBook {
    side: Side,
    orders: BTreeMap<BookKey, OrderRef>,
}

impl OrderBook {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            orders: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Highest priority resting order
    pub fn peek_best(&self) -> Option<&OrderRef> {
        self.orders.first_key_value().map(|(_, order)| order)
    }

    /// Best price on this side
    pub fn best_price(&self) -> Option<Price> {
        self.peek_best().map(|order| order.price)
    }

    /// Add an order; returns false if an order with the same key already rests
    pub fn insert(&mut self, order: OrderRef) -> bool {
        debug_assert_eq!(order.side, self.side, "order {} on wrong book", order);
        let key = BookKey::of(&order);
        if self.orders.contains_key(&key) {
            return false;
        }
        debug!("{:?} book: insert {}", self.side, order);
        self.orders.insert(key, order);
        true
    }

    /// Remove an order by identity; returns whether it was present
    pub fn remove(&mut self, order: &Order) -> bool {
        let removed = self.orders.remove(&BookKey::of(order)).is_some();
        if removed {
            debug!("{:?} book: remove #{}", self.side, order.sequence_id);
        }
        removed
    }

    /// Returns true if an order with the same price and sequence id rests
    pub fn contains_key(&self, order: &Order) -> bool {
        self.orders.contains_key(&BookKey::of(order))
    }

    /// Returns true if this exact order rests in the book
    pub fn contains(&self, order: &OrderRef) -> bool {
        self.orders
            .get(&BookKey::of(order))
            .is_some_and(|resting| Arc::ptr_eq(resting, order))
    }

    /// Resting orders in priority order
    pub fn iter(&self) -> impl Iterator<Item = &OrderRef> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Top `limit` price levels, best first
    pub fn depth(&self, limit: usize) -> Vec<PriceLevel> {
        let mut levels: Vec<PriceLevel> = Vec::new();
        for order in self.orders.values() {
            let unfilled = order.unfilled_quantity();
            match levels.last_mut() {
                Some(level) if level.price == order.price => {
                    level.quantity += unfilled;
                    level.order_count += 1;
                }
                _ => {
                    if levels.len() == limit {
                        break;
                    }
                    levels.push(PriceLevel {
                        price: order.price,
                        quantity: unfilled,
                        order_count: 1,
                    });
                }
            }
        }
        levels
    }
}
