use std::sync::Arc;

use bourse_core::{OrderRef, OrderStatus, Price, Side};
use log::debug;

use crate::error::{MatchingError, MatchingResult};
use crate::order_book::OrderBook;
use crate::result::MatchResult;

/// Standard price-time priority matching engine (FIFO)
///
/// Orders are matched based on:
/// 1. Best price (highest bid, lowest ask)
/// 2. Time priority (lowest sequence id at the same price)
///
/// Trades execute at the resting order's price.
#[derive(Debug)]
pub struct MatchingEngine {
    bids: OrderBook,
    asks: OrderBook,
    last_price: Price,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            bids: OrderBook::new(Side::Buy),
            asks: OrderBook::new(Side::Sell),
            last_price: Price::ZERO,
        }
    }

    /// Match a taker order against the opposite book, resting any remainder
    ///
    /// An order whose key already rests on its own side is refused before
    /// it can trade.
    pub fn submit(&mut self, taker: OrderRef) -> MatchingResult<MatchResult> {
        let (maker_book, own_book) = match taker.side {
            Side::Buy => (&mut self.asks, &mut self.bids),
            Side::Sell => (&mut self.bids, &mut self.asks),
        };
        if own_book.contains_key(&taker) {
            return Err(MatchingError::DuplicateOrder(taker.sequence_id));
        }
        let mut result = MatchResult::new(Arc::clone(&taker));

        loop {
            let Some(maker) = maker_book.peek_best().cloned() else {
                break;
            };

            let crosses = match taker.side {
                Side::Buy => taker.price >= maker.price,
                Side::Sell => taker.price <= maker.price,
            };
            if !crosses {
                break;
            }

            // Resting order sets the price
            self.last_price = maker.price;
            let matched = taker.unfilled_quantity().min(maker.unfilled_quantity());
            result.add(Arc::clone(&maker), maker.price, matched);
            debug!(
                "Trade: taker=#{} maker=#{} price={} qty={}",
                taker.sequence_id, maker.sequence_id, maker.price, matched
            );

            let taker_left = taker.fill(matched);
            let maker_left = maker.fill(matched);

            if maker_left.is_zero() {
                maker.set_status(OrderStatus::FullyFilled);
                maker_book.remove(&maker);
            } else {
                maker.set_status(OrderStatus::PartiallyFilled);
            }

            if taker_left.is_zero() {
                taker.set_status(OrderStatus::FullyFilled);
                break;
            }
        }

        let unfilled = taker.unfilled_quantity();
        if !unfilled.is_zero() {
            if unfilled < taker.quantity {
                taker.set_status(OrderStatus::PartiallyFilled);
            }
            let sequence_id = taker.sequence_id;
            if !own_book.insert(taker) {
                return Err(MatchingError::DuplicateOrder(sequence_id));
            }
        }

        Ok(result)
    }

    /// Remove a resting order from its book and mark it cancelled
    pub fn cancel(&mut self, order: &OrderRef) -> MatchingResult<()> {
        let book = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if !book.remove(order) {
            return Err(MatchingError::OrderNotInBook(order.sequence_id));
        }
        order.set_status(OrderStatus::Cancelled);
        Ok(())
    }

    /// Book holding resting orders of `side`
    pub fn book(&self, side: Side) -> &OrderBook {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Price of the most recent trade, zero before the first one
    pub fn last_price(&self) -> Price {
        self.last_price
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Spread between best ask and best bid
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Number of resting orders on both sides
    pub fn order_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}
