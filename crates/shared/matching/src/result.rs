use bourse_core::{OrderRef, Price, Quantity};

/// A single fill between the taker and one resting order
#[derive(Debug, Clone)]
pub struct MatchRecord {
    /// The resting (passive) order
    pub maker: OrderRef,
    /// Execution price, always the maker's limit price
    pub price: Price,
    pub quantity: Quantity,
}

/// Outcome of submitting one taker order
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub taker: OrderRef,
    /// Fills in the order they were produced
    pub records: Vec<MatchRecord>,
}

impl MatchResult {
    pub fn new(taker: OrderRef) -> Self {
        Self {
            taker,
            records: Vec::new(),
        }
    }

    pub fn add(&mut self, maker: OrderRef, price: Price, quantity: Quantity) {
        self.records.push(MatchRecord {
            maker,
            price,
            quantity,
        });
    }

    /// Total quantity traded by the taker
    pub fn matched_quantity(&self) -> Quantity {
        self.records
            .iter()
            .map(|r| r.quantity)
            .fold(Quantity::ZERO, |a, b| a + b)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
