//! Bourse Matching
//!
//! Price-time priority order book and matching engine for a single instrument.

mod error;
mod order_book;
mod price_time;
mod result;

pub use error::{MatchingError, MatchingResult};
pub use order_book::{OrderBook, PriceLevel};
pub use price_time::MatchingEngine;
pub use result::{MatchRecord, MatchResult};
