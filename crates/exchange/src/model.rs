// Re-export domain types from bourse-core and bourse-matching
pub use bourse_core::{
    AssetBalance, AssetId, DEBT_ACCOUNT, FIRST_TRADER, MAX_SCALE, Order, OrderRef, OrderSnapshot,
    OrderStatus, Price, Quantity, SequenceId, Side, TransferMode, UserId,
};
pub use bourse_matching::{MatchRecord, MatchResult, PriceLevel};
