mod clearing;
mod engine;
pub mod validation;

pub use clearing::ClearingService;
pub use engine::{BalanceEntry, EngineSnapshot, TradingEngine};
