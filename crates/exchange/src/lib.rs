//! Single-instrument spot exchange core
//!
//! Users deposit FIAT and STOCK against a liability account, place limit
//! orders that reserve funds up front, and have them matched by price-time
//! priority. [`TradingEngine`] drives ledger, registry, matching and
//! clearing for each command; [`Sequencer`] puts one engine behind an async
//! handle so that many callers can share it.

// Application layer
pub mod application;

// Infrastructure layer
pub mod infrastructure;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod model;

// Re-export main types for convenience
pub use application::{EngineSnapshot, TradingEngine};
pub use config::{ConfigError, EngineConfig};
pub use error::{ErrorClass, ExchangeError, Result};
pub use infrastructure::{AssetLedger, EngineHandle, OrderRegistry, Sequencer, SequencerStats};
