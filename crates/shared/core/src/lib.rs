//! Bourse Core Domain
//!
//! Pure domain types for the Bourse exchange core.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod error;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    AssetBalance, AssetId, Order, OrderRef, OrderSnapshot, OrderStatus, Side, TransferMode,
};
pub use error::{BalanceError, ParseError};
pub use values::{DEBT_ACCOUNT, FIRST_TRADER, MAX_SCALE, Price, Quantity, SequenceId, UserId};
