use bourse_core::{AssetId, ParseError, SequenceId, UserId};
use bourse_matching::MatchingError;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::infrastructure::LedgerError;

/// How a caller should treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input, rejected before any state changed
    InvalidInput,
    /// Valid request refused by business rules, no state changed
    Rejected,
    /// Defect in the core; the engine stops accepting work
    Fatal,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Invalid user id: {0}")]
    InvalidUser(UserId),

    #[error("Invalid asset id: {0}")]
    InvalidAsset(String),

    #[error("Invalid side: {0}")]
    InvalidSide(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(Decimal),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(Decimal),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Insufficient {asset} for user {user_id}: required {required}")]
    InsufficientFunds {
        user_id: UserId,
        asset: AssetId,
        required: Decimal,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(SequenceId),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Engine halted after a fatal error")]
    Halted,

    #[error("Sequencer has shut down")]
    SequencerShutdown,
}

impl ExchangeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ExchangeError::InvalidUser(_)
            | ExchangeError::InvalidAsset(_)
            | ExchangeError::InvalidSide(_)
            | ExchangeError::InvalidPrice(_)
            | ExchangeError::InvalidQuantity(_)
            | ExchangeError::InvalidAmount(_) => ErrorClass::InvalidInput,
            ExchangeError::InsufficientFunds { .. } | ExchangeError::OrderNotFound(_) => {
                ErrorClass::Rejected
            }
            ExchangeError::InvariantViolation(_)
            | ExchangeError::Halted
            | ExchangeError::SequencerShutdown => ErrorClass::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;

impl From<ParseError> for ExchangeError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnknownSide(side) => ExchangeError::InvalidSide(side),
            ParseError::UnknownAsset(asset) => ExchangeError::InvalidAsset(asset),
        }
    }
}

impl From<MatchingError> for ExchangeError {
    fn from(err: MatchingError) -> Self {
        // Registry and books diverged
        ExchangeError::InvariantViolation(err.to_string())
    }
}

impl From<LedgerError> for ExchangeError {
    fn from(err: LedgerError) -> Self {
        ExchangeError::InvariantViolation(err.to_string())
    }
}
