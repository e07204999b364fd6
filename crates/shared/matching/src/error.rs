use bourse_core::SequenceId;
use thiserror::Error;

/// Domain-level errors for matching operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchingError {
    #[error("Order {0} not found in order book")]
    OrderNotInBook(SequenceId),

    #[error("Order {0} already rests in the order book")]
    DuplicateOrder(SequenceId),
}

pub type MatchingResult<T> = std::result::Result<T, MatchingError>;
