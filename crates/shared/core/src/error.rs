use thiserror::Error;

/// Errors raised when parsing domain identifiers from text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown side: {0}")]
    UnknownSide(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),
}

/// Reasons a single balance refuses a debit or credit
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Insufficient balance")]
    Insufficient,

    #[error("Balance arithmetic overflow")]
    Overflow,
}
