use rust_decimal::Decimal;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Quantity value - uses Decimal for precision
pub type Quantity = Decimal;

/// Identifier of a user account
pub type UserId = u64;

/// Engine-assigned order identifier, strictly increasing
pub type SequenceId = u64;

/// System liability account, counter-party of every deposit
pub const DEBT_ACCOUNT: UserId = 1;

/// Lowest user id an ordinary trader may have
pub const FIRST_TRADER: UserId = 1000;

/// Maximum number of fractional digits accepted on external prices and amounts
pub const MAX_SCALE: u32 = 2;
