use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TransferMode;
use crate::error::BalanceError;

/// Balance of one user in one asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    /// Free to trade or withdraw
    pub available: Decimal,
    /// Reserved by resting orders
    pub frozen: Decimal,
}

impl AssetBalance {
    pub fn new(available: Decimal, frozen: Decimal) -> Self {
        Self { available, frozen }
    }

    /// Total balance (available + frozen), `None` on overflow
    pub fn checked_total(&self) -> Option<Decimal> {
        self.available.checked_add(self.frozen)
    }

    /// Total balance (available + frozen), saturating at the Decimal bounds
    pub fn total(&self) -> Decimal {
        self.available.saturating_add(self.frozen)
    }

    /// Take `amount` from the sub-balance `mode` draws from.
    ///
    /// With `check_balance` set, an insufficient source is refused. A refused
    /// debit leaves the balance untouched.
    pub fn debit(
        &mut self,
        mode: TransferMode,
        amount: Decimal,
        check_balance: bool,
    ) -> Result<(), BalanceError> {
        let source = match mode {
            TransferMode::AvailableToAvailable | TransferMode::AvailableToFrozen => {
                &mut self.available
            }
            TransferMode::FrozenToAvailable => &mut self.frozen,
        };
        if check_balance && *source < amount {
            return Err(BalanceError::Insufficient);
        }
        *source = source.checked_sub(amount).ok_or(BalanceError::Overflow)?;
        Ok(())
    }

    /// Add `amount` to the sub-balance `mode` pays into
    pub fn credit(&mut self, mode: TransferMode, amount: Decimal) -> Result<(), BalanceError> {
        let target = match mode {
            TransferMode::AvailableToAvailable | TransferMode::FrozenToAvailable => {
                &mut self.available
            }
            TransferMode::AvailableToFrozen => &mut self.frozen,
        };
        *target = target.checked_add(amount).ok_or(BalanceError::Overflow)?;
        Ok(())
    }

    /// Put back an amount taken by [`debit`](Self::debit) with the same mode
    pub fn undo_debit(&mut self, mode: TransferMode, amount: Decimal) -> Result<(), BalanceError> {
        let source = match mode {
            TransferMode::AvailableToAvailable | TransferMode::AvailableToFrozen => {
                &mut self.available
            }
            TransferMode::FrozenToAvailable => &mut self.frozen,
        };
        *source = source.checked_add(amount).ok_or(BalanceError::Overflow)?;
        Ok(())
    }
}
