use std::collections::BTreeMap;

use bourse_core::{AssetBalance, AssetId, BalanceError, TransferMode, UserId};
use dashmap::DashMap;
use log::{debug, warn};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Negative transfer amount: {0}")]
    NegativeAmount(Decimal),

    #[error("Transfer failed for {mode:?}, from user {from} to user {to}, asset = {asset}, amount = {amount}")]
    TransferFailed {
        mode: TransferMode,
        from: UserId,
        to: UserId,
        asset: AssetId,
        amount: Decimal,
    },

    #[error("Balance overflow for user {user_id}, asset = {asset}, amount = {amount}")]
    Overflow {
        user_id: UserId,
        asset: AssetId,
        amount: Decimal,
    },
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Per-user, per-asset balances
///
/// Thread-safe storage using DashMap. Each (user, asset) record is mutated
/// under its own entry guard, and a transfer never holds two guards at once.
#[derive(Debug, Default)]
pub struct AssetLedger {
    balances: DashMap<(UserId, AssetId), AssetBalance>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
        }
    }

    /// Move `amount` of `asset` between two sub-balances.
    ///
    /// Returns `Ok(false)` without touching anything when `check_balance` is
    /// set and the source is short. Without the check the source may go
    /// negative, which only the liability account relies on.
    pub fn try_transfer(
        &self,
        mode: TransferMode,
        from: UserId,
        to: UserId,
        asset: AssetId,
        amount: Decimal,
        check_balance: bool,
    ) -> LedgerResult<bool> {
        if amount.is_zero() {
            return Ok(true);
        }
        if amount < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount(amount));
        }

        let overflow = |user_id| LedgerError::Overflow {
            user_id,
            asset,
            amount,
        };

        if from == to {
            let mut balance = self.balances.entry((from, asset)).or_default();
            let mut updated = *balance;
            match updated.debit(mode, amount, check_balance) {
                Ok(()) => {}
                Err(BalanceError::Insufficient) => return Ok(false),
                Err(BalanceError::Overflow) => return Err(overflow(from)),
            }
            updated.credit(mode, amount).map_err(|_| overflow(to))?;
            *balance = updated;
        } else {
            // Destination record exists even if the debit below is refused
            drop(self.balances.entry((to, asset)).or_default());

            match self
                .balances
                .entry((from, asset))
                .or_default()
                .debit(mode, amount, check_balance)
            {
                Ok(()) => {}
                Err(BalanceError::Insufficient) => return Ok(false),
                Err(BalanceError::Overflow) => return Err(overflow(from)),
            }

            let credited = self
                .balances
                .entry((to, asset))
                .or_default()
                .credit(mode, amount);
            if credited.is_err() {
                // Hand the debited amount back before reporting
                if self
                    .balances
                    .entry((from, asset))
                    .or_default()
                    .undo_debit(mode, amount)
                    .is_err()
                {
                    warn!("Could not restore {} {} to user {}", amount, asset, from);
                }
                return Err(overflow(to));
            }
        }

        debug!(
            "Transfer {:?}: {} {} from user {} to user {}",
            mode, amount, asset, from, to
        );
        Ok(true)
    }

    /// Checked transfer whose failure means balances and orders diverged
    pub fn transfer(
        &self,
        mode: TransferMode,
        from: UserId,
        to: UserId,
        asset: AssetId,
        amount: Decimal,
    ) -> LedgerResult<()> {
        if self.try_transfer(mode, from, to, asset, amount, true)? {
            Ok(())
        } else {
            Err(LedgerError::TransferFailed {
                mode,
                from,
                to,
                asset,
                amount,
            })
        }
    }

    /// Reserve available funds of a user
    pub fn try_freeze(&self, user_id: UserId, asset: AssetId, amount: Decimal) -> LedgerResult<bool> {
        self.try_transfer(
            TransferMode::AvailableToFrozen,
            user_id,
            user_id,
            asset,
            amount,
            true,
        )
    }

    /// Release reserved funds of a user
    pub fn unfreeze(&self, user_id: UserId, asset: AssetId, amount: Decimal) -> LedgerResult<()> {
        self.transfer(
            TransferMode::FrozenToAvailable,
            user_id,
            user_id,
            asset,
            amount,
        )
    }

    /// Balance record, if it was ever referenced
    pub fn balance(&self, user_id: UserId, asset: AssetId) -> Option<AssetBalance> {
        self.balances.get(&(user_id, asset)).map(|b| *b.value())
    }

    /// All balance records of one user
    pub fn user_balances(&self, user_id: UserId) -> BTreeMap<AssetId, AssetBalance> {
        AssetId::ALL
            .into_iter()
            .filter_map(|asset| self.balance(user_id, asset).map(|b| (asset, b)))
            .collect()
    }

    /// Snapshot of every record, ordered by user then asset
    pub fn balances(&self) -> Vec<(UserId, AssetId, AssetBalance)> {
        let mut all: Vec<_> = self
            .balances
            .iter()
            .map(|entry| {
                let (user_id, asset) = *entry.key();
                (user_id, asset, *entry.value())
            })
            .collect();
        all.sort_by_key(|(user_id, asset, _)| (*user_id, *asset));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::DEBT_ACCOUNT;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::thread;

    const ALICE: UserId = 1000;
    const BOB: UserId = 1001;

    fn funded(user_id: UserId, asset: AssetId, amount: Decimal) -> AssetLedger {
        let ledger = AssetLedger::new();
        assert!(
            ledger
                .try_transfer(
                    TransferMode::AvailableToAvailable,
                    DEBT_ACCOUNT,
                    user_id,
                    asset,
                    amount,
                    false
                )
                .unwrap()
        );
        ledger
    }

    #[test]
    fn test_deposit_from_liability_account() {
        let ledger = funded(ALICE, AssetId::Fiat, dec!(58000));

        assert_eq!(
            ledger.balance(ALICE, AssetId::Fiat),
            Some(AssetBalance::new(dec!(58000), dec!(0)))
        );
        assert_eq!(
            ledger.balance(DEBT_ACCOUNT, AssetId::Fiat),
            Some(AssetBalance::new(dec!(-58000), dec!(0)))
        );
    }

    #[test]
    fn test_zero_amount_is_noop() {
        let ledger = AssetLedger::new();
        assert_eq!(
            ledger.try_transfer(
                TransferMode::AvailableToAvailable,
                ALICE,
                BOB,
                AssetId::Fiat,
                dec!(0),
                true
            ),
            Ok(true)
        );
        assert!(ledger.balances().is_empty());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let ledger = AssetLedger::new();
        assert_eq!(
            ledger.try_freeze(ALICE, AssetId::Fiat, dec!(-1)),
            Err(LedgerError::NegativeAmount(dec!(-1)))
        );
    }

    #[test]
    fn test_freeze_and_unfreeze() {
        let ledger = funded(ALICE, AssetId::Fiat, dec!(100));

        assert_eq!(ledger.try_freeze(ALICE, AssetId::Fiat, dec!(60)), Ok(true));
        assert_eq!(ledger.try_freeze(ALICE, AssetId::Fiat, dec!(41)), Ok(false));
        assert_eq!(
            ledger.balance(ALICE, AssetId::Fiat),
            Some(AssetBalance::new(dec!(40), dec!(60)))
        );

        ledger.unfreeze(ALICE, AssetId::Fiat, dec!(60)).unwrap();
        assert_eq!(
            ledger.balance(ALICE, AssetId::Fiat),
            Some(AssetBalance::new(dec!(100), dec!(0)))
        );
    }

    #[test]
    fn test_failed_transfer_leaves_balances_untouched() {
        let ledger = funded(ALICE, AssetId::Stock, dec!(1));
        ledger.try_freeze(ALICE, AssetId::Stock, dec!(1)).unwrap();

        let err = ledger
            .transfer(
                TransferMode::FrozenToAvailable,
                ALICE,
                BOB,
                AssetId::Stock,
                dec!(1.5),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::TransferFailed { .. }));
        assert_eq!(
            ledger.balance(ALICE, AssetId::Stock),
            Some(AssetBalance::new(dec!(0), dec!(1)))
        );
        // Records for both parties exist after the attempt
        assert_eq!(ledger.balance(BOB, AssetId::Stock), Some(AssetBalance::default()));
    }

    #[test]
    fn test_settlement_between_users() {
        let ledger = funded(ALICE, AssetId::Fiat, dec!(500));
        ledger.try_freeze(ALICE, AssetId::Fiat, dec!(300)).unwrap();

        ledger
            .transfer(
                TransferMode::FrozenToAvailable,
                ALICE,
                BOB,
                AssetId::Fiat,
                dec!(300),
            )
            .unwrap();

        assert_eq!(
            ledger.user_balances(ALICE)[&AssetId::Fiat],
            AssetBalance::new(dec!(200), dec!(0))
        );
        assert_eq!(
            ledger.user_balances(BOB)[&AssetId::Fiat],
            AssetBalance::new(dec!(300), dec!(0))
        );
    }

    #[test]
    fn test_overflowing_credit_is_rolled_back() {
        let ledger = funded(ALICE, AssetId::Fiat, Decimal::MAX);

        let err = ledger
            .try_transfer(
                TransferMode::AvailableToAvailable,
                BOB,
                ALICE,
                AssetId::Fiat,
                dec!(1),
                false,
            )
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::Overflow {
                user_id: ALICE,
                asset: AssetId::Fiat,
                amount: dec!(1)
            }
        );
        assert_eq!(ledger.balance(BOB, AssetId::Fiat), Some(AssetBalance::default()));
        assert_eq!(
            ledger.balance(ALICE, AssetId::Fiat),
            Some(AssetBalance::new(Decimal::MAX, dec!(0)))
        );
    }

    #[test]
    fn test_overflowing_liability_is_refused() {
        let ledger = funded(ALICE, AssetId::Stock, Decimal::MAX);

        assert!(matches!(
            ledger.try_transfer(
                TransferMode::AvailableToAvailable,
                DEBT_ACCOUNT,
                BOB,
                AssetId::Stock,
                Decimal::MAX,
                false,
            ),
            Err(LedgerError::Overflow { user_id: DEBT_ACCOUNT, .. })
        ));
        assert_eq!(ledger.balance(BOB, AssetId::Stock), Some(AssetBalance::default()));
    }

    #[test]
    fn test_concurrent_transfers_conserve_totals() {
        let ledger = Arc::new(AssetLedger::new());
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..250 {
                        ledger
                            .try_transfer(
                                TransferMode::AvailableToAvailable,
                                DEBT_ACCOUNT,
                                ALICE + i % 3,
                                AssetId::Fiat,
                                dec!(0.01),
                                false,
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total: Decimal = ledger
            .balances()
            .iter()
            .map(|(_, _, b)| b.total())
            .sum();
        assert_eq!(total, dec!(0));
        assert_eq!(
            ledger.balance(DEBT_ACCOUNT, AssetId::Fiat).unwrap().available,
            dec!(-20)
        );
    }
}
