use std::sync::Arc;

use bourse_core::{AssetId, OrderRef, Price, Quantity, Side, TransferMode};
use bourse_matching::MatchResult;
use log::debug;
use rust_decimal::Decimal;

use crate::error::{ExchangeError, Result};
use crate::infrastructure::{AssetLedger, OrderRegistry};

/// Turns match results into balance movements
///
/// Every transfer here draws on funds frozen at order creation, so a refused
/// transfer is reported as an invariant violation.
#[derive(Debug)]
pub struct ClearingService {
    ledger: Arc<AssetLedger>,
    registry: Arc<OrderRegistry>,
}

impl ClearingService {
    pub fn new(ledger: Arc<AssetLedger>, registry: Arc<OrderRegistry>) -> Self {
        Self { ledger, registry }
    }

    /// Settle every trade of a match, then retire filled orders
    pub fn settle(&self, result: &MatchResult) -> Result<()> {
        let taker = &result.taker;

        for record in &result.records {
            let maker = &record.maker;
            let price = record.price;
            let matched = record.quantity;

            match taker.side {
                Side::Buy => {
                    // Taker reserved at its own limit; give back the improvement
                    if taker.price > price {
                        let refund = fiat_value(taker.price - price, matched)?;
                        self.ledger.unfreeze(taker.user_id, AssetId::Fiat, refund)?;
                        debug!(
                            "Refunded {} FIAT to user {} on order #{}",
                            refund, taker.user_id, taker.sequence_id
                        );
                    }
                    self.ledger.transfer(
                        TransferMode::FrozenToAvailable,
                        taker.user_id,
                        maker.user_id,
                        AssetId::Fiat,
                        fiat_value(price, matched)?,
                    )?;
                    self.ledger.transfer(
                        TransferMode::FrozenToAvailable,
                        maker.user_id,
                        taker.user_id,
                        AssetId::Stock,
                        matched,
                    )?;
                }
                Side::Sell => {
                    self.ledger.transfer(
                        TransferMode::FrozenToAvailable,
                        taker.user_id,
                        maker.user_id,
                        AssetId::Stock,
                        matched,
                    )?;
                    self.ledger.transfer(
                        TransferMode::FrozenToAvailable,
                        maker.user_id,
                        taker.user_id,
                        AssetId::Fiat,
                        fiat_value(price, matched)?,
                    )?;
                }
            }

            if maker.is_filled() {
                self.registry.remove_order(maker.sequence_id)?;
            }
        }

        if taker.is_filled() {
            self.registry.remove_order(taker.sequence_id)?;
        }
        Ok(())
    }

    /// Release what a cancelled order still holds and retire it
    pub fn settle_cancellation(&self, order: &OrderRef) -> Result<()> {
        let (asset, amount) = order.frozen_requirement();
        self.ledger
            .unfreeze(order.user_id, asset, amount)
            .map_err(|e| {
                ExchangeError::InvariantViolation(format!(
                    "cannot release reservation of order {}: {}",
                    order.sequence_id, e
                ))
            })?;
        self.registry.remove_order(order.sequence_id)?;
        Ok(())
    }
}

/// FIAT amount of `quantity` at `price`
fn fiat_value(price: Price, quantity: Quantity) -> Result<Decimal> {
    price.checked_mul(quantity).ok_or_else(|| {
        ExchangeError::InvariantViolation(format!(
            "trade value of {} at {} overflows",
            quantity, price
        ))
    })
}
