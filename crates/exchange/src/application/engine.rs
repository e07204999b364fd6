use std::collections::BTreeMap;
use std::sync::Arc;

use bourse_core::{
    AssetBalance, AssetId, DEBT_ACCOUNT, OrderRef, OrderSnapshot, Price, Quantity, SequenceId,
    Side, TransferMode, UserId,
};
use bourse_matching::{MatchingEngine, PriceLevel};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::clearing::ClearingService;
use super::validation;
use crate::config::EngineConfig;
use crate::error::{ExchangeError, Result};
use crate::infrastructure::{AssetLedger, OrderRegistry};

/// One balance record in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub user_id: UserId,
    pub asset: AssetId,
    pub available: Decimal,
    pub frozen: Decimal,
}

/// Serializable point-in-time view of the whole engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub last_sequence_id: SequenceId,
    pub last_price: Price,
    pub balances: Vec<BalanceEntry>,
    /// Resting bids, best first
    pub bids: Vec<OrderSnapshot>,
    /// Resting asks, best first
    pub asks: Vec<OrderSnapshot>,
}

/// Single-instrument trading engine
///
/// Owns the matching engine and drives registry, matching and clearing for
/// every order. Mutating calls take `&mut self`; for shared use put the
/// engine behind a [`Sequencer`](crate::infrastructure::Sequencer).
///
/// A fatal error halts the engine: it is logged once and every later
/// mutating call returns [`ExchangeError::Halted`].
#[derive(Debug)]
pub struct TradingEngine {
    config: EngineConfig,
    ledger: Arc<AssetLedger>,
    registry: Arc<OrderRegistry>,
    matching: MatchingEngine,
    clearing: ClearingService,
    halted: bool,
}

impl TradingEngine {
    pub fn new(config: EngineConfig) -> Self {
        let ledger = Arc::new(AssetLedger::new());
        let registry = Arc::new(OrderRegistry::new(Arc::clone(&ledger)));
        let clearing = ClearingService::new(Arc::clone(&ledger), Arc::clone(&registry));
        Self {
            config,
            ledger,
            registry,
            matching: MatchingEngine::new(),
            clearing,
            halted: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared balances, readable from any thread
    pub fn ledger(&self) -> Arc<AssetLedger> {
        Arc::clone(&self.ledger)
    }

    /// Shared active-order registry, readable from any thread
    pub fn registry(&self) -> Arc<OrderRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Credit a user from the liability account
    pub fn deposit(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<()> {
        self.execute(|engine| {
            engine.check_user(user_id)?;
            let asset: AssetId = asset.parse()?;
            if !engine.is_valid_decimal(amount) {
                return Err(ExchangeError::InvalidAmount(amount));
            }

            // Every trader balance is bounded by what the liability account owes
            let max_supply = engine.config.max_supply();
            let outstanding = -engine.balance(DEBT_ACCOUNT, asset).available;
            if !outstanding
                .checked_add(amount)
                .is_some_and(|supply| supply <= max_supply)
            {
                warn!(
                    "Deposit rejected: {} {} would take the supply past {}",
                    amount, asset, max_supply
                );
                return Err(ExchangeError::InvalidAmount(amount));
            }

            let credited = engine.ledger.try_transfer(
                TransferMode::AvailableToAvailable,
                DEBT_ACCOUNT,
                user_id,
                asset,
                amount,
                false,
            )?;
            if !credited {
                return Err(ExchangeError::InvariantViolation(format!(
                    "deposit of {} {} to user {} was refused by the ledger",
                    amount, asset, user_id
                )));
            }
            info!("Deposit: user {} +{} {}", user_id, amount, asset);
            Ok(())
        })
    }

    /// Place a limit order and match it immediately
    ///
    /// Returns the order in whatever state matching left it: resting,
    /// partially filled or fully filled.
    pub fn create_order(
        &mut self,
        user_id: UserId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Result<OrderRef> {
        self.execute(|engine| {
            engine.check_user(user_id)?;
            if !engine.is_valid_decimal(price) {
                return Err(ExchangeError::InvalidPrice(price));
            }
            if !engine.is_valid_decimal(quantity) {
                return Err(ExchangeError::InvalidQuantity(quantity));
            }
            let max_supply = engine.config.max_supply();
            let within_supply = price
                .checked_mul(quantity)
                .is_some_and(|value| value <= max_supply && quantity <= max_supply);
            if !within_supply {
                warn!(
                    "Order rejected: {} x {} is beyond the supply ceiling {}",
                    quantity, price, max_supply
                );
                return Err(ExchangeError::InvalidQuantity(quantity));
            }

            let order = engine.registry.create_order(user_id, side, price, quantity)?;
            let result = engine.matching.submit(Arc::clone(&order))?;
            if !result.is_empty() {
                debug!(
                    "Order #{} matched {} in {} trade(s)",
                    order.sequence_id,
                    result.matched_quantity(),
                    result.records.len()
                );
            }
            engine.clearing.settle(&result)?;
            Ok(order)
        })
    }

    /// Same as [`create_order`](Self::create_order) with the side given by name
    pub fn create_order_str(
        &mut self,
        user_id: UserId,
        side: &str,
        price: Price,
        quantity: Quantity,
    ) -> Result<OrderRef> {
        if self.halted {
            return Err(ExchangeError::Halted);
        }
        let side: Side = side.parse()?;
        self.create_order(user_id, side, price, quantity)
    }

    /// Cancel a resting order owned by `user_id`
    pub fn cancel_order(&mut self, user_id: UserId, sequence_id: SequenceId) -> Result<OrderRef> {
        self.execute(|engine| {
            engine.check_user(user_id)?;
            let order = match engine.registry.get_order(sequence_id) {
                Some(order) if order.user_id == user_id => order,
                _ => {
                    warn!(
                        "Cancel rejected: order {} not found for user {}",
                        sequence_id, user_id
                    );
                    return Err(ExchangeError::OrderNotFound(sequence_id));
                }
            };

            engine.matching.cancel(&order)?;
            engine.clearing.settle_cancellation(&order)?;
            info!("Order cancelled: {}", order);
            Ok(order)
        })
    }

    /// Check every cross-component invariant; a failure halts the engine
    pub fn validate(&mut self) -> Result<()> {
        let result = validation::validate(&self.ledger, &self.registry, &self.matching);
        if let Err(err) = &result {
            self.halt(err);
        }
        result
    }

    pub fn balance(&self, user_id: UserId, asset: AssetId) -> AssetBalance {
        self.ledger.balance(user_id, asset).unwrap_or_default()
    }

    pub fn user_balances(&self, user_id: UserId) -> BTreeMap<AssetId, AssetBalance> {
        self.ledger.user_balances(user_id)
    }

    /// Active order by sequence id
    pub fn order(&self, sequence_id: SequenceId) -> Option<OrderRef> {
        self.registry.get_order(sequence_id)
    }

    pub fn active_orders(&self) -> Vec<OrderRef> {
        self.registry.active_orders()
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.matching.best_bid()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.matching.best_ask()
    }

    pub fn last_price(&self) -> Price {
        self.matching.last_price()
    }

    /// Aggregated price levels of one side, best first
    pub fn depth(&self, side: Side, limit: usize) -> Vec<PriceLevel> {
        self.matching.book(side).depth(limit)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let resting = |side| {
            self.matching
                .book(side)
                .iter()
                .map(|o| o.snapshot())
                .collect::<Vec<_>>()
        };
        EngineSnapshot {
            last_sequence_id: self.registry.last_sequence_id(),
            last_price: self.matching.last_price(),
            balances: self
                .ledger
                .balances()
                .into_iter()
                .map(|(user_id, asset, b)| BalanceEntry {
                    user_id,
                    asset,
                    available: b.available,
                    frozen: b.frozen,
                })
                .collect(),
            bids: resting(Side::Buy),
            asks: resting(Side::Sell),
        }
    }

    /// Run one mutating command with halting and optional self-check
    fn execute<T>(&mut self, command: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.halted {
            return Err(ExchangeError::Halted);
        }

        let result = command(self);
        if let Err(err) = &result {
            if err.is_fatal() {
                self.halt(err);
            }
            return result;
        }

        if self.config.validate_after_each_command {
            self.validate()?;
        }
        result
    }

    /// Stop accepting mutating calls; only the first reason is logged
    pub fn halt(&mut self, err: &ExchangeError) {
        if !self.halted {
            error!("Trading engine halted: {}", err);
            self.halted = true;
        }
    }

    fn check_user(&self, user_id: UserId) -> Result<()> {
        if user_id < self.config.first_trader_id {
            return Err(ExchangeError::InvalidUser(user_id));
        }
        Ok(())
    }

    /// Positive and within the configured number of fractional digits
    fn is_valid_decimal(&self, value: Decimal) -> bool {
        value > Decimal::ZERO && value.scale() <= self.config.max_scale
    }
}

impl Default for TradingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
