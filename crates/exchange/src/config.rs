//! Configuration for the trading engine
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration.

use bourse_core::{DEBT_ACCOUNT, FIRST_TRADER, MAX_SCALE, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Largest scale `rust_decimal` can represent
const DECIMAL_MAX_SCALE: u32 = 28;

/// Order values carry the scale of price and quantity combined
const MAX_CONFIG_SCALE: u32 = DECIMAL_MAX_SCALE / 2;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Lowest user id accepted for deposits and orders
    #[serde(default = "default_first_trader_id")]
    pub first_trader_id: UserId,

    /// Maximum fractional digits on prices, quantities and deposit amounts
    #[serde(default = "default_max_scale")]
    pub max_scale: u32,

    /// Bound of the sequencer command queue
    #[serde(default = "default_command_buffer_size")]
    pub command_buffer_size: usize,

    /// Run the full consistency check after every mutating call
    #[serde(default)]
    pub validate_after_each_command: bool,
}

fn default_first_trader_id() -> UserId {
    FIRST_TRADER
}

fn default_max_scale() -> u32 {
    MAX_SCALE
}

fn default_command_buffer_size() -> usize {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            first_trader_id: default_first_trader_id(),
            max_scale: default_max_scale(),
            command_buffer_size: default_command_buffer_size(),
            validate_after_each_command: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Self-checking preset used by tests and audits
    pub fn strict() -> Self {
        Self {
            validate_after_each_command: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.first_trader_id <= DEBT_ACCOUNT {
            return Err(ConfigError::Invalid(format!(
                "first_trader_id must be above the liability account {}",
                DEBT_ACCOUNT
            )));
        }
        if self.command_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "command_buffer_size must be positive".to_string(),
            ));
        }
        if self.max_scale > MAX_CONFIG_SCALE {
            return Err(ConfigError::Invalid(format!(
                "max_scale must not exceed {}",
                MAX_CONFIG_SCALE
            )));
        }
        Ok(())
    }

    /// Ceiling on the outstanding supply of each asset and on any order value.
    ///
    /// Balances and order values carry up to twice `max_scale` fractional
    /// digits; below this bound they stay exact in a `Decimal`.
    pub fn max_supply(&self) -> Decimal {
        let digits = DECIMAL_MAX_SCALE.saturating_sub(self.max_scale.saturating_mul(2));
        Decimal::from_i128_with_scale(10i128.pow(digits), 0)
    }
}
