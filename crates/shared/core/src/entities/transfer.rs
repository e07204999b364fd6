use serde::{Deserialize, Serialize};

/// Which sub-balances a ledger transfer moves funds between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferMode {
    /// Source available to destination available (deposits)
    AvailableToAvailable,
    /// Source available to destination frozen (reserving funds for an order)
    AvailableToFrozen,
    /// Source frozen to destination available (settlement, unfreezing)
    FrozenToAvailable,
}
