use serde::{Deserialize, Serialize};

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order is active and has not traded yet
    Pending,
    /// Order has been partially filled and is still resting
    PartiallyFilled,
    /// Order has been completely filled
    FullyFilled,
    /// Order has been canceled by its owner
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::FullyFilled | OrderStatus::Cancelled)
    }

    /// Returns true if the order is still active
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PartiallyFilled)
    }
}
