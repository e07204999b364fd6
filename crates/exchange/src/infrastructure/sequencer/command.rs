use bourse_core::{OrderSnapshot, Price, Quantity, SequenceId, Side, UserId};
use rust_decimal::Decimal;
use tokio::sync::oneshot;

use crate::application::EngineSnapshot;
use crate::error::Result;

/// Commands processed one at a time by the sequencer worker
#[derive(Debug)]
pub enum EngineCommand {
    /// Credit a user from the liability account
    Deposit {
        user_id: UserId,
        asset: String,
        amount: Decimal,
        response: oneshot::Sender<Result<()>>,
    },

    /// Place and match a limit order
    CreateOrder {
        user_id: UserId,
        side: Side,
        price: Price,
        quantity: Quantity,
        response: oneshot::Sender<Result<OrderSnapshot>>,
    },

    /// Cancel a resting order
    CancelOrder {
        user_id: UserId,
        sequence_id: SequenceId,
        response: oneshot::Sender<Result<OrderSnapshot>>,
    },

    /// Run the full consistency check
    Validate {
        response: oneshot::Sender<Result<()>>,
    },

    /// Capture the engine state
    Snapshot {
        response: oneshot::Sender<EngineSnapshot>,
    },

    /// Stop the worker after everything queued before it
    Shutdown,
}

/// Counters exposed by the sequencer handle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencerStats {
    pub commands_processed: u64,
    pub commands_failed: u64,
    pub commands_in_queue: usize,
    pub halted: bool,
}
