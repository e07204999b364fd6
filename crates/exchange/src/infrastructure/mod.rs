mod ledger;
mod registry;
pub mod sequencer;

pub use ledger::{AssetLedger, LedgerError, LedgerResult};
pub use registry::OrderRegistry;
pub use sequencer::{EngineCommand, EngineHandle, Sequencer, SequencerStats};
