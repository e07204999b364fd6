//! Serialized access to a [`TradingEngine`] from any number of tasks
//!
//! A dedicated thread owns the engine and drains a bounded command queue.
//! Callers hold cheap [`EngineHandle`] clones and await replies over
//! oneshot channels. Balances and active orders stay readable without a
//! round trip through the queue.

mod command;
mod worker;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

use bourse_core::{OrderSnapshot, Price, Quantity, SequenceId, Side, UserId};
use crossbeam_channel::{Sender, bounded};
use log::{error, info};
use rust_decimal::Decimal;
use tokio::sync::oneshot;

pub use command::{EngineCommand, SequencerStats};
use worker::{STATE_ALIVE, STATE_DEAD, SequencerWorker, SharedState};

use super::{AssetLedger, OrderRegistry};
use crate::application::{EngineSnapshot, TradingEngine};
use crate::config::EngineConfig;
use crate::error::{ExchangeError, Result};

/// Cloneable async front end of the sequencer
#[derive(Clone)]
pub struct EngineHandle {
    sender: Sender<EngineCommand>,
    shared: Arc<SharedState>,
    ledger: Arc<AssetLedger>,
    registry: Arc<OrderRegistry>,
}

impl EngineHandle {
    /// Send a command to the worker
    pub fn send(&self, cmd: EngineCommand) -> Result<()> {
        if self.shared.lifecycle.load(Ordering::Acquire) == STATE_DEAD {
            return Err(ExchangeError::SequencerShutdown);
        }
        self.sender
            .send(cmd)
            .map_err(|_| ExchangeError::SequencerShutdown)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx))?;
        rx.await.map_err(|_| ExchangeError::SequencerShutdown)
    }

    pub async fn deposit(&self, user_id: UserId, asset: &str, amount: Decimal) -> Result<()> {
        let asset = asset.to_string();
        self.request(|response| EngineCommand::Deposit {
            user_id,
            asset,
            amount,
            response,
        })
        .await?
    }

    pub async fn create_order(
        &self,
        user_id: UserId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Result<OrderSnapshot> {
        self.request(|response| EngineCommand::CreateOrder {
            user_id,
            side,
            price,
            quantity,
            response,
        })
        .await?
    }

    pub async fn cancel_order(
        &self,
        user_id: UserId,
        sequence_id: SequenceId,
    ) -> Result<OrderSnapshot> {
        self.request(|response| EngineCommand::CancelOrder {
            user_id,
            sequence_id,
            response,
        })
        .await?
    }

    pub async fn validate(&self) -> Result<()> {
        self.request(|response| EngineCommand::Validate { response })
            .await?
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        self.request(|response| EngineCommand::Snapshot { response })
            .await
    }

    /// Balances, readable while the worker runs
    pub fn ledger(&self) -> &Arc<AssetLedger> {
        &self.ledger
    }

    /// Active orders, readable while the worker runs
    pub fn registry(&self) -> &Arc<OrderRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> SequencerStats {
        SequencerStats {
            commands_processed: self.shared.commands_processed.load(Ordering::Relaxed),
            commands_failed: self.shared.commands_failed.load(Ordering::Relaxed),
            commands_in_queue: self.sender.len(),
            halted: self.shared.halted.load(Ordering::Acquire),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.shared.lifecycle.load(Ordering::Acquire) == STATE_ALIVE
    }
}

/// Owner of the worker thread
pub struct Sequencer {
    handle: EngineHandle,
    thread: Option<JoinHandle<()>>,
}

impl Sequencer {
    /// Start a worker around a fresh engine
    pub fn spawn(config: EngineConfig) -> std::io::Result<Self> {
        Self::spawn_engine(TradingEngine::new(config))
    }

    /// Start a worker around an existing engine
    pub fn spawn_engine(engine: TradingEngine) -> std::io::Result<Self> {
        let (sender, receiver) = bounded(engine.config().command_buffer_size);
        let shared = Arc::new(SharedState::default());

        let handle = EngineHandle {
            sender,
            shared: Arc::clone(&shared),
            ledger: engine.ledger(),
            registry: engine.registry(),
        };

        let worker = SequencerWorker::new(engine, receiver, shared);
        let thread = thread::Builder::new()
            .name("bourse-sequencer".to_string())
            .spawn(move || worker.run())?;

        info!("Sequencer spawned");
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Process everything already queued, then stop and join the worker
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Already gone if the worker exited on its own
        let _ = self.handle.send(EngineCommand::Shutdown);
        if thread.join().is_err() {
            error!("Sequencer thread panicked");
        }
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}
