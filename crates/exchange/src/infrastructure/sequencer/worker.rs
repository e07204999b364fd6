use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};

use super::command::EngineCommand;
use crate::application::TradingEngine;
use crate::error::{ExchangeError, Result};

pub(super) const STATE_ALIVE: u8 = 0;
pub(super) const STATE_SHUTTING_DOWN: u8 = 1;
pub(super) const STATE_DEAD: u8 = 2;

/// State shared between the worker and every handle
#[derive(Debug, Default)]
pub(super) struct SharedState {
    pub commands_processed: AtomicU64,
    pub commands_failed: AtomicU64,
    pub halted: AtomicBool,
    pub lifecycle: AtomicU8,
}

/// Marks the worker dead however `run` exits, including by unwinding.
///
/// Commands still queued are dropped with their reply channels, so their
/// callers get `SequencerShutdown` instead of waiting forever.
struct ExitGuard {
    shared: Arc<SharedState>,
    receiver: Receiver<EngineCommand>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.shared.lifecycle.store(STATE_DEAD, Ordering::Release);
        let dropped = self.receiver.try_iter().count();
        if dropped > 0 {
            warn!("Sequencer dropped {} queued command(s)", dropped);
        }
    }
}

/// Sole owner of the trading engine
pub(super) struct SequencerWorker {
    engine: TradingEngine,
    receiver: Receiver<EngineCommand>,
    shared: Arc<SharedState>,
}

impl SequencerWorker {
    pub fn new(
        engine: TradingEngine,
        receiver: Receiver<EngineCommand>,
        shared: Arc<SharedState>,
    ) -> Self {
        Self {
            engine,
            receiver,
            shared,
        }
    }

    /// Main loop, commands are handled strictly in arrival order
    pub fn run(mut self) {
        info!("Sequencer started");
        let _exit = ExitGuard {
            shared: Arc::clone(&self.shared),
            receiver: self.receiver.clone(),
        };

        loop {
            match self.receiver.recv() {
                Ok(cmd) => {
                    if !self.process_command(cmd) {
                        break;
                    }
                }
                Err(_) => {
                    // Every handle dropped
                    info!("Sequencer channel closed");
                    break;
                }
            }
        }

        info!(
            "Sequencer stopped after {} commands",
            self.shared.commands_processed.load(Ordering::Relaxed)
        );
    }

    /// Process a single command, returns false on shutdown
    fn process_command(&mut self, cmd: EngineCommand) -> bool {
        match cmd {
            EngineCommand::Deposit {
                user_id,
                asset,
                amount,
                response,
            } => {
                let result = self.guarded(|engine| engine.deposit(user_id, &asset, amount));
                let _ = response.send(result);
            }

            EngineCommand::CreateOrder {
                user_id,
                side,
                price,
                quantity,
                response,
            } => {
                let result = self.guarded(|engine| {
                    engine
                        .create_order(user_id, side, price, quantity)
                        .map(|order| order.snapshot())
                });
                let _ = response.send(result);
            }

            EngineCommand::CancelOrder {
                user_id,
                sequence_id,
                response,
            } => {
                let result = self.guarded(|engine| {
                    engine
                        .cancel_order(user_id, sequence_id)
                        .map(|order| order.snapshot())
                });
                let _ = response.send(result);
            }

            EngineCommand::Validate { response } => {
                let result = self.guarded(|engine| engine.validate());
                let _ = response.send(result);
            }

            EngineCommand::Snapshot { response } => {
                match panic::catch_unwind(AssertUnwindSafe(|| self.engine.snapshot())) {
                    Ok(snapshot) => {
                        let _ = response.send(snapshot);
                    }
                    // Dropping the reply channel tells the caller
                    Err(payload) => {
                        let err = self.contain_panic(payload.as_ref());
                        self.record::<()>(&Err(err));
                    }
                }
            }

            EngineCommand::Shutdown => {
                debug!("Sequencer received shutdown");
                self.shared
                    .lifecycle
                    .store(STATE_SHUTTING_DOWN, Ordering::Release);
                return false;
            }
        }
        true
    }

    /// Run one engine call; a panic halts the engine and becomes the reply
    fn guarded<T>(&mut self, command: impl FnOnce(&mut TradingEngine) -> Result<T>) -> Result<T> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| command(&mut self.engine)))
            .unwrap_or_else(|payload| Err(self.contain_panic(payload.as_ref())));
        self.record(&result);
        result
    }

    fn contain_panic(&mut self, payload: &(dyn Any + Send)) -> ExchangeError {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic");
        error!("Sequencer command panicked: {}", message);

        let err = ExchangeError::InvariantViolation(format!("command panicked: {}", message));
        self.engine.halt(&err);
        err
    }

    fn record<T>(&self, result: &Result<T>) {
        self.shared.commands_processed.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.shared.commands_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.shared
            .halted
            .store(self.engine.is_halted(), Ordering::Release);
    }
}
