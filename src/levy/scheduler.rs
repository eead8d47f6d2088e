use crate::error::{LedgerError, Result};
use crate::levy::LevyEngine;
use log::{error, info};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct LevyScheduler;

/// Running scheduler. Dropping the handle stops it as well.
pub struct LevyHandle {
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl LevyScheduler {
    /// Runs a levy cycle every `tick`, the first one a full tick after start.
    pub fn start(engine: Arc<LevyEngine>, tick: Duration) -> Result<LevyHandle> {
        let (shutdown, signal) = mpsc::channel::<()>();
        let worker = thread::Builder::new()
            .name("levy-scheduler".to_string())
            .spawn(move || loop {
                match signal.recv_timeout(tick) {
                    Err(RecvTimeoutError::Timeout) => match engine.run_cycle() {
                        Ok(report) => {
                            if let Some(block) = &report.block {
                                info!("Levy cycle sealed block #{}", block.get_index());
                            }
                        }
                        Err(e) => error!("Levy cycle failed: {e}"),
                    },
                    // Stop requested, or the handle is gone
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| LedgerError::Io(format!("Failed to spawn levy scheduler: {e}")))?;

        info!("Levy scheduler started (tick {}s)", tick.as_secs());
        Ok(LevyHandle {
            shutdown: Some(shutdown),
            worker: Some(worker),
        })
    }
}

impl LevyHandle {
    /// Signals the loop and waits for it. A cycle already running, including
    /// its seal, finishes first.
    pub fn stop(mut self) {
        self.halt();
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    fn halt(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // Fails only if the loop already exited on its own
            shutdown.send(()).ok();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Levy scheduler panicked");
            }
            info!("Levy scheduler stopped");
        }
    }
}

impl Drop for LevyHandle {
    fn drop(&mut self) {
        self.halt();
    }
}
