//! Handle to a stop that waits for peers in the background.

use crate::cancel::CancellationToken;
use crate::error::{Result, ZeusError};
use crate::process::Termination;
use std::thread::JoinHandle;

/// Thread name of the deferred-stop worker.
pub const WORKER_NAME: &str = "zeus-deferred-stop";

/// How a deferred stop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredResult {
    /// The preloader was stopped (or was already gone).
    Completed(Termination),
    /// [`DeferredStop::cancel`] won the race; nothing was signalled.
    Cancelled,
}

/// A pending last-one-out stop.
///
/// Dropping the handle detaches the worker; it still stops Zeus once the
/// peers are gone.
#[derive(Debug)]
pub struct DeferredStop {
    handle: JoinHandle<Result<DeferredResult>>,
    token: CancellationToken,
}

impl DeferredStop {
    /// Start `work` on a named thread. `work` receives a clone of the
    /// handle's token.
    pub fn spawn<F>(work: F) -> Result<Self>
    where
        F: FnOnce(CancellationToken) -> Result<DeferredResult> + Send + 'static,
    {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let handle = std::thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || work(worker_token))?;
        Ok(Self { handle, token })
    }

    /// Abandon the stop if it has not signalled yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker.
    pub fn join(self) -> Result<DeferredResult> {
        self.handle
            .join()
            .map_err(|_| ZeusError::Other(format!("{} thread panicked", WORKER_NAME)))?
    }
}
