//! Cancellation token for the deferred-stop worker.
//!
//! The worker checks the token between poll attempts and once more right
//! before it signals the preloader, so a cancelled stop never kills.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable flag shared between a [`DeferredStop`](crate::shutdown::DeferredStop)
/// handle and its worker thread.
///
/// ```
/// use guard_zeus::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_side = token.clone();
///
/// token.cancel();
/// assert!(worker_side.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
